//! Pseudorandom number plumbing for the program generator
//!
//! Program generation consumes randomness in 8-bit and 32-bit units, but
//! the underlying generator produces 64-bit words. [`SipRand`] is the
//! production word source, a SipHash1,3 counter stream keyed from the
//! seed. [`RngStream`] sits on top of any [`RngCore`] and deals the words
//! out in smaller pieces, keeping one queue per piece size so that 8-bit
//! draws never disturb the 32-bit queue and vice versa.
//!
//! Every detail here is load-bearing: the hash program is a pure function
//! of the exact sequence of values these queues return.

use crate::siphash::{siphash13_ctr, SipState};
use rand_core::RngCore;

/// A stream of pseudorandom 64-bit words generated with SipHash1,3
///
/// The counter starts at zero and each output consumes one counter value.
/// This is public so that testing and fuzzing tools can substitute their
/// own word stream via [`crate::HashXBuilder::build_from_rng`].
#[derive(Debug, Clone)]
pub struct SipRand {
    /// SipHash state vector used as the stream key
    key: SipState,
    /// Next unused counter value
    counter: u64,
}

impl SipRand {
    /// Build a new word stream from a SipHash state.
    pub fn new(key: SipState) -> Self {
        SipRand { key, counter: 0 }
    }
}

impl RngCore for SipRand {
    fn next_u64(&mut self) -> u64 {
        let value = siphash13_ctr(self.key, self.counter);
        self.counter += 1;
        value
    }

    fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        rand_core::impls::fill_bytes_via_next(self, dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// 8-bit and 32-bit draws from a 64-bit word source
///
/// Each size has its own shift register: when a draw finds its register
/// empty, one fresh word is taken from the source and handed out from the
/// most significant end downwards.
pub(crate) struct RngStream<'r, R: RngCore> {
    /// Word source shared by both queues
    rng: &'r mut R,
    /// Remainder of the last word consumed by 32-bit draws
    word32: u64,
    /// How many unread 32-bit values `word32` still holds
    avail32: u8,
    /// Remainder of the last word consumed by 8-bit draws
    word8: u64,
    /// How many unread bytes `word8` still holds
    avail8: u8,
}

impl<'r, R: RngCore> RngStream<'r, R> {
    /// Wrap a word source with empty queues.
    #[inline(always)]
    pub(crate) fn new(rng: &'r mut R) -> Self {
        RngStream {
            rng,
            word32: 0,
            avail32: 0,
            word8: 0,
            avail8: 0,
        }
    }

    /// Draw the next 32-bit value.
    #[inline(always)]
    pub(crate) fn next_u32(&mut self) -> u32 {
        if self.avail32 == 0 {
            self.word32 = self.rng.next_u64();
            self.avail32 = 2;
        }
        self.avail32 -= 1;
        (self.word32 >> (32 * self.avail32)) as u32
    }

    /// Draw the next 8-bit value.
    #[inline(always)]
    pub(crate) fn next_u8(&mut self) -> u8 {
        if self.avail8 == 0 {
            self.word8 = self.rng.next_u64();
            self.avail8 = 8;
        }
        self.avail8 -= 1;
        (self.word8 >> (8 * self.avail8)) as u8
    }
}

#[cfg(test)]
mod test {
    use super::{RngStream, SipRand};
    use crate::siphash::SipState;

    /// One expected draw, in either supported width
    #[derive(Debug, PartialEq)]
    enum Value {
        /// Expected result of a 32-bit draw
        U32(u32),
        /// Expected result of an 8-bit draw
        U8(u8),
    }

    #[test]
    fn interleaved_stream_vectors() {
        // Interleaved 8/32-bit queue output for one known key
        let (key0, _key1) = SipState::pair_from_seed(b"abc");
        let mut rng = SipRand::new(key0);
        let mut stream = RngStream::new(&mut rng);

        let expected = vec![
            Value::U32(0xf695edd0),
            Value::U32(0x2205449d),
            Value::U32(0x51c1ac51),
            Value::U32(0xcd19a7d1),
            Value::U8(0xad),
            Value::U32(0x79793a52),
            Value::U32(0xd965083d),
            Value::U8(0xf4),
            Value::U32(0x915e9969),
            Value::U32(0x7563b6e2),
            Value::U32(0x4e5a9d8b),
            Value::U32(0xef2bb9ce),
            Value::U8(0xcb),
            Value::U32(0xa4beee16),
            Value::U32(0x78fa6e6f),
            Value::U8(0x30),
            Value::U32(0xc321cb9f),
            Value::U32(0xbbf29635),
            Value::U32(0x919450f4),
            Value::U32(0xf3d8f358),
            Value::U8(0x3b),
            Value::U32(0x818a72e9),
            Value::U32(0x58225fcf),
            Value::U8(0x98),
            Value::U32(0x3fcb5059),
            Value::U32(0xaf5bcb70),
            Value::U8(0x14),
            Value::U32(0xd41e0326),
            Value::U32(0xe79aebc6),
            Value::U32(0xa348672c),
            Value::U8(0xcf),
            Value::U32(0x5d51b520),
            Value::U32(0x73afc36f),
            Value::U32(0x31348711),
            Value::U32(0xca25b040),
            Value::U32(0x3700c37b),
            Value::U8(0x62),
            Value::U32(0xf0d1d6a6),
            Value::U32(0xc1edebf3),
            Value::U8(0x9d),
            Value::U32(0x9bb1f33f),
            Value::U32(0xf1309c95),
            Value::U32(0x0797718a),
            Value::U32(0xa3bbcf7e),
            Value::U8(0x80),
            Value::U8(0x28),
            Value::U8(0xe9),
            Value::U8(0x2e),
            Value::U32(0xf5506289),
            Value::U32(0x97b46d7c),
            Value::U8(0x64),
            Value::U32(0xc99fe4ad),
            Value::U32(0x6e756189),
            Value::U8(0x54),
            Value::U8(0xf7),
            Value::U8(0x0f),
            Value::U8(0x7d),
            Value::U32(0x38c983eb),
        ];

        let mut actual = Vec::new();
        for item in &expected {
            match item {
                Value::U8(_) => actual.push(Value::U8(stream.next_u8())),
                Value::U32(_) => actual.push(Value::U32(stream.next_u32())),
            }
        }

        assert_eq!(expected, actual);
    }

    #[test]
    fn split_queue_vectors() {
        // 32-bit draws followed by 8-bit draws; the byte queue starts on
        // a fresh word rather than reusing the tail of the 32-bit queue.
        let (key0, _key1) = SipState::pair_from_seed(b"This is a test\0");
        let mut rng = SipRand::new(key0);
        let mut stream = RngStream::new(&mut rng);

        let words: Vec<u32> = (0..8).map(|_| stream.next_u32()).collect();
        assert_eq!(
            words,
            vec![
                0x8c98be2d, 0x86a2127d, 0x7c38aa8e, 0x2b92aacb, 0x2f9c62ef, 0xf853ce56,
                0x70eeecf1, 0x3e6b1e8a,
            ]
        );

        let bytes: Vec<u8> = (0..8).map(|_| stream.next_u8()).collect();
        assert_eq!(bytes, vec![0x62, 0xc0, 0x03, 0xd4, 0x25, 0xaa, 0x50, 0x86]);
    }
}
