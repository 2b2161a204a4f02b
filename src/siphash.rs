//! The SipHash variants HashX is built from
//!
//! HashX leans on SipHash in three places, none of which is the textbook
//! SipHash-2-4 PRF:
//!
//! - Key setup: instead of initializing 256 bits of state from a 128-bit
//!   key and the standard constants, HashX hashes an arbitrary-length seed
//!   with Blake2b and loads the 512-bit result directly into the state of
//!   two SipHash instances.
//!
//! - A SipHash1,3 counter stream supplies all the pseudorandom numbers
//!   consumed while generating a hash program. See [`crate::rng::SipRand`].
//!
//! - A SipHash2,4 counter construction with 512-bit output fills the
//!   register file from the hash input, and bare SipRounds digest the
//!   register file after the program runs.
//!
//! The SipRound permutation itself is as defined by Jean-Philippe Aumasson
//! and Daniel J. Bernstein in "SipHash: a fast short-input PRF" (2012).

use blake2::digest::block_buffer::LazyBuffer;
use blake2::digest::core_api::{BlockSizeUser, UpdateCore, VariableOutputCore};
use blake2::Blake2bVarCore;
use std::fmt::{self, Debug};

/// Default key-derivation salt, folded into the Blake2b parameter block
/// when a seed is expanded into SipHash keys.
pub(crate) const DEFAULT_SEED_SALT: &[u8] = b"HashX v1";

/// State for one instance of the SipHash permutation
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct SipState {
    /// State variable V0 from the SipHash paper
    pub(crate) v0: u64,
    /// State variable V1 from the SipHash paper
    pub(crate) v1: u64,
    /// State variable V2 from the SipHash paper
    pub(crate) v2: u64,
    /// State variable V3 from the SipHash paper
    pub(crate) v3: u64,
}

impl Debug for SipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SipState {{ v0: {:#018x}, v1: {:#018x}, v2: {:#018x}, v3: {:#018x} }}",
            self.v0, self.v1, self.v2, self.v3
        )
    }
}

impl SipState {
    /// Size of the serialized state, in bytes
    pub(crate) const SIZE: usize = 32;

    /// Load a state vector from its little-endian byte representation.
    ///
    /// HashX only ever builds these from another pseudorandom function
    /// (Blake2b); arbitrary bytes such as all zeroes make a poor key.
    fn from_le_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        /// One little-endian u64 out of the byte array
        fn word(bytes: &[u8], n: usize) -> u64 {
            u64::from_le_bytes(
                bytes[n * 8..(n + 1) * 8]
                    .try_into()
                    .expect("8-byte slice fits a u64"),
            )
        }
        SipState {
            v0: word(bytes, 0),
            v1: word(bytes, 1),
            v2: word(bytes, 2),
            v3: word(bytes, 3),
        }
    }

    /// Derive the two SipHash instances for a seed, using the default salt.
    ///
    /// The first state drives the program generator's number stream, the
    /// second keys the register file.
    pub fn pair_from_seed(seed: &[u8]) -> (SipState, SipState) {
        Self::pair_from_seed_salted(seed, DEFAULT_SEED_SALT)
    }

    /// Derive a SipHash state pair with an explicit Blake2b salt.
    ///
    /// The salt must be at most 16 bytes; shorter salts are zero-padded
    /// by the Blake2b parameter block.
    pub(crate) fn pair_from_seed_salted(seed: &[u8], salt: &[u8]) -> (SipState, SipState) {
        /// Blake2b engine; the low-level interface gives us access to
        /// `new_with_params` and its salt field.
        type Core = Blake2bVarCore;

        /// Block size of the chosen engine
        type BlockSize = <Core as BlockSizeUser>::BlockSize;

        let mut buffer = LazyBuffer::<BlockSize>::new(&[]);
        let mut core = Core::new_with_params(salt, &[], 0, 64);
        let mut digest = Default::default();

        buffer.digest_blocks(seed, |blocks| core.update_blocks(blocks));
        core.finalize_variable_core(&mut buffer, &mut digest);

        (
            Self::from_le_bytes(digest[0..32].try_into().expect("Blake2b output is 64 bytes")),
            Self::from_le_bytes(digest[32..64].try_into().expect("Blake2b output is 64 bytes")),
        )
    }

    /// Apply one SipRound to this state.
    #[inline(always)]
    pub(crate) fn sip_round(&mut self) {
        self.v0 = self.v0.wrapping_add(self.v1);
        self.v2 = self.v2.wrapping_add(self.v3);
        self.v1 = self.v1.rotate_left(13);
        self.v3 = self.v3.rotate_left(16);
        self.v1 ^= self.v0;
        self.v3 ^= self.v2;
        self.v0 = self.v0.rotate_left(32);

        self.v2 = self.v2.wrapping_add(self.v1);
        self.v0 = self.v0.wrapping_add(self.v3);
        self.v1 = self.v1.rotate_left(17);
        self.v3 = self.v3.rotate_left(21);
        self.v1 ^= self.v2;
        self.v3 ^= self.v0;
        self.v2 = self.v2.rotate_left(32);
    }
}

/// SipHash1,3 in HashX's counter mode, with a 64-bit result.
///
/// This is the cheap generator behind the program Rng. SipHash1,3 isn't
/// normally used standalone; the counter construction here is specific
/// to HashX.
pub(crate) fn siphash13_ctr(key: SipState, input: u64) -> u64 {
    let mut s = key;
    s.v3 ^= input;

    s.sip_round();

    s.v0 ^= input;
    s.v2 ^= 0xff;

    s.sip_round();
    s.sip_round();
    s.sip_round();

    (s.v0 ^ s.v1) ^ (s.v2 ^ s.v3)
}

/// SipHash2,4 in HashX's counter mode, with a 512-bit result.
///
/// Expands one 64-bit input into a full register file under the given key.
pub(crate) fn siphash24_ctr(key: SipState, input: u64) -> [u64; 8] {
    let mut s = key;
    s.v1 ^= 0xee;
    s.v3 ^= input;

    s.sip_round();
    s.sip_round();

    s.v0 ^= input;
    s.v2 ^= 0xee;

    s.sip_round();
    s.sip_round();
    s.sip_round();
    s.sip_round();

    let mut t = s;
    t.v1 ^= 0xdd;

    t.sip_round();
    t.sip_round();
    t.sip_round();
    t.sip_round();

    [s.v0, s.v1, s.v2, s.v3, t.v0, t.v1, t.v2, t.v3]
}
