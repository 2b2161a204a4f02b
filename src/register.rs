//! The virtual machine's register file and register bookkeeping types

use crate::siphash::{self, SipState};
use std::fmt;

/// Number of 64-bit registers in the HashX machine
pub(crate) const NUM_REGISTERS: usize = 8;

/// Register R5.
///
/// The only register the machine treats specially: it can never be the
/// destination of an add-with-shift, because the x86-64 `lea` encoding
/// HashX assumes can't express r13 as a base register without a
/// displacement byte. The constraint applies on every backend so that
/// all backends agree on the generated program.
pub(crate) const R5: RegisterId = RegisterId(5);

/// One of the eight registers, R0 through R7
#[derive(Clone, Copy, Eq, PartialEq)]
pub(crate) struct RegisterId(u8);

impl fmt::Debug for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

impl RegisterId {
    /// The index of this register within the file, 0 through 7
    #[inline(always)]
    pub(crate) fn as_usize(&self) -> usize {
        self.0 as usize
    }

    /// Construct a RegisterId from an index in 0..8, panicking otherwise.
    ///
    /// Kept private to this module; everything outside obtains registers
    /// by filtering a [`RegisterSet`].
    fn from_usize(n: usize) -> Self {
        assert!(n < NUM_REGISTERS);
        RegisterId(n as u8)
    }
}

/// A subset of the machine's registers, stored as a bit mask
#[derive(Clone, Copy, Eq, PartialEq)]
pub(crate) struct RegisterSet(u8);

impl fmt::Debug for RegisterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for n in 0..NUM_REGISTERS {
            if self.contains(RegisterId::from_usize(n)) {
                list.entry(&RegisterId::from_usize(n));
            }
        }
        list.finish()
    }
}

impl RegisterSet {
    /// The set holding every register.
    ///
    /// Candidate sets always start here and narrow via [`Self::filter`].
    pub(crate) fn all() -> Self {
        RegisterSet(((1_usize << NUM_REGISTERS) - 1) as u8)
    }

    /// Number of registers in the set
    pub(crate) fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Test whether a particular register is in the set.
    pub(crate) fn contains(&self, id: RegisterId) -> bool {
        self.0 & (1 << id.0) != 0
    }

    /// Keep only the registers for which the predicate returns true.
    pub(crate) fn filter<P: FnMut(RegisterId) -> bool>(&self, mut predicate: P) -> Self {
        let mut bits = 0_u8;
        for n in 0..NUM_REGISTERS {
            let id = RegisterId::from_usize(n);
            if self.contains(id) && predicate(id) {
                bits |= 1 << n;
            }
        }
        RegisterSet(bits)
    }

    /// Return the `idx`'th register of the set, in R0-to-R7 order.
    ///
    /// Panics if `idx` is not less than the set's length.
    pub(crate) fn index(&self, idx: usize) -> RegisterId {
        let mut remaining = idx;
        for n in 0..NUM_REGISTERS {
            let id = RegisterId::from_usize(n);
            if self.contains(id) {
                if remaining == 0 {
                    return id;
                }
                remaining -= 1;
            }
        }
        panic!("register set index out of range");
    }
}

/// Values for all eight registers.
///
/// Native code produced by the compiler reads and writes a `RegisterFile`
/// through a raw pointer, so the array must be the only field and the
/// struct must be `repr(C)`.
#[derive(Debug, Clone, Eq, PartialEq)]
#[repr(C)]
pub(crate) struct RegisterFile {
    /// The registers themselves, R0 first
    inner: [u64; NUM_REGISTERS],
}

impl RegisterFile {
    /// Read one register.
    #[inline(always)]
    pub(crate) fn load(&self, id: RegisterId) -> u64 {
        self.inner[id.as_usize()]
    }

    /// Overwrite one register.
    #[inline(always)]
    pub(crate) fn store(&mut self, id: RegisterId, value: u64) {
        self.inner[id.as_usize()] = value;
    }

    /// Fill the register file for one counter-mode hash invocation,
    /// expanding the 64-bit input under the seed-derived key.
    #[inline(always)]
    pub(crate) fn new(key: SipState, input: u64) -> Self {
        RegisterFile {
            inner: siphash::siphash24_ctr(key, input),
        }
    }

    /// Build a register file from already-expanded words (block mode).
    #[inline(always)]
    pub(crate) fn from_words(inner: [u64; NUM_REGISTERS]) -> Self {
        RegisterFile { inner }
    }

    /// Digest the register file down to four output words.
    ///
    /// Each half of the file is treated as a SipHash state and run through
    /// one SipRound, then the halves are combined with XOR. The single
    /// round is what it takes for the output to pass SMHasher.
    #[inline(always)]
    pub(crate) fn digest(&self) -> [u64; 4] {
        let mut x = SipState {
            v0: self.inner[0],
            v1: self.inner[1],
            v2: self.inner[2],
            v3: self.inner[3],
        };
        let mut y = SipState {
            v0: self.inner[4],
            v1: self.inner[5],
            v2: self.inner[6],
            v3: self.inner[7],
        };
        x.sip_round();
        y.sip_round();
        [x.v0 ^ y.v0, x.v1 ^ y.v1, x.v2 ^ y.v2, x.v3 ^ y.v3]
    }
}
