//! Rules that reject registers, instruction pairings, and whole programs
//!
//! The generator never emits an instruction that an optimizing compiler or
//! an ASIC could trivially simplify: no `xor r, r` style self-cancellation,
//! no constant operations that collapse into their predecessor, no chains
//! of multiplies that only accumulate trailing zero bits. This module
//! holds those rules, plus the final whole-program acceptance check.
//!
//! The rules double as part of the program derivation itself: a different
//! rejection anywhere here changes which random draws happen next and
//! therefore changes every subsequent instruction.

use crate::program::{Instruction, InstructionArray, Opcode};
use crate::register::{RegisterId, RegisterSet, NUM_REGISTERS, R5};
use crate::scheduler::Scheduler;

/// Accepted programs have exactly this many instructions.
const REQUIRED_INSTRUCTIONS: usize = 510;

/// Accepted programs contain exactly this many multiplies of any width.
const REQUIRED_MULTIPLIES: usize = 170;

/// Accepted programs see their final register write land at exactly this
/// cycle, counting from 0.
const REQUIRED_OVERALL_LATENCY: usize = 172;

/// Equivalence classes of opcodes, for purposes of pairing rules.
///
/// Most opcodes form their own group. The exceptions: subtraction pairs
/// with add-shift, and negation pairs with the constant add (negating is
/// just `xor r, -1` followed by `add r, 1`).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum OpGroup {
    /// [`Opcode::AddConst`] and [`Opcode::Negate`]
    AddConst,
    /// [`Opcode::AddShift`] and [`Opcode::Sub`]
    AddShift,
    /// [`Opcode::Mul`]
    Mul,
    /// [`Opcode::Rotate`]
    Rotate,
    /// [`Opcode::SMulH`]
    SMulH,
    /// [`Opcode::UMulH`]
    UMulH,
    /// [`Opcode::Xor`]
    Xor,
    /// [`Opcode::XorConst`]
    XorConst,
}

/// The pairing group an opcode belongs to
#[inline(always)]
pub(crate) fn op_group(op: Opcode) -> OpGroup {
    match op {
        Opcode::AddConst | Opcode::Negate => OpGroup::AddConst,
        Opcode::AddShift | Opcode::Sub => OpGroup::AddShift,
        Opcode::Mul => OpGroup::Mul,
        Opcode::Rotate => OpGroup::Rotate,
        Opcode::SMulH => OpGroup::SMulH,
        Opcode::UMulH => OpGroup::UMulH,
        Opcode::Xor => OpGroup::Xor,
        Opcode::XorConst => OpGroup::XorConst,
    }
}

/// Does this opcode count toward the multiplication requirement?
#[inline(always)]
pub(crate) fn is_multiply(op: Opcode) -> bool {
    matches!(op, Opcode::Mul | Opcode::SMulH | Opcode::UMulH)
}

/// Must this opcode's source and destination registers differ?
///
/// True for everything except the wide multiplies: `sub r, r` or
/// `xor r, r` would be a constant, and `mul r, r` squares away entropy.
/// The wide multiplies keep useful high bits even when squaring.
#[inline(always)]
fn distinct_operands(op: Opcode) -> bool {
    !matches!(op, Opcode::UMulH | Opcode::SMulH)
}

/// May this opcode be selected immediately after one of `last`'s group?
///
/// Adjacent picks from the same group are rejected at selection time and
/// redrawn, before any operands are considered.
#[inline(always)]
pub(crate) fn op_pair_allowed(last: Option<OpGroup>, op: Opcode) -> bool {
    last != Some(op_group(op))
}

/// Identity of the instruction that last wrote a register, as far as the
/// destination pairing rules care.
///
/// Two writers compare equal when a second write would be collapsible
/// with the first: same group, and the same source register or both
/// sourced from constants. The wide multiplies carry a pseudorandom
/// discriminator, so repeat writes are almost always allowed there.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct RegisterWriter {
    /// Pairing group of the writing opcode
    group: OpGroup,
    /// Discriminating parameter; [`Self::NO_PARAM`] when the writer has
    /// no source register
    param: u32,
}

impl RegisterWriter {
    /// Parameter value for writers distinguished by group alone
    const NO_PARAM: u32 = u32::MAX;

    /// Writer info for an op sourced from a register
    #[inline(always)]
    pub(crate) fn reg_source(op: Opcode, src: RegisterId) -> Self {
        RegisterWriter {
            group: op_group(op),
            param: src.as_usize() as u32,
        }
    }

    /// Writer info for an op with a constant or missing source
    #[inline(always)]
    pub(crate) fn const_source(op: Opcode) -> Self {
        RegisterWriter {
            group: op_group(op),
            param: Self::NO_PARAM,
        }
    }

    /// Writer info for a wide multiply, with its random discriminator
    #[inline(always)]
    pub(crate) fn wide_mul(op: Opcode, discriminator: u32) -> Self {
        RegisterWriter {
            group: op_group(op),
            param: discriminator,
        }
    }

    /// The writer's pairing group
    #[inline(always)]
    fn group(&self) -> OpGroup {
        self.group
    }
}

/// The allowed source registers for an op, out of those the schedule
/// offers.
///
/// Normally every ready register qualifies. The one special case is
/// add-with-shift when exactly two registers are ready and one of them is
/// [`R5`]: R5 can't be the destination there, so it is forced to be the
/// source instead of letting the destination choice run aground.
#[inline(always)]
pub(crate) fn src_registers_allowed(available: RegisterSet, op: Opcode) -> RegisterSet {
    if op == Opcode::AddShift && available.len() == 2 && available.contains(R5) {
        available.filter(
            #[inline(always)]
            |reg| reg == R5,
        )
    } else {
        available
    }
}

/// Tracks written-register history and multiply totals while a program
/// is generated, and applies the destination and whole-program rules.
#[derive(Debug, Clone)]
pub(crate) struct Validator {
    /// Most recent writer of each register, if any
    writers: [Option<RegisterWriter>; NUM_REGISTERS],
    /// Multiplies committed so far
    multiply_count: usize,
}

impl Validator {
    /// A fresh validator: nothing written, nothing counted.
    #[inline(always)]
    pub(crate) fn new() -> Self {
        Validator {
            writers: [None; NUM_REGISTERS],
            multiply_count: 0,
        }
    }

    /// Multiplies committed so far.
    ///
    /// The generator compares this against the cycle count to decide when
    /// a multiply must be forced.
    #[inline(always)]
    pub(crate) fn multiplies(&self) -> usize {
        self.multiply_count
    }

    /// Absorb one committed instruction into the tracked state.
    #[inline(always)]
    pub(crate) fn commit_instruction(&mut self, inst: &Instruction, writer: RegisterWriter) {
        if is_multiply(inst.opcode()) {
            self.multiply_count += 1;
        }
        self.writers[inst.destination().as_usize()] = Some(writer);
    }

    /// The allowed destination registers for an op, out of those the
    /// schedule offers.
    #[inline(always)]
    pub(crate) fn dst_registers_allowed(
        &self,
        available: RegisterSet,
        op: Opcode,
        writer: &RegisterWriter,
        src: Option<RegisterId>,
        allow_chained_mul: bool,
    ) -> RegisterSet {
        available.filter(
            #[inline(always)]
            |dst| {
                // The lea encoding constraint on R5
                if op == Opcode::AddShift && dst == R5 {
                    return false;
                }

                // No self-cancelling operand pairs
                if distinct_operands(op) && Some(dst) == src {
                    return false;
                }

                let last = &self.writers[dst.as_usize()];

                // Registers are not multiplied twice in a row, which
                // would pile up trailing zeroes. Waived after a failed
                // selection attempt so generation can't wedge here.
                if !allow_chained_mul
                    && op_group(op) == OpGroup::Mul
                    && last.map(|w| w.group()) == Some(OpGroup::Mul)
                {
                    return false;
                }

                // No writer may repeat the previous writer of the same
                // register: `add r, c1; add r, c2` is one add, and
                // `xor r1, r2; xor r1, r2` is nothing at all.
                last.as_ref() != Some(writer)
            },
        )
    }

    /// Whole-program acceptance.
    ///
    /// Run after generation stops; any miss means the seed is unusable.
    /// The thresholds are empirical targets for the modeled pipeline, not
    /// tunable parameters.
    #[inline(always)]
    pub(crate) fn check_whole_program(
        &self,
        scheduler: &Scheduler,
        instructions: &InstructionArray,
    ) -> Result<(), ()> {
        if instructions.len() == REQUIRED_INSTRUCTIONS
            && self.multiply_count == REQUIRED_MULTIPLIES
            && scheduler.overall_latency() == REQUIRED_OVERALL_LATENCY
        {
            Ok(())
        } else {
            Err(())
        }
    }
}
