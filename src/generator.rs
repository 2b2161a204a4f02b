//! Turn a stream of random numbers into an accepted hash program
//!
//! The generator walks the simulated schedule forward, repeatedly asking
//! the random stream for an opcode, operands, and immediates, and asking
//! the scheduler where the result can issue. Failed choices are retried
//! once with a simpler opcode palette and then resolved by stalling the
//! simulated decoder.
//!
//! Nothing here is free to vary: the program is defined as the result of
//! running exactly this algorithm against the seed's number stream, so
//! the order of every random draw and the outcome of every constraint
//! check are all part of the hash function's definition.

use crate::constraints::{self, OpGroup, RegisterWriter, Validator};
use crate::program::{Instruction, InstructionArray, Opcode, Program};
use crate::register::{RegisterId, RegisterSet};
use crate::rng::RngStream;
use crate::scheduler::{Scheduler, TARGET_CYCLE};
use crate::Error;
use rand_core::RngCore;

/// Choices for a forced wide multiply, drawn with one 8-bit value
const WIDE_MUL_OPS_TABLE: [Opcode; 2] = [Opcode::UMulH, Opcode::SMulH];

/// Opcode palette for ordinary instruction slots.
///
/// Relative frequencies matter: rotates and constant adds appear twice.
/// The first four entries need no source register; retry passes draw from
/// that prefix only, so a retry never repeats a failed source search.
const NORMAL_OPS_TABLE: [Opcode; 8] = [
    Opcode::Rotate,
    Opcode::Negate,
    Opcode::XorConst,
    Opcode::AddConst,
    Opcode::Rotate,
    Opcode::Sub,
    Opcode::Xor,
    Opcode::AddShift,
];

/// How many leading entries of [`NORMAL_OPS_TABLE`] are source-free
const SRC_FREE_PREFIX: usize = 4;

/// Generate a hash program from an arbitrary [`RngCore`] implementer.
///
/// Returns [`Error::ProgramConstraints`] when the finished program fails
/// the whole-program checks. This happens for a small fraction of seeds
/// during normal use, and the caller should move on to another seed.
pub(crate) fn generate_program<T: RngCore>(rng: &mut T) -> Result<Program, Error> {
    Generator::new(rng).generate_program()
}

/// One attempt counter state for instruction choice.
///
/// A failed register search on the original pass triggers one retry with
/// the reduced opcode palette; a failure on the retry pass stalls the
/// decoder instead.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Pass {
    /// First try for this instruction slot
    Original,
    /// Second try, after a register search came up empty
    Retry,
}

/// Internal state for the program generator
struct Generator<'r, R: RngCore> {
    /// Source of 8-bit and 32-bit random draws
    rng: RngStream<'r, R>,

    /// Port schedule, decoder position, and register readiness
    scheduler: Scheduler,

    /// Register history constraints and multiply accounting
    validator: Validator,

    /// Pairing group of the most recently selected opcode.
    ///
    /// Updated on every selection, whether or not that instruction ends
    /// up committed; duplicate-avoidance runs on the selection sequence.
    last_group: Option<OpGroup>,

    /// Whether the multiply-chaining rule is currently waived.
    ///
    /// Set while choosing operands on a retry pass. Rarely needed, but it
    /// keeps a pathological schedule from wedging the generator.
    allow_chained_mul: bool,
}

impl<'r, R: RngCore> Generator<'r, R> {
    /// Create a fresh generator wrapping a random word source.
    #[inline(always)]
    fn new(rng: &'r mut R) -> Self {
        Generator {
            rng: RngStream::new(rng),
            scheduler: Scheduler::new(),
            validator: Validator::new(),
            last_group: None,
            allow_chained_mul: false,
        }
    }

    /// Run the generator to completion and apply the acceptance checks.
    #[inline(always)]
    fn generate_program(&mut self) -> Result<Program, Error> {
        let mut code = InstructionArray::new();
        let mut pass = Pass::Original;

        while !code.is_full() {
            let op = self.choose_opcode(pass);

            // Find out where this instruction would issue; when even the
            // extended schedule has no room, the program is over.
            let issue_at = match self.scheduler.instruction_plan(op) {
                None => break,
                Some(cycle) => cycle,
            };

            self.allow_chained_mul = pass == Pass::Retry;
            let (inst, writer) = match self.choose_instruction(op, issue_at) {
                Err(()) => {
                    // Register search failed. Retry the slot once, then
                    // wait a cycle for more registers to come back.
                    match pass {
                        Pass::Original => pass = Pass::Retry,
                        Pass::Retry => {
                            self.scheduler.stall();
                            pass = Pass::Original;
                        }
                    }
                    continue;
                }
                Ok(result) => result,
            };
            pass = Pass::Original;

            let issue_at = match self.scheduler.commit_instruction(op) {
                None => break,
                Some(cycle) => cycle,
            };
            if issue_at >= TARGET_CYCLE {
                break;
            }

            self.validator.commit_instruction(&inst, writer);
            self.scheduler.retire(op, inst.destination(), issue_at);
            self.scheduler.advance();
            code.push(inst);
        }

        match self.validator.check_whole_program(&self.scheduler, &code) {
            Err(()) => Err(Error::ProgramConstraints),
            Ok(()) => Ok(Program::new(&code)),
        }
    }

    /// Select the opcode for the next instruction slot.
    ///
    /// Multiplies are not optional: whenever the committed multiply count
    /// falls behind the decoder's cycle count, one is forced, and every
    /// fourth multiply is widened to keep 64x64->128 work in the mix.
    /// Otherwise the opcode comes from the table, redrawing as long as
    /// the pick would pair with the previous selection's group.
    #[inline(always)]
    fn choose_opcode(&mut self, pass: Pass) -> Opcode {
        let op = if self.validator.multiplies() < self.scheduler.cycle() + 1 {
            if self.validator.multiplies() % 4 == 0 {
                *self.select_op(&WIDE_MUL_OPS_TABLE)
            } else {
                Opcode::Mul
            }
        } else {
            let table: &[Opcode] = match pass {
                Pass::Original => &NORMAL_OPS_TABLE,
                Pass::Retry => &NORMAL_OPS_TABLE[..SRC_FREE_PREFIX],
            };
            loop {
                let op = *self.select_op(table);
                if constraints::op_pair_allowed(self.last_group, op) {
                    break op;
                }
            }
        };
        self.last_group = Some(constraints::op_group(op));
        op
    }

    /// Pick an operation from a list of choices, consuming one 8-bit draw.
    #[inline(always)]
    fn select_op<'a>(&mut self, options: &'a [Opcode]) -> &'a Opcode {
        &options[(self.rng.next_u8() as usize) % options.len()]
    }

    /// Pick a register from a candidate set.
    ///
    /// Returns `Err(())` on an empty set. A 32-bit draw is consumed only
    /// when there's an actual choice to make.
    #[inline(always)]
    fn select_register(&mut self, options: RegisterSet) -> Result<RegisterId, ()> {
        match options.len() {
            0 => Err(()),
            1 => Ok(options.index(0)),
            num_options => {
                let index = (self.rng.next_u32() as usize) % num_options;
                Ok(options.index(index))
            }
        }
    }

    /// Draw 32-bit values under a mask until one is nonzero.
    #[inline(always)]
    fn select_nonzero_u32(&mut self, mask: u32) -> u32 {
        loop {
            let value = self.rng.next_u32() & mask;
            if value != 0 {
                return value;
            }
        }
    }

    /// Choose a source register for an op issuing at `cycle`.
    #[inline(always)]
    fn choose_src_reg(&mut self, op: Opcode, cycle: usize) -> Result<RegisterId, ()> {
        let available = self.scheduler.registers_available(cycle);
        let options = constraints::src_registers_allowed(available, op);
        self.select_register(options)
    }

    /// Choose a destination register for an op issuing at `cycle`.
    #[inline(always)]
    fn choose_dst_reg(
        &mut self,
        op: Opcode,
        cycle: usize,
        writer: &RegisterWriter,
        src: Option<RegisterId>,
    ) -> Result<RegisterId, ()> {
        let available = self.scheduler.registers_available(cycle);
        let options = self.validator.dst_registers_allowed(
            available,
            op,
            writer,
            src,
            self.allow_chained_mul,
        );
        self.select_register(options)
    }

    /// Finish an instruction whose opcode and issue cycle are known:
    /// draw its immediates, then its registers, in that order.
    #[inline(always)]
    fn choose_instruction(
        &mut self,
        op: Opcode,
        cycle: usize,
    ) -> Result<(Instruction, RegisterWriter), ()> {
        Ok(match op {
            Opcode::UMulH => {
                let writer = RegisterWriter::wide_mul(op, self.rng.next_u32());
                let src = self.choose_src_reg(op, cycle)?;
                let dst = self.choose_dst_reg(op, cycle, &writer, Some(src))?;
                (Instruction::UMulH { dst, src }, writer)
            }

            Opcode::SMulH => {
                let writer = RegisterWriter::wide_mul(op, self.rng.next_u32());
                let src = self.choose_src_reg(op, cycle)?;
                let dst = self.choose_dst_reg(op, cycle, &writer, Some(src))?;
                (Instruction::SMulH { dst, src }, writer)
            }

            Opcode::Mul => {
                let src = self.choose_src_reg(op, cycle)?;
                let writer = RegisterWriter::reg_source(op, src);
                let dst = self.choose_dst_reg(op, cycle, &writer, Some(src))?;
                (Instruction::Mul { dst, src }, writer)
            }

            Opcode::Sub => {
                let src = self.choose_src_reg(op, cycle)?;
                let writer = RegisterWriter::reg_source(op, src);
                let dst = self.choose_dst_reg(op, cycle, &writer, Some(src))?;
                (Instruction::Sub { dst, src }, writer)
            }

            Opcode::Xor => {
                let src = self.choose_src_reg(op, cycle)?;
                let writer = RegisterWriter::reg_source(op, src);
                let dst = self.choose_dst_reg(op, cycle, &writer, Some(src))?;
                (Instruction::Xor { dst, src }, writer)
            }

            Opcode::AddShift => {
                let shift = (self.rng.next_u32() & 3) as u8;
                let src = self.choose_src_reg(op, cycle)?;
                let writer = RegisterWriter::reg_source(op, src);
                let dst = self.choose_dst_reg(op, cycle, &writer, Some(src))?;
                (Instruction::AddShift { dst, src, shift }, writer)
            }

            Opcode::Rotate => {
                let bits = self.select_nonzero_u32(63) as u8;
                let writer = RegisterWriter::const_source(op);
                let dst = self.choose_dst_reg(op, cycle, &writer, None)?;
                (Instruction::Rotate { dst, bits }, writer)
            }

            Opcode::AddConst => {
                let imm = self.select_nonzero_u32(u32::MAX) as i32;
                let writer = RegisterWriter::const_source(op);
                let dst = self.choose_dst_reg(op, cycle, &writer, None)?;
                (Instruction::AddConst { dst, imm }, writer)
            }

            Opcode::XorConst => {
                let imm = self.select_nonzero_u32(u32::MAX) as i32;
                let writer = RegisterWriter::const_source(op);
                let dst = self.choose_dst_reg(op, cycle, &writer, None)?;
                (Instruction::XorConst { dst, imm }, writer)
            }

            Opcode::Negate => {
                let writer = RegisterWriter::const_source(op);
                let dst = self.choose_dst_reg(op, cycle, &writer, None)?;
                (Instruction::Negate { dst }, writer)
            }
        })
    }
}
