//! x86-64 backend for the program compiler
//!
//! The eight virtual registers live in `r8` through `r15` for the whole
//! program, which keeps every emitted instruction free of memory operands
//! and makes the destination-register encodings uniform. The register
//! file is read once on entry and written back once on exit, through the
//! pointer the caller passes in. Emitted code is position independent and
//! makes no calls.
//!
//! `dynasmrt` owns the executable buffer, including the transition from
//! writable to executable memory protection.

use crate::program::{Instruction, Program};
use crate::register::{RegisterFile, RegisterId};
use crate::CompilerError;
use dynasmrt::{dynasm, x64, AssemblyOffset, DynasmApi, ExecutableBuffer};
use std::{fmt, mem};

/// The function signature of a compiled program.
///
/// The `sysv64` convention pins the register file pointer to `rdi` on
/// every platform, including ones whose default C convention differs.
type CompiledFunc = unsafe extern "sysv64" fn(*mut RegisterFile);

/// A program compiled into executable memory
pub(crate) struct Executable {
    /// Backing buffer, already marked executable
    buffer: ExecutableBuffer,
}

impl Executable {
    /// Translate a generated program into a new executable buffer.
    pub(crate) fn compile(program: &Program) -> Result<Self, CompilerError> {
        let mut asm = x64::Assembler::new()?;
        emit_entry(&mut asm);
        for inst in program.instructions() {
            emit_instruction(&mut asm, inst);
        }
        emit_exit(&mut asm);

        let buffer = asm.finalize().map_err(|_| {
            CompilerError::Runtime(std::io::Error::new(
                std::io::ErrorKind::Other,
                "failed to finalize executable buffer",
            ))
        })?;
        Ok(Executable { buffer })
    }

    /// Run the compiled program against a register file, in place.
    pub(crate) fn invoke(&self, regs: &mut RegisterFile) {
        let entry = self.buffer.ptr(AssemblyOffset(0));
        // SAFETY: The buffer was filled by `compile` with a complete
        // function in the `CompiledFunc` convention: it begins at offset
        // zero, only dereferences the register file pointer it is given,
        // preserves all callee-saved registers, and returns. The pointer
        // stays valid for the call because we borrow `regs` mutably.
        unsafe {
            let func: CompiledFunc = mem::transmute(entry);
            func(regs);
        }
    }
}

impl fmt::Debug for Executable {
    /// Hex dump of the assembled code, for development only
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Executable[{}]: {}",
            self.buffer.len(),
            hex::encode(&self.buffer[..])
        )
    }
}

/// Machine register holding one virtual register
#[inline(always)]
fn native_reg(id: RegisterId) -> u8 {
    8 + id.as_usize() as u8
}

/// Save callee-saved registers and load the register file.
fn emit_entry(asm: &mut x64::Assembler) {
    dynasm!(asm
        ; push r12
        ; push r13
        ; push r14
        ; push r15
        ; mov r8, [rdi]
        ; mov r9, [rdi + 0x08]
        ; mov r10, [rdi + 0x10]
        ; mov r11, [rdi + 0x18]
        ; mov r12, [rdi + 0x20]
        ; mov r13, [rdi + 0x28]
        ; mov r14, [rdi + 0x30]
        ; mov r15, [rdi + 0x38]
    );
}

/// Write the register file back and restore the saved registers.
fn emit_exit(asm: &mut x64::Assembler) {
    dynasm!(asm
        ; mov [rdi], r8
        ; mov [rdi + 0x08], r9
        ; mov [rdi + 0x10], r10
        ; mov [rdi + 0x18], r11
        ; mov [rdi + 0x20], r12
        ; mov [rdi + 0x28], r13
        ; mov [rdi + 0x30], r14
        ; mov [rdi + 0x38], r15
        ; pop r15
        ; pop r14
        ; pop r13
        ; pop r12
        ; ret
    );
}

/// Emit the fixed lowering of one instruction.
fn emit_instruction(asm: &mut x64::Assembler, inst: &Instruction) {
    match *inst {
        Instruction::AddConst { dst, imm } => {
            let dst = native_reg(dst);
            dynasm!(asm; add Rq(dst), imm);
        }
        Instruction::AddShift { dst, src, shift } => {
            let dst = native_reg(dst);
            let src = native_reg(src);
            // The scale byte is part of the opcode encoding, so each
            // shift distance is its own template.
            match shift {
                0 => dynasm!(asm; lea Rq(dst), [Rq(dst) + Rq(src)]),
                1 => dynasm!(asm; lea Rq(dst), [Rq(dst) + Rq(src) * 2]),
                2 => dynasm!(asm; lea Rq(dst), [Rq(dst) + Rq(src) * 4]),
                _ => dynasm!(asm; lea Rq(dst), [Rq(dst) + Rq(src) * 8]),
            }
        }
        Instruction::Mul { dst, src } => {
            let dst = native_reg(dst);
            let src = native_reg(src);
            dynasm!(asm; imul Rq(dst), Rq(src));
        }
        Instruction::Negate { dst } => {
            let dst = native_reg(dst);
            dynasm!(asm; neg Rq(dst));
        }
        Instruction::Rotate { dst, bits } => {
            let dst = native_reg(dst);
            dynasm!(asm; ror Rq(dst), bits as i8);
        }
        Instruction::SMulH { dst, src } => {
            let dst = native_reg(dst);
            let src = native_reg(src);
            dynasm!(asm
                ; mov rax, Rq(dst)
                ; imul Rq(src)
                ; mov Rq(dst), rdx
            );
        }
        Instruction::Sub { dst, src } => {
            let dst = native_reg(dst);
            let src = native_reg(src);
            dynasm!(asm; sub Rq(dst), Rq(src));
        }
        Instruction::UMulH { dst, src } => {
            let dst = native_reg(dst);
            let src = native_reg(src);
            dynasm!(asm
                ; mov rax, Rq(dst)
                ; mul Rq(src)
                ; mov Rq(dst), rdx
            );
        }
        Instruction::Xor { dst, src } => {
            let dst = native_reg(dst);
            let src = native_reg(src);
            dynasm!(asm; xor Rq(dst), Rq(src));
        }
        Instruction::XorConst { dst, imm } => {
            let dst = native_reg(dst);
            dynasm!(asm; xor Rq(dst), imm);
        }
    }
}
