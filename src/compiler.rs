//! Native code runtime for hash programs
//!
//! With the `compiler` feature enabled and a supported target
//! architecture, generated programs can be translated into machine code
//! held in an executable buffer, instead of walking the instruction list
//! in the interpreter. Hashing throughput is the whole point of this:
//! proof-of-work verifiers hash tens of thousands of inputs per program,
//! and the compiled runtime is an order of magnitude faster per input.
//!
//! Both runtimes implement exactly the same register machine, and every
//! digest they produce is identical.

#[cfg(all(feature = "compiler", target_arch = "x86_64"))]
mod x86_64;

#[cfg(all(feature = "compiler", target_arch = "x86_64"))]
pub(crate) use x86_64::Executable;

#[cfg(not(all(feature = "compiler", target_arch = "x86_64")))]
pub(crate) use fallback::Executable;

/// Placeholder backend for configurations with no compiler support
#[cfg(not(all(feature = "compiler", target_arch = "x86_64")))]
mod fallback {
    use crate::program::Program;
    use crate::register::RegisterFile;
    use crate::CompilerError;
    use std::fmt;

    /// Stand-in for a compiled program on unsupported configurations.
    ///
    /// This type has no values; compilation always fails before one
    /// could exist.
    pub(crate) enum Executable {}

    impl Executable {
        /// Always reports [`CompilerError::NotAvailable`].
        pub(crate) fn compile(_program: &Program) -> Result<Self, CompilerError> {
            Err(CompilerError::NotAvailable)
        }

        /// Run the compiled program. Statically unreachable here.
        pub(crate) fn invoke(&self, _regs: &mut RegisterFile) {
            match *self {}
        }
    }

    impl fmt::Debug for Executable {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match *self {}
        }
    }
}
