//! Error types for the `hashx` crate

/// Errors that can occur while building a HashX instance
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The whole-program requirements weren't met for this seed.
    ///
    /// A small fraction of seeds produce programs that fail the size,
    /// multiplication count, or latency checks. Those seeds are unusable
    /// and the caller is expected to move on to another one.
    #[error("seed produces an unusable hash program")]
    ProgramConstraints,

    /// Native code generation failed and no interpreter fallback was allowed
    #[error("program compilation failed with no fallback enabled: {0}")]
    Compiler(#[from] CompilerError),
}

/// Details about a failure in the runtime compiler
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CompilerError {
    /// No native code backend exists for this target
    #[error("no hash program compiler is available on this platform")]
    NotAvailable,

    /// The runtime assembler failed to set up or finalize executable memory
    #[error("failed preparing executable hash program: {0}")]
    Runtime(#[from] std::io::Error),
}
