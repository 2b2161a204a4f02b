#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(noop_method_call)]
#![warn(unreachable_pub)]
#![warn(clippy::all)]
#![deny(clippy::cast_lossless)]
#![deny(clippy::checked_conversions)]
#![warn(clippy::cognitive_complexity)]
#![deny(clippy::exhaustive_structs)]
#![deny(clippy::expl_impl_clone_on_copy)]
#![deny(clippy::large_stack_arrays)]
#![warn(clippy::manual_ok_or)]
#![deny(clippy::missing_docs_in_private_items)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![deny(clippy::unnecessary_wraps)]
#![warn(clippy::unseparated_literal_suffix)]
#![deny(clippy::unwrap_used)]

mod blake2_4r;
mod compiler;
mod constraints;
mod err;
mod generator;
mod program;
mod register;
mod rng;
mod scheduler;
mod siphash;

pub use err::{CompilerError, Error};
pub use rng::SipRand;
pub use siphash::SipState;

use crate::compiler::Executable;
use crate::program::Program;
use crate::register::RegisterFile;
use rand_core::RngCore;

/// Option for selecting a HashX runtime
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[non_exhaustive]
pub enum RuntimeOption {
    /// Only use the interpreted runtime
    InterpretOnly,
    /// Only use the compiled runtime, and fail if it's unavailable
    CompileOnly,
    /// Use the compiled runtime when possible, the interpreter otherwise
    TryCompile,
}

/// One of the two available runtimes, and its program
#[derive(Debug)]
enum Runtime {
    /// The program is stored as instructions and stepped by a switch loop
    Interpreted(Program),
    /// The program was translated into native machine code
    Compiled(Executable),
}

impl Runtime {
    /// Run the program, mutating a register file in place.
    #[inline(always)]
    fn run(&self, regs: &mut RegisterFile) {
        match self {
            Runtime::Interpreted(program) => program.interpret(regs),
            Runtime::Compiled(executable) => executable.invoke(regs),
        }
    }
}

/// Effective settings for building a [`HashX`] instance
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HashXBuilder {
    /// Runtime choice, defaulting to [`RuntimeOption::TryCompile`]
    runtime: RuntimeOption,
    /// Key-derivation salt, in its padded parameter-block form
    salt: [u8; SALT_MAX_LEN],
}

/// Capacity of the key-derivation salt field, fixed by Blake2b
const SALT_MAX_LEN: usize = 16;

impl Default for HashXBuilder {
    fn default() -> Self {
        let mut salt = [0_u8; SALT_MAX_LEN];
        salt[..siphash::DEFAULT_SEED_SALT.len()].copy_from_slice(siphash::DEFAULT_SEED_SALT);
        HashXBuilder {
            runtime: RuntimeOption::TryCompile,
            salt,
        }
    }
}

impl HashXBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Default::default()
    }

    /// Select a [`RuntimeOption`].
    pub fn runtime(&mut self, runtime: RuntimeOption) -> &mut Self {
        self.runtime = runtime;
        self
    }

    /// Replace the default key-derivation salt, `b"HashX v1"`.
    ///
    /// Instances built with different salts form unrelated hash families
    /// for the same seeds. The salt enters the Blake2b parameter block,
    /// which limits it to 16 bytes; shorter values are zero padded.
    ///
    /// Panics if `salt` is longer than 16 bytes.
    pub fn salt(&mut self, salt: &[u8]) -> &mut Self {
        assert!(salt.len() <= SALT_MAX_LEN, "salt fits the parameter block");
        self.salt = [0_u8; SALT_MAX_LEN];
        self.salt[..salt.len()].copy_from_slice(salt);
        self
    }

    /// Build a [`HashX`] instance from these settings and a seed.
    pub fn build(&self, seed: &[u8]) -> Result<HashX, Error> {
        let (key0, key1) = SipState::pair_from_seed_salted(seed, &self.salt);
        let mut rng = SipRand::new(key0);
        self.build_from_rng(&mut rng, key1)
    }

    /// Build a [`HashX`] instance from an arbitrary random number
    /// generator and a register file key.
    ///
    /// Regular callers want [`Self::build`]; this entry point exists so
    /// that fuzzers and differential testers can drive program generation
    /// with their own stream of values.
    pub fn build_from_rng<R: RngCore>(
        &self,
        rng: &mut R,
        register_key: SipState,
    ) -> Result<HashX, Error> {
        let program = generator::generate_program(rng)?;
        let runtime = match self.runtime {
            RuntimeOption::InterpretOnly => Runtime::Interpreted(program),
            RuntimeOption::CompileOnly => Runtime::Compiled(Executable::compile(&program)?),
            RuntimeOption::TryCompile => match Executable::compile(&program) {
                Ok(executable) => Runtime::Compiled(executable),
                Err(_) => Runtime::Interpreted(program),
            },
        };
        Ok(HashX {
            register_key,
            runtime,
        })
    }
}

/// One member of the HashX function family, ready to hash inputs
///
/// Each instance is built from a seed, which determines both the random
/// program at the hash function's core and the key material mixed into
/// its inputs and outputs. Instances are immutable once built: hashing
/// takes `&self` and any number of inputs.
#[derive(Debug)]
pub struct HashX {
    /// Key for expanding inputs into the register file
    register_key: SipState,
    /// The seed's program, in whichever runtime was selected
    runtime: Runtime,
}

impl HashX {
    /// The longest digest this function can produce, in bytes
    pub const FULL_SIZE: usize = 32;

    /// Build a hash instance for a seed, with default settings.
    ///
    /// Equivalent to [`HashXBuilder::build`] on a fresh builder. Fails
    /// with [`Error::ProgramConstraints`] for the occasional seed that
    /// generates an unacceptable program; such seeds must be skipped.
    pub fn new(seed: &[u8]) -> Result<Self, Error> {
        HashXBuilder::new().build(seed)
    }

    /// Hash a 64-bit counter into a 64-bit result.
    ///
    /// The result equals the first 8 bytes of [`Self::hash_to_bytes`]
    /// read little-endian, which makes it the cheap choice for
    /// difficulty comparisons.
    pub fn hash_to_u64(&self, input: u64) -> u64 {
        self.digest(RegisterFile::new(self.register_key, input))[0]
    }

    /// Hash a 64-bit counter into a digest of `N` bytes, `1 <= N <= 32`.
    ///
    /// Shorter digests are prefixes of longer ones. Panics if `N` is
    /// zero or greater than [`Self::FULL_SIZE`].
    pub fn hash_to_bytes<const N: usize>(&self, input: u64) -> [u8; N] {
        pack_digest(self.digest(RegisterFile::new(self.register_key, input)))
    }

    /// Hash a block of bytes into a digest of `N` bytes, `1 <= N <= 32`.
    ///
    /// This is the variable-length-input flavor of HashX: the block is
    /// expanded into the register file with a reduced-round keyed Blake2b
    /// instead of the counter expansion. The two input modes share their
    /// program and keys but produce unrelated digests.
    pub fn hash_block_to_bytes<const N: usize>(&self, input: &[u8]) -> [u8; N] {
        let words = blake2_4r::hash_to_words(&self.register_key, input);
        pack_digest(self.digest(RegisterFile::from_words(words)))
    }

    /// Run the program over a loaded register file and fold the result.
    fn digest(&self, mut regs: RegisterFile) -> [u64; 4] {
        self.runtime.run(&mut regs);
        regs.digest()
    }
}

/// Serialize digest words little-endian and truncate to `N` bytes.
fn pack_digest<const N: usize>(words: [u64; 4]) -> [u8; N] {
    assert!(N >= 1 && N <= HashX::FULL_SIZE, "digest size in range");
    let mut full = [0_u8; HashX::FULL_SIZE];
    for (chunk, word) in full.chunks_exact_mut(8).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    let mut out = [0_u8; N];
    out.copy_from_slice(&full[..N]);
    out
}
