//! Fuzzer for HashX with input injected at the pseudo-random number
//! generator
//!
//! This exercises program generation and execution together as a unit,
//! without needing a stable wire format for programs: the fuzzer's input
//! replaces the leading random values the generator would have drawn, and
//! the interpreted and compiled runtimes must then agree on every digest.
//!
//! Once the replacement string is exhausted, the real number stream takes
//! over, skipping the values that were replaced. Resuming the real stream
//! matters: steady-state constant Rng output could keep the program
//! generator from ever terminating.
//!
//! (Requires an x86-64 host so the compiled runtime exists.)

#![no_main]
use arbitrary::Arbitrary;
use core::num::NonZeroU64;
use libfuzzer_sys::fuzz_target;
use rand::RngCore;

// Test a fixed number of hash inputs per program, trading time between
// program generation coverage and execution coverage.
const NUM_HASH_INPUTS: u64 = 64;

/// Operation, decoded from arbitrary fuzzer input
#[derive(Clone, Debug, Arbitrary)]
struct Op {
    /// Seed bytes for the Blake2b preprocessing stage.
    ///
    /// These become the register file key, and the Rng values used after
    /// `rng_values` runs out.
    seed: [u8; 32],

    /// First hash input, anywhere in the 64-bit space
    first_hash_input: u64,

    /// Increment between tested hash inputs
    input_step: NonZeroU64,

    /// Replacement values for the program generator's number stream
    rng_values: Vec<u64>,
}

impl Op {
    // Get an iterator over all hash input values
    fn hash_inputs(&self) -> impl Iterator<Item = u64> + '_ {
        let first = self.first_hash_input;
        let step = self.input_step.get();
        (0..NUM_HASH_INPUTS).map(move |counter| first.wrapping_add(counter.wrapping_mul(step)))
    }
}

/// Wrapper that splices `rng_values` over the beginning of the real
/// number stream
struct RngWrapper<'o> {
    /// The real stream, consumed even while values are replaced
    inner: hashx::SipRand,
    /// How many values have been handed out so far
    counter: usize,
    /// The fuzzer op this wrapper serves
    op: &'o Op,
}

impl<'o> RngCore for RngWrapper<'o> {
    fn next_u64(&mut self) -> u64 {
        let original_value = self.inner.next_u64();
        let result = if self.counter < self.op.rng_values.len() {
            self.op.rng_values[self.counter]
        } else {
            original_value
        };
        self.counter += 1;
        result
    }

    fn next_u32(&mut self) -> u32 {
        unreachable!();
    }

    fn fill_bytes(&mut self, _dest: &mut [u8]) {
        unreachable!();
    }

    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
        unreachable!();
    }
}

// Build one instance and run every hash input, returning digests.
// None if the injected stream produced an unusable program.
fn test_instance(op: &Op, option: hashx::RuntimeOption) -> Option<Vec<[u8; 8]>> {
    let (key0, key1) = hashx::SipState::pair_from_seed(&op.seed);
    let mut rng = RngWrapper {
        inner: hashx::SipRand::new(key0),
        counter: 0,
        op,
    };

    let result = hashx::HashXBuilder::new()
        .runtime(option)
        .build_from_rng(&mut rng, key1);

    match result {
        Err(hashx::Error::ProgramConstraints) => None,
        Err(e) => panic!("unexpected hashx error with {:?}, {:?}", option, e),
        Ok(hashx) => Some(
            op.hash_inputs()
                .map(|input| hashx.hash_to_u64(input).to_le_bytes())
                .collect(),
        ),
    }
}

fuzz_target!(|op: Op| {
    let interp = test_instance(&op, hashx::RuntimeOption::InterpretOnly);
    let compiled = test_instance(&op, hashx::RuntimeOption::CompileOnly);
    assert_eq!(interp, compiled);
});
