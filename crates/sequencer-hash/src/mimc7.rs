//! MiMC7 over the BN254 scalar field (§4.2).
//!
//! MiMC7 is the tally-chain public-input digest: a low-multiplicative-complexity permutation
//! well suited to arithmetic circuits, used wherever an `InputsHash` must be both computed
//! off-circuit (here) and re-derived inside a recursive proof.

use std::sync::OnceLock;

use ark_ff::PrimeField;
use sha2::{Digest as _, Sha256};

use sequencer_core::Fr;

/// Number of MiMC7 rounds. 91 rounds gives the conventional security margin for an exponent-7
/// round function over a ~254-bit field (`log_7(p) ≈ 91`).
const ROUNDS: usize = 91;

/// Domain-separation seed the round constants are derived from.
const SEED: &[u8] = b"sequencer-mimc7";

fn round_constants() -> &'static [Fr; ROUNDS] {
    static CONSTANTS: OnceLock<[Fr; ROUNDS]> = OnceLock::new();
    CONSTANTS.get_or_init(|| {
        std::array::from_fn(|round| {
            let mut hasher = Sha256::new();
            hasher.update(SEED);
            hasher.update(round.to_be_bytes());
            let digest: [u8; 32] = hasher.finalize().into();
            Fr::from_be_bytes_mod_order(&digest)
        })
    })
}

/// The MiMC7 block permutation, `MiMC7(x, k)`: 91 rounds of `x -> (x + k + c_i)^7`, plus a
/// final key addition.
#[must_use]
pub fn permute(x: Fr, k: Fr) -> Fr {
    let mut state = x;
    for constant in round_constants() {
        let t = state + k + *constant;
        state = pow7(t);
    }
    state + k
}

fn pow7(x: Fr) -> Fr {
    let x2 = x * x;
    let x4 = x2 * x2;
    x4 * x2 * x
}

/// Hash a variable number of field elements with MiMC7, via Miyaguchi–Preneel-style chaining
/// of the block permutation: `state_{i+1} = MiMC7(input_i, state_i) + state_i`, `state_0 = 0`.
#[must_use]
pub fn hash(inputs: &[Fr]) -> Fr {
    let mut state = Fr::from(0_u64);
    for input in inputs {
        state = permute(*input, state) + state;
    }
    state
}

/// In-circuit MiMC7, constrained round-by-round exactly like [`permute`] and [`hash`].
pub mod constraints {
    use ark_r1cs_std::fields::fp::FpVar;
    use ark_r1cs_std::prelude::*;
    use ark_relations::r1cs::SynthesisError;
    use sequencer_core::Fr;

    use super::round_constants;

    /// `MiMC7(x, k)` as a sequence of constrained `(x + k + c_i)^7` rounds, mirroring [`super::permute`].
    pub fn permute(x: &FpVar<Fr>, k: &FpVar<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
        let mut state = x.clone();
        for constant in round_constants() {
            let t = &state + k + FpVar::constant(*constant);
            state = pow7(&t)?;
        }
        Ok(state + k)
    }

    fn pow7(x: &FpVar<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
        let x2 = x * x;
        let x4 = &x2 * &x2;
        Ok(&x4 * &x2 * x)
    }

    /// Hash constrained field elements with MiMC7, mirroring [`super::hash`]'s chaining.
    pub fn hash(inputs: &[FpVar<Fr>]) -> Result<FpVar<Fr>, SynthesisError> {
        let mut state = FpVar::constant(Fr::from(0_u64));
        for input in inputs {
            let permuted = permute(input, &state)?;
            state = permuted + &state;
        }
        Ok(state)
    }
}
