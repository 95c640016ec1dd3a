//! Poseidon over the BN254 scalar field (§4.2), used for commitment and nullifier derivation.

use std::sync::OnceLock;

use ark_crypto_primitives::sponge::poseidon::{PoseidonConfig, PoseidonSponge, find_poseidon_ark_and_mds};
use ark_crypto_primitives::sponge::CryptographicSponge;
use sequencer_core::Fr;

const FULL_ROUNDS: usize = 8;
const PARTIAL_ROUNDS: usize = 57;
const RATE: usize = 4;
const CAPACITY: usize = 1;
const ALPHA: u64 = 5;
const PRIME_BITS: u64 = 254;

fn config() -> &'static PoseidonConfig<Fr> {
    static CONFIG: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();
    CONFIG.get_or_init(|| {
        let full_rounds_u64 = u64::try_from(FULL_ROUNDS).unwrap_or(0);
        let partial_rounds_u64 = u64::try_from(PARTIAL_ROUNDS).unwrap_or(0);
        let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
            PRIME_BITS,
            RATE,
            full_rounds_u64,
            partial_rounds_u64,
            0,
        );
        PoseidonConfig {
            full_rounds: FULL_ROUNDS,
            partial_rounds: PARTIAL_ROUNDS,
            alpha: ALPHA,
            ark,
            mds,
            rate: RATE,
            capacity: CAPACITY,
        }
    })
}

/// Hash a variable number of field elements with Poseidon, absorbing them one at a time and
/// squeezing a single output element.
#[must_use]
pub fn hash(inputs: &[Fr]) -> Fr {
    let mut sponge = PoseidonSponge::new(config());
    for input in inputs {
        sponge.absorb(input);
    }
    let output: Vec<Fr> = sponge.squeeze_field_elements(1);
    output
        .into_iter()
        .next()
        .unwrap_or_else(|| unreachable!("squeeze_field_elements(1) always returns one element"))
}

/// In-circuit Poseidon, constrained to absorb and squeeze exactly like [`hash`].
pub mod constraints {
    use ark_crypto_primitives::sponge::constraints::CryptographicSpongeVar;
    use ark_crypto_primitives::sponge::poseidon::constraints::PoseidonSpongeVar;
    use ark_r1cs_std::fields::fp::FpVar;
    use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};
    use sequencer_core::Fr;

    use super::config;

    /// Absorb `inputs` and squeeze a single output element, mirroring [`super::hash`].
    pub fn hash(cs: ConstraintSystemRef<Fr>, inputs: &[FpVar<Fr>]) -> Result<FpVar<Fr>, SynthesisError> {
        let mut sponge = PoseidonSpongeVar::new(cs, config());
        sponge.absorb(&inputs)?;
        let output = sponge.squeeze_field_elements(1)?;
        output.into_iter().next().ok_or(SynthesisError::AssignmentMissing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let inputs = [Fr::from(7_u64), Fr::from(9_u64)];
        assert_eq!(hash(&inputs), hash(&inputs));
    }

    #[test]
    fn hash_is_sensitive_to_order() {
        let a = [Fr::from(1_u64), Fr::from(2_u64)];
        let b = [Fr::from(2_u64), Fr::from(1_u64)];
        assert_ne!(hash(&a), hash(&b));
    }

    #[test]
    fn different_lengths_differ() {
        let a = [Fr::from(5_u64)];
        let b = [Fr::from(5_u64), Fr::from(0_u64)];
        assert_ne!(hash(&a), hash(&b));
    }
}
