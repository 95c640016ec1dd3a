//! The single public value a BallotProof exposes (§4.4, §6).

use sequencer_core::Fr;

use crate::witness::BallotWitness;

/// `InputsHash`, the only public input the BallotProof circuit exposes. Everything it binds
/// together (process parameters, encryption key, address, commitment, nullifier, ciphertexts,
/// weight) is witnessed privately and only reachable through this digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicInputs {
    /// `MiMC7(ProcessID, BallotMode…, PK, Address, Commitment, Nullifier, Ballot(TE), Weight)`.
    pub inputs_hash: Fr,
}

impl PublicInputs {
    /// Derive the public inputs a given witness's proof must satisfy.
    #[must_use]
    pub fn from_witness(witness: &BallotWitness) -> Self {
        Self {
            inputs_hash: witness.inputs_hash(),
        }
    }

    /// Flatten to the field-element vector Groth16 verification expects.
    #[must_use]
    pub fn to_field_elements(self) -> [Fr; 1] {
        [self.inputs_hash]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_std::UniformRand;
    use sequencer_core::schema::{BallotMode, EncryptionKeyCoords};
    use sequencer_core::StateKey;
    use sequencer_core::constants::FIELDS_PER_BALLOT;
    use sequencer_curve::{Point, Scalar};

    fn mode() -> BallotMode {
        BallotMode {
            max_count: 1,
            force_uniqueness: false,
            max_value: 9,
            min_value: 0,
            max_total_cost: 9,
            min_total_cost: 0,
            cost_exp: None,
            cost_from_weight: false,
        }
    }

    fn witness(weight: u64) -> BallotWitness {
        let mut rng = ark_std::test_rng();
        let pk = Point::generator();
        let plaintext = [1; FIELDS_PER_BALLOT].map(|_| 0_u64);
        let mut plaintext = plaintext;
        plaintext[0] = 3;
        BallotWitness::new(
            StateKey::ZERO,
            mode(),
            EncryptionKeyCoords { x: pk.x(), y: pk.y() },
            StateKey::ZERO,
            weight,
            plaintext,
            Scalar::rand(&mut rng),
            Fr::rand(&mut rng),
        )
        .expect("valid witness")
    }

    #[test]
    fn derivation_is_deterministic() {
        let w = witness(1);
        assert_eq!(PublicInputs::from_witness(&w), PublicInputs::from_witness(&w));
    }

    #[test]
    fn sensitive_to_weight() {
        let a = PublicInputs::from_witness(&witness(1));
        let b = PublicInputs::from_witness(&witness(2));
        assert_ne!(a, b);
    }
}
