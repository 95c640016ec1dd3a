//! Private witness for the BallotProof circuit (§4.4) and its native derivations.
//!
//! Every derivation here (ciphertexts, commitment, nullifier, `InputsHash`) is computed
//! off-circuit by this module and re-derived on-circuit by [`crate::circuit::BallotCircuit`];
//! the two must always agree bit-for-bit, since the circuit's only public input is the digest
//! this module computes.

use ark_ff::PrimeField;
use sequencer_core::constants::FIELDS_PER_BALLOT;
use sequencer_core::schema::{BallotMode, CostExponent, EncryptionKeyCoords};
use sequencer_core::{Fr, StateKey};
use sequencer_curve::{Ballot, Ciphertext, Point, Scalar};
use sequencer_hash::{mimc7, poseidon};

/// Errors raised while validating a [`BallotWitness`] against its process's `BallotMode`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WitnessError {
    /// `BallotMode::max_count` exceeds the number of slots a ballot actually carries.
    #[error("max_count {max_count} exceeds ballot capacity {capacity}")]
    MaxCountExceedsCapacity {
        /// The offending `max_count`.
        max_count: u64,
        /// `FIELDS_PER_BALLOT`.
        capacity: usize,
    },

    /// A used slot's plaintext fell outside `[MinValue, MaxValue]`.
    #[error("slot {index} value {value} is outside [{min}, {max}]")]
    PlaintextOutOfRange {
        /// Index of the offending slot.
        index: usize,
        /// The offending value.
        value: u64,
        /// `BallotMode::min_value`.
        min: u64,
        /// `BallotMode::max_value`.
        max: u64,
    },

    /// A slot at or beyond `max_count` carried a nonzero plaintext.
    #[error("unused slot {index} carries nonzero value {value}")]
    UnusedSlotNotZero {
        /// Index of the offending slot.
        index: usize,
        /// The offending value.
        value: u64,
    },

    /// Two nonzero slots collided while `ForceUniqueness` was set.
    #[error("slots {first} and {second} both carry the nonzero value {value}")]
    PlaintextNotUnique {
        /// The lower index of the colliding pair.
        first: usize,
        /// The higher index of the colliding pair.
        second: usize,
        /// The value they share.
        value: u64,
    },

    /// The (possibly weight-scaled) cost sum fell outside `[MinTotalCost, MaxTotalCost]`.
    #[error("cost {cost} is outside [{min}, {max}]")]
    CostOutOfRange {
        /// The computed cost.
        cost: u128,
        /// `BallotMode::min_total_cost`.
        min: u64,
        /// `BallotMode::max_total_cost`.
        max: u64,
    },
}

/// Everything the BallotProof circuit witnesses privately: one voter's plaintext choices, the
/// process parameters they're checked against, and the randomness binding them into ciphertexts
/// and a commitment/nullifier pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BallotWitness {
    /// The process this ballot is cast into.
    pub process_id: StateKey,
    /// The process's ballot-shape constraints.
    pub ballot_mode: BallotMode,
    /// The process's public encryption key, in TE form.
    pub encryption_key: EncryptionKeyCoords,
    /// The voter's address.
    pub address: StateKey,
    /// The voter's census weight.
    pub weight: u64,
    /// The plaintext value of each of `FieldsPerBallot` slots; entries at or beyond
    /// `ballot_mode.max_count` must be zero.
    pub plaintext: [u64; FIELDS_PER_BALLOT],
    /// The single ElGamal randomness shared by every ciphertext in this ballot.
    pub randomness: Scalar,
    /// The voter's secret, binding the commitment and nullifier together.
    pub secret: Fr,
}

impl BallotWitness {
    /// Build and validate a ballot witness against its process's `BallotMode` (§4.4).
    ///
    /// # Errors
    /// Returns a [`WitnessError`] variant naming the first constraint violated: an out-of-range
    /// or nonzero-unused plaintext slot, a uniqueness collision, or an out-of-range cost sum.
    pub fn new(
        process_id: StateKey,
        ballot_mode: BallotMode,
        encryption_key: EncryptionKeyCoords,
        address: StateKey,
        weight: u64,
        plaintext: [u64; FIELDS_PER_BALLOT],
        randomness: Scalar,
        secret: Fr,
    ) -> Result<Self, WitnessError> {
        let max_count = usize::try_from(ballot_mode.max_count).unwrap_or(usize::MAX);
        if max_count > FIELDS_PER_BALLOT {
            return Err(WitnessError::MaxCountExceedsCapacity {
                max_count: ballot_mode.max_count,
                capacity: FIELDS_PER_BALLOT,
            });
        }

        for (index, value) in plaintext.iter().enumerate() {
            if index < max_count {
                if *value < ballot_mode.min_value || *value > ballot_mode.max_value {
                    return Err(WitnessError::PlaintextOutOfRange {
                        index,
                        value: *value,
                        min: ballot_mode.min_value,
                        max: ballot_mode.max_value,
                    });
                }
            } else if *value != 0 {
                return Err(WitnessError::UnusedSlotNotZero { index, value: *value });
            }
        }

        if ballot_mode.force_uniqueness {
            for i in 0..max_count {
                for j in (i + 1)..max_count {
                    #[allow(clippy::indexing_slicing, reason = "i, j < max_count <= FIELDS_PER_BALLOT")]
                    let (a, b) = (plaintext[i], plaintext[j]);
                    if a != 0 && a == b {
                        return Err(WitnessError::PlaintextNotUnique { first: i, second: j, value: a });
                    }
                }
            }
        }

        if let Some(exponent) = ballot_mode.cost_exp {
            let cost = cost_sum(&plaintext, exponent, weight, ballot_mode.cost_from_weight);
            if cost < u128::from(ballot_mode.min_total_cost) || cost > u128::from(ballot_mode.max_total_cost) {
                return Err(WitnessError::CostOutOfRange {
                    cost,
                    min: ballot_mode.min_total_cost,
                    max: ballot_mode.max_total_cost,
                });
            }
        }

        Ok(Self {
            process_id,
            ballot_mode,
            encryption_key,
            address,
            weight,
            plaintext,
            randomness,
            secret,
        })
    }

    /// The process encryption key as a curve point, in TE form.
    #[must_use]
    pub fn encryption_key_point(&self) -> Point {
        Point::from_coords_unchecked(self.encryption_key.x, self.encryption_key.y)
    }

    /// Encrypt every slot under the process key and this witness's shared randomness.
    #[must_use]
    pub fn ciphertexts(&self) -> [Ciphertext; FIELDS_PER_BALLOT] {
        let pk = self.encryption_key_point();
        std::array::from_fn(|i| {
            #[allow(clippy::indexing_slicing, reason = "i < FIELDS_PER_BALLOT by array length")]
            sequencer_curve::elgamal::encrypt(pk, self.plaintext[i], self.randomness)
        })
    }

    /// The encrypted ballot this witness commits to.
    #[must_use]
    pub fn ballot(&self) -> Ballot {
        Ballot::new(self.ciphertexts())
    }

    /// The voter's address as a field element.
    #[must_use]
    pub fn address_field(&self) -> Fr {
        Fr::from_be_bytes_mod_order(self.address.as_ref())
    }

    /// The process identifier as a field element.
    #[must_use]
    pub fn process_field(&self) -> Fr {
        Fr::from_be_bytes_mod_order(self.process_id.as_ref())
    }

    /// `Commitment = Poseidon(Address, ProcessID, Secret)` (§3).
    #[must_use]
    pub fn commitment(&self) -> Fr {
        poseidon::hash(&[self.address_field(), self.process_field(), self.secret])
    }

    /// `Nullifier = Poseidon(Commitment, Secret)` (§3).
    #[must_use]
    pub fn nullifier(&self) -> Fr {
        poseidon::hash(&[self.commitment(), self.secret])
    }

    /// `InputsHash = MiMC7(ProcessID, BallotMode…, PK, Address, Commitment, Nullifier, Ballot(TE),
    /// Weight)` (§4.4), the circuit's sole public input.
    #[must_use]
    pub fn inputs_hash(&self) -> Fr {
        let mut preimage = Vec::with_capacity(1 + BallotMode::FIELD_COUNT + 2 + 1 + 1 + 1 + 4 * FIELDS_PER_BALLOT + 1);
        preimage.push(self.process_field());
        preimage.extend(self.ballot_mode.to_field_elements());
        preimage.push(self.encryption_key.x);
        preimage.push(self.encryption_key.y);
        preimage.push(self.address_field());
        preimage.push(self.commitment());
        preimage.push(self.nullifier());
        for ciphertext in self.ciphertexts() {
            preimage.push(ciphertext.c1.x());
            preimage.push(ciphertext.c1.y());
            preimage.push(ciphertext.c2.x());
            preimage.push(ciphertext.c2.y());
        }
        preimage.push(Fr::from(self.weight));
        mimc7::hash(&preimage)
    }
}

/// `Σ slot^exponent`, optionally scaled by `weight` (§4.4, `CostFromWeight`).
///
/// Widened to `u128` so a full `FieldsPerBallot`-slot quadratic sum over `u64` values, further
/// scaled by a `u64` weight, cannot silently wrap before the range check runs.
fn cost_sum(plaintext: &[u64; FIELDS_PER_BALLOT], exponent: CostExponent, weight: u64, from_weight: bool) -> u128 {
    let power = exponent.as_u32();
    let sum: u128 = plaintext
        .iter()
        .map(|value| u128::from(*value).pow(power))
        .fold(0_u128, u128::saturating_add);
    if from_weight {
        sum.saturating_mul(u128::from(weight))
    } else {
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_std::UniformRand;
    use sequencer_curve::Point;

    fn mode(max_count: u64, max_value: u64, cost_exp: Option<CostExponent>, force_uniqueness: bool) -> BallotMode {
        BallotMode {
            max_count,
            force_uniqueness,
            max_value,
            min_value: 0,
            max_total_cost: max_value.saturating_mul(max_count),
            min_total_cost: 0,
            cost_exp,
            cost_from_weight: false,
        }
    }

    fn key(tag: u8) -> StateKey {
        let mut bytes = [0_u8; 20];
        *bytes.last_mut().expect("nonempty") = tag;
        StateKey::new(bytes)
    }

    fn pk_coords() -> EncryptionKeyCoords {
        let pk = Point::generator();
        EncryptionKeyCoords { x: pk.x(), y: pk.y() }
    }

    fn sample(plaintext: [u64; FIELDS_PER_BALLOT], mode: BallotMode) -> Result<BallotWitness, WitnessError> {
        let mut rng = ark_std::test_rng();
        BallotWitness::new(
            key(1),
            mode,
            pk_coords(),
            key(2),
            10,
            plaintext,
            Scalar::rand(&mut rng),
            Fr::from(42_u64),
        )
    }

    #[test]
    fn valid_ballot_is_accepted() {
        let plaintext = [1, 2, 3, 0, 0, 0, 0, 0];
        let witness = sample(plaintext, mode(3, 3, Some(CostExponent::Linear), false)).expect("valid");
        assert_eq!(witness.plaintext, plaintext);
    }

    #[test]
    fn out_of_range_slot_is_rejected() {
        let plaintext = [5, 0, 0, 0, 0, 0, 0, 0];
        let err = sample(plaintext, mode(1, 3, None, false)).unwrap_err();
        assert!(matches!(err, WitnessError::PlaintextOutOfRange { index: 0, .. }));
    }

    #[test]
    fn nonzero_unused_slot_is_rejected() {
        let plaintext = [1, 1, 0, 0, 0, 0, 0, 0];
        let err = sample(plaintext, mode(1, 3, None, false)).unwrap_err();
        assert!(matches!(err, WitnessError::UnusedSlotNotZero { index: 1, .. }));
    }

    #[test]
    fn duplicate_slots_rejected_when_unique_required() {
        let plaintext = [2, 2, 0, 0, 0, 0, 0, 0];
        let err = sample(plaintext, mode(2, 3, None, true)).unwrap_err();
        assert!(matches!(err, WitnessError::PlaintextNotUnique { first: 0, second: 1, .. }));
    }

    #[test]
    fn duplicate_zero_slots_are_allowed() {
        let plaintext = [0, 0, 1, 0, 0, 0, 0, 0];
        sample(plaintext, mode(3, 3, None, true)).expect("zeros never collide");
    }

    #[test]
    fn cost_sum_out_of_range_is_rejected() {
        let plaintext = [3, 3, 0, 0, 0, 0, 0, 0];
        let mut mode = mode(2, 3, Some(CostExponent::Quadratic), false);
        mode.max_total_cost = 4;
        let err = sample(plaintext, mode).unwrap_err();
        assert!(matches!(err, WitnessError::CostOutOfRange { .. }));
    }

    #[test]
    fn inputs_hash_is_sensitive_to_plaintext() {
        let mode = mode(2, 5, None, false);
        let a = sample([1, 2, 0, 0, 0, 0, 0, 0], mode).expect("valid");
        let b = sample([1, 3, 0, 0, 0, 0, 0, 0], mode).expect("valid");
        assert_ne!(a.inputs_hash(), b.inputs_hash());
    }

    #[test]
    fn max_count_over_capacity_is_rejected() {
        let plaintext = [0; FIELDS_PER_BALLOT];
        let err = sample(plaintext, mode(9, 1, None, false)).unwrap_err();
        assert!(matches!(err, WitnessError::MaxCountExceedsCapacity { .. }));
    }
}
