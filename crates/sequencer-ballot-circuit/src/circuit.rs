//! The BallotProof constraint system (§4.4): per-ballot range, uniqueness, cost, encryption and
//! commitment/nullifier checks over BN254, binding everything to a single `InputsHash` public
//! input via MiMC7.

use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use ark_ff::{BigInteger, PrimeField};
use sequencer_core::constants::FIELDS_PER_BALLOT;
use sequencer_core::Fr;
use sequencer_hash::{mimc7, poseidon};

use crate::gadgets::{enforce_bounded, is_less_than, widen_to_scalar_bits_msb, PointVar};
use crate::witness::BallotWitness;

/// Bit width used to range-check a single ballot slot against `[MinValue, MaxValue]`.
const VALUE_RANGE_BITS: usize = 64;
/// Bit width used to range-check a weight-scaled cost sum (up to `FieldsPerBallot * u64::MAX^2`).
const COST_RANGE_BITS: usize = 128;
/// Bit width used to compare slot indices and `MaxCount`, both at most `FieldsPerBallot`.
const COUNT_BITS: usize = 8;
/// Bits witnessed for the shared ElGamal randomness, matching `Scalar`'s `BigInteger` width.
const SCALAR_BITS: usize = 256;

/// The BallotProof circuit: one voter's encrypted ballot, checked against its process's
/// `BallotMode` and encryption key, with every private value bound to `inputs_hash` via MiMC7.
#[derive(Clone)]
pub struct BallotCircuit {
    witness: Option<BallotWitness>,
    inputs_hash: Fr,
}

impl BallotCircuit {
    /// Build a circuit instance ready to prove `witness`.
    #[must_use]
    pub fn new(witness: BallotWitness) -> Self {
        let inputs_hash = witness.inputs_hash();
        Self {
            witness: Some(witness),
            inputs_hash,
        }
    }

    /// An empty circuit of the right shape, for trusted-setup key generation.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            witness: None,
            inputs_hash: Fr::from(0_u64),
        }
    }

    /// The public input this circuit's proof commits to.
    #[must_use]
    pub fn inputs_hash(&self) -> Fr {
        self.inputs_hash
    }

    fn witness_fr(&self, f: impl Fn(&BallotWitness) -> Fr) -> Result<Fr, SynthesisError> {
        self.witness.as_ref().map(f).ok_or(SynthesisError::AssignmentMissing)
    }

    fn witness_bool(&self, f: impl Fn(&BallotWitness) -> bool) -> Result<bool, SynthesisError> {
        self.witness.as_ref().map(f).ok_or(SynthesisError::AssignmentMissing)
    }
}

impl ConstraintSynthesizer<Fr> for BallotCircuit {
    #[allow(clippy::too_many_lines, reason = "one flat constraint system is clearer than an arbitrary split")]
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let inputs_hash_var = FpVar::new_input(cs.clone(), || Ok(self.inputs_hash))?;

        let process_id = FpVar::new_witness(cs.clone(), || self.witness_fr(BallotWitness::process_field))?;
        let address = FpVar::new_witness(cs.clone(), || self.witness_fr(BallotWitness::address_field))?;
        let weight = FpVar::new_witness(cs.clone(), || {
            self.witness_fr(|w| Fr::from(w.weight))
        })?;
        let secret = FpVar::new_witness(cs.clone(), || self.witness_fr(|w| w.secret))?;
        let commitment = FpVar::new_witness(cs.clone(), || self.witness_fr(BallotWitness::commitment))?;
        let nullifier = FpVar::new_witness(cs.clone(), || self.witness_fr(BallotWitness::nullifier))?;

        let max_count = FpVar::new_witness(cs.clone(), || {
            self.witness_fr(|w| Fr::from(w.ballot_mode.max_count))
        })?;
        let max_value = FpVar::new_witness(cs.clone(), || {
            self.witness_fr(|w| Fr::from(w.ballot_mode.max_value))
        })?;
        let min_value = FpVar::new_witness(cs.clone(), || {
            self.witness_fr(|w| Fr::from(w.ballot_mode.min_value))
        })?;
        let max_total_cost = FpVar::new_witness(cs.clone(), || {
            self.witness_fr(|w| Fr::from(w.ballot_mode.max_total_cost))
        })?;
        let min_total_cost = FpVar::new_witness(cs.clone(), || {
            self.witness_fr(|w| Fr::from(w.ballot_mode.min_total_cost))
        })?;
        let cost_exp = FpVar::new_witness(cs.clone(), || {
            self.witness_fr(|w| w.ballot_mode.cost_exp.map_or(0, |e| u64::from(e.as_u32())).into())
        })?;
        let force_uniqueness = Boolean::new_witness(cs.clone(), || {
            self.witness_bool(|w| w.ballot_mode.force_uniqueness)
        })?;
        let cost_from_weight = Boolean::new_witness(cs.clone(), || {
            self.witness_bool(|w| w.ballot_mode.cost_from_weight)
        })?;

        let pk_x_te = FpVar::new_witness(cs.clone(), || self.witness_fr(|w| w.encryption_key.x))?;
        let pk_y_te = FpVar::new_witness(cs.clone(), || self.witness_fr(|w| w.encryption_key.y))?;
        let pk_rte = PointVar::from_te_coords(&pk_x_te, &pk_y_te);
        let generator_rte = PointVar::generator();

        // MaxCount and CostExp are prover-supplied; constrain them to the values they claim to
        // be so the selectors built from them below can't smuggle in an out-of-band value.
        enforce_bounded(
            &max_count,
            &FpVar::zero(),
            &FpVar::constant(Fr::from(u64::try_from(FIELDS_PER_BALLOT).unwrap_or(0))),
            COUNT_BITS,
        )?;
        let cost_exp_minus_one = &cost_exp - FpVar::one();
        let cost_exp_minus_two = &cost_exp - FpVar::constant(Fr::from(2_u64));
        (&cost_exp * &cost_exp_minus_one * &cost_exp_minus_two).enforce_equal(&FpVar::zero())?;
        let cost_elided = cost_exp.is_eq(&FpVar::zero())?;
        let cost_is_quadratic = cost_exp.is_eq(&FpVar::constant(Fr::from(2_u64)))?;

        let shared_k_bits: Vec<Boolean<Fr>> = (0..SCALAR_BITS)
            .map(|i| {
                Boolean::new_witness(cs.clone(), || {
                    self.witness_bool(|w| {
                        w.randomness
                            .into_bigint()
                            .to_bits_be()
                            .get(i)
                            .copied()
                            .unwrap_or(false)
                    })
                })
            })
            .collect::<Result<_, _>>()?;
        let c1_expected = generator_rte.scalar_mul(&shared_k_bits)?;

        let mut plaintext_vars = Vec::with_capacity(FIELDS_PER_BALLOT);
        let mut linear_sum = FpVar::zero();
        let mut quadratic_sum = FpVar::zero();
        let mut ciphertext_fields = Vec::with_capacity(4 * FIELDS_PER_BALLOT);

        for index in 0..FIELDS_PER_BALLOT {
            #[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects, reason = "index < FIELDS_PER_BALLOT")]
            let slot = FpVar::new_witness(cs.clone(), || self.witness_fr(|w| Fr::from(w.plaintext[index])))?;

            let idx_const = FpVar::constant(Fr::from(u64::try_from(index).unwrap_or(0)));
            let used = is_less_than(&idx_const, &max_count, COUNT_BITS)?;
            let lower = FpVar::conditionally_select(&used, &min_value, &FpVar::zero())?;
            let upper = FpVar::conditionally_select(&used, &max_value, &FpVar::zero())?;
            enforce_bounded(&slot, &lower, &upper, VALUE_RANGE_BITS)?;

            linear_sum += &slot;
            quadratic_sum += &slot * &slot;

            #[allow(clippy::indexing_slicing, reason = "index < FIELDS_PER_BALLOT")]
            let (c1x_te, c1y_te, c2x_te, c2y_te) = (
                FpVar::new_witness(cs.clone(), || self.witness_fr(|w| w.ciphertexts()[index].c1.x()))?,
                FpVar::new_witness(cs.clone(), || self.witness_fr(|w| w.ciphertexts()[index].c1.y()))?,
                FpVar::new_witness(cs.clone(), || self.witness_fr(|w| w.ciphertexts()[index].c2.x()))?,
                FpVar::new_witness(cs.clone(), || self.witness_fr(|w| w.ciphertexts()[index].c2.y()))?,
            );
            let c1_rte = PointVar::from_te_coords(&c1x_te, &c1y_te);
            let c2_rte = PointVar::from_te_coords(&c2x_te, &c2y_te);
            c1_rte.enforce_equal(&c1_expected)?;

            let value_bits_le = slot.to_bits_le()?;
            #[allow(clippy::indexing_slicing, reason = "VALUE_RANGE_BITS <= value_bits_le.len()")]
            let value_bits_msb = widen_to_scalar_bits_msb(&value_bits_le[..VALUE_RANGE_BITS], SCALAR_BITS);
            let message_term = generator_rte.scalar_mul(&value_bits_msb)?;
            let key_term = pk_rte.scalar_mul(&shared_k_bits)?;
            let c2_expected = message_term.add(&key_term)?;
            c2_rte.enforce_equal(&c2_expected)?;

            ciphertext_fields.extend([c1x_te, c1y_te, c2x_te, c2y_te]);
            plaintext_vars.push(slot);
        }

        for i in 0..FIELDS_PER_BALLOT {
            for j in (i + 1)..FIELDS_PER_BALLOT {
                #[allow(clippy::indexing_slicing, reason = "i, j < FIELDS_PER_BALLOT")]
                let (slot_i, slot_j) = (&plaintext_vars[i], &plaintext_vars[j]);
                let nonzero_i = slot_i.is_eq(&FpVar::zero())?.not();
                let nonzero_j = slot_j.is_eq(&FpVar::zero())?.not();
                let equal = slot_i.is_eq(slot_j)?;
                let collision = nonzero_i.and(&nonzero_j)?.and(&equal)?;
                collision.and(&force_uniqueness)?.enforce_equal(&Boolean::constant(false))?;
            }
        }

        let selected_sum = FpVar::conditionally_select(&cost_is_quadratic, &quadratic_sum, &linear_sum)?;
        let weighted_sum = FpVar::conditionally_select(&cost_from_weight, &(&selected_sum * &weight), &selected_sum)?;
        let cost_lower = FpVar::conditionally_select(&cost_elided, &FpVar::zero(), &min_total_cost)?;
        let cost_upper = FpVar::conditionally_select(
            &cost_elided,
            &FpVar::constant(Fr::from(u128::MAX)),
            &max_total_cost,
        )?;
        enforce_bounded(&weighted_sum, &cost_lower, &cost_upper, COST_RANGE_BITS)?;

        let commitment_expected = poseidon::constraints::hash(cs.clone(), &[address.clone(), process_id.clone(), secret.clone()])?;
        commitment.enforce_equal(&commitment_expected)?;
        let nullifier_expected = poseidon::constraints::hash(cs.clone(), &[commitment.clone(), secret])?;
        nullifier.enforce_equal(&nullifier_expected)?;

        let mut preimage = Vec::with_capacity(47);
        preimage.push(process_id);
        preimage.extend([
            max_count,
            FpVar::from(force_uniqueness),
            max_value,
            min_value,
            max_total_cost,
            min_total_cost,
            cost_exp,
            FpVar::from(cost_from_weight),
        ]);
        preimage.push(pk_x_te);
        preimage.push(pk_y_te);
        preimage.push(address);
        preimage.push(commitment);
        preimage.push(nullifier);
        preimage.extend(ciphertext_fields);
        preimage.push(weight);

        let computed_inputs_hash = mimc7::constraints::hash(&preimage)?;
        computed_inputs_hash.enforce_equal(&inputs_hash_var)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_relations::r1cs::ConstraintSystem;
    use ark_std::UniformRand;
    use sequencer_core::schema::{BallotMode, CostExponent, EncryptionKeyCoords};
    use sequencer_core::StateKey;
    use sequencer_curve::{Point, Scalar};

    fn key(tag: u8) -> StateKey {
        let mut bytes = [0_u8; 20];
        *bytes.last_mut().expect("nonempty") = tag;
        StateKey::new(bytes)
    }

    fn sample_witness(plaintext: [u64; FIELDS_PER_BALLOT], ballot_mode: BallotMode) -> BallotWitness {
        let mut rng = ark_std::test_rng();
        let pk = Point::generator();
        BallotWitness::new(
            key(1),
            ballot_mode,
            EncryptionKeyCoords { x: pk.x(), y: pk.y() },
            key(2),
            7,
            plaintext,
            Scalar::rand(&mut rng),
            Fr::rand(&mut rng),
        )
        .expect("witness satisfies its own ballot mode")
    }

    fn simple_mode() -> BallotMode {
        BallotMode {
            max_count: 2,
            force_uniqueness: true,
            max_value: 5,
            min_value: 0,
            max_total_cost: 8,
            min_total_cost: 0,
            cost_exp: Some(CostExponent::Linear),
            cost_from_weight: false,
        }
    }

    #[test]
    fn valid_witness_satisfies_the_circuit() {
        let witness = sample_witness([3, 4, 0, 0, 0, 0, 0, 0], simple_mode());
        let circuit = BallotCircuit::new(witness);
        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).expect("synthesis succeeds");
        assert!(cs.is_satisfied().expect("satisfiability check runs"));
    }

    #[test]
    fn tampered_inputs_hash_is_rejected() {
        let witness = sample_witness([1, 2, 0, 0, 0, 0, 0, 0], simple_mode());
        let mut circuit = BallotCircuit::new(witness);
        circuit.inputs_hash += Fr::from(1_u64);
        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).expect("synthesis succeeds");
        assert!(!cs.is_satisfied().expect("satisfiability check runs"));
    }

    #[test]
    fn elided_cost_never_constrains_the_sum() {
        let mut mode = simple_mode();
        mode.cost_exp = None;
        mode.max_total_cost = 0;
        let witness = sample_witness([5, 3, 0, 0, 0, 0, 0, 0], mode);
        let circuit = BallotCircuit::new(witness);
        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).expect("synthesis succeeds");
        assert!(cs.is_satisfied().expect("satisfiability check runs"));
    }
}
