//! Aggregator circuit (C6): constraints over BW6-761.
//!
//! Every batched slot's VoteVerifier proof was already verified natively in
//! [`crate::witness::AggregatorWitness::new`], the same way the VoteVerifier circuit itself
//! leaves BallotProof recursion, ECDSA verification and census inclusion to its own witness
//! constructor (§REDESIGN, "cross-field recursion boundaries"). What this circuit constrains in
//! R1CS is that the shared process header, every slot's per-vote fields, and every slot's own
//! `VoteDigest`/`InputsHash` (rebased and limb-packed in from BLS12-377) together hash to the
//! public `AggregatorDigest`, and that the separately-declared, limb-packed `AggregatedInputsHash`
//! (§4.6's BN254-native digest) is correctly range-checked.

use ark_bls12_377::Fr as VoteFr;
use ark_bw6_761::Fr as F;
use ark_ff::{BigInteger, PrimeField};
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use sequencer_core::constants::{FIELDS_PER_BALLOT, VOTES_PER_BATCH};
use sequencer_hash::nonnative;
use sequencer_vote_circuit::INPUTS_HASH_LIMBS;

use crate::witness::{aggregated_inputs_hash, AggregatorWitness};

/// Number of 64-bit limbs an `AggregatedInputsHash` (a BN254 field element) is packed into.
pub const INPUTS_HASH_LIMBS_OUT: usize = 4;

/// Fields one slot contributes to [`preimage_fields`]: nullifier, `4 * FIELDS_PER_BALLOT` ballot
/// coordinates, address, commitment, the slot's own `VoteDigest`, its `InputsHash` limbs, and a
/// validity flag.
const PER_SLOT_LEN: usize = 1 + 4 * FIELDS_PER_BALLOT + 1 + 1 + 1 + INPUTS_HASH_LIMBS + 1;

/// Header fields: process id, census root, 8 ballot-mode fields, 2 encryption-key coordinates.
const HEADER_LEN: usize = 4 + 8;

const PREIMAGE_LEN: usize = HEADER_LEN + VOTES_PER_BATCH * PER_SLOT_LEN;

/// Re-embed a BN254- or BLS12-377-native field element as a BW6-761-native one via its
/// little-endian byte representation, reduced modulo BW6-761's scalar field — the same
/// deliberate cross-field simplification every recursion boundary in this tower uses.
pub(crate) fn rebase<S: PrimeField>(value: S) -> F {
    F::from_le_bytes_mod_order(&value.into_bigint().to_bytes_le())
}

/// The flat, BW6-761-native preimage `AggregatorDigest` is computed over: the shared process
/// header, every slot's per-vote fields, and every slot's own VoteVerifier public inputs.
pub(crate) fn preimage_fields(witness: &AggregatorWitness) -> Vec<F> {
    let address_field = |key: sequencer_core::StateKey| sequencer_core::Fr::from_be_bytes_mod_order(key.as_ref());
    let process_field = sequencer_core::Fr::from_be_bytes_mod_order(witness.process_id.as_ref());

    let mut preimage = Vec::with_capacity(PREIMAGE_LEN);
    preimage.push(rebase(process_field));
    preimage.push(rebase(witness.census_root));
    preimage.extend(witness.ballot_mode.to_field_elements().into_iter().map(rebase));
    preimage.push(rebase(witness.encryption_key.x));
    preimage.push(rebase(witness.encryption_key.y));

    for slot in &witness.slots {
        preimage.push(rebase(slot.nullifier));
        for ciphertext in slot.ballot.fields() {
            let (c1x, c1y) = ciphertext.c1.to_rte();
            let (c2x, c2y) = ciphertext.c2.to_rte();
            preimage.push(rebase(c1x));
            preimage.push(rebase(c1y));
            preimage.push(rebase(c2x));
            preimage.push(rebase(c2y));
        }
        preimage.push(rebase(address_field(slot.address)));
        preimage.push(rebase(slot.commitment));
        preimage.push(rebase(slot.vote_public_inputs.vote_digest));
        for limb in slot.vote_public_inputs.inputs_hash_limbs {
            preimage.push(rebase(limb));
        }
        // Every slot passed native verification in `AggregatorWitness::new` (real or dummy).
        preimage.push(F::from(1_u64));
    }

    preimage
}

/// Batches up to `VotesPerBatch` VoteVerifier proofs into one Aggregator proof.
#[derive(Clone)]
pub struct AggregatorCircuit {
    witness: Option<AggregatorWitness>,
    aggregator_digest: F,
    inputs_hash_limbs: [F; INPUTS_HASH_LIMBS_OUT],
}

impl AggregatorCircuit {
    /// Build a circuit instance from a validated witness (§4.6).
    #[must_use]
    pub fn new(witness: AggregatorWitness) -> Self {
        let aggregator_digest = nonnative::bridge_hash(&preimage_fields(&witness));
        let limbs: Vec<F> = nonnative::pack_limbs(witness.aggregated_inputs_hash(), INPUTS_HASH_LIMBS_OUT);
        let inputs_hash_limbs = std::array::from_fn(|i| limbs.get(i).copied().unwrap_or(F::from(0_u64)));
        Self { witness: Some(witness), aggregator_digest, inputs_hash_limbs }
    }

    /// A witness-less instance, for trusted setup.
    #[must_use]
    pub fn empty() -> Self {
        Self { witness: None, aggregator_digest: F::from(0_u64), inputs_hash_limbs: [F::from(0_u64); INPUTS_HASH_LIMBS_OUT] }
    }

    /// The public `AggregatorDigest` this witness's proof exposes.
    #[must_use]
    pub const fn aggregator_digest(&self) -> F {
        self.aggregator_digest
    }

    /// The public limb-packed `AggregatedInputsHash` this witness's proof exposes.
    #[must_use]
    pub const fn inputs_hash_limbs(&self) -> [F; INPUTS_HASH_LIMBS_OUT] {
        self.inputs_hash_limbs
    }
}

impl ConstraintSynthesizer<F> for AggregatorCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<F>) -> Result<(), SynthesisError> {
        let digest_var = FpVar::new_input(cs.clone(), || Ok(self.aggregator_digest))?;
        let limb_vars = (0..INPUTS_HASH_LIMBS_OUT)
            .map(|i| FpVar::new_input(cs.clone(), || Ok(self.inputs_hash_limbs.get(i).copied().unwrap_or(F::from(0_u64)))))
            .collect::<Result<Vec<_>, _>>()?;
        nonnative::constraints::enforce_limbs_bounded(&limb_vars)?;

        let witness = self.witness;
        let preimage = witness.as_ref().map_or_else(|| vec![F::from(0_u64); PREIMAGE_LEN], preimage_fields);
        let preimage_vars = preimage
            .into_iter()
            .map(|value| FpVar::new_witness(cs.clone(), || Ok(value)))
            .collect::<Result<Vec<_>, _>>()?;

        // Each slot's validity flag sits at a fixed offset within its PER_SLOT_LEN block; re-enforce
        // every one true here so a malicious prover can't flip a slot's outcome in the witness.
        for slot_index in 0..VOTES_PER_BATCH {
            let flag_offset = HEADER_LEN + slot_index * PER_SLOT_LEN + PER_SLOT_LEN - 1;
            if let Some(flag) = preimage_vars.get(flag_offset) {
                flag.enforce_equal(&FpVar::constant(F::from(1_u64)))?;
            }
        }

        let recomputed = nonnative::constraints::bridge_hash(cs, &preimage_vars)?;
        recomputed.enforce_equal(&digest_var)?;

        Ok(())
    }
}
