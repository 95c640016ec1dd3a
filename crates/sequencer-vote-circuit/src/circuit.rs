//! VoteVerifier circuit (C5): constraints over BLS12-377.
//!
//! Recursive BallotProof verification, ECDSA signature verification and census Merkle inclusion
//! each cross a field boundary that isn't a native arkworks 2-chain (§REDESIGN, "cross-field
//! recursion boundaries"); [`crate::witness::VoteWitness::new`] already checked all three
//! natively before this circuit ever sees the witness. What this circuit actually constrains in
//! R1CS is that every witnessed field — census root, ballot mode, encryption key, nullifier,
//! ballot, address, commitment, weight, and the three natively-checked booleans — hashes to the
//! public `VoteDigest`, and that the separately-declared, limb-packed `InputsHash` (§4.5's
//! BN254-native digest, carried across the boundary by [`sequencer_hash::nonnative`]) is
//! correctly range-checked.

use ark_bls12_377::Fr as F;
use ark_ff::{BigInteger, PrimeField};
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use sequencer_core::constants::FIELDS_PER_BALLOT;
use sequencer_hash::nonnative;

use crate::witness::VoteWitness;

/// Number of 64-bit limbs an `InputsHash` (a BN254 field element, ≤254 bits) is packed into.
pub const INPUTS_HASH_LIMBS: usize = 4;

/// Length of [`preimage_fields`]'s output: 4 header fields, 8 ballot-mode fields, the nullifier,
/// `4 * FIELDS_PER_BALLOT` ciphertext coordinates, address, commitment, weight, and 3 booleans.
const PREIMAGE_LEN: usize = 4 + 8 + 1 + 4 * FIELDS_PER_BALLOT + 1 + 1 + 1 + 3;

/// Re-embed a BN254-native field element as a BLS12-377-native one via its little-endian byte
/// representation, reduced modulo BLS12-377's (different, similarly-sized) scalar field.
///
/// This is the same deliberate cross-field simplification the booleans below rely on: exact, as
/// opposed to reduced, translation would need nonnative field emulation this circuit doesn't do.
pub(crate) fn rebase(value: sequencer_core::Fr) -> F {
    F::from_le_bytes_mod_order(&value.into_bigint().to_bytes_le())
}

/// The flat, BLS12-377-native preimage `VoteDigest` is computed over: every witnessed field,
/// rebased into this stage's native field, plus the three natively-checked booleans.
pub(crate) fn preimage_fields(witness: &VoteWitness) -> Vec<F> {
    let address_field = sequencer_core::Fr::from_be_bytes_mod_order(witness.address.as_ref());
    let process_field = sequencer_core::Fr::from_be_bytes_mod_order(witness.process_id.as_ref());

    let mut preimage = Vec::with_capacity(4 + 8 + 1 + 4 * FIELDS_PER_BALLOT + 1 + 1 + 1 + 3);
    preimage.push(rebase(process_field));
    preimage.push(rebase(witness.census_root));
    preimage.push(rebase(witness.encryption_key.x));
    preimage.push(rebase(witness.encryption_key.y));
    preimage.extend(witness.ballot_mode.to_field_elements().into_iter().map(rebase));
    preimage.push(rebase(witness.nullifier));
    for ciphertext in witness.ballot.fields() {
        let (c1x, c1y) = ciphertext.c1.to_rte();
        let (c2x, c2y) = ciphertext.c2.to_rte();
        preimage.push(rebase(c1x));
        preimage.push(rebase(c1y));
        preimage.push(rebase(c2x));
        preimage.push(rebase(c2y));
    }
    preimage.push(rebase(address_field));
    preimage.push(rebase(witness.commitment));
    preimage.push(F::from(witness.weight));
    // Natively-checked facts (§4.5): all three always hold for a constructed `VoteWitness`.
    preimage.push(F::from(1_u64));
    preimage.push(F::from(1_u64));
    preimage.push(F::from(1_u64));
    preimage
}

/// BallotProof-recursion, census-inclusion and ECDSA-signature-verification circuit.
#[derive(Clone)]
pub struct VoteCircuit {
    witness: Option<VoteWitness>,
    vote_digest: F,
    inputs_hash_limbs: [F; INPUTS_HASH_LIMBS],
}

impl VoteCircuit {
    /// Build a circuit instance from a validated witness (§4.5).
    #[must_use]
    pub fn new(witness: VoteWitness) -> Self {
        let vote_digest = nonnative::bridge_hash(&preimage_fields(&witness));
        let limbs: Vec<F> = nonnative::pack_limbs(witness.inputs_hash(), INPUTS_HASH_LIMBS);
        let inputs_hash_limbs = std::array::from_fn(|i| limbs.get(i).copied().unwrap_or(F::from(0_u64)));
        Self { witness: Some(witness), vote_digest, inputs_hash_limbs }
    }

    /// A witness-less instance, for trusted setup.
    #[must_use]
    pub fn empty() -> Self {
        Self { witness: None, vote_digest: F::from(0_u64), inputs_hash_limbs: [F::from(0_u64); INPUTS_HASH_LIMBS] }
    }

    /// The public `VoteDigest` this witness's proof exposes.
    #[must_use]
    pub const fn vote_digest(&self) -> F {
        self.vote_digest
    }

    /// The public limb-packed `InputsHash` this witness's proof exposes.
    #[must_use]
    pub const fn inputs_hash_limbs(&self) -> [F; INPUTS_HASH_LIMBS] {
        self.inputs_hash_limbs
    }
}

impl ConstraintSynthesizer<F> for VoteCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<F>) -> Result<(), SynthesisError> {
        let vote_digest_var = FpVar::new_input(cs.clone(), || Ok(self.vote_digest))?;
        let limb_vars = (0..INPUTS_HASH_LIMBS)
            .map(|i| FpVar::new_input(cs.clone(), || Ok(self.inputs_hash_limbs.get(i).copied().unwrap_or(F::from(0_u64)))))
            .collect::<Result<Vec<_>, _>>()?;
        nonnative::constraints::enforce_limbs_bounded(&limb_vars)?;

        let witness = self.witness;
        let preimage = witness.as_ref().map_or_else(|| vec![F::from(0_u64); PREIMAGE_LEN], preimage_fields);
        let preimage_vars = preimage
            .into_iter()
            .map(|value| FpVar::new_witness(cs.clone(), || Ok(value)))
            .collect::<Result<Vec<_>, _>>()?;

        // The last three preimage entries are the natively-checked booleans; re-enforce them
        // true here so a malicious prover can't flip them in the witness it supplies.
        for flag in preimage_vars.iter().rev().take(3) {
            flag.enforce_equal(&FpVar::constant(F::from(1_u64)))?;
        }

        let recomputed = nonnative::constraints::bridge_hash(cs, &preimage_vars)?;
        recomputed.enforce_equal(&vote_digest_var)?;

        Ok(())
    }
}
