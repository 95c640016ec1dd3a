//! Private witness for the VoteVerifier circuit (§4.5) and its native derivations.
//!
//! The expensive cross-field checks this circuit is responsible for — recursive BallotProof
//! verification, ECDSA signature verification, census Merkle inclusion — all cross a field
//! boundary that isn't a native arkworks 2-chain from BN254/secp256k1 into BLS12-377 (§REDESIGN,
//! "cross-field recursion boundaries"). They run natively here, exactly as far as
//! [`sequencer_ballot_circuit::witness::BallotWitness::new`] already validates range/uniqueness/
//! cost natively before a single R1CS constraint is written; [`crate::circuit::VoteCircuit`]
//! witnesses their boolean outcomes and binds the limb-packed `InputsHash` they produce.

use ark_bn254::Bn254;
use ark_ff::PrimeField;
use ark_groth16::VerifyingKey;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey as EcdsaVerifyingKey};
use sha2::{Digest, Sha256};

use sequencer_core::constants::{CENSUS_PROOF_MAX_LEVELS, FIELDS_PER_BALLOT};
use sequencer_core::schema::BallotMode;
use sequencer_core::{Fr, StateKey};
use sequencer_curve::Ballot;
use sequencer_hash::{mimc7, smt_leaf};

use sequencer_ballot_circuit::{verify_ballot_proof, BallotProof, PublicInputs as BallotPublicInputs};

/// Errors raised while validating a [`VoteWitness`].
#[derive(Debug, thiserror::Error)]
pub enum WitnessError {
    /// The declared address doesn't hash from the declared voter public key.
    #[error("address does not derive from the voter's public key")]
    AddressMismatch,

    /// The voter's public key bytes aren't a valid secp256k1 point.
    #[error("invalid voter public key: {0}")]
    InvalidPublicKey(String),

    /// The ECDSA signature over `H(BallotInputsHash)` did not verify.
    #[error("invalid ECDSA signature")]
    InvalidSignature,

    /// `census_path` isn't exactly [`CENSUS_PROOF_MAX_LEVELS`] siblings long.
    #[error("census path has {got} levels, expected {want}")]
    CensusPathWrongLength {
        /// Observed length.
        got: usize,
        /// Required length.
        want: usize,
    },

    /// The census path does not recompute to the declared `CensusRoot`.
    #[error("census inclusion proof does not recompute the declared root")]
    CensusRootMismatch,

    /// The inner BallotProof failed Groth16 verification.
    #[error("ballot proof failed verification")]
    InvalidBallotProof,
}

/// Everything the VoteVerifier circuit witnesses privately.
#[derive(Clone)]
pub struct VoteWitness {
    /// The process this vote belongs to.
    pub process_id: StateKey,
    /// The census root this vote's inclusion proof is checked against.
    pub census_root: Fr,
    /// The process's ballot-shape constraints.
    pub ballot_mode: BallotMode,
    /// The process's ElGamal encryption key, in TE form.
    pub encryption_key: sequencer_core::schema::EncryptionKeyCoords,
    /// The ballot's nullifier.
    pub nullifier: Fr,
    /// The encrypted ballot.
    pub ballot: Ballot,
    /// The voter's address.
    pub address: StateKey,
    /// The ballot's commitment.
    pub commitment: Fr,
    /// The voter's census weight.
    pub weight: u64,
    /// Sibling hashes of the census inclusion proof, leaf-first, one per level.
    pub census_path: Vec<Fr>,
    /// The voter's uncompressed secp256k1 public key coordinates, `x || y`.
    pub voter_pub_key: [u8; 64],
    /// Fixed-width `r || s` ECDSA signature bytes.
    pub signature: [u8; 64],
    /// `MiMC7` digest the BallotProof's public input commits to.
    pub ballot_inputs_hash: Fr,
    /// The BN254 BallotProof (C4) this vote recursively verifies.
    pub ballot_proof: BallotProof,
    /// The BallotProof circuit's verifying key.
    pub ballot_proof_vk: VerifyingKey<Bn254>,
}

impl VoteWitness {
    /// Validate every natively-checkable constraint this witness must satisfy (§4.5).
    ///
    /// # Errors
    /// Returns the first [`WitnessError`] variant violated.
    pub fn new(
        process_id: StateKey,
        census_root: Fr,
        ballot_mode: BallotMode,
        encryption_key: sequencer_core::schema::EncryptionKeyCoords,
        nullifier: Fr,
        ballot: Ballot,
        address: StateKey,
        commitment: Fr,
        weight: u64,
        census_path: Vec<Fr>,
        voter_pub_key: [u8; 64],
        signature: [u8; 64],
        ballot_inputs_hash: Fr,
        ballot_proof: BallotProof,
        ballot_proof_vk: VerifyingKey<Bn254>,
    ) -> Result<Self, WitnessError> {
        if address != address_from_pub_key(&voter_pub_key) {
            return Err(WitnessError::AddressMismatch);
        }

        let verifying_key = decode_pub_key(&voter_pub_key)?;
        let message_hash = Sha256::digest(ballot_inputs_hash.into_bigint().to_bytes_be());
        let sig = Signature::from_slice(&signature).map_err(|_| WitnessError::InvalidSignature)?;
        verifying_key
            .verify_prehash(&message_hash, &sig)
            .map_err(|_| WitnessError::InvalidSignature)?;

        if census_path.len() != CENSUS_PROOF_MAX_LEVELS {
            return Err(WitnessError::CensusPathWrongLength {
                got: census_path.len(),
                want: CENSUS_PROOF_MAX_LEVELS,
            });
        }
        let address_field = Fr::from_be_bytes_mod_order(address.as_ref());
        let weight_field = Fr::from(weight);
        if recompute_census_root(address_field, weight_field, &census_path) != census_root {
            return Err(WitnessError::CensusRootMismatch);
        }

        let ballot_public_inputs = BallotPublicInputs { inputs_hash: ballot_inputs_hash };
        let valid = verify_ballot_proof(&ballot_proof_vk, &ballot_proof, &ballot_public_inputs)
            .map_err(|_| WitnessError::InvalidBallotProof)?;
        if !valid {
            return Err(WitnessError::InvalidBallotProof);
        }

        Ok(Self {
            process_id,
            census_root,
            ballot_mode,
            encryption_key,
            nullifier,
            ballot,
            address,
            commitment,
            weight,
            census_path,
            voter_pub_key,
            signature,
            ballot_inputs_hash,
            ballot_proof,
            ballot_proof_vk,
        })
    }

    /// `InputsHash = MiMC7(ProcessID, CensusRoot, EncryptionKey, BallotMode, Nullifier,
    /// Ballot(RTE), Address, Commitment)` (§4.5).
    #[must_use]
    pub fn inputs_hash(&self) -> Fr {
        vote_inputs_hash(
            self.process_id,
            self.census_root,
            self.encryption_key,
            self.ballot_mode,
            self.nullifier,
            &self.ballot,
            self.address,
            self.commitment,
        )
    }
}

/// `MiMC7(ProcessID, CensusRoot, EncryptionKey, BallotMode, Nullifier, Ballot(RTE), Address,
/// Commitment)` (§4.5), factored out of [`VoteWitness::inputs_hash`] so the Aggregator (C6) can
/// recompute the same digest from the `VerifiedBallot` fields it batches without reaching into a
/// private `VoteWitness`.
#[must_use]
#[allow(clippy::too_many_arguments, reason = "mirrors the MiMC7 preimage's own field count, not an arbitrary parameter pile")]
pub fn vote_inputs_hash(
    process_id: StateKey,
    census_root: Fr,
    encryption_key: sequencer_core::schema::EncryptionKeyCoords,
    ballot_mode: BallotMode,
    nullifier: Fr,
    ballot: &Ballot,
    address: StateKey,
    commitment: Fr,
) -> Fr {
    let address_field = Fr::from_be_bytes_mod_order(address.as_ref());
    let process_field = Fr::from_be_bytes_mod_order(process_id.as_ref());

    let mut preimage = Vec::with_capacity(2 + 2 + BallotMode::FIELD_COUNT + 1 + 4 * FIELDS_PER_BALLOT + 2);
    preimage.push(process_field);
    preimage.push(census_root);
    preimage.push(encryption_key.x);
    preimage.push(encryption_key.y);
    preimage.extend(ballot_mode.to_field_elements());
    preimage.push(nullifier);
    for ciphertext in ballot.fields() {
        let (c1x, c1y) = ciphertext.c1.to_rte();
        let (c2x, c2y) = ciphertext.c2.to_rte();
        preimage.push(c1x);
        preimage.push(c1y);
        preimage.push(c2x);
        preimage.push(c2y);
    }
    preimage.push(address_field);
    preimage.push(commitment);
    mimc7::hash(&preimage)
}

/// "The voter's address is the standard hash of that public key" (§4.5): SHA-256 of the
/// uncompressed coordinates, reduced to [`StateKey`]'s 20-byte width by truncating the hash's
/// low-order bytes.
#[must_use]
pub fn address_from_pub_key(voter_pub_key: &[u8; 64]) -> StateKey {
    let digest = Sha256::digest(voter_pub_key);
    StateKey::from_slice(&digest[digest.len().saturating_sub(20)..]).unwrap_or(StateKey::ZERO)
}

fn decode_pub_key(voter_pub_key: &[u8; 64]) -> Result<EcdsaVerifyingKey, WitnessError> {
    let mut sec1 = [0_u8; 65];
    sec1[0] = 0x04;
    #[allow(clippy::indexing_slicing, reason = "sec1 is 65 bytes, voter_pub_key is 64")]
    {
        sec1[1..65].copy_from_slice(voter_pub_key);
    }
    EcdsaVerifyingKey::from_sec1_bytes(&sec1).map_err(|e| WitnessError::InvalidPublicKey(e.to_string()))
}

/// Recompute a fixed-depth Merkle root from a leaf and its leaf-first sibling path, using the
/// low-order bit of `address` at each level (least-significant-first) to pick left/right.
fn recompute_census_root(address: Fr, weight: Fr, path: &[Fr]) -> Fr {
    let mut current = smt_leaf::leaf_hash(address, weight);
    let bits = address.into_bigint().to_bits_be();
    let mut bits = bits;
    bits.reverse();
    for (level, sibling) in path.iter().enumerate() {
        let goes_right = bits.get(level).copied().unwrap_or(false);
        current = if goes_right {
            smt_leaf::node_hash(*sibling, current)
        } else {
            smt_leaf::node_hash(current, *sibling)
        };
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;
    use k256::elliptic_curve::sec1::ToEncodedPoint;

    fn uncompressed_pub_key(signing_key: &SigningKey) -> [u8; 64] {
        let point = signing_key.verifying_key().to_encoded_point(false);
        let bytes = point.as_bytes();
        let mut out = [0_u8; 64];
        #[allow(clippy::indexing_slicing, reason = "uncompressed SEC1 points are always 65 bytes")]
        out.copy_from_slice(&bytes[1..65]);
        out
    }

    #[test]
    fn address_derivation_is_deterministic() {
        let signing_key = SigningKey::from_bytes(&[7_u8; 32].into()).expect("valid scalar");
        let pub_key = uncompressed_pub_key(&signing_key);
        assert_eq!(address_from_pub_key(&pub_key), address_from_pub_key(&pub_key));
    }

    #[test]
    fn distinct_keys_derive_distinct_addresses() {
        let a = uncompressed_pub_key(&SigningKey::from_bytes(&[7_u8; 32].into()).expect("valid scalar"));
        let b = uncompressed_pub_key(&SigningKey::from_bytes(&[8_u8; 32].into()).expect("valid scalar"));
        assert_ne!(address_from_pub_key(&a), address_from_pub_key(&b));
    }

    #[test]
    #[allow(clippy::indexing_slicing, reason = "CENSUS_PROOF_MAX_LEVELS is nonzero, so index 0 exists")]
    fn census_root_is_sensitive_to_the_path() {
        let address = Fr::from(123_u64);
        let weight = Fr::from(5_u64);
        let path: Vec<Fr> = (0..CENSUS_PROOF_MAX_LEVELS).map(|i| Fr::from(u64::try_from(i).unwrap_or(0))).collect();
        let root = recompute_census_root(address, weight, &path);

        let mut tampered = path;
        tampered[0] = tampered[0] + Fr::from(1_u64);
        assert_ne!(recompute_census_root(address, weight, &tampered), root);
    }
}
