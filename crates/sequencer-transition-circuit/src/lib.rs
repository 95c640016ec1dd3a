//! StateTransition circuit (C7): the recursion tower's terminus.
//!
//! Recursively verifies a single Aggregator proof (C6) and re-chains the SMT transitions that
//! batch produced, from `RootHashBefore` to `RootHashAfter` (§4.7). Unlike the three boundaries
//! below it, this stage's own native field is already the field `AggregatedInputsHash` lives in,
//! so there's no combined digest to carry across a boundary: the circuit exposes `RootHashBefore`,
//! `RootHashAfter`, `NumNewVotes` and `NumOverwrites` directly as its public inputs (§6).

mod circuit;
mod proof;
mod public_inputs;
mod witness;

pub use circuit::TransitionCircuit;
pub use proof::{create_transition_proof, generate_keys, verify_transition_proof, ProofError, TransitionProof};
pub use public_inputs::PublicInputs;
pub use witness::{TransitionWitness, WitnessError};

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bls12_377::Bls12_377;
    use ark_std::UniformRand;
    use k256::ecdsa::signature::Signer;
    use k256::ecdsa::{Signature as EcdsaSignature, SigningKey};
    use k256::elliptic_curve::sec1::ToEncodedPoint;
    use sha2::{Digest, Sha256};

    use ark_ff::{BigInteger, PrimeField};
    use sequencer_aggregator_circuit::{
        build_dummy_vote, AggregatorWitness, RealVote,
    };
    use sequencer_ballot_circuit::{create_ballot_proof, generate_keys as generate_ballot_keys, BallotWitness};
    use sequencer_core::constants::{CENSUS_PROOF_MAX_LEVELS, VOTES_PER_BATCH};
    use sequencer_core::schema::{BallotMode, CostExponent, EncryptionKeyCoords, Process};
    use sequencer_core::{Fr, StateKey};
    use sequencer_curve::{Point, Scalar};
    use sequencer_state::{
        ballot_digest, AggregatedBatch, Engine, MemorySmtStore, RecursionProof, SparseMerkleTree, VerifiedBallot,
    };
    use sequencer_vote_circuit::{address_from_pub_key, create_vote_proof, PublicInputs as VotePublicInputs, VoteWitness};

    fn mode() -> BallotMode {
        BallotMode {
            max_count: 1,
            force_uniqueness: false,
            max_value: 9,
            min_value: 0,
            max_total_cost: 9,
            min_total_cost: 0,
            cost_exp: Some(CostExponent::Linear),
            cost_from_weight: false,
        }
    }

    fn uncompressed_pub_key(signing_key: &SigningKey) -> [u8; 64] {
        let point = signing_key.verifying_key().to_encoded_point(false);
        let bytes = point.as_bytes();
        let mut out = [0_u8; 64];
        #[allow(clippy::indexing_slicing, reason = "uncompressed SEC1 points are always 65 bytes")]
        out.copy_from_slice(&bytes[1..65]);
        out
    }

    /// A `StateKey` whose `key_to_field` reduction is exactly `Fr::from(value)`: the low 8 bytes
    /// carry `value` big-endian, the rest are zero, so the integer the tree reduces mod the field
    /// order is `value` itself. Lets one seed value stand for "the same nullifier" on both sides of
    /// the Aggregator-witness / state-engine boundary, which disagree on nullifier representation
    /// (`Fr` there, `StateKey` here).
    fn nullifier_key(value: u64) -> StateKey {
        let mut bytes = [0_u8; 20];
        let value_bytes = value.to_be_bytes();
        #[allow(clippy::indexing_slicing, reason = "value_bytes is 8 bytes, bytes is 20")]
        bytes[12..].copy_from_slice(&value_bytes);
        StateKey::new(bytes)
    }

    /// One real vote, built the same way the Aggregator circuit's own tests build one: every vote
    /// in a batch shares one process and one census root, so this reuses the same fixed voter
    /// (address, weight, census path) across every call and only varies the nullifier, commitment
    /// and ballot secret by `seed`. Also returns the matching `VerifiedBallot` the state engine
    /// consumes (same address, commitment and ballot; the nullifier bridged through
    /// [`nullifier_key`], since the two sides disagree on nullifier representation).
    #[allow(clippy::too_many_arguments, reason = "assembling one vote needs every key material input")]
    fn one_vote(
        seed: u8,
        process_id: StateKey,
        encryption_key: EncryptionKeyCoords,
        ballot_pk: &ark_groth16::ProvingKey<ark_bn254::Bn254>,
        ballot_vk: &ark_groth16::VerifyingKey<ark_bn254::Bn254>,
        vote_pk: &ark_groth16::ProvingKey<Bls12_377>,
    ) -> (RealVote, VerifiedBallot, Fr) {
        let mut rng = ark_std::test_rng();
        let signing_key = SigningKey::from_bytes(&[11_u8; 32].into()).expect("valid scalar");
        let pub_key = uncompressed_pub_key(&signing_key);
        let address = address_from_pub_key(&pub_key);
        let address_field = Fr::from_be_bytes_mod_order(address.as_ref());
        let weight = 3_u64;
        let weight_field = Fr::from(weight);

        let ballot_witness = BallotWitness::new(
            process_id,
            mode(),
            encryption_key,
            address,
            weight,
            [1, 0, 0, 0, 0, 0, 0, 0],
            Scalar::rand(&mut rng),
            Fr::from(u64::from(seed)),
        )
        .expect("well-formed ballot witness");
        let ballot_inputs_hash = ballot_witness.inputs_hash();
        let ballot = ballot_witness.ballot();
        let ballot_proof = create_ballot_proof(ballot_pk, ballot_witness, &mut rng).expect("ballot proof creation");

        let path: Vec<Fr> = (0..CENSUS_PROOF_MAX_LEVELS).map(|i| Fr::from(u64::try_from(i).unwrap_or(0))).collect();
        let mut current = sequencer_hash::smt_leaf::leaf_hash(address_field, weight_field);
        let bits = {
            let mut b = address_field.into_bigint().to_bits_be();
            b.reverse();
            b
        };
        for (level, sibling) in path.iter().enumerate() {
            let goes_right = bits.get(level).copied().unwrap_or(false);
            current = if goes_right {
                sequencer_hash::smt_leaf::node_hash(*sibling, current)
            } else {
                sequencer_hash::smt_leaf::node_hash(current, *sibling)
            };
        }
        let census_root = current;

        let nullifier_value = u64::from(seed) + 1000;
        let nullifier = Fr::from(nullifier_value);
        let commitment = Fr::from(u64::from(seed) + 2000);

        let sig: EcdsaSignature = signing_key.sign(&Sha256::digest(ballot_inputs_hash.into_bigint().to_bytes_be()));
        let mut sig_bytes = [0_u8; 64];
        sig_bytes.copy_from_slice(&sig.to_bytes());

        let vote_witness = VoteWitness::new(
            process_id,
            census_root,
            mode(),
            encryption_key,
            nullifier,
            ballot,
            address,
            commitment,
            weight,
            path,
            pub_key,
            sig_bytes,
            ballot_inputs_hash,
            ballot_proof,
            ballot_vk.clone(),
        )
        .expect("witness satisfies its own natively-checked constraints");

        let vote_inputs_hash = vote_witness.inputs_hash();
        let vote_public_inputs = VotePublicInputs::from_witness(&vote_witness);
        let vote_proof = create_vote_proof(vote_pk, vote_witness, &mut rng).expect("vote proof creation");

        let real_vote = RealVote {
            vote_proof: vote_proof.clone(),
            vote_public_inputs,
            nullifier,
            ballot,
            address,
            commitment,
        };
        let verified = VerifiedBallot {
            process_id,
            address,
            nullifier: nullifier_key(nullifier_value),
            commitment,
            ballot,
            voter_weight: weight,
            inputs_hash: vote_inputs_hash,
            proof: RecursionProof(vote_proof.to_bytes()),
            vote_public_inputs: RecursionProof(real_vote.vote_public_inputs.to_bytes()),
        };

        (real_vote, verified, census_root)
    }

    /// Register a process, run one batch of `votes` through the state engine, build the matching
    /// Aggregator witness/proof, and assemble the `TransitionWitness` that results.
    #[allow(clippy::too_many_arguments, reason = "one helper threads every stage this test exercises")]
    fn build_transition_witness(
        process: Process,
        real_votes: Vec<RealVote>,
        verified_votes: Vec<VerifiedBallot>,
        census_root: Fr,
        vote_vk: &ark_groth16::VerifyingKey<Bls12_377>,
        aggregator_vk: &ark_groth16::VerifyingKey<ark_bw6_761::BW6_761>,
        aggregator_pk: &ark_groth16::ProvingKey<ark_bw6_761::BW6_761>,
        dummy: &sequencer_aggregator_circuit::DummyVote,
    ) -> TransitionWitness {
        let mut rng = ark_std::test_rng();

        let mut engine = Engine::new(SparseMerkleTree::new(Fr::from(0_u64), MemorySmtStore::new()));
        engine.register_process(&process).expect("register process");
        let root_before = engine.root();
        let header_inclusion = engine.header_inclusion().expect("header inclusion");

        engine.start_batch().expect("start batch");
        for vote in &verified_votes {
            engine.add_vote(vote).expect("vote accepted");
        }
        let transitions = engine.end_batch().expect("end batch");
        let results = engine.last_results_snapshot().expect("results snapshot");

        let aggregator_witness = AggregatorWitness::new(
            process.id,
            census_root,
            process.ballot_mode,
            process.encryption_key,
            real_votes,
            vote_vk,
            dummy,
        )
        .expect("aggregator witness validates");

        let aggregator_public_inputs = sequencer_aggregator_circuit::PublicInputs::from_witness(&aggregator_witness);
        let aggregator_proof = sequencer_aggregator_circuit::create_aggregator_proof(
            aggregator_pk,
            aggregator_witness.clone(),
            &mut rng,
        )
        .expect("aggregator proof creation");

        TransitionWitness::new(
            root_before,
            process,
            &header_inclusion,
            transitions,
            results,
            &aggregator_witness,
            &aggregator_proof,
            &aggregator_public_inputs,
            aggregator_vk,
        )
        .expect("transition witness validates")
    }

    #[test]
    fn partial_batch_proves_and_verifies_end_to_end() {
        let mut rng = ark_std::test_rng();
        let process = Process {
            id: StateKey::ZERO,
            census_root: Fr::from(0_u64),
            ballot_mode: mode(),
            encryption_key: EncryptionKeyCoords { x: Point::generator().x(), y: Point::generator().y() },
        };

        let (ballot_pk, ballot_vk) = generate_ballot_keys(&mut rng).expect("ballot keys");
        let (vote_pk, vote_vk) = sequencer_vote_circuit::generate_keys(&mut rng).expect("vote keys");
        let dummy = build_dummy_vote(&ballot_pk, ballot_vk.clone(), &vote_pk, &mut rng).expect("dummy builds");
        let (aggregator_pk, aggregator_vk) =
            sequencer_aggregator_circuit::generate_keys(&mut rng).expect("aggregator keys");

        let (real_vote, verified_vote, census_root) =
            one_vote(11, process.id, process.encryption_key, &ballot_pk, &ballot_vk, &vote_pk);

        let witness = build_transition_witness(
            process,
            vec![real_vote],
            vec![verified_vote],
            census_root,
            &vote_vk,
            &aggregator_vk,
            &aggregator_pk,
            &dummy,
        );
        assert_eq!(witness.num_new_votes, 1);
        assert_eq!(witness.num_overwrites, 0);

        let (pk, vk) = generate_keys(&mut rng).expect("transition key generation");
        let public_inputs = PublicInputs::from_witness(&witness);
        let root_before = witness.root_before;
        let root_after = witness.root_after;
        let proof = create_transition_proof(&pk, witness, &mut rng).expect("transition proof creation");

        assert_ne!(root_before, root_after);
        assert!(verify_transition_proof(&vk, &proof, &public_inputs).expect("verification runs"));
    }

    #[test]
    fn full_batch_with_no_padding_proves_and_verifies() {
        let mut rng = ark_std::test_rng();
        let process = Process {
            id: StateKey::ZERO,
            census_root: Fr::from(0_u64),
            ballot_mode: mode(),
            encryption_key: EncryptionKeyCoords { x: Point::generator().x(), y: Point::generator().y() },
        };

        let (ballot_pk, ballot_vk) = generate_ballot_keys(&mut rng).expect("ballot keys");
        let (vote_pk, vote_vk) = sequencer_vote_circuit::generate_keys(&mut rng).expect("vote keys");
        let dummy = build_dummy_vote(&ballot_pk, ballot_vk.clone(), &vote_pk, &mut rng).expect("dummy builds");
        let (aggregator_pk, aggregator_vk) =
            sequencer_aggregator_circuit::generate_keys(&mut rng).expect("aggregator keys");

        let mut real_votes = Vec::with_capacity(VOTES_PER_BATCH);
        let mut verified_votes = Vec::with_capacity(VOTES_PER_BATCH);
        let mut census_root = Fr::from(0_u64);
        for i in 0..VOTES_PER_BATCH {
            let seed = u8::try_from(i).unwrap_or(0).wrapping_add(40);
            let (real, verified, root) =
                one_vote(seed, process.id, process.encryption_key, &ballot_pk, &ballot_vk, &vote_pk);
            real_votes.push(real);
            verified_votes.push(verified);
            census_root = root;
        }

        let witness = build_transition_witness(
            process,
            real_votes,
            verified_votes,
            census_root,
            &vote_vk,
            &aggregator_vk,
            &aggregator_pk,
            &dummy,
        );
        assert_eq!(witness.num_new_votes, u64::try_from(VOTES_PER_BATCH).unwrap_or(0));
        assert_eq!(witness.num_overwrites, 0);

        let (pk, vk) = generate_keys(&mut rng).expect("transition key generation");
        let public_inputs = PublicInputs::from_witness(&witness);
        let proof = create_transition_proof(&pk, witness, &mut rng).expect("transition proof creation");

        assert!(verify_transition_proof(&vk, &proof, &public_inputs).expect("verification runs"));
    }

    #[test]
    fn tampered_results_snapshot_is_rejected() {
        let mut rng = ark_std::test_rng();
        let process = Process {
            id: StateKey::ZERO,
            census_root: Fr::from(0_u64),
            ballot_mode: mode(),
            encryption_key: EncryptionKeyCoords { x: Point::generator().x(), y: Point::generator().y() },
        };

        let (ballot_pk, ballot_vk) = generate_ballot_keys(&mut rng).expect("ballot keys");
        let (vote_pk, vote_vk) = sequencer_vote_circuit::generate_keys(&mut rng).expect("vote keys");
        let dummy = build_dummy_vote(&ballot_pk, ballot_vk.clone(), &vote_pk, &mut rng).expect("dummy builds");
        let (aggregator_pk, aggregator_vk) =
            sequencer_aggregator_circuit::generate_keys(&mut rng).expect("aggregator keys");

        let (real_vote, verified_vote, census_root) =
            one_vote(22, process.id, process.encryption_key, &ballot_pk, &ballot_vk, &vote_pk);

        let mut engine = Engine::new(SparseMerkleTree::new(Fr::from(0_u64), MemorySmtStore::new()));
        engine.register_process(&process).expect("register process");
        let root_before = engine.root();
        let header_inclusion = engine.header_inclusion().expect("header inclusion");
        engine.start_batch().expect("start batch");
        engine.add_vote(&verified_vote).expect("vote accepted");
        let transitions = engine.end_batch().expect("end batch");
        let mut results = engine.last_results_snapshot().expect("results snapshot");
        results.new_results_add = sequencer_curve::Ballot::zero();

        let aggregator_witness = AggregatorWitness::new(
            process.id,
            census_root,
            process.ballot_mode,
            process.encryption_key,
            vec![real_vote],
            &vote_vk,
            &dummy,
        )
        .expect("aggregator witness validates");
        let aggregator_public_inputs = sequencer_aggregator_circuit::PublicInputs::from_witness(&aggregator_witness);
        let aggregator_proof = sequencer_aggregator_circuit::create_aggregator_proof(
            &aggregator_pk,
            aggregator_witness.clone(),
            &mut rng,
        )
        .expect("aggregator proof creation");

        let err = TransitionWitness::new(
            root_before,
            process,
            &header_inclusion,
            transitions,
            results,
            &aggregator_witness,
            &aggregator_proof,
            &aggregator_public_inputs,
            &aggregator_vk,
        )
        .unwrap_err();
        assert!(matches!(err, WitnessError::ResultsMismatch));
    }

    #[test]
    fn ballot_digest_is_exposed_for_results_reconciliation() {
        assert_eq!(ballot_digest(&sequencer_curve::Ballot::zero()), ballot_digest(&sequencer_curve::Ballot::zero()));
    }
}
