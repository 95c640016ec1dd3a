//! Private witness for the StateTransition circuit (§4.7) and its native derivations.
//!
//! Every heavy check here — the Aggregator proof's recursive verification, the process header's
//! inclusion under `RootHashBefore`, and the full SMT transition chain from `RootHashBefore` to
//! `RootHashAfter` — runs natively in [`TransitionWitness::new`], the same way earlier stages
//! leave their own inner recursion to their witness constructors (§REDESIGN, "cross-field
//! recursion boundaries"). Unlike those boundaries, though, `AggregatedInputsHash` and this
//! stage's own native field are the same curve (BN254): nothing needs to cross into this stage's
//! field at all, so the recomputed hash is only limb-packed outward, into the Aggregator proof's
//! own BW6-761-native limb field, purely to compare against what that proof already committed to.

use ark_bw6_761::{Fr as AggregatorFr, BW6_761};
use ark_groth16::VerifyingKey;

use sequencer_aggregator_circuit::{
    verify_aggregator_proof, AggregatorProof, AggregatorWitness, PublicInputs as AggregatorPublicInputs,
    INPUTS_HASH_LIMBS_OUT,
};
use sequencer_core::constants::VOTES_PER_BATCH;
use sequencer_core::schema::{Fnc, Process, Transition};
use sequencer_core::Fr;
use sequencer_curve::Ballot;
use sequencer_hash::nonnative;
use sequencer_state::{ballot_digest, verify_transition, HeaderInclusion, ResultsSnapshot};

/// Number of ballot (or commitment) transitions in one batch, before the two results transitions.
const BALLOT_SLOTS: usize = VOTES_PER_BATCH;
/// Total transitions in one batch: padded ballot transitions, padded commitment transitions,
/// `ResultsAdd`, `ResultsSub` (§4.7).
const TRANSITION_COUNT: usize = 2 * VOTES_PER_BATCH + 2;
const RESULTS_ADD_INDEX: usize = 2 * VOTES_PER_BATCH;
const RESULTS_SUB_INDEX: usize = 2 * VOTES_PER_BATCH + 1;

/// Errors raised while validating a [`TransitionWitness`].
#[derive(Debug, thiserror::Error)]
pub enum WitnessError {
    /// A reserved header leaf's declared value doesn't match the process being applied.
    #[error("process header field {field} does not match the declared process")]
    HeaderFieldMismatch {
        /// The offending header field's name.
        field: &'static str,
    },

    /// A reserved header leaf's inclusion proof doesn't reconstruct `RootHashBefore`.
    #[error("process header field {field} is not included under RootHashBefore")]
    HeaderNotIncluded {
        /// The offending header field's name.
        field: &'static str,
    },

    /// The declared process doesn't match the one the recursively-verified Aggregator batch
    /// actually ran against.
    #[error("declared process does not match the aggregator witness's own process header")]
    ProcessMismatch,

    /// The recursive Aggregator proof failed Groth16 verification.
    #[error("recursive aggregator proof failed verification")]
    InvalidAggregatorProof,

    /// The natively-recomputed `AggregatedInputsHash` doesn't limb-pack to what the Aggregator
    /// proof's own public inputs declare.
    #[error("aggregated inputs hash does not match the aggregator proof's declared batch")]
    InputsHashMismatch,

    /// The batch did not carry exactly [`TRANSITION_COUNT`] transitions.
    #[error("batch holds {got} transitions, expected {expected}")]
    WrongTransitionCount {
        /// Observed transition count.
        got: usize,
        /// [`TRANSITION_COUNT`].
        expected: usize,
    },

    /// A transition's leaf-hash chain doesn't replay from the expected root.
    #[error("transition {index} breaks the chain from RootHashBefore")]
    ChainBroken {
        /// The offending transition's index within the batch.
        index: usize,
    },

    /// The results bookkeeping supplied alongside the transitions doesn't reconcile with them.
    #[error("results bookkeeping does not reconcile with the applied ballot transitions")]
    ResultsMismatch,
}

/// One fully-assembled StateTransition witness: a batch of SMT transitions already checked
/// against a recursively-verified Aggregator proof and the process header they apply to (§4.7).
#[derive(Clone)]
pub struct TransitionWitness {
    /// Root before this batch's transitions are applied; one of the four public values.
    pub root_before: Fr,
    /// Root after every transition in `transitions` is applied in order; the other three.
    pub root_after: Fr,
    /// Count of real votes this batch (`#IsInsertOrUpdate`).
    pub num_new_votes: u64,
    /// Count of overwrites this batch (`#IsUpdate`).
    pub num_overwrites: u64,
    /// The process this batch applies to.
    pub(crate) process: Process,
    /// Every transition in circuit order, already individually chain-verified.
    pub(crate) transitions: Vec<Transition>,
}

impl TransitionWitness {
    /// Validate one closed batch's Aggregator proof, header inclusion and transition chain,
    /// producing the witness the StateTransition circuit consumes (§4.7).
    ///
    /// # Errors
    /// Returns the first [`WitnessError`] variant violated.
    #[allow(clippy::too_many_arguments, reason = "one call assembles every native check this stage owns")]
    pub fn new(
        root_before: Fr,
        process: Process,
        header_inclusion: &HeaderInclusion,
        transitions: Vec<Transition>,
        results: ResultsSnapshot,
        aggregator_witness: &AggregatorWitness,
        aggregator_proof: &AggregatorProof,
        aggregator_public_inputs: &AggregatorPublicInputs,
        aggregator_vk: &VerifyingKey<BW6_761>,
    ) -> Result<Self, WitnessError> {
        check_header_inclusion(root_before, &process, header_inclusion)?;
        check_process_matches_witness(&process, aggregator_witness)?;

        let valid = verify_aggregator_proof(aggregator_vk, aggregator_proof, aggregator_public_inputs)
            .map_err(|_| WitnessError::InvalidAggregatorProof)?;
        if !valid {
            return Err(WitnessError::InvalidAggregatorProof);
        }

        let recomputed_hash = aggregator_witness.aggregated_inputs_hash();
        let expected_limbs: Vec<AggregatorFr> = nonnative::pack_limbs(recomputed_hash, INPUTS_HASH_LIMBS_OUT);
        if expected_limbs.as_slice() != aggregator_public_inputs.inputs_hash_limbs.as_slice() {
            return Err(WitnessError::InputsHashMismatch);
        }

        if transitions.len() != TRANSITION_COUNT {
            return Err(WitnessError::WrongTransitionCount {
                got: transitions.len(),
                expected: TRANSITION_COUNT,
            });
        }

        let mut running_root = root_before;
        for (index, transition) in transitions.iter().enumerate() {
            if !verify_transition(running_root, transition) {
                return Err(WitnessError::ChainBroken { index });
            }
            running_root = transition.new_root;
        }
        let root_after = running_root;

        let ballot_transitions = transitions
            .get(..BALLOT_SLOTS)
            .ok_or(WitnessError::WrongTransitionCount { got: transitions.len(), expected: TRANSITION_COUNT })?;
        let num_new_votes = count_fnc(ballot_transitions, |fnc| matches!(fnc, Fnc::Insert | Fnc::Update));
        let num_overwrites = count_fnc(ballot_transitions, |fnc| matches!(fnc, Fnc::Update));

        check_results(&transitions, &results, aggregator_witness, num_new_votes, num_overwrites)?;

        Ok(Self {
            root_before,
            root_after,
            num_new_votes,
            num_overwrites,
            process,
            transitions,
        })
    }
}

fn count_fnc(transitions: &[Transition], matches: impl Fn(Fnc) -> bool) -> u64 {
    u64::try_from(transitions.iter().filter(|t| matches(t.fnc)).count()).unwrap_or(0)
}

/// A results leaf's `old_value` only ever equals `ballot_digest(old_total)` when the leaf already
/// existed (an `Update`). The first batch ever to touch `ResultsAdd`/`ResultsSub` inserts it, and
/// an `Insert`'s `old_value` is the empty-leaf sentinel regardless of what the "prior total"
/// conceptually is — so that case is only consistent when the prior total was actually zero.
fn old_leaf_matches(transition: &Transition, old_total: &Ballot) -> bool {
    if transition.is_old0 {
        *old_total == Ballot::zero()
    } else {
        ballot_digest(old_total) == transition.old_value
    }
}

fn check_header_inclusion(
    root_before: Fr,
    process: &Process,
    header_inclusion: &HeaderInclusion,
) -> Result<(), WitnessError> {
    use ark_ff::PrimeField;
    use sequencer_core::StateKey;
    use sequencer_hash::poseidon;

    let process_field = Fr::from_be_bytes_mod_order(process.id.as_ref());
    if header_inclusion.process_id.value != process_field {
        return Err(WitnessError::HeaderFieldMismatch { field: "process_id" });
    }
    if !header_inclusion.process_id.verify(root_before, StateKey::PROCESS_ID) {
        return Err(WitnessError::HeaderNotIncluded { field: "process_id" });
    }

    if header_inclusion.census_root.value != process.census_root {
        return Err(WitnessError::HeaderFieldMismatch { field: "census_root" });
    }
    if !header_inclusion.census_root.verify(root_before, StateKey::CENSUS_ROOT) {
        return Err(WitnessError::HeaderNotIncluded { field: "census_root" });
    }

    let mode_digest = poseidon::hash(&process.ballot_mode.to_field_elements());
    if header_inclusion.ballot_mode.value != mode_digest {
        return Err(WitnessError::HeaderFieldMismatch { field: "ballot_mode" });
    }
    if !header_inclusion.ballot_mode.verify(root_before, StateKey::BALLOT_MODE) {
        return Err(WitnessError::HeaderNotIncluded { field: "ballot_mode" });
    }

    let key_digest = poseidon::hash(&[process.encryption_key.x, process.encryption_key.y]);
    if header_inclusion.encryption_key.value != key_digest {
        return Err(WitnessError::HeaderFieldMismatch { field: "encryption_key" });
    }
    if !header_inclusion.encryption_key.verify(root_before, StateKey::ENCRYPTION_KEY) {
        return Err(WitnessError::HeaderNotIncluded { field: "encryption_key" });
    }

    Ok(())
}

fn check_process_matches_witness(process: &Process, witness: &AggregatorWitness) -> Result<(), WitnessError> {
    if process.id != witness.process_id
        || process.census_root != witness.census_root
        || process.ballot_mode != witness.ballot_mode
        || process.encryption_key != witness.encryption_key
    {
        return Err(WitnessError::ProcessMismatch);
    }
    Ok(())
}

fn check_results(
    transitions: &[Transition],
    results: &ResultsSnapshot,
    aggregator_witness: &AggregatorWitness,
    num_new_votes: u64,
    num_overwrites: u64,
) -> Result<(), WitnessError> {
    let results_add = transitions.get(RESULTS_ADD_INDEX).ok_or(WitnessError::ResultsMismatch)?;
    let results_sub = transitions.get(RESULTS_SUB_INDEX).ok_or(WitnessError::ResultsMismatch)?;

    if !old_leaf_matches(results_add, &results.old_results_add)
        || ballot_digest(&results.new_results_add) != results_add.new_value
        || !old_leaf_matches(results_sub, &results.old_results_sub)
        || ballot_digest(&results.new_results_sub) != results_sub.new_value
    {
        return Err(WitnessError::ResultsMismatch);
    }

    if results.new_results_add != results.old_results_add.add(&results.batch_ballot_sum) {
        return Err(WitnessError::ResultsMismatch);
    }
    if results.new_results_sub != results.old_results_sub.add(&results.overwritten_ballot_sum) {
        return Err(WitnessError::ResultsMismatch);
    }

    let recomputed_batch_sum = aggregator_witness
        .slots
        .iter()
        .take(aggregator_witness.real_count)
        .fold(Ballot::zero(), |acc, slot| acc.add(&slot.ballot));
    if results.batch_ballot_sum != recomputed_batch_sum {
        return Err(WitnessError::ResultsMismatch);
    }

    if results.num_new_votes != num_new_votes
        || u64::try_from(aggregator_witness.real_count).unwrap_or(0) != num_new_votes
        || results.num_overwrites != num_overwrites
    {
        return Err(WitnessError::ResultsMismatch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer_core::schema::{BallotMode, CostExponent, EncryptionKeyCoords};
    use sequencer_core::StateKey;
    use sequencer_state::{Engine, MemorySmtStore, SparseMerkleTree};

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

    #[test]
    fn transition_count_mismatch_is_rejected_before_any_chain_walk() {
        assert_eq!(TRANSITION_COUNT, 2 * VOTES_PER_BATCH + 2);
        assert_eq!(RESULTS_ADD_INDEX, 2 * VOTES_PER_BATCH);
        assert_eq!(RESULTS_SUB_INDEX, 2 * VOTES_PER_BATCH + 1);
    }

    #[test]
    fn header_inclusion_detects_a_mismatched_encryption_key() {
        let mut engine = Engine::with_batch_size(SparseMerkleTree::new(Fr::from(0_u64), MemorySmtStore::new()), 1);
        let process = Process {
            id: StateKey::new([1_u8; 20]),
            census_root: Fr::from(7_u64),
            ballot_mode: mode(),
            encryption_key: EncryptionKeyCoords { x: Fr::from(1_u64), y: Fr::from(2_u64) },
        };
        engine.register_process(&process).expect("register");
        let header_inclusion = engine.header_inclusion().expect("header inclusion");
        let wrong_process = Process {
            encryption_key: EncryptionKeyCoords { x: Fr::from(99_u64), y: Fr::from(2_u64) },
            ..process
        };
        let err = check_header_inclusion(engine.root(), &wrong_process, &header_inclusion).unwrap_err();
        assert!(matches!(err, WitnessError::HeaderFieldMismatch { field: "encryption_key" }));
    }
}
