//! Batch lifecycle over the sparse Merkle tree: `StartBatch` / `AddVote` / `EndBatch` (§4.3).
//!
//! The tree's leaves only ever hold a single field element, so per-nullifier and per-address
//! leaves store a Poseidon digest of the full ciphertext/commitment rather than the value
//! itself. The engine keeps the actual ballots in a side table, keyed the same way, so it can
//! recover a prior ballot on overwrite and maintain the running `BallotSum`/`OverwriteSum`
//! homomorphic totals.

use std::collections::{BTreeMap, BTreeSet};

use sequencer_core::constants::VOTES_PER_BATCH;
use sequencer_core::schema::{Fnc, Process, Transition};
use sequencer_core::{CoreError, Fr, StateKey};
use sequencer_curve::Ballot;
use sequencer_hash::poseidon;

use crate::error::StateError;
use crate::schema::VerifiedBallot;
use crate::store::SmtStore;
use crate::tree::{MembershipProof, SparseMerkleTree};

/// Poseidon digest of a ballot's ciphertext coordinates, the value stored at its nullifier leaf
/// and at the reserved `ResultsAdd`/`ResultsSub` leaves. Exposed so the state-transition circuit's
/// witness can check a declared running total against what a transition's leaf actually commits
/// to (§4.7).
#[must_use]
pub fn ballot_digest(ballot: &Ballot) -> Fr {
    let mut inputs = Vec::with_capacity(ballot.fields().len().saturating_mul(4));
    for ciphertext in ballot.fields() {
        inputs.push(ciphertext.c1.x());
        inputs.push(ciphertext.c1.y());
        inputs.push(ciphertext.c2.x());
        inputs.push(ciphertext.c2.y());
    }
    poseidon::hash(&inputs)
}

#[derive(Debug, Default)]
struct BatchState {
    seen_nullifiers: BTreeSet<StateKey>,
    ballot_transitions: Vec<Transition>,
    commitment_transitions: Vec<Transition>,
    ballot_sum: Option<Ballot>,
    overwrite_sum: Option<Ballot>,
    num_new_votes: u64,
    num_overwrites: u64,
}

/// The state-engine batch lifecycle: one open batch at a time over a persistent tree.
#[derive(Debug)]
pub struct Engine<S> {
    tree: SparseMerkleTree<S>,
    ballots: BTreeMap<StateKey, Ballot>,
    results_add: Ballot,
    results_sub: Ballot,
    votes_per_batch: usize,
    batch: Option<BatchState>,
    last_results_snapshot: Option<ResultsSnapshot>,
}

/// A single `AddVote`'s effect, reported back to the caller for bookkeeping (e.g. queue
/// acknowledgement); the transitions themselves are only surfaced via `EndBatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The nullifier had no prior leaf; a new ballot was accepted.
    Accepted,
    /// The nullifier already had a leaf; its prior ballot was overwritten.
    Overwritten,
}

impl<S: SmtStore> Engine<S> {
    /// Open an engine over `tree`, proving `VOTES_PER_BATCH` vote slots per batch.
    #[must_use]
    pub fn new(tree: SparseMerkleTree<S>) -> Self {
        Self::with_batch_size(tree, VOTES_PER_BATCH)
    }

    /// Open an engine with a non-default batch size, for tests exercising padding directly.
    #[must_use]
    pub fn with_batch_size(tree: SparseMerkleTree<S>, votes_per_batch: usize) -> Self {
        Self {
            tree,
            ballots: BTreeMap::new(),
            results_add: Ballot::zero(),
            results_sub: Ballot::zero(),
            votes_per_batch,
            batch: None,
            last_results_snapshot: None,
        }
    }

    /// The tree's current root.
    #[must_use]
    pub const fn root(&self) -> Fr {
        self.tree.root()
    }

    /// Register a process's immutable header (§3 `Process`) as the tree's four reserved leaves,
    /// so later batches can prove their inclusion under `RootHashBefore` (§4.7). Must be called
    /// once per tree, before the first batch.
    ///
    /// # Errors
    /// Returns [`StateError::KeyAlreadyExists`] if the header was already registered, or a store
    /// error.
    pub fn register_process(&mut self, process: &Process) -> Result<(), StateError> {
        let process_field = Fr::from_be_bytes_mod_order(process.id.as_ref());
        self.tree.insert(StateKey::PROCESS_ID, process_field)?;
        self.tree.insert(StateKey::CENSUS_ROOT, process.census_root)?;
        let mode_digest = poseidon::hash(&process.ballot_mode.to_field_elements());
        self.tree.insert(StateKey::BALLOT_MODE, mode_digest)?;
        let key_digest = poseidon::hash(&[process.encryption_key.x, process.encryption_key.y]);
        self.tree.insert(StateKey::ENCRYPTION_KEY, key_digest)?;
        Ok(())
    }

    /// Produce inclusion proofs for the registered process header, for the state-transition
    /// circuit's witness to check against `RootHashBefore`.
    ///
    /// # Errors
    /// Returns [`StateError::MissingNode`] if the header hasn't been registered yet, or a store
    /// error.
    pub fn header_inclusion(&self) -> Result<HeaderInclusion, StateError> {
        Ok(HeaderInclusion {
            process_id: self.tree.prove(StateKey::PROCESS_ID)?,
            census_root: self.tree.prove(StateKey::CENSUS_ROOT)?,
            ballot_mode: self.tree.prove(StateKey::BALLOT_MODE)?,
            encryption_key: self.tree.prove(StateKey::ENCRYPTION_KEY)?,
        })
    }

    /// Begin a batch.
    ///
    /// # Errors
    /// Returns [`CoreError::StateOpen`] if a batch is already open.
    pub fn start_batch(&mut self) -> Result<(), StateError> {
        if self.batch.is_some() {
            return Err(StateError::Core(CoreError::StateOpen));
        }
        self.batch = Some(BatchState::default());
        Ok(())
    }

    /// Apply one verified ballot within the open batch: an insert-or-update on its nullifier
    /// leaf, and an insert-or-update on its commitment leaf keyed by address.
    ///
    /// # Errors
    /// Returns [`CoreError::StateClosed`] if no batch is open, [`CoreError::DuplicateWithinBatch`]
    /// if `vote.nullifier` already appeared earlier in this batch, or a store error.
    pub fn add_vote(&mut self, vote: &VerifiedBallot) -> Result<VoteOutcome, StateError> {
        let Some(batch) = self.batch.as_mut() else {
            return Err(StateError::Core(CoreError::StateClosed));
        };
        if !batch.seen_nullifiers.insert(vote.nullifier) {
            return Err(StateError::Core(CoreError::DuplicateWithinBatch));
        }

        let digest = ballot_digest(&vote.ballot);
        let (ballot_transition, outcome) = match self.tree.get(vote.nullifier)? {
            None => (self.tree.insert(vote.nullifier, digest)?, VoteOutcome::Accepted),
            Some(_) => (self.tree.update(vote.nullifier, digest)?, VoteOutcome::Overwritten),
        };

        let commitment_transition = match self.tree.get(vote.address)? {
            None => self.tree.insert(vote.address, vote.commitment)?,
            Some(_) => self.tree.update(vote.address, vote.commitment)?,
        };

        let batch = self.batch.as_mut().ok_or(StateError::Core(CoreError::StateClosed))?;
        match outcome {
            VoteOutcome::Accepted => {
                batch.num_new_votes = batch.num_new_votes.saturating_add(1);
                batch.ballot_sum = Some(match batch.ballot_sum.take() {
                    Some(sum) => sum.add(&vote.ballot),
                    None => vote.ballot,
                });
            }
            VoteOutcome::Overwritten => {
                let previous = self
                    .ballots
                    .get(&vote.nullifier)
                    .copied()
                    .ok_or(StateError::MissingNode)?;
                batch.num_overwrites = batch.num_overwrites.saturating_add(1);
                batch.overwrite_sum = Some(match batch.overwrite_sum.take() {
                    Some(sum) => sum.add(&previous),
                    None => previous,
                });
                batch.ballot_sum = Some(match batch.ballot_sum.take() {
                    Some(sum) => sum.add(&vote.ballot),
                    None => vote.ballot,
                });
            }
        }
        batch.ballot_transitions.push(ballot_transition);
        batch.commitment_transitions.push(commitment_transition);

        self.ballots.insert(vote.nullifier, vote.ballot);
        Ok(outcome)
    }

    /// Close the batch, folding `BallotSum`/`OverwriteSum` into the reserved results leaves and
    /// returning every transition in circuit order: padded ballot transitions, then padded
    /// commitment transitions, then `ResultsAdd`, then `ResultsSub`.
    ///
    /// # Errors
    /// Returns [`CoreError::StateClosed`] if no batch is open, or a store error.
    pub fn end_batch(&mut self) -> Result<Vec<Transition>, StateError> {
        let batch = self.batch.take().ok_or(StateError::Core(CoreError::StateClosed))?;

        let mut ballot_transitions = batch.ballot_transitions;
        let mut commitment_transitions = batch.commitment_transitions;
        while ballot_transitions.len() < self.votes_per_batch {
            ballot_transitions.push(noop_transition(self.tree.root()));
            commitment_transitions.push(noop_transition(self.tree.root()));
        }

        let mut transitions = Vec::with_capacity(self.votes_per_batch.saturating_mul(2).saturating_add(2));
        transitions.append(&mut ballot_transitions);
        transitions.append(&mut commitment_transitions);

        let old_results_add = self.results_add;
        let old_results_sub = self.results_sub;

        if let Some(sum) = batch.ballot_sum {
            self.results_add = self.results_add.add(&sum);
        }
        transitions.push(self.update_results_leaf(StateKey::RESULTS_ADD, self.results_add)?);

        if let Some(sum) = batch.overwrite_sum {
            self.results_sub = self.results_sub.add(&sum);
        }
        transitions.push(self.update_results_leaf(StateKey::RESULTS_SUB, self.results_sub)?);

        self.last_results_snapshot = Some(ResultsSnapshot {
            old_results_add,
            new_results_add: self.results_add,
            old_results_sub,
            new_results_sub: self.results_sub,
            batch_ballot_sum: batch.ballot_sum.unwrap_or_else(Ballot::zero),
            overwritten_ballot_sum: batch.overwrite_sum.unwrap_or_else(Ballot::zero),
            num_new_votes: batch.num_new_votes,
            num_overwrites: batch.num_overwrites,
        });

        Ok(transitions)
    }

    /// The results bookkeeping from the most recently closed batch, for the state-transition
    /// circuit's `NewResultsAdd`/`NewResultsSub` equation check (§4.7). `None` before the first
    /// `end_batch` call; overwritten by the next one.
    #[must_use]
    pub fn last_results_snapshot(&self) -> Option<ResultsSnapshot> {
        self.last_results_snapshot
    }

    fn update_results_leaf(&mut self, key: StateKey, new_total: Ballot) -> Result<Transition, StateError> {
        let digest = ballot_digest(&new_total);
        match self.tree.get(key)? {
            None => self.tree.insert(key, digest),
            Some(_) => self.tree.update(key, digest),
        }
    }
}

/// Inclusion proofs for a process's four reserved header leaves under one root, the witness the
/// state-transition circuit checks against `RootHashBefore` (§4.7).
#[derive(Debug, Clone)]
pub struct HeaderInclusion {
    /// Proof for the [`StateKey::PROCESS_ID`] leaf.
    pub process_id: MembershipProof,
    /// Proof for the [`StateKey::CENSUS_ROOT`] leaf.
    pub census_root: MembershipProof,
    /// Proof for the [`StateKey::BALLOT_MODE`] leaf.
    pub ballot_mode: MembershipProof,
    /// Proof for the [`StateKey::ENCRYPTION_KEY`] leaf.
    pub encryption_key: MembershipProof,
}

/// Snapshot of one closed batch's results bookkeeping: the `Ballot` totals before and after
/// folding in this batch's real votes, plus the batch's own contribution to each. The
/// state-transition circuit rebuilds `NewResultsAdd`/`NewResultsSub` from these rather than from
/// the tree's stored digests, since a digest alone can't be re-added to (§4.7).
#[derive(Debug, Clone, Copy)]
pub struct ResultsSnapshot {
    /// `ResultsAdd` before this batch.
    pub old_results_add: Ballot,
    /// `ResultsAdd` after this batch: `old_results_add + batch_ballot_sum`.
    pub new_results_add: Ballot,
    /// `ResultsSub` before this batch.
    pub old_results_sub: Ballot,
    /// `ResultsSub` after this batch: `old_results_sub + overwritten_ballot_sum`.
    pub new_results_sub: Ballot,
    /// Sum of every real vote's ballot this batch, inserts and overwrites alike.
    pub batch_ballot_sum: Ballot,
    /// Sum of the prior ballot at every overwritten nullifier this batch.
    pub overwritten_ballot_sum: Ballot,
    /// Count of real votes this batch (inserts and overwrites).
    pub num_new_votes: u64,
    /// Count of overwrites this batch.
    pub num_overwrites: u64,
}

/// A transition that leaves the root unchanged, padding a batch out to its fixed vote-slot count.
fn noop_transition(root: Fr) -> Transition {
    Transition {
        old_root: root,
        old_key: Fr::from(0_u64),
        old_value: Fr::from(0_u64),
        new_root: root,
        new_key: Fr::from(0_u64),
        new_value: Fr::from(0_u64),
        siblings: Vec::new(),
        old_leaf_level: 0,
        is_old0: true,
        fnc: Fnc::Noop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::EMPTY_HASH;
    use crate::schema::RecursionProof;
    use crate::store::MemorySmtStore;
    use sequencer_curve::{Ciphertext, Point};

    fn key(tag: u8) -> StateKey {
        let mut bytes = [0_u8; 20];
        *bytes.last_mut().expect("nonempty") = tag;
        StateKey::new(bytes)
    }

    /// A ballot whose every slot is `(G, G)`, distinguishable from the zero ballot without
    /// needing a scalar sample.
    fn non_zero_ballot() -> Ballot {
        let ciphertext = Ciphertext {
            c1: Point::generator(),
            c2: Point::generator(),
        };
        Ballot::new([ciphertext; sequencer_core::FIELDS_PER_BALLOT])
    }

    fn vote(nullifier_tag: u8, address_tag: u8, ballot: Ballot) -> VerifiedBallot {
        VerifiedBallot {
            process_id: key(0),
            address: key(address_tag),
            nullifier: key(nullifier_tag),
            commitment: Fr::from(u64::from(address_tag)),
            ballot,
            voter_weight: 1,
            inputs_hash: Fr::from(0_u64),
            proof: RecursionProof(Vec::new()),
            vote_public_inputs: RecursionProof(Vec::new()),
        }
    }

    fn engine_with_batch_size(votes_per_batch: usize) -> Engine<MemorySmtStore> {
        let tree = SparseMerkleTree::new(EMPTY_HASH, MemorySmtStore::new());
        Engine::with_batch_size(tree, votes_per_batch)
    }

    #[test]
    fn add_vote_without_batch_fails() {
        let mut engine = engine_with_batch_size(2);
        let err = engine.add_vote(&vote(1, 1, Ballot::zero())).unwrap_err();
        assert!(matches!(err, StateError::Core(CoreError::StateClosed)));
    }

    #[test]
    fn start_batch_twice_fails() {
        let mut engine = engine_with_batch_size(2);
        engine.start_batch().expect("start");
        let err = engine.start_batch().unwrap_err();
        assert!(matches!(err, StateError::Core(CoreError::StateOpen)));
    }

    #[test]
    fn duplicate_nullifier_within_batch_fails() {
        let mut engine = engine_with_batch_size(2);
        engine.start_batch().expect("start");
        engine.add_vote(&vote(1, 1, Ballot::zero())).expect("first vote");
        let err = engine.add_vote(&vote(1, 2, Ballot::zero())).unwrap_err();
        assert!(matches!(err, StateError::Core(CoreError::DuplicateWithinBatch)));
    }

    #[test]
    fn end_batch_pads_to_votes_per_batch() {
        let mut engine = engine_with_batch_size(3);
        engine.start_batch().expect("start");
        engine.add_vote(&vote(1, 1, Ballot::zero())).expect("vote");
        let transitions = engine.end_batch().expect("end batch");
        assert_eq!(transitions.len(), 3 * 2 + 2);
        let noop_count = transitions.iter().filter(|t| t.fnc == Fnc::Noop).count();
        assert_eq!(noop_count, 4);
        let insert_count = transitions.iter().filter(|t| t.fnc == Fnc::Insert).count();
        assert_eq!(insert_count, 4);
    }

    #[test]
    fn overwrite_moves_prior_ballot_to_results_sub() {
        let mut engine = engine_with_batch_size(1);
        engine.start_batch().expect("start");
        engine
            .add_vote(&vote(1, 1, non_zero_ballot()))
            .expect("first vote");
        engine.end_batch().expect("end first batch");
        assert_eq!(engine.results_add, non_zero_ballot());
        assert_eq!(engine.results_sub, Ballot::zero());

        engine.start_batch().expect("start again");
        let outcome = engine.add_vote(&vote(1, 1, Ballot::zero())).expect("overwrite");
        assert_eq!(outcome, VoteOutcome::Overwritten);
        engine.end_batch().expect("end second batch");
        assert_eq!(engine.results_sub, non_zero_ballot());
        assert_eq!(engine.results_add, non_zero_ballot());
    }

    #[test]
    fn last_results_snapshot_tracks_batch_contribution() {
        let mut engine = engine_with_batch_size(1);
        engine.start_batch().expect("start");
        engine
            .add_vote(&vote(1, 1, non_zero_ballot()))
            .expect("first vote");
        engine.end_batch().expect("end first batch");
        let first = engine.last_results_snapshot().expect("snapshot");
        assert_eq!(first.old_results_add, Ballot::zero());
        assert_eq!(first.new_results_add, non_zero_ballot());
        assert_eq!(first.old_results_sub, Ballot::zero());
        assert_eq!(first.new_results_sub, Ballot::zero());
        assert_eq!(first.num_new_votes, 1);
        assert_eq!(first.num_overwrites, 0);

        engine.start_batch().expect("start again");
        engine.add_vote(&vote(1, 1, Ballot::zero())).expect("overwrite");
        engine.end_batch().expect("end second batch");
        let second = engine.last_results_snapshot().expect("snapshot");
        assert_eq!(second.old_results_sub, Ballot::zero());
        assert_eq!(second.overwritten_ballot_sum, non_zero_ballot());
        assert_eq!(second.new_results_sub, non_zero_ballot());
        assert_eq!(second.num_new_votes, 1);
        assert_eq!(second.num_overwrites, 1);
    }

    #[test]
    fn end_batch_without_start_fails() {
        let mut engine = engine_with_batch_size(2);
        let err = engine.end_batch().unwrap_err();
        assert!(matches!(err, StateError::Core(CoreError::StateClosed)));
    }

    #[test]
    fn header_inclusion_proofs_verify_under_the_registered_root() {
        use sequencer_core::schema::{CostExponent, EncryptionKeyCoords, Process};

        let process = Process {
            id: key(1),
            census_root: Fr::from(7_u64),
            ballot_mode: sequencer_core::schema::BallotMode {
                max_count: 1,
                force_uniqueness: false,
                max_value: 1,
                min_value: 0,
                max_total_cost: 1,
                min_total_cost: 0,
                cost_exp: Some(CostExponent::Linear),
                cost_from_weight: false,
            },
            encryption_key: EncryptionKeyCoords { x: Fr::from(1_u64), y: Fr::from(2_u64) },
        };

        let mut engine = engine_with_batch_size(2);
        engine.register_process(&process).expect("register");
        let root = engine.root();
        let proofs = engine.header_inclusion().expect("header inclusion");

        assert!(proofs.process_id.verify(root, StateKey::PROCESS_ID));
        assert!(proofs.census_root.verify(root, StateKey::CENSUS_ROOT));
        assert!(proofs.ballot_mode.verify(root, StateKey::BALLOT_MODE));
        assert!(proofs.encryption_key.verify(root, StateKey::ENCRYPTION_KEY));
        assert!(!proofs.process_id.verify(root, StateKey::CENSUS_ROOT));
    }
}
