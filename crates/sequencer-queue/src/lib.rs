//! Durable reservation-queue substrate for the pipeline's four stages (§4.8, C8).
//!
//! Every stage between the voter and the tally sits behind one of these queues: the ballot
//! verifier consumes pending ballots and produces verified ballots, the aggregator scheduler
//! consumes verified ballots and produces batches, the state-transition worker consumes batches
//! and produces nothing further (it is the recursion tower's terminus). [`Queue`] is the
//! storage primitive one stage uses; [`Queues`] owns every stage's trees plus the one global
//! mutex §4.8 requires to make "find a free entry and reserve it" atomic.

mod codec;
mod error;
mod key;
mod queue;
mod reservation;

pub use error::QueueError;
pub use key::{QueueKey, CONTENT_HASH_BYTES};
pub use queue::Queue;
pub use reservation::Reservation;

use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use sequencer_core::StateKey;
use sequencer_state::{AggregatedBatch, Vote, VerifiedBallot};

/// Every registered `sled` tree prefix (§6), kept together so the four queues can coexist in one
/// `sled::Db` without colliding.
mod prefixes {
    pub const BALLOTS: &str = "b";
    pub const BALLOT_RESERVATIONS: &str = "br";
    pub const VERIFIED: &str = "vb";
    pub const VERIFIED_RESERVATIONS: &str = "vbr";
    pub const BATCHES: &str = "ag";
    pub const BATCH_RESERVATIONS: &str = "agr";
}

/// The pipeline's three queues (pending ballots, verified ballots, batches) backed by one `sled`
/// database, plus the mutex serializing every `Next…`/`Pull…` call across all of them.
pub struct Queues {
    db: sled::Db,
    lock: Mutex<()>,
    ballots: Queue<Vote>,
    verified: Queue<VerifiedBallot>,
    batches: Queue<AggregatedBatch>,
}

impl Queues {
    /// Open (or create) the queue database at `path`, clearing every reservation sub-prefix —
    /// the crash-recovery sweep §4.8 requires at process start.
    ///
    /// # Errors
    /// Returns [`QueueError::Io`] if the store cannot be opened or cleared.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, QueueError> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        let queues = Self {
            ballots: Queue::new(
                db.open_tree(prefixes::BALLOTS)?,
                db.open_tree(prefixes::BALLOT_RESERVATIONS)?,
                false,
            ),
            verified: Queue::new(
                db.open_tree(prefixes::VERIFIED)?,
                db.open_tree(prefixes::VERIFIED_RESERVATIONS)?,
                true,
            ),
            batches: Queue::new(
                db.open_tree(prefixes::BATCHES)?,
                db.open_tree(prefixes::BATCH_RESERVATIONS)?,
                true,
            ),
            lock: Mutex::new(()),
            db,
        };
        queues.ballots.clear_reservations()?;
        queues.verified.clear_reservations()?;
        queues.batches.clear_reservations()?;
        tracing::info!(path = %path.display(), "queue store opened, stale reservations cleared");
        Ok(queues)
    }

    /// Flush every pending write to disk, crossing the single fsync boundary §4.8 describes.
    ///
    /// # Errors
    /// Returns [`QueueError::Io`] if the flush fails.
    pub fn flush(&self) -> Result<(), QueueError> {
        self.db.flush()?;
        Ok(())
    }

    /// Push a freshly submitted ballot.
    ///
    /// # Errors
    /// Returns [`QueueError::Io`]/[`QueueError::Codec`] if the write or encode fails.
    pub fn push_ballot(&self, vote: &Vote) -> Result<QueueKey, QueueError> {
        self.ballots.push(vote)
    }

    /// Reserve and return the next free pending ballot, in store order.
    ///
    /// # Errors
    /// Returns [`QueueError::NoMoreElements`] if none is free.
    pub fn next_ballot(&self) -> Result<(QueueKey, Vote), QueueError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.ballots.next_locked(None)
    }

    /// Complete a ballot: free its reservation, delete it, and push the verifier's output into
    /// the verified-ballot queue for `process_id` — §4.8's "writes the successor entry" half of
    /// `MarkDone`.
    ///
    /// # Errors
    /// Returns [`QueueError::Io`]/[`QueueError::Codec`] if either queue's store access fails.
    pub fn mark_ballot_done(
        &self,
        key: &QueueKey,
        process_id: StateKey,
        verified: &VerifiedBallot,
    ) -> Result<QueueKey, QueueError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.ballots.mark_done(key)?;
        self.verified.push_for_process(process_id, verified)
    }

    /// Discard a reserved ballot without promoting it: no successor entry is written (§7, a
    /// permanently invalid ballot — bad signature, census proof, or inner BallotProof — is
    /// logged and dropped rather than advanced).
    ///
    /// # Errors
    /// Returns [`QueueError::Io`] if the store access fails.
    pub fn drop_ballot(&self, key: &QueueKey) -> Result<(), QueueError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.ballots.mark_done(key)
    }

    /// Number of free (unreserved) verified ballots currently queued for `process_id`, for the
    /// aggregator scheduler's trigger policy (§4.8).
    ///
    /// # Errors
    /// Returns [`QueueError::Io`] if the store access fails.
    pub fn count_verified_ballots(&self, process_id: StateKey) -> Result<usize, QueueError> {
        self.verified.count_free(process_id)
    }

    /// Reserve and return up to `n` free verified ballots for `process_id`. An empty result is
    /// not an error: the caller (the aggregator scheduler) is expected to treat it as "nothing to
    /// do yet" (§4.8).
    ///
    /// # Errors
    /// Returns [`QueueError::Io`]/[`QueueError::Codec`] if the store or decode fails.
    pub fn pull_verified_ballots(&self, process_id: StateKey, n: usize) -> Result<Vec<(QueueKey, VerifiedBallot)>, QueueError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.verified.pull_locked(process_id, n)
    }

    /// Complete a batch of verified ballots: free their reservations, delete them, and push the
    /// aggregator's output into the batch queue for `process_id`.
    ///
    /// # Errors
    /// Returns [`QueueError::Io`]/[`QueueError::Codec`] if either queue's store access fails.
    pub fn mark_verified_done(
        &self,
        keys: &[QueueKey],
        process_id: StateKey,
        batch: &AggregatedBatch,
    ) -> Result<QueueKey, QueueError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            self.verified.mark_done(key)?;
        }
        self.batches.push_for_process(process_id, batch)
    }

    /// Reserve and return the next free batch for any process, in store order.
    ///
    /// # Errors
    /// Returns [`QueueError::NoMoreElements`] if none is free.
    pub fn next_batch(&self) -> Result<(QueueKey, AggregatedBatch), QueueError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.batches.next_locked(None)
    }

    /// Complete a batch: this stage is the pipeline's terminus, so `MarkDone` here only deletes
    /// the entry and its reservation — there is no successor queue to write to.
    ///
    /// # Errors
    /// Returns [`QueueError::Io`] if the store access fails.
    pub fn mark_batch_done(&self, key: &QueueKey) -> Result<(), QueueError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.batches.mark_done(key)
    }

    /// Clear reservations older than `max_age` across all three stages — the periodic
    /// stale-reservation sweeper (§4.8). Returns the total number cleared.
    ///
    /// # Errors
    /// Returns [`QueueError::Io`]/[`QueueError::Codec`] if a store access or decode fails.
    pub fn sweep_stale_reservations(&self, max_age: Duration) -> Result<usize, QueueError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut cleared = self.ballots.sweep_stale(max_age)?;
        cleared = cleared.saturating_add(self.verified.sweep_stale(max_age)?);
        cleared = cleared.saturating_add(self.batches.sweep_stale(max_age)?);
        if cleared > 0 {
            tracing::warn!(cleared, "swept stale queue reservations");
        }
        Ok(cleared)
    }
}
