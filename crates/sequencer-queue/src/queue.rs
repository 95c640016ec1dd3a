//! A single reservation-backed queue: one `sled` tree of entries, one of reservations (§4.8).
//!
//! `Queue` itself only handles one stage's storage; the cross-stage "delete here, write there"
//! half of `MarkDone` and the global mutex serializing `Next…` lives one level up, in
//! [`crate::Queues`], which is the only place that can see more than one stage's trees at once.

use std::marker::PhantomData;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use sequencer_core::StateKey;

use crate::codec::{decode, encode};
use crate::error::QueueError;
use crate::key::QueueKey;
use crate::reservation::Reservation;

/// One stage's entries plus its reservation sub-prefix.
pub struct Queue<T> {
    entries: sled::Tree,
    reservations: sled::Tree,
    per_process: bool,
    _value: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> Queue<T> {
    /// Wrap an already-open pair of trees. `per_process` selects whether [`Queue::push`] keys
    /// entries by content hash alone or by `ProcessID ‖ content-hash` (§6).
    #[must_use]
    pub const fn new(entries: sled::Tree, reservations: sled::Tree, per_process: bool) -> Self {
        Self { entries, reservations, per_process, _value: PhantomData }
    }

    /// Push a value with no process affinity. Unlocked: pushes never race a reservation.
    ///
    /// # Errors
    /// Returns [`QueueError::Io`] if the store write fails.
    pub fn push(&self, value: &T) -> Result<QueueKey, QueueError> {
        debug_assert!(!self.per_process, "per-process queues must use push_for_process");
        let encoded = encode(value)?;
        let key = QueueKey::content_only(&encoded);
        self.entries.insert(key.as_bytes(), encoded)?;
        Ok(key)
    }

    /// Push a value owned by `process_id`. Unlocked, for the same reason as [`Queue::push`].
    ///
    /// # Errors
    /// Returns [`QueueError::Io`] if the store write fails.
    pub fn push_for_process(&self, process_id: StateKey, value: &T) -> Result<QueueKey, QueueError> {
        debug_assert!(self.per_process, "non-per-process queues must use push");
        let encoded = encode(value)?;
        let key = QueueKey::for_process(process_id, &encoded);
        self.entries.insert(key.as_bytes(), encoded)?;
        Ok(key)
    }

    /// Reserve `key` iff it is not already reserved.
    ///
    /// # Errors
    /// Returns [`QueueError::KeyAlreadyExists`] if another reservation is already present, or
    /// [`QueueError::Io`] if the store access fails.
    pub fn reserve(&self, key: &QueueKey) -> Result<(), QueueError> {
        let record = encode(&Reservation::now())?;
        let outcome = self
            .reservations
            .compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(record))?;
        outcome.map_err(|_| QueueError::KeyAlreadyExists)
    }

    /// Iterate entries in store order, skipping reserved ones, within an optional process scope.
    /// Returns the first free entry found, already reserved.
    ///
    /// Callers outside this module must hold [`crate::Queues`]'s global mutex while calling this:
    /// scanning for a free entry and reserving it has to happen as one atomic step, or two
    /// workers can both choose the same entry before either reserves it.
    ///
    /// # Errors
    /// Returns [`QueueError::NoMoreElements`] if every entry in scope is reserved, or
    /// [`QueueError::Io`]/[`QueueError::Codec`] if the store or decode fails.
    pub fn next_locked(&self, process_id: Option<StateKey>) -> Result<(QueueKey, T), QueueError> {
        let iter = match process_id {
            Some(process_id) => self.entries.scan_prefix(process_id.as_bytes()),
            None => self.entries.iter(),
        };
        for item in iter {
            let (key_bytes, value_bytes) = item?;
            if self.reservations.contains_key(&key_bytes)? {
                continue;
            }
            let key = QueueKey::from_raw(key_bytes.to_vec());
            self.reserve(&key)?;
            return Ok((key, decode(&value_bytes)?));
        }
        Err(QueueError::NoMoreElements)
    }

    /// Reserve and return up to `limit` free entries for `process_id`, skipping past reserved
    /// ones. Unlike [`Queue::next_locked`], an empty result is not an error (§4.8: "an empty pull
    /// short-circuits with a warning, not an error").
    ///
    /// Callers must hold [`crate::Queues`]'s global mutex, for the same reason as
    /// [`Queue::next_locked`].
    ///
    /// # Errors
    /// Returns [`QueueError::Io`]/[`QueueError::Codec`] if the store or decode fails.
    pub fn pull_locked(&self, process_id: StateKey, limit: usize) -> Result<Vec<(QueueKey, T)>, QueueError> {
        let mut out = Vec::with_capacity(limit);
        for item in self.entries.scan_prefix(process_id.as_bytes()) {
            if out.len() >= limit {
                break;
            }
            let (key_bytes, value_bytes) = item?;
            if self.reservations.contains_key(&key_bytes)? {
                continue;
            }
            let key = QueueKey::from_raw(key_bytes.to_vec());
            self.reserve(&key)?;
            out.push((key, decode(&value_bytes)?));
        }
        Ok(out)
    }

    /// Count free (unreserved) entries for `process_id`, without reserving any of them.
    ///
    /// # Errors
    /// Returns [`QueueError::Io`] if the store access fails.
    pub fn count_free(&self, process_id: StateKey) -> Result<usize, QueueError> {
        let mut count = 0_usize;
        for item in self.entries.scan_prefix(process_id.as_bytes()) {
            let (key_bytes, _) = item?;
            if !self.reservations.contains_key(&key_bytes)? {
                count = count.saturating_add(1);
            }
        }
        Ok(count)
    }

    /// Delete both the entry and its reservation.
    ///
    /// # Errors
    /// Returns [`QueueError::Io`] if the store access fails.
    pub fn mark_done(&self, key: &QueueKey) -> Result<(), QueueError> {
        self.entries.remove(key.as_bytes())?;
        self.reservations.remove(key.as_bytes())?;
        Ok(())
    }

    /// Clear every reservation in this stage's sub-prefix — run once at startup (§4.8 crash
    /// recovery) and by the periodic stale-reservation sweeper.
    ///
    /// # Errors
    /// Returns [`QueueError::Io`] if the store access fails.
    pub fn clear_reservations(&self) -> Result<(), QueueError> {
        self.reservations.clear()?;
        Ok(())
    }

    /// Clear reservations older than `max_age`, leaving fresh ones untouched. Returns the number
    /// cleared.
    ///
    /// # Errors
    /// Returns [`QueueError::Io`]/[`QueueError::Codec`] if the store or decode fails.
    pub fn sweep_stale(&self, max_age: Duration) -> Result<usize, QueueError> {
        let mut cleared = 0_usize;
        for item in self.reservations.iter() {
            let (key_bytes, record_bytes) = item?;
            let record: Reservation = decode(&record_bytes)?;
            if record.is_stale(max_age) {
                self.reservations.remove(&key_bytes)?;
                cleared = cleared.saturating_add(1);
            }
        }
        Ok(cleared)
    }
}
