//! Registry of registered processes, backed by the `p/` prefix of the state `sled::Db` (§6, §9).
//!
//! The tally tree only ever stores Poseidon digests of a process's header fields (§4.3), so the
//! worker loops need this side table to recover the raw `Process` (census root, ballot mode,
//! encryption key) a submitted vote or batch is checked against. Processes are registered or
//! unregistered at runtime; removing one only drops the registry entry, never the state tree or
//! any ballots already queued for it (§9 "Process registry").

use sequencer_core::schema::Process;
use sequencer_core::StateKey;

use crate::error::ArtifactError;

/// An in-process, `sled`-persisted map of `ProcessID -> Process`.
#[derive(Clone)]
pub struct ProcessRegistry {
    tree: sled::Tree,
}

impl ProcessRegistry {
    /// Open the registry over an already-open `sled::Tree`.
    #[must_use]
    pub const fn new(tree: sled::Tree) -> Self {
        Self { tree }
    }

    /// Register (or replace) a process.
    ///
    /// # Errors
    /// Returns [`sled::Error`] if the write fails.
    pub fn register(&self, process: &Process) -> Result<(), sled::Error> {
        let mut bytes = Vec::new();
        ciborium::into_writer(process, &mut bytes).unwrap_or_else(|err| {
            unreachable!("Process is plain serde data and always encodes: {err}")
        });
        self.tree.insert(process.id.as_bytes(), bytes)?;
        Ok(())
    }

    /// Drop a process from the registry. Idempotent: absent keys are not an error.
    ///
    /// # Errors
    /// Returns [`sled::Error`] if the write fails.
    pub fn unregister(&self, process_id: StateKey) -> Result<(), sled::Error> {
        self.tree.remove(process_id.as_bytes())?;
        Ok(())
    }

    /// Look up a registered process.
    ///
    /// # Errors
    /// Returns [`sled::Error`] if the read fails.
    pub fn get(&self, process_id: StateKey) -> Result<Option<Process>, sled::Error> {
        let Some(bytes) = self.tree.get(process_id.as_bytes())? else {
            return Ok(None);
        };
        Ok(ciborium::from_reader(bytes.as_ref()).ok())
    }

    /// Every currently registered process ID.
    ///
    /// # Errors
    /// Returns [`sled::Error`] if iteration fails.
    pub fn process_ids(&self) -> Result<Vec<StateKey>, sled::Error> {
        let mut out = Vec::new();
        for entry in self.tree.iter() {
            let (key, _) = entry?;
            if let Ok(process_id) = StateKey::from_slice(&key) {
                out.push(process_id);
            }
        }
        Ok(out)
    }
}

/// Look up a registered process, reporting an absent one through the same `ArtifactError`-style
/// "not found" shape workers already propagate (kept free of a `sled` dependency at the call
/// site).
///
/// # Errors
/// Returns [`ArtifactError::NotFound`] if no process is registered for `process_id`.
pub fn require(registry: &ProcessRegistry, process_id: StateKey) -> Result<Process, ArtifactError> {
    registry
        .get(process_id)
        .ok()
        .flatten()
        .ok_or_else(|| ArtifactError::NotFound(process_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer_core::schema::{BallotMode, CostExponent, EncryptionKeyCoords};
    use sequencer_core::Fr;

    fn sample_process(tag: u8) -> Process {
        Process {
            id: StateKey::from_slice(&[tag]).expect("within width"),
            census_root: Fr::from(u64::from(tag)),
            ballot_mode: BallotMode {
                max_count: 1,
                force_uniqueness: false,
                max_value: 9,
                min_value: 0,
                max_total_cost: 9,
                min_total_cost: 0,
                cost_exp: Some(CostExponent::Linear),
                cost_from_weight: false,
            },
            encryption_key: EncryptionKeyCoords { x: Fr::from(1_u64), y: Fr::from(2_u64) },
        }
    }

    fn open_registry() -> (tempfile::TempDir, ProcessRegistry) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = sled::open(dir.path()).expect("open sled db");
        let tree = db.open_tree("p").expect("open tree");
        (dir, ProcessRegistry::new(tree))
    }

    #[test]
    fn registered_process_round_trips() {
        let (_dir, registry) = open_registry();
        let process = sample_process(7);
        registry.register(&process).expect("register");
        assert_eq!(registry.get(process.id).expect("get"), Some(process));
    }

    #[test]
    fn unregistering_drops_the_entry() {
        let (_dir, registry) = open_registry();
        let process = sample_process(9);
        registry.register(&process).expect("register");
        registry.unregister(process.id).expect("unregister");
        assert_eq!(registry.get(process.id).expect("get"), None);
    }

    #[test]
    fn require_reports_an_unknown_process() {
        let (_dir, registry) = open_registry();
        let err = require(&registry, StateKey::from_slice(&[1]).expect("within width")).unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }

    #[test]
    fn process_ids_lists_every_registered_process() {
        let (_dir, registry) = open_registry();
        registry.register(&sample_process(1)).expect("register 1");
        registry.register(&sample_process(2)).expect("register 2");
        let mut ids = registry.process_ids().expect("process ids");
        ids.sort();
        let mut expected = vec![
            StateKey::from_slice(&[1]).expect("within width"),
            StateKey::from_slice(&[2]).expect("within width"),
        ];
        expected.sort();
        assert_eq!(ids, expected);
    }
}
