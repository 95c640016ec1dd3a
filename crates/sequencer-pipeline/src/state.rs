//! Restart-surviving per-process engine registry (§4.3, §5, §9).
//!
//! `SmtStore` only persists tree nodes, addressed by their own Poseidon hash; nothing in
//! `sequencer-state` remembers which root a process's tree currently sits at — that's left to
//! whoever reopens the tree. This module is the side table that does: one `sled::Tree` mapping
//! `ProcessID -> current root`, read at startup to reopen a process's `Engine` wherever the last
//! completed batch left it, and written back every time the state-transition worker (the only
//! writer, §5) closes a batch. Tree nodes are content-addressed and shared across every process
//! in one `sled::Tree`, the same way any content-addressed store shares storage across callers.

use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

use sequencer_core::schema::Process;
use sequencer_core::{Fr, StateKey};
use sequencer_state::node::EMPTY_HASH;
use sequencer_state::{Engine, SledSmtStore, SparseMerkleTree};

use crate::error::WorkerError;

/// Owns the node store and the per-process root table behind every `Engine<SledSmtStore>` the
/// state-transition worker opens.
pub struct EngineStore {
    roots: sled::Tree,
    nodes: sled::Tree,
}

impl EngineStore {
    /// Open the registry's two `sled` trees over an already-open database.
    ///
    /// # Errors
    /// Returns [`sled::Error`] if either tree fails to open.
    pub fn open(db: &sled::Db) -> Result<Self, sled::Error> {
        Ok(Self {
            roots: db.open_tree("roots")?,
            nodes: db.open_tree("nodes")?,
        })
    }

    fn persisted_root(&self, process_id: StateKey) -> Result<Fr, WorkerError> {
        match self.roots.get(process_id.as_bytes())? {
            Some(bytes) => Fr::deserialize_compressed(bytes.as_ref())
                .map_err(|err| WorkerError::Malformed(format!("corrupt persisted root for {process_id}: {err}"))),
            None => Ok(EMPTY_HASH),
        }
    }

    /// Persist `root` as `process_id`'s current root, to be picked up on the next
    /// [`Self::engine_for`] call (a restart, or another worker).
    ///
    /// # Errors
    /// Returns [`WorkerError::Sled`] if the write fails.
    pub fn save_root(&self, process_id: StateKey, root: Fr) -> Result<(), WorkerError> {
        let mut bytes = Vec::new();
        root.serialize_compressed(&mut bytes)
            .unwrap_or_else(|err| unreachable!("a field element always serializes: {err}"));
        self.roots.insert(process_id.as_bytes(), bytes)?;
        Ok(())
    }

    /// Reopen `process`'s engine at its last persisted root. A never-before-seen process (no
    /// persisted root, i.e. still at [`EMPTY_HASH`]) gets its header registered as the tree's
    /// first write, mirroring `Engine::register_process`'s own "once per tree" contract.
    ///
    /// # Errors
    /// Returns [`WorkerError::Sled`] if the root lookup fails, or [`WorkerError::State`] if
    /// registering a fresh process's header fails.
    pub fn engine_for(&self, process: &Process) -> Result<Engine<SledSmtStore>, WorkerError> {
        let root = self.persisted_root(process.id)?;
        let store = SledSmtStore::new(self.nodes.clone());
        let mut engine = Engine::new(SparseMerkleTree::new(root, store));
        if root == EMPTY_HASH {
            engine.register_process(process)?;
        }
        Ok(engine)
    }
}
