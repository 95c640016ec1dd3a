//! Storage backends for the sparse Merkle tree (§4.3 ambient: `SmtStore`).
//!
//! Mirrors the durability split the pipeline's reservation queue (C8) uses: an in-memory
//! implementation for tests, a `sled`-backed one for the node binary.

use std::collections::BTreeMap;

use ark_ff::{BigInteger, PrimeField};
use sequencer_core::Fr;

use crate::node::Node;

/// Backing storage for tree nodes, addressed by content hash.
///
/// Nodes are never mutated once written: the same content always hashes to the same key, so
/// inserting an already-present node is a harmless no-op. Implementations need not support
/// deletion.
pub trait SmtStore {
    /// The error an implementation's I/O can fail with.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Look up a node by its content hash.
    ///
    /// # Errors
    /// Returns `Self::Error` if the underlying storage access fails.
    fn get_node(&self, hash: Fr) -> Result<Option<Node>, Self::Error>;

    /// Persist a node, returning its content hash.
    ///
    /// # Errors
    /// Returns `Self::Error` if the underlying storage access fails.
    fn put_node(&mut self, node: Node) -> Result<Fr, Self::Error>;
}

fn field_key_bytes(hash: Fr) -> [u8; 32] {
    let raw = hash.into_bigint().to_bytes_be();
    let mut out = [0_u8; 32];
    let offset = 32_usize.saturating_sub(raw.len());
    #[allow(
        clippy::indexing_slicing,
        reason = "offset is derived from the 32-byte output width just above"
    )]
    {
        out[offset..].copy_from_slice(&raw);
    }
    out
}

fn encode_node(node: Node) -> Vec<u8> {
    match node {
        Node::Leaf { key, value } => {
            let mut out = vec![0_u8];
            out.extend_from_slice(&field_key_bytes(key));
            out.extend_from_slice(&field_key_bytes(value));
            out
        }
        Node::Middle { left, right } => {
            let mut out = vec![1_u8];
            out.extend_from_slice(&field_key_bytes(left));
            out.extend_from_slice(&field_key_bytes(right));
            out
        }
    }
}

#[allow(
    clippy::indexing_slicing,
    reason = "length is checked against the fixed tag+32+32 encoding just above"
)]
fn decode_node(bytes: &[u8]) -> Option<Node> {
    if bytes.len() != 65 {
        return None;
    }
    let tag = bytes[0];
    let a = Fr::from_be_bytes_mod_order(&bytes[1..33]);
    let b = Fr::from_be_bytes_mod_order(&bytes[33..65]);
    match tag {
        0 => Some(Node::Leaf { key: a, value: b }),
        1 => Some(Node::Middle { left: a, right: b }),
        _ => None,
    }
}

/// An in-memory node store, for tests and short-lived processes.
#[derive(Debug, Default, Clone)]
pub struct MemorySmtStore {
    nodes: BTreeMap<[u8; 32], Node>,
}

impl MemorySmtStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SmtStore for MemorySmtStore {
    type Error = std::convert::Infallible;

    fn get_node(&self, hash: Fr) -> Result<Option<Node>, Self::Error> {
        Ok(self.nodes.get(&field_key_bytes(hash)).copied())
    }

    fn put_node(&mut self, node: Node) -> Result<Fr, Self::Error> {
        let hash = node.hash();
        self.nodes.entry(field_key_bytes(hash)).or_insert(node);
        Ok(hash)
    }
}

/// A `sled`-backed node store, for the node binary's durable state.
#[derive(Debug, Clone)]
pub struct SledSmtStore {
    tree: sled::Tree,
}

impl SledSmtStore {
    /// Wrap an already-open `sled` tree.
    #[must_use]
    pub const fn new(tree: sled::Tree) -> Self {
        Self { tree }
    }
}

impl SmtStore for SledSmtStore {
    type Error = sled::Error;

    fn get_node(&self, hash: Fr) -> Result<Option<Node>, Self::Error> {
        let bytes = self.tree.get(field_key_bytes(hash))?;
        Ok(bytes.and_then(|ivec| decode_node(&ivec)))
    }

    fn put_node(&mut self, node: Node) -> Result<Fr, Self::Error> {
        let hash = node.hash();
        let key = field_key_bytes(hash);
        if self.tree.get(key)?.is_none() {
            self.tree.insert(key, encode_node(node))?;
        }
        Ok(hash)
    }
}
