//! Sparse-Merkle-tree node content, addressed by its own hash (§4.2 `SMTHashLeaf`).

use ark_ff::Field;
use sequencer_core::Fr;
use sequencer_hash::smt_leaf;

/// The hash of the empty subtree, used as both the initial root and every unpopulated branch.
pub const EMPTY_HASH: Fr = Fr::ZERO;

/// A node in the tree, addressed by `hash()`. Leaves fold their entire remaining subtree depth
/// into a single hash — the tree never materializes a full 160-level path for a sparse set of
/// leaves, only the nodes actually branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    /// A populated leaf at some depth, standing in for the rest of its path to depth 160.
    Leaf {
        /// The leaf's full key, as a field element.
        key: Fr,
        /// The leaf's value.
        value: Fr,
    },
    /// An internal branch with two children, each either another node's hash or
    /// [`EMPTY_HASH`].
    Middle {
        /// Hash of the left child.
        left: Fr,
        /// Hash of the right child.
        right: Fr,
    },
}

impl Node {
    /// This node's content hash, its address in the store.
    #[must_use]
    pub fn hash(&self) -> Fr {
        match *self {
            Self::Leaf { key, value } => smt_leaf::leaf_hash(key, value),
            Self::Middle { left, right } => smt_leaf::node_hash(left, right),
        }
    }
}
