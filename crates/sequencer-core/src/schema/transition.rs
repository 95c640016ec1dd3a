//! Sparse-Merkle-tree transition witnesses (§4.3, §4.10).

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::base::HexField;
use crate::Fr;

/// The function tag attached to a single sparse-Merkle-tree transition step, encoded on the
/// wire (and inside circuits) as the `(Fnc0, Fnc1)` bit pair fixed by §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fnc {
    /// No change to the tree; old and new roots are identical.
    Noop,
    /// An existing leaf's value changes, its key unchanged.
    Update,
    /// A new leaf is created at a previously empty key.
    Insert,
    /// An existing leaf is removed.
    Delete,
}

impl Fnc {
    /// The `(Fnc0, Fnc1)` bit pair this tag is encoded as.
    #[must_use]
    pub const fn bits(self) -> (bool, bool) {
        match self {
            Self::Noop => (false, false),
            Self::Update => (true, false),
            Self::Insert => (false, true),
            Self::Delete => (true, true),
        }
    }

    /// Recover a tag from its `(Fnc0, Fnc1)` bit pair.
    #[must_use]
    pub const fn from_bits(fnc0: bool, fnc1: bool) -> Self {
        match (fnc0, fnc1) {
            (false, false) => Self::Noop,
            (true, false) => Self::Update,
            (false, true) => Self::Insert,
            (true, true) => Self::Delete,
        }
    }
}

/// A single sparse-Merkle-tree transition: the witness needed to recompute `NewRoot` from
/// `OldRoot` inside a circuit, or to replay it outside one.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Root before this step.
    #[serde_as(as = "HexField")]
    pub old_root: Fr,
    /// Key touched by this step.
    #[serde_as(as = "HexField")]
    pub old_key: Fr,
    /// Leaf value before this step (zero for `Insert`).
    #[serde_as(as = "HexField")]
    pub old_value: Fr,
    /// Root after this step.
    #[serde_as(as = "HexField")]
    pub new_root: Fr,
    /// Key this step writes to (equal to `old_key` for `Update`/`Delete`).
    #[serde_as(as = "HexField")]
    pub new_key: Fr,
    /// Leaf value after this step (zero for `Delete`).
    #[serde_as(as = "HexField")]
    pub new_value: Fr,
    /// Sibling hashes from the *new* leaf's position up to the root, bottom-up. For most steps
    /// this is also where the old leaf sat; the exception is an `Insert` that displaces a
    /// pre-existing leaf one or more levels shallower (see [`Self::old_leaf_level`]).
    #[serde_as(as = "Vec<HexField>")]
    pub siblings: Vec<Fr>,
    /// Number of sibling levels the *old* leaf's climb actually uses, counted from the root
    /// (i.e. `siblings[..old_leaf_level]`). Equal to `siblings.len()` for every step except an
    /// `Insert` that pushes a colliding leaf down past its original depth: there, the old leaf
    /// was a single `Node::Leaf` standing in for its whole subtree at the shallower depth where
    /// the two keys' bits first diverged, so its climb only passes through the shared prefix of
    /// `siblings`, not the deeper padding added to reach the new leaf's position.
    pub old_leaf_level: usize,
    /// Whether the old leaf is itself an empty subtree (a genuinely empty `Insert` destination);
    /// `false` whenever a real leaf — including one displaced by a collision push-down — sat at
    /// `old_leaf_level`.
    pub is_old0: bool,
    /// The function this step performs.
    pub fnc: Fnc,
}
