//! Sparse Merkle tree over a [`SmtStore`], fixed at [`STATE_PROOF_MAX_LEVELS`] depth (§4.3).
//!
//! Nodes are content-addressed (§4.2 `SMTHashLeaf`): a [`Node::Leaf`] stands in for its entire
//! remaining subtree, so the tree only ever materializes the branches that actually split. A
//! descent walks key bits from the root, most significant first, collecting the sibling hash at
//! each level it passes through.

use ark_ff::{BigInteger, PrimeField};
use sequencer_core::constants::STATE_PROOF_MAX_LEVELS;
use sequencer_core::schema::{Fnc, Transition};
use sequencer_core::{Fr, StateKey};

use crate::error::StateError;
use crate::node::{Node, EMPTY_HASH};
use crate::store::SmtStore;

/// A sparse Merkle tree over a key-value leaf set, backed by a content-addressed node store.
#[derive(Debug, Clone)]
pub struct SparseMerkleTree<S> {
    root: Fr,
    store: S,
}

/// The outcome of a descent: the path taken and, if it terminated at a leaf, that leaf's contents.
struct Descent {
    /// Sibling hash at each level visited, root-first.
    siblings: Vec<Fr>,
    /// The leaf found at the end of the path, if any.
    leaf: Option<(Fr, Fr)>,
}

pub(crate) fn key_to_field(key: StateKey) -> Fr {
    Fr::from_be_bytes_mod_order(key.as_ref())
}

/// Most-significant-first bits of `key`'s fixed-width representation, one per tree level.
pub(crate) fn key_bits(key: StateKey) -> Vec<bool> {
    let mut bits = Vec::with_capacity(STATE_PROOF_MAX_LEVELS);
    for byte in key.as_ref() {
        for shift in (0..8).rev() {
            bits.push((byte >> shift) & 1 == 1);
        }
    }
    bits
}

/// True if `bit` routes to the right child.
pub(crate) const fn goes_right(bit: bool) -> bool {
    bit
}

/// A sibling path proving a single leaf's membership, independent of any live tree or store —
/// the form the state-transition circuit (C7) witnesses to check header inclusion under
/// `RootHashBefore` (§4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipProof {
    /// The leaf's value.
    pub value: Fr,
    /// Sibling hashes from the leaf up to the root, root-first (mirrors [`Transition::siblings`](sequencer_core::schema::Transition::siblings)).
    pub siblings: Vec<Fr>,
}

impl MembershipProof {
    /// Recompute the root this proof climbs to for `key` and compare it against `root`.
    #[must_use]
    pub fn verify(&self, root: Fr, key: StateKey) -> bool {
        let field_key = key_to_field(key);
        let bits = key_bits(key);
        if self.siblings.len() > bits.len() {
            return false;
        }
        let leaf_hash = crate::node::Node::Leaf { key: field_key, value: self.value }.hash();
        let mut current = leaf_hash;
        for (bit, sibling) in bits[..self.siblings.len()].iter().zip(self.siblings.iter()).rev() {
            current = if goes_right(*bit) {
                crate::node::Node::Middle { left: *sibling, right: current }.hash()
            } else {
                crate::node::Node::Middle { left: current, right: *sibling }.hash()
            };
        }
        current == root
    }
}

impl<S: SmtStore> SparseMerkleTree<S> {
    /// Open a tree at the given root (use [`EMPTY_HASH`] for a fresh tree).
    pub const fn new(root: Fr, store: S) -> Self {
        Self { root, store }
    }

    /// The current root hash.
    #[must_use]
    pub const fn root(&self) -> Fr {
        self.root
    }

    fn get_node(&self, hash: Fr) -> Result<Option<Node>, StateError> {
        if hash == EMPTY_HASH {
            return Ok(None);
        }
        self.store
            .get_node(hash)
            .map_err(|err| StateError::Store(err.to_string()))
    }

    fn put_node(&mut self, node: Node) -> Result<Fr, StateError> {
        self.store
            .put_node(node)
            .map_err(|err| StateError::Store(err.to_string()))
    }

    /// Walk from the root along `bits`, stopping at the first leaf or empty slot.
    ///
    /// `siblings[i]` is the hash of the sibling at level `i` (root-first); its length is the
    /// number of levels actually descended, which is at most [`STATE_PROOF_MAX_LEVELS`].
    fn descend(&self, bits: &[bool]) -> Result<Descent, StateError> {
        let mut siblings = Vec::new();
        let mut current = self.root;
        for &bit in bits {
            match self.get_node(current)? {
                None => return Ok(Descent { siblings, leaf: None }),
                Some(Node::Leaf { key, value }) => {
                    return Ok(Descent {
                        siblings,
                        leaf: Some((key, value)),
                    })
                }
                Some(Node::Middle { left, right }) => {
                    let (next, sibling) = if goes_right(bit) { (right, left) } else { (left, right) };
                    siblings.push(sibling);
                    current = next;
                }
            }
        }
        Err(StateError::TreeFull)
    }

    /// Look up the value stored at `key`, if any.
    ///
    /// # Errors
    /// Returns [`StateError`] if the backing store fails.
    pub fn get(&self, key: StateKey) -> Result<Option<Fr>, StateError> {
        let field_key = key_to_field(key);
        let bits = key_bits(key);
        match self.descend(&bits)?.leaf {
            Some((leaf_key, value)) if leaf_key == field_key => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// Produce a membership proof for `key`'s current leaf, for a caller (the state-transition
    /// circuit's witness) to verify against a root it independently holds.
    ///
    /// # Errors
    /// Returns [`StateError::MissingNode`] if `key` has no leaf, or a store error.
    pub fn prove(&self, key: StateKey) -> Result<MembershipProof, StateError> {
        let field_key = key_to_field(key);
        let bits = key_bits(key);
        let descent = self.descend(&bits)?;
        match descent.leaf {
            Some((leaf_key, value)) if leaf_key == field_key => Ok(MembershipProof {
                value,
                siblings: descent.siblings,
            }),
            _ => Err(StateError::MissingNode),
        }
    }

    /// Recompute a root by replaying a path from a leaf back up through its siblings.
    ///
    /// `bits` and `siblings` are root-first and must be the same length; `siblings[i]` is the
    /// sibling recorded at the level `bits[i]` routed through.
    fn rebuild_root(
        &mut self,
        bits: &[bool],
        siblings: &[Fr],
        leaf_hash: Fr,
    ) -> Result<Fr, StateError> {
        let mut current = leaf_hash;
        for (bit, sibling) in bits.iter().zip(siblings.iter()).rev() {
            let node = if goes_right(*bit) {
                Node::Middle {
                    left: *sibling,
                    right: current,
                }
            } else {
                Node::Middle {
                    left: current,
                    right: *sibling,
                }
            };
            current = self.put_node(node)?;
        }
        Ok(current)
    }

    /// Insert a new leaf at `key`.
    ///
    /// # Errors
    /// Returns [`StateError::KeyAlreadyExists`] if `key` already has a leaf, or a store error.
    pub fn insert(&mut self, key: StateKey, value: Fr) -> Result<Transition, StateError> {
        let field_key = key_to_field(key);
        let bits = key_bits(key);
        let descent = self.descend(&bits)?;

        let transition = match descent.leaf {
            Some((existing_key, _)) if existing_key == field_key => {
                return Err(StateError::KeyAlreadyExists(key))
            }
            Some((other_key, other_value)) => {
                self.insert_with_collision(&bits, &descent.siblings, field_key, value, other_key, other_value)?
            }
            None => self.insert_into_empty(&bits, &descent.siblings, field_key, value)?,
        };
        self.root = transition.new_root;
        Ok(transition)
    }

    fn insert_into_empty(
        &mut self,
        bits: &[bool],
        siblings: &[Fr],
        field_key: Fr,
        value: Fr,
    ) -> Result<Transition, StateError> {
        let old_root = self.root;
        let leaf_hash = self.put_node(Node::Leaf { key: field_key, value })?;
        let new_root = self.rebuild_root(&bits[..siblings.len()], siblings, leaf_hash)?;
        Ok(Transition {
            old_root,
            old_key: field_key,
            old_value: EMPTY_HASH,
            new_root,
            new_key: field_key,
            new_value: value,
            siblings: siblings.to_vec(),
            old_leaf_level: siblings.len(),
            is_old0: true,
            fnc: Fnc::Insert,
        })
    }

    /// Push both the existing and the new leaf one level further down until their key bits
    /// diverge, inserting empty-sibling branches along the shared prefix.
    #[allow(
        clippy::too_many_arguments,
        reason = "collision resolution needs both leaves' full identity to branch them apart"
    )]
    fn insert_with_collision(
        &mut self,
        bits: &[bool],
        shared_siblings: &[Fr],
        field_key: Fr,
        value: Fr,
        other_key: Fr,
        other_value: Fr,
    ) -> Result<Transition, StateError> {
        let old_root = self.root;
        let depth = shared_siblings.len();
        let other_bits = field_bits(other_key);

        let mut extra_siblings = Vec::new();
        let mut level = depth;
        while level < bits.len() && other_bits.get(level) == bits.get(level) {
            extra_siblings.push(EMPTY_HASH);
            level = level.saturating_add(1);
        }
        if level >= bits.len() {
            return Err(StateError::TreeFull);
        }

        let new_leaf_hash = self.put_node(Node::Leaf { key: field_key, value })?;
        let other_leaf_hash = self.put_node(Node::Leaf {
            key: other_key,
            value: other_value,
        })?;
        let new_bit = *bits.get(level).ok_or(StateError::TreeFull)?;
        let branch = if goes_right(new_bit) {
            Node::Middle {
                left: other_leaf_hash,
                right: new_leaf_hash,
            }
        } else {
            Node::Middle {
                left: new_leaf_hash,
                right: other_leaf_hash,
            }
        };
        let branch_hash = self.put_node(branch)?;

        let mut full_siblings = shared_siblings.to_vec();
        full_siblings.extend(extra_siblings);
        let new_root = self.rebuild_root(&bits[..full_siblings.len()], &full_siblings, branch_hash)?;

        // The displaced leaf lived at `depth`, standing in for its whole remaining subtree
        // (tree.rs:3-4); its climb to `old_root` only ever passed through `shared_siblings`,
        // the prefix of `full_siblings` laid down before the two keys' bits diverged.
        Ok(Transition {
            old_root,
            old_key: other_key,
            old_value: other_value,
            new_root,
            new_key: field_key,
            new_value: value,
            siblings: full_siblings,
            old_leaf_level: depth,
            is_old0: false,
            fnc: Fnc::Insert,
        })
    }

    /// Overwrite the value at an existing leaf.
    ///
    /// # Errors
    /// Returns [`StateError::MissingNode`] if `key` has no leaf, or a store error.
    pub fn update(&mut self, key: StateKey, new_value: Fr) -> Result<Transition, StateError> {
        let field_key = key_to_field(key);
        let bits = key_bits(key);
        let descent = self.descend(&bits)?;
        let Some((leaf_key, old_value)) = descent.leaf else {
            return Err(StateError::MissingNode);
        };
        if leaf_key != field_key {
            return Err(StateError::MissingNode);
        }

        let old_root = self.root;
        let leaf_hash = self.put_node(Node::Leaf {
            key: field_key,
            value: new_value,
        })?;
        let old_leaf_level = descent.siblings.len();
        let new_root = self.rebuild_root(&bits[..descent.siblings.len()], &descent.siblings, leaf_hash)?;

        Ok(Transition {
            old_root,
            old_key: field_key,
            old_value,
            new_root,
            new_key: field_key,
            new_value,
            siblings: descent.siblings,
            old_leaf_level,
            is_old0: false,
            fnc: Fnc::Update,
        })
    }

    /// Remove the leaf at `key`, collapsing its sibling branch to empty.
    ///
    /// This is a simplified delete: it does not re-collapse a now-single-child sibling subtree
    /// back into its parent (no path compaction), unlike a full iden3-style SMT. The sequencer
    /// never exercises delete outside of tests, since every reserved and per-vote key is only
    /// ever inserted or updated.
    ///
    /// # Errors
    /// Returns [`StateError::MissingNode`] if `key` has no leaf, or a store error.
    pub fn delete(&mut self, key: StateKey) -> Result<Transition, StateError> {
        let field_key = key_to_field(key);
        let bits = key_bits(key);
        let descent = self.descend(&bits)?;
        let Some((leaf_key, old_value)) = descent.leaf else {
            return Err(StateError::MissingNode);
        };
        if leaf_key != field_key {
            return Err(StateError::MissingNode);
        }

        let old_root = self.root;
        let old_leaf_level = descent.siblings.len();
        let new_root = self.rebuild_root(&bits[..descent.siblings.len()], &descent.siblings, EMPTY_HASH)?;

        Ok(Transition {
            old_root,
            old_key: field_key,
            old_value,
            new_root,
            new_key: field_key,
            new_value: EMPTY_HASH,
            siblings: descent.siblings,
            old_leaf_level,
            is_old0: false,
            fnc: Fnc::Delete,
        })
    }
}

/// Bits of `value`'s low [`STATE_PROOF_MAX_LEVELS`] bits, framed identically to [`key_bits`] so
/// the two can be compared level-by-level. Every key this tree stores was produced by
/// [`key_to_field`] from a [`StateKey`], so it always fits in that width.
pub(crate) fn field_bits(value: Fr) -> Vec<bool> {
    let key_bytes = STATE_PROOF_MAX_LEVELS.saturating_div(8);
    let raw = value.into_bigint().to_bytes_be();
    let start = raw.len().saturating_sub(key_bytes);
    #[allow(
        clippy::indexing_slicing,
        reason = "start is derived from raw's own length just above"
    )]
    let low_bytes = &raw[start..];
    let mut padded = vec![0_u8; key_bytes.saturating_sub(low_bytes.len())];
    padded.extend_from_slice(low_bytes);
    let mut bits = Vec::with_capacity(STATE_PROOF_MAX_LEVELS);
    for byte in &padded {
        for shift in (0..8).rev() {
            bits.push((byte >> shift) & 1 == 1);
        }
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySmtStore;

    fn key(tag: u8) -> StateKey {
        let mut bytes = [0_u8; 20];
        *bytes.last_mut().expect("nonempty") = tag;
        StateKey::new(bytes)
    }

    #[test]
    fn insert_then_get_round_trips() {
        let mut tree = SparseMerkleTree::new(EMPTY_HASH, MemorySmtStore::new());
        let transition = tree.insert(key(1), Fr::from(42_u64)).expect("insert");
        assert_eq!(transition.fnc, Fnc::Insert);
        assert_eq!(tree.get(key(1)).expect("get"), Some(Fr::from(42_u64)));
    }

    #[test]
    fn insert_duplicate_key_fails() {
        let mut tree = SparseMerkleTree::new(EMPTY_HASH, MemorySmtStore::new());
        tree.insert(key(1), Fr::from(1_u64)).expect("first insert");
        let err = tree.insert(key(1), Fr::from(2_u64)).unwrap_err();
        assert!(matches!(err, StateError::KeyAlreadyExists(_)));
    }

    #[test]
    fn two_keys_coexist_after_collision_push_down() {
        let mut tree = SparseMerkleTree::new(EMPTY_HASH, MemorySmtStore::new());
        let first = tree.insert(key(1), Fr::from(10_u64)).expect("first insert");
        let root_after_first = tree.root();
        let second = tree.insert(key(2), Fr::from(20_u64)).expect("second insert");
        assert_eq!(tree.get(key(1)).expect("get"), Some(Fr::from(10_u64)));
        assert_eq!(tree.get(key(2)).expect("get"), Some(Fr::from(20_u64)));

        assert!(crate::replay::verify_transition(EMPTY_HASH, &first));
        assert!(crate::replay::verify_transition(root_after_first, &second));
    }

    #[test]
    fn update_changes_value_and_root() {
        let mut tree = SparseMerkleTree::new(EMPTY_HASH, MemorySmtStore::new());
        tree.insert(key(1), Fr::from(1_u64)).expect("insert");
        let root_after_insert = tree.root();
        let transition = tree.update(key(1), Fr::from(2_u64)).expect("update");
        assert_eq!(transition.old_value, Fr::from(1_u64));
        assert_eq!(transition.new_value, Fr::from(2_u64));
        assert_ne!(tree.root(), root_after_insert);
        assert_eq!(tree.get(key(1)).expect("get"), Some(Fr::from(2_u64)));
    }

    #[test]
    fn update_missing_key_fails() {
        let mut tree = SparseMerkleTree::new(EMPTY_HASH, MemorySmtStore::new());
        let err = tree.update(key(1), Fr::from(1_u64)).unwrap_err();
        assert!(matches!(err, StateError::MissingNode));
    }

    #[test]
    fn delete_removes_leaf() {
        let mut tree = SparseMerkleTree::new(EMPTY_HASH, MemorySmtStore::new());
        tree.insert(key(1), Fr::from(5_u64)).expect("insert");
        tree.delete(key(1)).expect("delete");
        assert_eq!(tree.get(key(1)).expect("get"), None);
    }

    #[test]
    fn fresh_tree_root_is_empty_hash() {
        let tree = SparseMerkleTree::new(EMPTY_HASH, MemorySmtStore::new());
        assert_eq!(tree.root(), EMPTY_HASH);
        assert_eq!(tree.get(key(1)).expect("get"), None);
    }
}
