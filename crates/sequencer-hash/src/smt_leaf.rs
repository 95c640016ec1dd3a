//! Sparse-Merkle-tree leaf hashing (§4.2, `SMTHashLeaf`).
//!
//! Packs a leaf's identity the same way on- and off-circuit: Poseidon of `(1, key, value)`, the
//! leading constant giving leaf nodes domain separation from internal nodes, which hash two
//! children with no leading constant (mirrors the domain-separated-level convention in
//! `zair-nonmembership`'s non-membership tree, adapted from tree depth to a fixed tag).
use sequencer_core::Fr;

use crate::poseidon;

/// Tags a leaf hash, distinguishing it from an internal-node hash of two children.
const LEAF_DOMAIN_TAG: u64 = 1;

/// Hash a single sparse-Merkle-tree leaf from its key and value.
#[must_use]
pub fn leaf_hash(key: Fr, value: Fr) -> Fr {
    poseidon::hash(&[Fr::from(LEAF_DOMAIN_TAG), key, value])
}

/// Hash an internal sparse-Merkle-tree node from its two children.
#[must_use]
pub fn node_hash(left: Fr, right: Fr) -> Fr {
    poseidon::hash(&[left, right])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_and_node_hashes_never_collide_trivially() {
        let key = Fr::from(1_u64);
        let value = Fr::from(2_u64);
        assert_ne!(leaf_hash(key, value), node_hash(key, value));
    }

    #[test]
    fn leaf_hash_is_sensitive_to_value() {
        let key = Fr::from(1_u64);
        assert_ne!(leaf_hash(key, Fr::from(2_u64)), leaf_hash(key, Fr::from(3_u64)));
    }
}
