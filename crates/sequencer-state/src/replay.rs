//! Store-independent replay of a single [`Transition`], the form the state-transition circuit
//! (C7) needs: checking a transition's leaf-hash chain without a live tree behind it (§4.7
//! "leaf-hash consistency").
//!
//! `Update` and `Delete` keep `old_key == new_key` (the same leaf's value changes in place). An
//! `Insert` that lands on genuinely empty space does too, by convention. The one exception is an
//! `Insert` that collides with an existing leaf: the old side of the chain is a *different* leaf
//! (the one the insert displaces, pushed one or more levels deeper), climbing through only the
//! shared prefix of [`Transition::siblings`] given by [`Transition::old_leaf_level`], while the
//! new side climbs the full array. A transition's own fields are enough to recompute both sides
//! of its chain without a live tree.

use sequencer_core::schema::{Fnc, Transition};
use sequencer_core::Fr;

use crate::node::{Node, EMPTY_HASH};
use crate::tree::{field_bits, goes_right};

/// Climb from `leaf_or_empty` through `siblings` (bottom-up) along `bits` (root-first, same
/// length as `siblings`), mirroring [`crate::tree::SparseMerkleTree`]'s own rebuild.
fn climb(bits: &[bool], siblings: &[Fr], leaf_or_empty: Fr) -> Fr {
    let mut current = leaf_or_empty;
    for (bit, sibling) in bits.iter().zip(siblings.iter()).rev() {
        current = if goes_right(*bit) {
            Node::Middle { left: *sibling, right: current }.hash()
        } else {
            Node::Middle { left: current, right: *sibling }.hash()
        };
    }
    current
}

/// Verify that `transition` is internally consistent and actually starts at `expected_old_root`
/// (§4.7: re-chaining transitions from `RootHashBefore`).
///
/// A `Noop` transition skips the leaf-hash chain entirely (it reads and writes nothing) and only
/// needs `old_root == new_root == expected_old_root`, matching the padding transitions
/// [`crate::engine::Engine::end_batch`] emits and the spec's own exemption for NOOPs.
#[must_use]
pub fn verify_transition(expected_old_root: Fr, transition: &Transition) -> bool {
    if transition.fnc == Fnc::Noop {
        return transition.old_root == expected_old_root && transition.old_root == transition.new_root;
    }
    if transition.old_root != expected_old_root {
        return false;
    }
    // A collision `Insert` displaces a different leaf than the one it writes; every other step
    // rewrites a single leaf in place and must keep the same key on both sides of the chain.
    let is_collision_insert = transition.fnc == Fnc::Insert && !transition.is_old0;
    if !is_collision_insert && transition.old_key != transition.new_key {
        return false;
    }
    if transition.old_leaf_level > transition.siblings.len() {
        return false;
    }

    let bits = field_bits(transition.new_key);
    if transition.siblings.len() > bits.len() {
        return false;
    }
    let new_bits = &bits[..transition.siblings.len()];
    let old_bits = &bits[..transition.old_leaf_level];
    let Some(old_siblings) = transition.siblings.get(..transition.old_leaf_level) else {
        return false;
    };

    let old_leaf = if transition.is_old0 {
        EMPTY_HASH
    } else {
        Node::Leaf { key: transition.old_key, value: transition.old_value }.hash()
    };
    let new_leaf = if transition.fnc == Fnc::Delete {
        EMPTY_HASH
    } else {
        Node::Leaf { key: transition.new_key, value: transition.new_value }.hash()
    };

    climb(old_bits, old_siblings, old_leaf) == transition.old_root
        && climb(new_bits, &transition.siblings, new_leaf) == transition.new_root
}
