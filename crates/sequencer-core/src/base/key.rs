//! Sparse-Merkle-tree key type.

use serde::{Deserialize, Serialize};
use serde_with::hex::Hex;
use serde_with::serde_as;

use crate::constants::STATE_KEY_BYTES;
use crate::error::CoreError;

/// A 20-byte key into the state tree: a nullifier, an address, or one of the small number of
/// reserved process/result keys.
#[serde_as]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct StateKey(#[serde_as(as = "Hex")] [u8; STATE_KEY_BYTES]);

impl StateKey {
    /// The zero key, reserved for no leaf in particular.
    pub const ZERO: Self = Self([0_u8; STATE_KEY_BYTES]);

    /// Reserved key holding the process identifier leaf.
    pub const PROCESS_ID: Self = Self::reserved(0);
    /// Reserved key holding the census root leaf.
    pub const CENSUS_ROOT: Self = Self::reserved(1);
    /// Reserved key holding the ballot-mode leaf.
    pub const BALLOT_MODE: Self = Self::reserved(2);
    /// Reserved key holding the encryption-key leaf.
    pub const ENCRYPTION_KEY: Self = Self::reserved(3);
    /// Reserved key holding the running `ResultsAdd` accumulator.
    pub const RESULTS_ADD: Self = Self::reserved(4);
    /// Reserved key holding the running `ResultsSub` accumulator.
    pub const RESULTS_SUB: Self = Self::reserved(5);

    #[allow(
        clippy::indexing_slicing,
        clippy::arithmetic_side_effects,
        reason = "STATE_KEY_BYTES - 1 is always in bounds for a nonempty array"
    )]
    const fn reserved(tag: u8) -> Self {
        let mut bytes = [0_u8; STATE_KEY_BYTES];
        bytes[STATE_KEY_BYTES - 1] = tag;
        Self(bytes)
    }

    /// Build a key from a full-width byte array.
    #[must_use]
    pub const fn new(bytes: [u8; STATE_KEY_BYTES]) -> Self {
        Self(bytes)
    }

    /// Build a key from a variable-length byte slice, left-padding with zeros.
    ///
    /// # Errors
    /// Returns [`CoreError::KeyWidth`] if `bytes` is longer than [`STATE_KEY_BYTES`].
    #[allow(
        clippy::indexing_slicing,
        clippy::arithmetic_side_effects,
        reason = "offset is derived from the length check just above"
    )]
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() > STATE_KEY_BYTES {
            return Err(CoreError::KeyWidth {
                got: bytes.len(),
                max: STATE_KEY_BYTES,
            });
        }
        let mut padded = [0_u8; STATE_KEY_BYTES];
        let offset = STATE_KEY_BYTES - bytes.len();
        padded[offset..].copy_from_slice(bytes);
        Ok(Self(padded))
    }

    /// Borrow the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; STATE_KEY_BYTES] {
        &self.0
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; STATE_KEY_BYTES]> for StateKey {
    fn from(bytes: [u8; STATE_KEY_BYTES]) -> Self {
        Self(bytes)
    }
}

impl From<StateKey> for [u8; STATE_KEY_BYTES] {
    fn from(key: StateKey) -> Self {
        key.0
    }
}

impl AsRef<[u8]> for StateKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_keys_are_distinct() {
        let reserved = [
            StateKey::PROCESS_ID,
            StateKey::CENSUS_ROOT,
            StateKey::BALLOT_MODE,
            StateKey::ENCRYPTION_KEY,
            StateKey::RESULTS_ADD,
            StateKey::RESULTS_SUB,
        ];
        for (i, a) in reserved.iter().enumerate() {
            for (j, b) in reserved.iter().enumerate() {
                assert_eq!(i == j, a == b);
            }
        }
    }

    #[test]
    fn from_slice_pads_left() {
        let key = StateKey::from_slice(&[1, 2, 3]).expect("within width");
        assert_eq!(key.as_bytes()[STATE_KEY_BYTES - 3..], [1, 2, 3]);
        assert!(key.as_bytes()[..STATE_KEY_BYTES - 3].iter().all(|b| *b == 0));
    }

    #[test]
    fn from_slice_rejects_overlong() {
        let bytes = vec![0_u8; STATE_KEY_BYTES + 1];
        assert!(matches!(
            StateKey::from_slice(&bytes),
            Err(CoreError::KeyWidth { .. })
        ));
    }
}
