//! Per-process identity and parameters rooted into the state tree (§3, `Process`).

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::base::{HexField, StateKey};
use crate::schema::BallotMode;
use crate::Fr;

/// Identifier of a voting process; reuses the sparse-Merkle-tree key width.
pub type ProcessId = StateKey;

/// Coordinates of an ElGamal public key on the encryption curve.
///
/// Kept as a raw `(x, y)` pair of field elements rather than a curve-typed point so that
/// `sequencer-core` stays independent of the curve implementation; [`sequencer-curve`] types
/// convert to and from this pair at the boundary.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionKeyCoords {
    /// Affine x-coordinate.
    #[serde_as(as = "HexField")]
    pub x: Fr,
    /// Affine y-coordinate.
    #[serde_as(as = "HexField")]
    pub y: Fr,
}

/// The immutable parameters of a voting process, as rooted into the state tree's reserved
/// leaves (§3, §4.3).
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    /// Process identifier.
    pub id: ProcessId,
    /// Root of the census (eligible-voter) Merkle tree.
    #[serde_as(as = "HexField")]
    pub census_root: Fr,
    /// Ballot-shape constraints every vote in this process must satisfy.
    pub ballot_mode: BallotMode,
    /// Public encryption key voters encrypt their ballots against.
    pub encryption_key: EncryptionKeyCoords,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CostExponent;

    #[test]
    fn process_is_plain_data() {
        let process = Process {
            id: ProcessId::PROCESS_ID,
            census_root: Fr::from(7_u64),
            ballot_mode: BallotMode {
                max_count: 1,
                force_uniqueness: false,
                max_value: 1,
                min_value: 0,
                max_total_cost: 1,
                min_total_cost: 0,
                cost_exp: Some(CostExponent::Linear),
                cost_from_weight: false,
            },
            encryption_key: EncryptionKeyCoords {
                x: Fr::from(1_u64),
                y: Fr::from(2_u64),
            },
        };
        assert_eq!(process.encryption_key.x, Fr::from(1_u64));
    }
}
