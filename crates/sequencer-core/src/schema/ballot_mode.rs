//! Per-process ballot constraints (§3, `BallotMode`).

use serde::{Deserialize, Serialize};

use crate::Fr;

/// Immutable per-process configuration constraining the shape of accepted ballots.
///
/// Every field is logically a field element (§3); integer-valued fields are kept as `u64` here
/// for ergonomics and converted to [`Fr`] only at hashing/circuit-witness boundaries via
/// [`BallotMode::to_field_elements`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotMode {
    /// Number of ballot slots actually used (`<= FIELDS_PER_BALLOT`).
    pub max_count: u64,
    /// Whether nonzero slots must be pairwise distinct.
    pub force_uniqueness: bool,
    /// Maximum value a single slot may hold.
    pub max_value: u64,
    /// Minimum value a single slot may hold.
    pub min_value: u64,
    /// Maximum allowed value of the cost function over all slots.
    pub max_total_cost: u64,
    /// Minimum allowed value of the cost function over all slots.
    pub min_total_cost: u64,
    /// Cost exponent; `None` means the cost constraint is elided entirely.
    pub cost_exp: Option<CostExponent>,
    /// Whether the cost bound is scaled by the voter's census weight.
    pub cost_from_weight: bool,
}

/// The two cost exponents the cost constraint may use (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostExponent {
    /// `Σ slot` must fall within `[MinTotalCost, MaxTotalCost]`.
    Linear,
    /// `Σ slot²` must fall within `[MinTotalCost, MaxTotalCost]`.
    Quadratic,
}

impl CostExponent {
    /// The exponent as a plain integer, for use inside the cost-sum loop.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Linear => 1,
            Self::Quadratic => 2,
        }
    }
}

impl BallotMode {
    /// Number of field elements `BallotMode` contributes to an `InputsHash` preimage (§6).
    pub const FIELD_COUNT: usize = 8;

    /// Flatten into the fixed 8-field-element ordering used by every `InputsHash` computation
    /// that embeds a `BallotMode` (§6): `MaxCount, ForceUniqueness, MaxValue, MinValue,
    /// MaxTotalCost, MinTotalCost, CostExp, CostFromWeight`.
    #[must_use]
    pub fn to_field_elements(self) -> [Fr; Self::FIELD_COUNT] {
        let cost_exp = self.cost_exp.map_or(0, |exp| u64::from(exp.as_u32()));
        [
            Fr::from(self.max_count),
            Fr::from(u64::from(self.force_uniqueness)),
            Fr::from(self.max_value),
            Fr::from(self.min_value),
            Fr::from(self.max_total_cost),
            Fr::from(self.min_total_cost),
            Fr::from(cost_exp),
            Fr::from(u64::from(self.cost_from_weight)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_elements_preserve_order() {
        let mode = BallotMode {
            max_count: 5,
            force_uniqueness: true,
            max_value: 16,
            min_value: 0,
            max_total_cost: 1280,
            min_total_cost: 0,
            cost_exp: Some(CostExponent::Quadratic),
            cost_from_weight: false,
        };
        let fields = mode.to_field_elements();
        assert_eq!(fields[0], Fr::from(5_u64));
        assert_eq!(fields[1], Fr::from(1_u64));
        assert_eq!(fields[6], Fr::from(2_u64));
        assert_eq!(fields[7], Fr::from(0_u64));
    }

    #[test]
    fn elided_cost_exponent_is_zero() {
        let mode = BallotMode {
            max_count: 1,
            force_uniqueness: false,
            max_value: 1,
            min_value: 0,
            max_total_cost: 0,
            min_total_cost: 0,
            cost_exp: None,
            cost_from_weight: false,
        };
        assert_eq!(mode.to_field_elements()[6], Fr::from(0_u64));
    }
}
