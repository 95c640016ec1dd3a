//! BabyJubJub point arithmetic (§4.1, "Curve point (P)").
//!
//! A point is always held in its twisted-Edwards (TE) form (`a = 168700`), the convention
//! voter-side clients and the wire format use. The reduced form (RTE, `a = -1`) used inside the
//! recursion tower is reached only through [`Point::to_rte`]/[`Point::from_rte`] — the single
//! boundary the core crosses between the two conventions (§REDESIGN, "TE vs RTE coordinate
//! duality").

use std::str::FromStr;
use std::sync::OnceLock;

use ark_ff::{BigInteger, Field, PrimeField};
use sequencer_core::base::HexField;
use sequencer_core::Fr;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::error::CurveError;
use crate::scalar::Scalar;

/// BabyJubJub's twisted-Edwards `a` coefficient.
const TE_A: u64 = 168_700;
/// BabyJubJub's twisted-Edwards `d` coefficient, shared by both coordinate conventions.
const D: u64 = 168_696;

/// A point on BabyJubJub, held in TE coordinates.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde_as(as = "HexField")]
    x: Fr,
    #[serde_as(as = "HexField")]
    y: Fr,
}

impl Point {
    /// The identity element, `(0, 1)`.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            x: Fr::from(0_u64),
            y: Fr::from(1_u64),
        }
    }

    /// Build a point from raw coordinates without checking curve membership.
    ///
    /// Used when the caller already trusts the coordinates (e.g. they were just derived from a
    /// scalar multiplication). External input should go through [`Point::decompress`] instead.
    #[must_use]
    pub const fn from_coords_unchecked(x: Fr, y: Fr) -> Self {
        Self { x, y }
    }

    /// The generator of BabyJubJub's prime-order subgroup, in TE form.
    #[must_use]
    pub fn generator() -> Self {
        Self {
            x: Fr::from_str(
                "995203441582195749578291179787384436505546430278305826713579947235728471134",
            )
            .unwrap_or_else(|()| unreachable!("generator x is a valid decimal field element")),
            y: Fr::from_str(
                "5472060717959818805561601436314318772137091100104008585924551046643952123905",
            )
            .unwrap_or_else(|()| unreachable!("generator y is a valid decimal field element")),
        }
    }

    /// Affine x-coordinate.
    #[must_use]
    pub const fn x(&self) -> Fr {
        self.x
    }

    /// Affine y-coordinate.
    #[must_use]
    pub const fn y(&self) -> Fr {
        self.y
    }

    /// Whether this is the curve's neutral element.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Check that `(x, y)` satisfies the TE curve equation `a*x^2 + y^2 = 1 + d*x^2*y^2`.
    #[must_use]
    pub fn is_on_curve(&self) -> bool {
        let x2 = self.x * self.x;
        let y2 = self.y * self.y;
        let lhs = x2 * Fr::from(TE_A) + y2;
        let rhs = Fr::from(1_u64) + x2 * y2 * Fr::from(D);
        lhs == rhs
    }

    /// Point addition via the twisted-Edwards addition law.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        te_add(self.x, self.y, other.x, other.y)
    }

    /// Scalar multiplication via double-and-add, most significant bit first.
    ///
    /// Every bit runs the same sequence of field operations: both the doubled and the
    /// doubled-plus-added candidates are always computed, and [`Self::select`] picks between
    /// them with an arithmetic blend rather than a branch on the bit's value, so the instruction
    /// trace carries no data-dependent shape (§4.1 policy: curve operations are constant-time
    /// with respect to secret scalars).
    #[must_use]
    pub fn scalar_mul(&self, scalar: Scalar) -> Self {
        let mut acc = Self::identity();
        for bit in scalar.into_bigint().to_bits_be() {
            let doubled = acc.add(&acc);
            let doubled_plus_self = doubled.add(self);
            acc = Self::select(bit, &doubled_plus_self, &doubled);
        }
        acc
    }

    /// Pick `on_true` when `bit` is set and `on_false` otherwise, via an arithmetic blend
    /// (`on_false + bit * (on_true - on_false)`) instead of a conditional branch.
    fn select(bit: bool, on_true: &Self, on_false: &Self) -> Self {
        let bit = Fr::from(u64::from(bit));
        Self {
            x: on_false.x + bit * (on_true.x - on_false.x),
            y: on_false.y + bit * (on_true.y - on_false.y),
        }
    }

    /// Encode as a 32-byte big-endian compressed form: `y`'s canonical encoding with `x`'s sign
    /// folded into the otherwise-unused top bit of the leading byte (§4.1 policy).
    #[must_use]
    #[allow(clippy::indexing_slicing, reason = "index 0 of a fixed [u8; 32]")]
    pub fn compress(&self) -> [u8; 32] {
        let mut bytes = be_bytes(self.y);
        if is_negative(self.x) {
            bytes[0] |= 0x80;
        } else {
            bytes[0] &= 0x7f;
        }
        bytes
    }

    /// Decode a compressed point, recovering `x` via the curve equation and rejecting values
    /// with no square root.
    ///
    /// # Errors
    /// Returns [`CurveError::NotOnCurve`] if no `x` satisfies the curve equation for the
    /// decoded `y`, or the recovered point fails the curve check.
    #[allow(clippy::indexing_slicing, reason = "index 0 of a fixed [u8; 32]")]
    pub fn decompress(bytes: [u8; 32]) -> Result<Self, CurveError> {
        let sign = bytes[0] & 0x80 != 0;
        let mut y_bytes = bytes;
        y_bytes[0] &= 0x7f;
        let y = Fr::from_be_bytes_mod_order(&y_bytes);

        let y2 = y * y;
        let numerator = y2 - Fr::from(1_u64);
        let denominator = Fr::from(D) * y2 - Fr::from(TE_A);
        let denom_inv = denominator.inverse().ok_or(CurveError::NotOnCurve)?;
        let x2 = numerator * denom_inv;
        let mut x = x2.sqrt().ok_or(CurveError::NotOnCurve)?;
        if is_negative(x) != sign {
            x = -x;
        }

        let point = Self { x, y };
        if point.is_on_curve() {
            Ok(point)
        } else {
            Err(CurveError::NotOnCurve)
        }
    }

    /// Convert to the reduced twisted-Edwards (RTE) coordinates used on-circuit, via the
    /// standard isomorphism between Edwards curves that share `d` (§REDESIGN, "TE vs RTE
    /// coordinate duality").
    #[must_use]
    pub fn to_rte(&self) -> (Fr, Fr) {
        (self.x * rte_factor(), self.y)
    }

    /// Recover a TE point from RTE coordinates.
    #[must_use]
    pub fn from_rte(x: Fr, y: Fr) -> Self {
        let factor_inv = rte_factor()
            .inverse()
            .unwrap_or_else(|| unreachable!("RTE factor is nonzero by construction"));
        Self {
            x: x * factor_inv,
            y,
        }
    }
}

/// Twisted-Edwards addition law specialized to BabyJubJub's `a = 168700`.
fn te_add(x1: Fr, y1: Fr, x2: Fr, y2: Fr) -> Point {
    let x1y2 = x1 * y2;
    let y1x2 = y1 * x2;
    let x1x2 = x1 * x2;
    let y1y2 = y1 * y2;
    let dx1x2y1y2 = Fr::from(D) * x1x2 * y1y2;

    let x3_denom_inv = (Fr::from(1_u64) + dx1x2y1y2)
        .inverse()
        .unwrap_or_else(|| unreachable!("1 + d*x1*x2*y1*y2 is nonzero for points on the curve"));
    let x3 = (x1y2 + y1x2) * x3_denom_inv;

    let y3_denom_inv = (Fr::from(1_u64) - dx1x2y1y2)
        .inverse()
        .unwrap_or_else(|| unreachable!("1 - d*x1*x2*y1*y2 is nonzero for points on the curve"));
    let y3 = (y1y2 - Fr::from(TE_A) * x1x2) * y3_denom_inv;

    Point { x: x3, y: y3 }
}

#[allow(
    clippy::indexing_slicing,
    reason = "offset is derived from the 32-byte output width just above"
)]
fn be_bytes(value: Fr) -> [u8; 32] {
    let raw = value.into_bigint().to_bytes_be();
    let mut out = [0_u8; 32];
    let offset = 32_usize.saturating_sub(raw.len());
    out[offset..].copy_from_slice(&raw);
    out
}

/// "Negative" here means the canonical representative is greater than its negation's, the same
/// convention circomlib and friends use to pick a sign bit for `x`.
fn is_negative(value: Fr) -> bool {
    let negated = Fr::from(0_u64) - value;
    value.into_bigint() > negated.into_bigint()
}

fn rte_factor() -> Fr {
    static FACTOR: OnceLock<Fr> = OnceLock::new();
    *FACTOR.get_or_init(|| {
        let radicand = -Fr::from(TE_A);
        radicand.sqrt().unwrap_or_else(|| {
            unreachable!("-TE_A is a quadratic residue mod the BN254 scalar field")
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::Scalar;

    #[test]
    fn identity_is_neutral_for_addition() {
        let g = Point::generator();
        assert_eq!(g.add(&Point::identity()), g);
    }

    #[test]
    fn generator_is_on_curve() {
        assert!(Point::generator().is_on_curve());
    }

    #[test]
    fn compress_decompress_round_trip() {
        let g = Point::generator();
        let compressed = g.compress();
        let decoded = Point::decompress(compressed).expect("generator decodes");
        assert_eq!(decoded, g);
    }

    #[test]
    fn scalar_mul_by_zero_is_identity() {
        let g = Point::generator();
        assert_eq!(g.scalar_mul(Scalar::from(0_u64)), Point::identity());
    }

    #[test]
    fn doubling_matches_self_addition() {
        let g = Point::generator();
        assert_eq!(g.scalar_mul(Scalar::from(2_u64)), g.add(&g));
    }

    #[test]
    fn scalar_mul_matches_repeated_addition() {
        let g = Point::generator();
        let expected = g.add(&g).add(&g).add(&g).add(&g);
        assert_eq!(g.scalar_mul(Scalar::from(5_u64)), expected);
    }

    #[test]
    fn select_picks_on_true_or_on_false() {
        let g = Point::generator();
        let h = g.add(&g);
        assert_eq!(Point::select(true, &g, &h), g);
        assert_eq!(Point::select(false, &g, &h), h);
    }

    #[test]
    fn te_rte_round_trip() {
        let g = Point::generator();
        let (rx, ry) = g.to_rte();
        assert_eq!(Point::from_rte(rx, ry), g);
    }
}
