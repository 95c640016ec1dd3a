//! Shared in-circuit building blocks: bounded range checks and BabyJubJub point arithmetic in
//! reduced twisted-Edwards (RTE) form, the convention the recursion tower computes on (§REDESIGN,
//! "TE vs RTE coordinate duality").

use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::SynthesisError;
use sequencer_core::Fr;
use sequencer_curve::Point;

/// BabyJubJub's twisted-Edwards `d` coefficient, shared by the TE and RTE coordinate forms.
const D: u64 = 168_696;

/// The scalar relating a point's TE and RTE `x`-coordinate: `x_rte = x_te * RTE_FACTOR`.
///
/// Derived from the curve's own public `to_rte` conversion on the generator, rather than
/// duplicating the private constant it's built from, so this crate carries no secret of its own.
fn rte_factor() -> Fr {
    let generator = Point::generator();
    let (gx_rte, _) = generator.to_rte();
    gx_rte
        * generator
            .x()
            .inverse()
            .unwrap_or_else(|| unreachable!("the generator's x-coordinate is nonzero"))
}

/// A BabyJubJub point in RTE form (`a = -1`), the form the in-circuit addition law below uses.
#[derive(Clone)]
pub struct PointVar {
    /// RTE x-coordinate.
    pub x: FpVar<Fr>,
    /// RTE y-coordinate.
    pub y: FpVar<Fr>,
}

impl PointVar {
    /// The curve's identity element, `(0, 1)` in both coordinate conventions.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            x: FpVar::constant(Fr::from(0_u64)),
            y: FpVar::constant(Fr::from(1_u64)),
        }
    }

    /// Witness a point given in TE form, constraining its RTE counterpart to the public
    /// `RTE_FACTOR` relationship (the boundary crossing the witness struct keeps in TE form).
    pub fn from_te_coords(x_te: &FpVar<Fr>, y: &FpVar<Fr>) -> Self {
        Self {
            x: x_te * FpVar::constant(rte_factor()),
            y: y.clone(),
        }
    }

    /// The generator, embedded as a constant via the curve's own `generator()` and `to_rte()`.
    #[must_use]
    pub fn generator() -> Self {
        let (x, y) = Point::generator().to_rte();
        Self {
            x: FpVar::constant(x),
            y: FpVar::constant(y),
        }
    }

    /// RTE addition law, `a = -1`: `x3 = (x1y2+y1x2)/(1+d*x1x2y1y2)`,
    /// `y3 = (y1y2+x1x2)/(1-d*x1x2y1y2)`.
    pub fn add(&self, other: &Self) -> Result<Self, SynthesisError> {
        let x1y2 = &self.x * &other.y;
        let y1x2 = &self.y * &other.x;
        let x1x2 = &self.x * &other.x;
        let y1y2 = &self.y * &other.y;
        let d_term = FpVar::constant(Fr::from(D)) * &x1x2 * &y1y2;

        let one = FpVar::constant(Fr::from(1_u64));
        let x3 = (&x1y2 + &y1x2) * (&one + &d_term).inverse()?;
        let y3 = (&y1y2 + &x1x2) * (&one - &d_term).inverse()?;
        Ok(Self { x: x3, y: y3 })
    }

    /// Pick between two points based on a circuit boolean, component-wise.
    pub fn select(cond: &Boolean<Fr>, true_point: &Self, false_point: &Self) -> Result<Self, SynthesisError> {
        Ok(Self {
            x: FpVar::conditionally_select(cond, &true_point.x, &false_point.x)?,
            y: FpVar::conditionally_select(cond, &true_point.y, &false_point.y)?,
        })
    }

    /// Scalar multiplication by `bits`, most-significant-bit first, mirroring
    /// [`sequencer_curve::Point::scalar_mul`]'s native double-and-add exactly.
    pub fn scalar_mul(&self, bits: &[Boolean<Fr>]) -> Result<Self, SynthesisError> {
        let mut acc = Self::identity();
        for bit in bits {
            let doubled = acc.add(&acc)?;
            let added = doubled.add(self)?;
            acc = Self::select(bit, &added, &doubled)?;
        }
        Ok(acc)
    }

    /// Enforce that two points (in the same coordinate convention) are equal.
    pub fn enforce_equal(&self, other: &Self) -> Result<(), SynthesisError> {
        self.x.enforce_equal(&other.x)?;
        self.y.enforce_equal(&other.y)
    }
}

/// Left-pad a little-endian bit vector with `false` up to `SCALAR_BITS` and reverse it to
/// most-significant-bit-first order, mirroring how a small integer's `Scalar` encoding is mostly
/// leading zeros (§4.1, `Encrypt`'s per-slot message scalar).
pub fn widen_to_scalar_bits_msb(value_bits_le: &[Boolean<Fr>], scalar_bits: usize) -> Vec<Boolean<Fr>> {
    let mut msb = vec![Boolean::constant(false); scalar_bits.saturating_sub(value_bits_le.len())];
    msb.extend(value_bits_le.iter().rev().cloned());
    msb
}

/// Enforce `value` fits in `bits` bits and is therefore non-negative as a field element
/// (no field element in `[0, 2^bits)` wraps around the BN254 modulus for any `bits` used here).
fn enforce_fits_in_bits(value: &FpVar<Fr>, bits: usize) -> Result<(), SynthesisError> {
    let decomposed = value.to_bits_le()?;
    for bit in decomposed.iter().skip(bits) {
        bit.enforce_equal(&Boolean::constant(false))?;
    }
    Ok(())
}

/// Enforce `min <= value <= max`, by range-checking both `value - min` and `max - value` into
/// `bits` bits (the standard two-sided bound check: each side is non-negative only if genuinely
/// bounded, since a negative field difference wraps to a value far outside `[0, 2^bits)`).
pub fn enforce_bounded(value: &FpVar<Fr>, min: &FpVar<Fr>, max: &FpVar<Fr>, bits: usize) -> Result<(), SynthesisError> {
    enforce_fits_in_bits(&(value - min), bits)?;
    enforce_fits_in_bits(&(max - value), bits)
}

/// `a < b`, witnessed as a boolean via the shifted-decomposition trick: `a - b + 2^bits` lies in
/// `[0, 2^bits)` iff `a >= b`, and in `[2^bits, 2*2^bits)` iff `a < b`, so bit `bits` of its
/// decomposition is exactly `NOT (a < b)`.
pub fn is_less_than(a: &FpVar<Fr>, b: &FpVar<Fr>, bits: usize) -> Result<Boolean<Fr>, SynthesisError> {
    let shift = Fr::from(1_u128.checked_shl(u32::try_from(bits).unwrap_or(0)).unwrap_or(u128::MAX));
    let shifted = a - b + FpVar::constant(shift);
    let decomposed = shifted.to_bits_le()?;
    let top_bit = decomposed.get(bits).cloned().ok_or(SynthesisError::AssignmentMissing)?;
    Ok(top_bit.not())
}
