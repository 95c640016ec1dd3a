//! BabyJubJub's own scalar field, used as the exponent in point multiplication.
//!
//! Distinct from [`sequencer_core::Fr`], which is the curve's *base* field (the coordinate
//! space, shared with BN254 and the rest of the recursion tower). `Scalar` is the order of
//! BabyJubJub's prime-order subgroup, roughly 251 bits.

use ark_ff::{BigInteger, PrimeField};
use ark_std::UniformRand;
use rand_core::RngCore;

use crate::error::CurveError;

/// BabyJubJub's scalar field.
pub type Scalar = ark_ed_on_bn254::Fr;

/// Sample a uniformly random scalar, as `Encrypt`'s `k` requires (§4.1).
pub fn sample_scalar<R: RngCore>(rng: &mut R) -> Scalar {
    Scalar::rand(rng)
}

/// Decode a scalar from its 32-byte big-endian encoding, rejecting values at or above the
/// subgroup order rather than silently reducing them (§4.1, `Encrypt`: "Fails with
/// `ScalarOutOfRange` when `k` or `m` exceeds the subgroup order").
///
/// # Errors
/// Returns [`CurveError::ScalarOutOfRange`] if `bytes` is not the canonical encoding of some
/// scalar strictly below the subgroup order.
pub fn scalar_from_bytes_checked(bytes: [u8; 32]) -> Result<Scalar, CurveError> {
    let reduced = Scalar::from_be_bytes_mod_order(&bytes);
    let mut round_trip = reduced.into_bigint().to_bytes_be();
    let mut padded = vec![0_u8; 32_usize.saturating_sub(round_trip.len())];
    padded.append(&mut round_trip);
    if padded == bytes {
        Ok(reduced)
    } else {
        Err(CurveError::ScalarOutOfRange)
    }
}
