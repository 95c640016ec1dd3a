//! Curve-layer error taxonomy (§7).

use thiserror::Error;

/// Errors raised by BabyJubJub point arithmetic and ElGamal encryption.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CurveError {
    /// A scalar supplied as bytes did not canonically reduce below the subgroup order.
    #[error("scalar is not less than the BabyJubJub subgroup order")]
    ScalarOutOfRange,

    /// A compressed point encoding did not decode to a point on the curve.
    #[error("compressed point does not decode to a point on the curve")]
    NotOnCurve,

    /// A coordinate pair declared as one convention (TE or RTE) was paired with the other.
    #[error("mixed TE/RTE coordinate forms in the same operation")]
    MixedCoordinateForm,
}
