//! Big-endian byte encoding for field elements.
//!
//! §4.2 fixes byte-to-field conversion as big-endian, zero-padded to 32 bytes, for every field in
//! the recursion tower. `ark_ff` canonical serialization is little-endian, so this module is the
//! single place that reconciles the two.

use ark_ff::{BigInteger, PrimeField};
use serde::{Deserialize, Serialize};
use serde_with::hex::Hex;
use serde_with::serde_as;

/// A field element's 32-byte big-endian encoding, used on the wire (queue entries, artifact
/// manifests) wherever a raw field value needs to round-trip through JSON/CBOR.
#[serde_as]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct FieldBytes(#[serde_as(as = "Hex")] pub [u8; 32]);

impl FieldBytes {
    /// Encode a field element as big-endian bytes, zero-padded to 32 bytes.
    #[allow(
        clippy::indexing_slicing,
        clippy::arithmetic_side_effects,
        reason = "bytes.len() <= 32 is checked just above the slice"
    )]
    pub fn from_field<F: PrimeField>(value: F) -> Self {
        let mut bytes = value.into_bigint().to_bytes_be();
        let mut out = [0_u8; 32];
        if bytes.len() < 32 {
            let mut padded = vec![0_u8; 32 - bytes.len()];
            padded.append(&mut bytes);
            bytes = padded;
        }
        out.copy_from_slice(&bytes[bytes.len().saturating_sub(32)..]);
        Self(out)
    }

    /// Decode a field element from big-endian bytes, reducing modulo the field's modulus.
    pub fn to_field<F: PrimeField>(self) -> F {
        F::from_be_bytes_mod_order(&self.0)
    }
}

/// A `serde_as` adapter converting any `PrimeField` to/from its big-endian byte encoding.
pub struct HexField;

impl<F: PrimeField> serde_with::SerializeAs<F> for HexField {
    fn serialize_as<S>(value: &F, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        FieldBytes::from_field(*value).serialize(serializer)
    }
}

impl<'de, F: PrimeField> serde_with::DeserializeAs<'de, F> for HexField {
    fn deserialize_as<D>(deserializer: D) -> Result<F, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = FieldBytes::deserialize(deserializer)?;
        Ok(bytes.to_field())
    }
}
