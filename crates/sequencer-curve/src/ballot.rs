//! A ballot: a fixed-length vector of ElGamal ciphertexts, one per tallied field (§3, §4.1).

use sequencer_core::constants::FIELDS_PER_BALLOT;
use serde::{Deserialize, Serialize};

use crate::ciphertext::Ciphertext;
use crate::point::Point;

/// `FieldsPerBallot` independently-encrypted ciphertexts, in field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    fields: [Ciphertext; FIELDS_PER_BALLOT],
}

impl Ballot {
    /// Build a ballot from exactly `FieldsPerBallot` ciphertexts.
    #[must_use]
    pub const fn new(fields: [Ciphertext; FIELDS_PER_BALLOT]) -> Self {
        Self { fields }
    }

    /// A ballot of `FieldsPerBallot` zero-ciphertexts `(O, O)`, the additive identity and the
    /// value every unused ballot slot carries.
    #[must_use]
    pub fn zero() -> Self {
        let zero_ciphertext = Ciphertext {
            c1: Point::identity(),
            c2: Point::identity(),
        };
        Self {
            fields: [zero_ciphertext; FIELDS_PER_BALLOT],
        }
    }

    /// Borrow the ciphertexts in field order.
    #[must_use]
    pub const fn fields(&self) -> &[Ciphertext; FIELDS_PER_BALLOT] {
        &self.fields
    }

    /// Homomorphic ballot addition: componentwise ciphertext addition (§4.3, running tallies).
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        let mut fields = self.fields;
        for (sum, rhs) in fields.iter_mut().zip(other.fields.iter()) {
            *sum = sum.add(rhs);
        }
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elgamal::encrypt;
    use crate::point::Point;
    use crate::scalar::Scalar;

    fn sample_ballot(pk: Point, seed: u64) -> Ballot {
        let fields = std::array::from_fn(|i| {
            let i = u64::try_from(i).unwrap_or(0);
            encrypt(pk, i, Scalar::from(seed + i + 1))
        });
        Ballot::new(fields)
    }

    #[test]
    fn zero_is_identity_for_add() {
        let pk = Point::generator();
        let ballot = sample_ballot(pk, 1);
        assert_eq!(ballot.add(&Ballot::zero()), ballot);
    }

    #[test]
    fn add_is_componentwise() {
        let pk = Point::generator();
        let a = sample_ballot(pk, 1);
        let b = sample_ballot(pk, 100);
        let sum = a.add(&b);
        for ((got, lhs), rhs) in sum.fields().iter().zip(a.fields()).zip(b.fields()) {
            assert_eq!(*got, lhs.add(rhs));
        }
    }
}
