//! ElGamal ciphertext over BabyJubJub (§3, "Ciphertext").

use serde::{Deserialize, Serialize};

use crate::point::Point;

/// `(C1, C2) = (k*G, m*G + k*PK)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    /// `k*G`.
    pub c1: Point,
    /// `m*G + k*PK`.
    pub c2: Point,
}

impl Ciphertext {
    /// Componentwise point addition, the ciphertext-level homomorphism over plaintext addition.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        Self {
            c1: self.c1.add(&other.c1),
            c2: self.c2.add(&other.c2),
        }
    }
}
