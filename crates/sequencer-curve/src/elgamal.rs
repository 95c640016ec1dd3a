//! Homomorphic ElGamal encryption over BabyJubJub (§4.1).

use crate::ciphertext::Ciphertext;
use crate::point::Point;
use crate::scalar::Scalar;

/// `Encrypt(PK, m, k) -> (C1, C2)` with `C1 = k*G`, `C2 = m*G + k*PK`.
///
/// `m` is taken as a plain integer rather than a pre-validated [`Scalar`]: every ballot value
/// this system encrypts is bounded by a process's `MaxValue`, far below the subgroup order, so
/// encoding it as a scalar cannot fail in practice.
#[must_use]
pub fn encrypt(pk: Point, m: u64, k: Scalar) -> Ciphertext {
    let g = Point::generator();
    let c1 = g.scalar_mul(k);
    let c2 = g.scalar_mul(Scalar::from(m)).add(&pk.scalar_mul(k));
    Ciphertext { c1, c2 }
}

/// Homomorphic ciphertext addition, `Add((A1,A2),(B1,B2)) = (A1+B1, A2+B2)`.
#[must_use]
pub fn add(a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
    a.add(b)
}

/// Recover a bounded plaintext by brute-force discrete-log search, `m` in `[0, max_tally]`.
///
/// This is not part of the proving pipeline: it exists so the quantified properties in §8 are
/// testable, and for the external collaborator that performs the actual tally decryption.
/// Returns `None` if no `m` in range reproduces `c2 - sk*c1`.
#[must_use]
pub fn decrypt(sk: Scalar, ciphertext: &Ciphertext, max_tally: u64) -> Option<u64> {
    let shared_secret = ciphertext.c1.scalar_mul(sk);
    let shared_secret_neg = Point::from_coords_unchecked(-shared_secret.x(), shared_secret.y());
    let target = ciphertext.c2.add(&shared_secret_neg);

    let g = Point::generator();
    let mut candidate = Point::identity();
    for m in 0..=max_tally {
        if candidate == target {
            return Some(m);
        }
        candidate = candidate.add(&g);
    }
    None
}
