//! Limb-packing across the recursion tower's field boundaries (§4.5, §4.7: "via limb-packing
//! witness translation").
//!
//! Two of the tower's three recursion boundaries aren't a native arkworks 2-chain (only
//! BLS12-377-inside-BW6-761 is), so a field element native to one stage can't be witnessed
//! directly inside the next. Instead it is split into fixed-width limbs small enough to fit the
//! next stage's native field, and those limbs are what the next circuit actually witnesses and
//! range-checks; recomposing and binding them is the caller's job (typically folding them into
//! that stage's own `InputsHash`), not this module's.

use ark_crypto_primitives::sponge::poseidon::{find_poseidon_ark_and_mds, PoseidonConfig, PoseidonSponge};
use ark_crypto_primitives::sponge::CryptographicSponge;
use ark_ff::{BigInteger, PrimeField};

/// Width of a single limb. 64 bits keeps every limb comfortably below every field modulus in this
/// workspace, including BabyJubJub's ~251-bit scalar field.
pub const LIMB_BITS: usize = 64;

/// Split `value` into `num_limbs` little-endian `LIMB_BITS`-wide limbs, each embedded as an
/// element of `T`. `num_limbs` must cover `S`'s bit length; trailing limbs beyond it are zero.
pub fn pack_limbs<S: PrimeField, T: PrimeField>(value: S, num_limbs: usize) -> Vec<T> {
    let bytes = value.into_bigint().to_bytes_le();
    let limb_bytes = LIMB_BITS / 8;
    (0..num_limbs)
        .map(|i| {
            let start = i.saturating_mul(limb_bytes);
            let mut chunk = [0_u8; 8];
            for (offset, byte) in chunk.iter_mut().enumerate() {
                if let Some(value) = bytes.get(start.saturating_add(offset)) {
                    *byte = *value;
                }
            }
            T::from(u64::from_le_bytes(chunk))
        })
        .collect()
}

/// Recompose little-endian `LIMB_BITS`-wide limbs back into a single field element, the off-circuit
/// counterpart to [`constraints::recompose`]. Used by a stage to check that limbs it receives as a
/// witness actually came from the value the caller claims, without re-deriving that value's own
/// native-field preimage.
#[must_use]
pub fn recompose<T: PrimeField>(limbs: &[T]) -> T {
    let mut acc = T::from(0_u64);
    let mut shift = T::from(1_u64);
    let base = T::from(1_u128 << LIMB_BITS);
    for limb in limbs {
        acc += *limb * shift;
        shift *= base;
    }
    acc
}

/// A Poseidon instance generated fresh for `F`, used only to bind limb-packed witnesses together
/// within a single recursion stage's own native field. Never used to reproduce this workspace's
/// BN254-native `InputsHash`/`AggregatedInputsHash` formulas, which stay defined over
/// [`sequencer_core::Fr`] regardless of which stage is proving them (§4.5, §4.6: "emulated ...
/// on BN254").
fn bridge_config<F: PrimeField>() -> PoseidonConfig<F> {
    let (ark, mds) = find_poseidon_ark_and_mds::<F>(u64::from(F::MODULUS_BIT_SIZE), 4, 8, 57, 0);
    PoseidonConfig { full_rounds: 8, partial_rounds: 57, alpha: 5, ark, mds, rate: 4, capacity: 1 }
}

/// Hash limb-packed field elements together within a single stage's native field.
#[must_use]
pub fn bridge_hash<F: PrimeField>(inputs: &[F]) -> F {
    let mut sponge = PoseidonSponge::new(&bridge_config());
    for input in inputs {
        sponge.absorb(input);
    }
    let output: Vec<F> = sponge.squeeze_field_elements(1);
    output
        .into_iter()
        .next()
        .unwrap_or_else(|| unreachable!("squeeze_field_elements(1) always returns one element"))
}

/// In-circuit limb witnessing and recomposition.
pub mod constraints {
    use ark_ff::PrimeField;
    use ark_r1cs_std::fields::fp::FpVar;
    use ark_r1cs_std::prelude::*;
    use ark_relations::r1cs::SynthesisError;

    use super::LIMB_BITS;

    /// Enforce every limb fits in `LIMB_BITS` bits, the same two-sided convention the ballot
    /// circuit's range checks use, specialized to a one-sided upper bound since limbs are
    /// produced as non-negative bytes off-circuit.
    pub fn enforce_limbs_bounded<T: PrimeField>(limbs: &[FpVar<T>]) -> Result<(), SynthesisError> {
        for limb in limbs {
            let bits = limb.to_bits_le()?;
            for bit in bits.iter().skip(LIMB_BITS) {
                bit.enforce_equal(&Boolean::constant(false))?;
            }
        }
        Ok(())
    }

    /// Recompose range-checked limbs into a single field element, `Σ limb_i · 2^(64i)`.
    #[allow(
        clippy::arithmetic_side_effects,
        reason = "LIMB_BITS is a fixed compile-time constant (64); 1u128 << 64 never overflows"
    )]
    pub fn recompose<T: PrimeField>(limbs: &[FpVar<T>]) -> FpVar<T> {
        let mut acc = FpVar::constant(T::from(0_u64));
        let mut shift = T::from(1_u64);
        let base = T::from(1_u128 << LIMB_BITS);
        for limb in limbs {
            acc += limb * FpVar::constant(shift);
            shift *= base;
        }
        acc
    }

    /// In-circuit Poseidon over `T`, mirroring [`super::bridge_hash`] exactly.
    pub fn bridge_hash<T: PrimeField>(
        cs: ark_relations::r1cs::ConstraintSystemRef<T>,
        inputs: &[FpVar<T>],
    ) -> Result<FpVar<T>, SynthesisError> {
        use ark_crypto_primitives::sponge::constraints::CryptographicSpongeVar;
        use ark_crypto_primitives::sponge::poseidon::constraints::PoseidonSpongeVar;

        let mut sponge = PoseidonSpongeVar::new(cs, &super::bridge_config());
        sponge.absorb(&inputs)?;
        let output = sponge.squeeze_field_elements(1)?;
        output.into_iter().next().ok_or(SynthesisError::AssignmentMissing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bls12_377::Fr as OuterFr;
    use sequencer_core::Fr;

    #[test]
    fn round_trips_a_small_value() {
        let value = Fr::from(123_456_789_u64);
        let limbs: Vec<OuterFr> = pack_limbs(value, 4);
        assert_eq!(limbs[0], OuterFr::from(123_456_789_u64));
        assert_eq!(limbs[1], OuterFr::from(0_u64));
    }

    #[test]
    fn distinct_values_pack_to_distinct_limbs() {
        let a: Vec<OuterFr> = pack_limbs(Fr::from(1_u64), 4);
        let b: Vec<OuterFr> = pack_limbs(Fr::from(2_u64), 4);
        assert_ne!(a, b);
    }

    #[test]
    fn recompose_undoes_pack_limbs() {
        let value = OuterFr::from(123_456_789_u64);
        let limbs: Vec<OuterFr> = pack_limbs(value, 4);
        assert_eq!(recompose(&limbs), value);
    }
}
