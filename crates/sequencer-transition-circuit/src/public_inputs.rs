//! The public values a StateTransition proof exposes (§4.7, §6).

use sequencer_core::Fr;

use crate::witness::TransitionWitness;

/// The four values §6 names as this stage's public inputs, exposed directly rather than folded
/// into a combined digest: `AggregatedInputsHash` is already this stage's own native field, so
/// there's no cross-field boundary here to bridge with one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicInputs {
    /// Tree root before this batch's transitions (`RootHashBefore`).
    pub root_before: Fr,
    /// Tree root after every transition in the batch is applied (`RootHashAfter`).
    pub root_after: Fr,
    /// Count of real votes this batch (`NumNewVotes`).
    pub num_new_votes: Fr,
    /// Count of overwrites this batch (`NumOverwrites`).
    pub num_overwrites: Fr,
}

impl PublicInputs {
    /// Derive the public inputs a given witness's proof must satisfy.
    #[must_use]
    pub fn from_witness(witness: &TransitionWitness) -> Self {
        Self {
            root_before: witness.root_before,
            root_after: witness.root_after,
            num_new_votes: Fr::from(witness.num_new_votes),
            num_overwrites: Fr::from(witness.num_overwrites),
        }
    }

    /// Flatten to the field-element vector Groth16 verification expects, in §6's declared order.
    #[must_use]
    pub fn to_field_elements(self) -> Vec<Fr> {
        vec![self.root_before, self.root_after, self.num_new_votes, self.num_overwrites]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_order_matches_the_circuits_allocation_order() {
        let inputs = PublicInputs {
            root_before: Fr::from(1_u64),
            root_after: Fr::from(2_u64),
            num_new_votes: Fr::from(3_u64),
            num_overwrites: Fr::from(4_u64),
        };
        assert_eq!(
            inputs.to_field_elements(),
            vec![Fr::from(1_u64), Fr::from(2_u64), Fr::from(3_u64), Fr::from(4_u64)]
        );
    }
}
