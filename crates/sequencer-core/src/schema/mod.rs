//! Serializable domain schema shared by every stage of the pipeline.

mod ballot_mode;
mod process;
mod transition;

pub use ballot_mode::{BallotMode, CostExponent};
pub use process::{EncryptionKeyCoords, Process};
pub use transition::{Fnc, Transition};
