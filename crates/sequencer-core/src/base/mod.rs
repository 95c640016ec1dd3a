//! Byte-level newtypes and serde helpers shared across the workspace.

mod key;
mod field_bytes;

pub use field_bytes::{FieldBytes, HexField};
pub use key::StateKey;
