//! qti-interchange: JSON item documents.
//!
//! Provides typed structs for the item document (declarations, mappings,
//! lookup tables) and a single `from_interchange()` entry point that
//! lowers a `serde_json::Value` document into a
//! [`qti_core::ItemDefinition`] with its expression and rule arenas
//! filled in.

pub mod deserialize;
pub mod types;

pub use deserialize::{from_interchange, from_json_str, lower, InterchangeError};
pub use types::*;
