//! Object models
//!
//! Diff computation for declared tables and sequences against their
//! observed structure, as free functions and plans over immutable
//! definitions.

pub mod check;
pub mod extension;
pub mod identity;
pub mod sequence;
pub mod table;

pub use check::CheckCanonicalizer;
pub use identity::actualize_identity;
pub use sequence::{sequence_changes, sequence_diff};
pub use extension::Renames;
pub use table::TablePlan;
