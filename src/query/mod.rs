//! Query generators
//!
//! Pure functions from a definition or diff record to DDL text. Nothing here
//! touches the database; the object models decide what to generate and the
//! orchestrator decides when it runs.

pub mod sequence;
pub mod table;

pub use sequence::SequenceDiff;
pub use table::{ColumnDiff, IdentityChange};
