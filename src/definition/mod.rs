//! Declared schema definitions
//!
//! Immutable values describing the desired end state of tables and
//! sequences, plus the JSON document format they are loaded from.

mod column;
mod document;
mod extension;
mod name;
mod sequence;
mod table;

pub use column::{defaults_match, ColumnDefinition, DefaultValue, Identity, IdentityGeneration};
pub use document::{ColumnDocument, Definition, Document, SequenceDocument, TableDocument};
pub use extension::{
    ExtensionBody, ExtensionDefinition, ExtensionKind, ForeignKey, MatchType, Reference,
    ReferentialAction,
};
pub use name::{ObjectName, MAX_IDENTIFIER_LENGTH};
pub use sequence::{SequenceAttributes, SequenceDefinition, SequenceType};
pub use table::TableDefinition;
