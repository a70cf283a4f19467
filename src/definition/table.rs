//! Table definitions

use super::{ColumnDefinition, ExtensionDefinition, ExtensionKind, ObjectName};

/// A declared table: columns in declaration order plus its extensions
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: ObjectName,
    pub columns: Vec<ColumnDefinition>,
    pub extensions: Vec<ExtensionDefinition>,
}

impl TableDefinition {
    pub fn new(name: ObjectName) -> Self {
        Self {
            name,
            columns: Vec::new(),
            extensions: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Declared extensions of one kind, in declaration order
    pub fn extensions(&self, kind: ExtensionKind) -> impl Iterator<Item = &ExtensionDefinition> {
        self.extensions.iter().filter(move |e| e.kind() == kind)
    }

    /// Columns of the primary key, if one is declared
    pub fn primary_key(&self) -> Option<&[String]> {
        self.extensions(ExtensionKind::PrimaryKey)
            .next()
            .map(|e| e.body.columns())
    }
}
