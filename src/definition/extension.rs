//! Table extensions: primary keys, unique constraints, foreign keys,
//! check constraints and indexes

use super::ObjectName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five extension kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtensionKind {
    PrimaryKey,
    ForeignKey,
    Unique,
    Check,
    Index,
}

impl ExtensionKind {
    /// Drop order: dependents before what they depend on
    pub const CLEANUP_ORDER: [ExtensionKind; 5] = [
        ExtensionKind::ForeignKey,
        ExtensionKind::PrimaryKey,
        ExtensionKind::Unique,
        ExtensionKind::Check,
        ExtensionKind::Index,
    ];

    /// Creation order, the reverse of [`Self::CLEANUP_ORDER`]
    pub const ADDITION_ORDER: [ExtensionKind; 5] = [
        ExtensionKind::Index,
        ExtensionKind::Check,
        ExtensionKind::Unique,
        ExtensionKind::PrimaryKey,
        ExtensionKind::ForeignKey,
    ];
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExtensionKind::PrimaryKey => "primaryKey",
            ExtensionKind::ForeignKey => "foreignKey",
            ExtensionKind::Unique => "unique",
            ExtensionKind::Check => "check",
            ExtensionKind::Index => "index",
        };
        f.write_str(label)
    }
}

/// `ON UPDATE` / `ON DELETE` action of a foreign key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[default]
    #[serde(rename = "NO ACTION")]
    NoAction,
    #[serde(rename = "RESTRICT")]
    Restrict,
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "SET DEFAULT")]
    SetDefault,
}

impl ReferentialAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }

    /// Decode `pg_constraint.confupdtype` / `confdeltype`
    pub fn from_catalog(code: &str) -> Option<Self> {
        match code {
            "a" => Some(ReferentialAction::NoAction),
            "r" => Some(ReferentialAction::Restrict),
            "c" => Some(ReferentialAction::Cascade),
            "n" => Some(ReferentialAction::SetNull),
            "d" => Some(ReferentialAction::SetDefault),
            _ => None,
        }
    }
}

/// Foreign key match type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    #[default]
    #[serde(rename = "SIMPLE")]
    Simple,
    #[serde(rename = "FULL")]
    Full,
}

impl MatchType {
    /// Decode `pg_constraint.confmatchtype`
    pub fn from_catalog(code: &str) -> Option<Self> {
        match code {
            "s" => Some(MatchType::Simple),
            "f" => Some(MatchType::Full),
            _ => None,
        }
    }
}

/// Target of a foreign key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub table: ObjectName,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub references: Reference,
    pub on_update: ReferentialAction,
    pub on_delete: ReferentialAction,
    pub match_type: MatchType,
}

/// Structural body of an extension
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExtensionBody {
    PrimaryKey(Vec<String>),
    Unique(Vec<String>),
    Index(Vec<String>),
    ForeignKey(ForeignKey),
    /// Condition as authored for declared checks; the server's full
    /// `CHECK (...)` rendering for observed ones
    Check(String),
}

impl ExtensionBody {
    pub fn kind(&self) -> ExtensionKind {
        match self {
            ExtensionBody::PrimaryKey(_) => ExtensionKind::PrimaryKey,
            ExtensionBody::Unique(_) => ExtensionKind::Unique,
            ExtensionBody::Index(_) => ExtensionKind::Index,
            ExtensionBody::ForeignKey(_) => ExtensionKind::ForeignKey,
            ExtensionBody::Check(_) => ExtensionKind::Check,
        }
    }

    /// Local columns the extension covers; empty for checks
    pub fn columns(&self) -> &[String] {
        match self {
            ExtensionBody::PrimaryKey(c) | ExtensionBody::Unique(c) | ExtensionBody::Index(c) => c,
            ExtensionBody::ForeignKey(fk) => &fk.columns,
            ExtensionBody::Check(_) => &[],
        }
    }

    /// Rewrite local column names, leaving referenced columns untouched
    pub fn map_columns(&self, f: impl Fn(&str) -> String) -> Self {
        let map = |columns: &[String]| columns.iter().map(|c| f(c)).collect::<Vec<_>>();
        match self {
            ExtensionBody::PrimaryKey(c) => ExtensionBody::PrimaryKey(map(c)),
            ExtensionBody::Unique(c) => ExtensionBody::Unique(map(c)),
            ExtensionBody::Index(c) => ExtensionBody::Index(map(c)),
            ExtensionBody::ForeignKey(fk) => ExtensionBody::ForeignKey(ForeignKey {
                columns: map(&fk.columns),
                ..fk.clone()
            }),
            ExtensionBody::Check(condition) => ExtensionBody::Check(condition.clone()),
        }
    }
}

/// A declared or observed extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionDefinition {
    /// Constraint or index name; server-assigned names never take part in
    /// matching
    pub name: Option<String>,
    pub body: ExtensionBody,
}

impl ExtensionDefinition {
    pub fn new(body: ExtensionBody) -> Self {
        Self { name: None, body }
    }

    pub fn named(name: impl Into<String>, body: ExtensionBody) -> Self {
        Self {
            name: Some(name.into()),
            body,
        }
    }

    pub fn kind(&self) -> ExtensionKind {
        self.body.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addition_order_reverses_cleanup_order() {
        let mut reversed = ExtensionKind::CLEANUP_ORDER;
        reversed.reverse();
        assert_eq!(reversed, ExtensionKind::ADDITION_ORDER);
    }

    #[test]
    fn test_catalog_codes() {
        assert_eq!(ReferentialAction::from_catalog("c"), Some(ReferentialAction::Cascade));
        assert_eq!(ReferentialAction::from_catalog("a"), Some(ReferentialAction::NoAction));
        assert_eq!(MatchType::from_catalog("f"), Some(MatchType::Full));
        assert_eq!(MatchType::from_catalog("x"), None);
    }

    #[test]
    fn test_map_columns_keeps_references() {
        let body = ExtensionBody::ForeignKey(ForeignKey {
            columns: vec!["role_id".to_string()],
            references: Reference {
                table: ObjectName::new("public", "roles"),
                columns: vec!["role_id".to_string()],
            },
            on_update: ReferentialAction::NoAction,
            on_delete: ReferentialAction::Cascade,
            match_type: MatchType::Simple,
        });

        let renamed = body.map_columns(|c| c.replace("role_id", "role"));
        assert_eq!(renamed.columns(), ["role".to_string()]);
        match renamed {
            ExtensionBody::ForeignKey(fk) => assert_eq!(fk.references.columns, vec!["role_id"]),
            other => panic!("unexpected body {:?}", other),
        }
    }
}
