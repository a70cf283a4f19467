//! Schema Introspection Module
//!
//! Reads the live structure of the registered tables and sequences from
//! `pg_catalog`. Observed values keep the server's own rendering (raw type
//! text, default expressions, constraint definitions); canonicalization
//! happens in the object models.

use crate::db::{queries, Database, Row};
use crate::definition::{
    ExtensionBody, ExtensionDefinition, ExtensionKind, ForeignKey, IdentityGeneration, MatchType,
    ObjectName, Reference, ReferentialAction, SequenceAttributes, SequenceType,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

/// Attributes of the sequence behind an identity column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentitySequence {
    pub start: i64,
    pub increment: i64,
    pub min: i64,
    pub max: i64,
    pub cycle: bool,
}

/// Column as the server reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedColumn {
    pub name: String,
    /// `format_type` rendering
    pub data_type: String,
    pub nullable: bool,
    /// `pg_get_expr` rendering
    pub default: Option<String>,
    /// Set only when it differs from the type's default collation
    pub collate: Option<String>,
    pub identity: Option<IdentityGeneration>,
    pub identity_sequence: Option<IdentitySequence>,
}

impl ObservedColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
            collate: None,
            identity: None,
            identity_sequence: None,
        }
    }
}

/// Live structure of one table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedTable {
    pub columns: Vec<ObservedColumn>,
    /// Primary key, foreign keys, unique constraints, checks and plain
    /// indexes, all carrying their server names
    pub extensions: Vec<ExtensionDefinition>,
}

impl ObservedTable {
    pub fn column(&self, name: &str) -> Option<&ObservedColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn extensions(&self, kind: ExtensionKind) -> impl Iterator<Item = &ExtensionDefinition> {
        self.extensions.iter().filter(move |e| e.kind() == kind)
    }

    pub fn primary_key(&self) -> Option<&[String]> {
        self.extensions(ExtensionKind::PrimaryKey)
            .next()
            .map(|e| e.body.columns())
    }
}

/// Which objects to look up
#[derive(Debug, Clone, Default)]
pub struct IntrospectionRequest {
    pub tables: Vec<ObjectName>,
    pub sequences: Vec<ObjectName>,
}

/// Result of one introspection pass. Missing objects are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observed {
    pub tables: HashMap<ObjectName, ObservedTable>,
    pub sequences: HashMap<ObjectName, SequenceAttributes>,
}

/// Source of observed structure
#[async_trait]
pub trait Introspector: Send + Sync {
    async fn find(&self, db: &dyn Database, request: &IntrospectionRequest) -> Result<Observed>;
}

/// Introspector backed by the PostgreSQL system catalogs
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresIntrospector;

fn observed_column(row: &Row) -> Result<ObservedColumn> {
    let identity = match row.get("identity") {
        None => None,
        Some("ALWAYS") => Some(IdentityGeneration::Always),
        Some("BY DEFAULT") => Some(IdentityGeneration::ByDefault),
        Some(other) => {
            return Err(Error::Query(format!("unknown identity generation `{}`", other)))
        }
    };

    let identity_sequence = match row.get_i64("sequence_start")? {
        Some(start) => Some(IdentitySequence {
            start,
            increment: row.require_i64("sequence_increment")?,
            min: row.require_i64("sequence_min")?,
            max: row.require_i64("sequence_max")?,
            cycle: row.get_bool("sequence_cycle")?.unwrap_or(false),
        }),
        None => None,
    };

    Ok(ObservedColumn {
        name: row.require("name")?.to_string(),
        data_type: row.require("type")?.to_string(),
        nullable: row.get_bool("nullable")?.unwrap_or(true),
        default: row.get("default").map(str::to_string),
        collate: row.get("collate").map(str::to_string),
        identity,
        identity_sequence,
    })
}

fn observed_constraint(row: &Row) -> Result<ExtensionDefinition> {
    let name = row.require("name")?;
    let columns = row.get_array("columns")?;

    let body = match row.require("kind")? {
        "p" => ExtensionBody::PrimaryKey(columns),
        "u" => ExtensionBody::Unique(columns),
        "c" => ExtensionBody::Check(row.require("definition")?.to_string()),
        "f" => {
            let table = match (row.get("referenced_schema"), row.get("referenced_table")) {
                (Some(schema), Some(table)) => ObjectName::new(schema, table),
                _ => {
                    return Err(Error::Query(format!(
                        "foreign key `{}` has no referenced table",
                        name
                    )))
                }
            };
            let action = |column: &str| {
                let code = row.get(column).unwrap_or_default();
                ReferentialAction::from_catalog(code).ok_or_else(|| {
                    Error::Query(format!("unknown referential action `{}` on `{}`", code, name))
                })
            };
            ExtensionBody::ForeignKey(ForeignKey {
                columns,
                references: Reference {
                    table,
                    columns: row.get_array("referenced_columns")?,
                },
                on_update: action("on_update")?,
                on_delete: action("on_delete")?,
                match_type: row
                    .get("match_type")
                    .and_then(MatchType::from_catalog)
                    .unwrap_or_default(),
            })
        }
        other => {
            return Err(Error::Query(format!(
                "unexpected constraint kind `{}` on `{}`",
                other, name
            )))
        }
    };
    Ok(ExtensionDefinition::named(name, body))
}

fn observed_sequence(row: &Row) -> Result<SequenceAttributes> {
    let raw_type = row.require("type")?;
    let data_type = SequenceType::parse(raw_type)
        .ok_or_else(|| Error::Query(format!("unexpected sequence type `{}`", raw_type)))?;

    Ok(SequenceAttributes {
        data_type,
        start: row.require_i64("start")?,
        increment: row.require_i64("increment")?,
        min: row.require_i64("min")?,
        max: row.require_i64("max")?,
        cycle: row.get_bool("cycle")?.unwrap_or(false),
    })
}

impl PostgresIntrospector {
    async fn relation_exists(db: &dyn Database, relation: &String) -> Result<bool> {
        let rows = db.query(queries::RELATION_EXISTS, &[relation]).await?;
        Ok(rows.first().map(|row| row.get_bool("found")).transpose()?.flatten() == Some(true))
    }

    async fn table(db: &dyn Database, relation: &String) -> Result<ObservedTable> {
        let columns = db
            .query(queries::TABLE_COLUMNS, &[relation])
            .await?
            .iter()
            .map(observed_column)
            .collect::<Result<Vec<_>>>()?;

        let mut extensions = db
            .query(queries::TABLE_CONSTRAINTS, &[relation])
            .await?
            .iter()
            .map(observed_constraint)
            .collect::<Result<Vec<_>>>()?;

        for row in db.query(queries::TABLE_INDEXES, &[relation]).await? {
            extensions.push(ExtensionDefinition::named(
                row.require("name")?,
                ExtensionBody::Index(row.get_array("columns")?),
            ));
        }

        Ok(ObservedTable {
            columns,
            extensions,
        })
    }

    async fn sequence(db: &dyn Database, relation: &String) -> Result<Option<SequenceAttributes>> {
        let rows = db.query(queries::SEQUENCE_ATTRIBUTES, &[relation]).await?;
        rows.first().map(observed_sequence).transpose()
    }
}

#[async_trait]
impl Introspector for PostgresIntrospector {
    async fn find(&self, db: &dyn Database, request: &IntrospectionRequest) -> Result<Observed> {
        let mut observed = Observed::default();

        for name in &request.tables {
            let relation = queries::relation(name);
            if Self::relation_exists(db, &relation).await? {
                observed.tables.insert(name.clone(), Self::table(db, &relation).await?);
            }
        }

        for name in &request.sequences {
            if let Some(attributes) = Self::sequence(db, &queries::relation(name)).await? {
                observed.sequences.insert(name.clone(), attributes);
            }
        }

        debug!(
            tables = observed.tables.len(),
            sequences = observed.sequences.len(),
            "Introspected {} of {} tables and {} of {} sequences",
            observed.tables.len(),
            request.tables.len(),
            observed.sequences.len(),
            request.sequences.len()
        );

        Ok(observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Value;
    use crate::testing::MockDatabase;

    fn text_array(values: &[&str]) -> Value {
        Value::from(values.iter().map(|v| v.to_string()).collect::<Vec<_>>())
    }

    fn constraint(name: &str, kind: &str, columns: &[&str], definition: &str) -> Vec<(&'static str, Value)> {
        vec![
            ("name", Value::from(name)),
            ("kind", Value::from(kind)),
            ("columns", text_array(columns)),
            ("referenced_schema", Value::Null),
            ("referenced_table", Value::Null),
            ("referenced_columns", text_array(&[])),
            ("on_update", Value::from(" ")),
            ("on_delete", Value::from(" ")),
            ("match_type", Value::from(" ")),
            ("definition", Value::from(definition)),
        ]
    }

    fn users_database() -> MockDatabase {
        let mut foreign_key = constraint(
            "users_role_fkey",
            "f",
            &["role"],
            "FOREIGN KEY (role) REFERENCES roles(id) ON DELETE CASCADE",
        );
        foreign_key.extend([
            ("referenced_schema", Value::from("public")),
            ("referenced_table", Value::from("roles")),
            ("referenced_columns", text_array(&["id"])),
            ("on_update", Value::from("a")),
            ("on_delete", Value::from("c")),
            ("match_type", Value::from("s")),
        ]);

        MockDatabase::new()
            .respond_with("AS found", "users", vec![Row::new([("found", true)])])
            .respond("AS found", vec![Row::new([("found", false)])])
            .respond(
                "AS identity",
                vec![
                    Row::new([
                        ("name", Value::from("id")),
                        ("type", Value::from("bigint")),
                        ("nullable", Value::from(false)),
                        ("default", Value::Null),
                        ("collate", Value::Null),
                        ("identity", Value::from("BY DEFAULT")),
                        ("sequence_start", Value::from(1i64)),
                        ("sequence_increment", Value::from(1i64)),
                        ("sequence_min", Value::from(1i64)),
                        ("sequence_max", Value::from(i64::MAX)),
                        ("sequence_cycle", Value::from(false)),
                    ]),
                    Row::new([
                        ("name", Value::from("role")),
                        ("type", Value::from("bigint")),
                        ("nullable", Value::from(true)),
                        ("default", Value::from("0")),
                    ]),
                ],
            )
            .respond(
                "AS match_type",
                vec![
                    Row::new(constraint("users_pkey", "p", &["id"], "PRIMARY KEY (id)")),
                    Row::new(foreign_key),
                ],
            )
            .respond(
                "FROM pg_index",
                vec![Row::new([
                    ("name", Value::from("users_role_idx")),
                    ("columns", text_array(&["role"])),
                ])],
            )
    }

    #[tokio::test]
    async fn test_find_decodes_catalog_rows() {
        let db = users_database();
        let request = IntrospectionRequest {
            tables: vec![ObjectName::new("public", "users"), ObjectName::new("public", "missing")],
            sequences: vec![],
        };
        let observed = PostgresIntrospector.find(&db, &request).await.unwrap();

        assert_eq!(observed.tables.len(), 1);
        let users = &observed.tables[&ObjectName::new("public", "users")];
        let id = users.column("id").unwrap();
        assert!(!id.nullable);
        assert_eq!(id.identity, Some(IdentityGeneration::ByDefault));
        assert_eq!(id.identity_sequence.unwrap().max, i64::MAX);

        let role = users.column("role").unwrap();
        assert_eq!(role.default.as_deref(), Some("0"));
        assert_eq!(role.identity_sequence, None);

        assert_eq!(users.primary_key(), Some(&["id".to_string()][..]));
        assert_eq!(users.extensions(ExtensionKind::Index).count(), 1);

        let fk = users.extensions(ExtensionKind::ForeignKey).next().unwrap();
        assert_eq!(fk.name.as_deref(), Some("users_role_fkey"));
        match &fk.body {
            ExtensionBody::ForeignKey(fk) => {
                assert_eq!(fk.references.table, ObjectName::new("public", "roles"));
                assert_eq!(fk.on_delete, ReferentialAction::Cascade);
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_relations_are_bound_as_parameters() {
        let db = users_database();
        let request = IntrospectionRequest {
            tables: vec![ObjectName::new("public", "users")],
            sequences: vec![],
        };
        PostgresIntrospector.find(&db, &request).await.unwrap();

        assert_eq!(
            db.parameters("AS identity"),
            Some(vec!["\"public\".\"users\"".to_string()])
        );
        assert!(db.statements().iter().all(|sql| !sql.contains("users")));
    }

    #[tokio::test]
    async fn test_find_sequences() {
        let db = MockDatabase::new().respond_with(
            "FROM pg_sequence",
            "ids",
            vec![Row::new([
                ("type", Value::from("integer")),
                ("start", Value::from(1i64)),
                ("increment", Value::from(1i64)),
                ("min", Value::from(1i64)),
                ("max", Value::from(i32::MAX as i64)),
                ("cycle", Value::from(false)),
            ])],
        );

        let request = IntrospectionRequest {
            tables: vec![],
            sequences: vec![ObjectName::new("public", "ids"), ObjectName::new("public", "gone")],
        };
        let observed = PostgresIntrospector.find(&db, &request).await.unwrap();

        assert_eq!(observed.sequences.len(), 1);
        let ids = observed.sequences[&ObjectName::new("public", "ids")];
        assert_eq!(ids.data_type, SequenceType::Integer);
        assert_eq!(ids.max, i32::MAX as i64);
    }

    #[tokio::test]
    async fn test_unknown_constraint_kind_is_rejected() {
        let db = MockDatabase::new()
            .respond("AS found", vec![Row::new([("found", true)])])
            .respond("AS match_type", vec![Row::new(constraint("odd", "x", &[], ""))]);
        let request = IntrospectionRequest {
            tables: vec![ObjectName::new("public", "users")],
            sequences: vec![],
        };

        let err = PostgresIntrospector.find(&db, &request).await.unwrap_err();
        assert!(matches!(err, Error::Query(_)));
    }
}
