//! Declared-schema documents
//!
//! The JSON shape users author, and its conversion into validated
//! [`TableDefinition`] and [`SequenceDefinition`] values. Every failure is an
//! [`Error::Validation`](crate::error::Error::Validation) naming the
//! offending path, e.g. `users.columns.id.type`.

use super::{
    ColumnDefinition, DefaultValue, ExtensionBody, ExtensionDefinition, ExtensionKind,
    ForeignKey, Identity, IdentityGeneration, MatchType, ObjectName, Reference,
    ReferentialAction, SequenceDefinition, SequenceType, TableDefinition, MAX_IDENTIFIER_LENGTH,
};
use crate::error::{validation_error, Result};
use crate::types;
use indexmap::IndexMap;
use serde::Deserialize;
use validator::Validate;

/// A validated definition of either kind
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Table(TableDefinition),
    Sequence(SequenceDefinition),
}

/// A single authored document
#[derive(Debug, Clone)]
pub enum Document {
    Table(TableDocument),
    Sequence(SequenceDocument),
}

impl Document {
    /// A document with a `columns` key is a table, anything else a sequence
    pub fn from_value(value: serde_json::Value) -> std::result::Result<Self, serde_json::Error> {
        if value.get("columns").is_some() {
            serde_json::from_value(value).map(Document::Table)
        } else {
            serde_json::from_value(value).map(Document::Sequence)
        }
    }

    pub fn into_definition(self, default_schema: &str) -> Result<Definition> {
        match self {
            Document::Table(doc) => doc.into_definition(default_schema).map(Definition::Table),
            Document::Sequence(doc) => doc
                .into_definition(default_schema)
                .map(Definition::Sequence),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TableDocument {
    #[validate(length(min = 1, max = 127, message = "Table name must be between 1 and 127 characters"))]
    pub name: String,
    pub columns: IndexMap<String, ColumnDocument>,
    pub primary_key: Option<KeyDocument>,
    #[serde(default)]
    pub unique: Vec<KeyDocument>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyDocument>,
    #[serde(default)]
    pub indexes: Vec<KeyDocument>,
    #[serde(default)]
    pub checks: Vec<CheckDocument>,
}

/// A column: either a bare type string or a full specification
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ColumnDocument {
    Type(String),
    Spec(ColumnSpec),
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ColumnSpec {
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "type is required"))]
    pub data_type: String,
    pub nullable: Option<bool>,
    #[serde(default)]
    pub default: serde_json::Value,
    pub collate: Option<String>,
    pub identity: Option<IdentityDocument>,
    #[serde(default)]
    pub former_names: Vec<String>,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdentityDocument {
    Flag(bool),
    Options(IdentityOptions),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityOptions {
    pub generation: Option<IdentityGeneration>,
    pub start: Option<i64>,
    pub increment: Option<i64>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub cycle: Option<bool>,
}

/// Primary key, unique constraint or index
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct KeyDocument {
    #[validate(length(min = 1, max = 63, message = "Name must be between 1 and 63 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "At least one column is required"))]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ForeignKeyDocument {
    #[validate(length(min = 1, max = 63, message = "Name must be between 1 and 63 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "At least one column is required"))]
    pub columns: Vec<String>,
    pub references: ReferenceDocument,
    #[serde(default)]
    pub on_update: ReferentialAction,
    #[serde(default)]
    pub on_delete: ReferentialAction,
    #[serde(default, rename = "match")]
    pub match_type: MatchType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceDocument {
    pub table: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CheckDocument {
    #[validate(length(min = 1, max = 63, message = "Name must be between 1 and 63 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "condition is required"))]
    pub condition: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SequenceDocument {
    #[validate(length(min = 1, max = 127, message = "Sequence name must be between 1 and 127 characters"))]
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: Option<String>,
    pub start: Option<i64>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub increment: Option<i64>,
    pub cycle: Option<bool>,
}

fn parse_name(raw: &str, default_schema: &str) -> Result<ObjectName> {
    ObjectName::parse(raw)
        .map(|name| name.with_default_schema(default_schema))
        .map_err(|message| validation_error(raw, message))
}

fn check_columns(path: &str, columns: &[String], declared: &IndexMap<String, ColumnDocument>) -> Result<()> {
    match columns.iter().find(|c| !declared.contains_key(*c)) {
        Some(unknown) => Err(validation_error(
            format!("{}.columns", path),
            format!("column `{}` is not declared", unknown),
        )),
        None => Ok(()),
    }
}

impl ColumnDocument {
    fn into_spec(self) -> ColumnSpec {
        match self {
            ColumnDocument::Spec(spec) => spec,
            ColumnDocument::Type(data_type) => ColumnSpec {
                data_type,
                nullable: None,
                default: serde_json::Value::Null,
                collate: None,
                identity: None,
                former_names: Vec::new(),
                primary: false,
                unique: false,
                force: false,
            },
        }
    }
}

fn parse_default(path: &str, value: serde_json::Value) -> Result<Option<DefaultValue>> {
    use serde_json::Value;

    match value {
        Value::Null => Ok(None),
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(Some(DefaultValue::Literal(value))),
        Value::Object(mut map) if map.len() == 1 => {
            if let Some(json) = map.remove("json") {
                return Ok(Some(DefaultValue::Json(json)));
            }
            match map.remove("sql") {
                Some(Value::String(sql)) if !sql.trim().is_empty() => Ok(Some(DefaultValue::Sql(sql))),
                _ => Err(validation_error(
                    format!("{}.default", path),
                    "expected a literal, {\"json\": ...} or {\"sql\": \"...\"}",
                )),
            }
        }
        _ => Err(validation_error(
            format!("{}.default", path),
            "expected a literal, {\"json\": ...} or {\"sql\": \"...\"}",
        )),
    }
}

fn parse_column(path: &str, name: String, spec: ColumnSpec) -> Result<ColumnDefinition> {
    if name.is_empty() || name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(validation_error(
            path,
            format!("Column name must be between 1 and {} characters", MAX_IDENTIFIER_LENGTH),
        ));
    }
    spec.validate()
        .map_err(|e| validation_error(format!("{}.type", path), e.to_string()))?;

    let data_type = types::parse(&spec.data_type);

    let identity = match spec.identity {
        None | Some(IdentityDocument::Flag(false)) => None,
        Some(IdentityDocument::Flag(true)) => Some(Identity::default()),
        Some(IdentityDocument::Options(options)) => Some(Identity {
            generation: options.generation.unwrap_or(IdentityGeneration::ByDefault),
            start: options.start,
            increment: options.increment,
            min: options.min,
            max: options.max,
            cycle: options.cycle,
        }),
    };

    if let Some(identity) = &identity {
        if !data_type.is_integer() {
            return Err(validation_error(
                format!("{}.identity", path),
                format!("identity requires smallint, integer or bigint, not {}", data_type),
            ));
        }
        if identity.increment == Some(0) {
            return Err(validation_error(
                format!("{}.identity.increment", path),
                "increment must not be zero",
            ));
        }
    }

    let default = parse_default(path, spec.default)?;
    if identity.is_some() && default.is_some() {
        return Err(validation_error(
            format!("{}.default", path),
            "an identity column cannot have a default",
        ));
    }

    Ok(ColumnDefinition {
        nullable: spec.nullable.unwrap_or(true) && identity.is_none() && !spec.primary,
        name,
        data_type,
        default,
        collate: spec.collate,
        identity,
        former_names: spec.former_names,
        force: spec.force,
    })
}

impl TableDocument {
    pub fn into_definition(self, default_schema: &str) -> Result<TableDefinition> {
        let path = self.name.clone();
        self.validate()
            .map_err(|e| validation_error(&path, e.to_string()))?;
        let mut table = TableDefinition::new(parse_name(&self.name, default_schema)?);

        if self.columns.is_empty() {
            return Err(validation_error(
                format!("{}.columns", path),
                "a table declares at least one column",
            ));
        }

        let mut primary = Vec::new();
        let mut unique_columns = Vec::new();
        for (name, document) in self.columns.clone() {
            let column_path = format!("{}.columns.{}", path, name);
            let spec = document.into_spec();
            if spec.primary {
                primary.push(name.clone());
            }
            if spec.unique {
                unique_columns.push(name.clone());
            }
            table.columns.push(parse_column(&column_path, name, spec)?);
        }

        // primary key
        let primary_key = match self.primary_key {
            Some(key) => {
                let key_path = format!("{}.primaryKey", path);
                key.validate()
                    .map_err(|e| validation_error(&key_path, e.to_string()))?;
                check_columns(&key_path, &key.columns, &self.columns)?;
                if !primary.is_empty() && primary != key.columns {
                    return Err(validation_error(
                        key_path,
                        "primaryKey disagrees with the columns marked `primary`",
                    ));
                }
                Some((key.name, key.columns))
            }
            None if !primary.is_empty() => Some((None, primary)),
            None => None,
        };
        if let Some((name, columns)) = primary_key {
            for column in table.columns.iter_mut().filter(|c| columns.contains(&c.name)) {
                column.nullable = false;
            }
            table.extensions.push(ExtensionDefinition {
                name,
                body: ExtensionBody::PrimaryKey(columns),
            });
        }

        for (i, key) in self.unique.into_iter().enumerate() {
            let key_path = format!("{}.unique[{}]", path, i);
            key.validate()
                .map_err(|e| validation_error(&key_path, e.to_string()))?;
            check_columns(&key_path, &key.columns, &self.columns)?;
            table.extensions.push(ExtensionDefinition {
                name: key.name,
                body: ExtensionBody::Unique(key.columns),
            });
        }
        for column in unique_columns {
            let body = ExtensionBody::Unique(vec![column]);
            if !table.extensions.iter().any(|e| e.body == body) {
                table.extensions.push(ExtensionDefinition::new(body));
            }
        }

        for (i, key) in self.foreign_keys.into_iter().enumerate() {
            let key_path = format!("{}.foreignKeys[{}]", path, i);
            key.validate()
                .map_err(|e| validation_error(&key_path, e.to_string()))?;
            check_columns(&key_path, &key.columns, &self.columns)?;
            if key.references.columns.len() != key.columns.len() {
                return Err(validation_error(
                    format!("{}.references.columns", key_path),
                    "references must name as many columns as the key",
                ));
            }
            table.extensions.push(ExtensionDefinition {
                name: key.name,
                body: ExtensionBody::ForeignKey(ForeignKey {
                    columns: key.columns,
                    references: Reference {
                        table: parse_name(&key.references.table, default_schema)?,
                        columns: key.references.columns,
                    },
                    on_update: key.on_update,
                    on_delete: key.on_delete,
                    match_type: key.match_type,
                }),
            });
        }

        for (i, check) in self.checks.into_iter().enumerate() {
            let check_path = format!("{}.checks[{}]", path, i);
            check
                .validate()
                .map_err(|e| validation_error(&check_path, e.to_string()))?;
            if check.condition.trim().is_empty() {
                return Err(validation_error(
                    format!("{}.condition", check_path),
                    "condition is required",
                ));
            }
            table.extensions.push(ExtensionDefinition {
                name: check.name,
                body: ExtensionBody::Check(check.condition),
            });
        }

        for (i, key) in self.indexes.into_iter().enumerate() {
            let key_path = format!("{}.indexes[{}]", path, i);
            key.validate()
                .map_err(|e| validation_error(&key_path, e.to_string()))?;
            check_columns(&key_path, &key.columns, &self.columns)?;
            table.extensions.push(ExtensionDefinition {
                name: key.name,
                body: ExtensionBody::Index(key.columns),
            });
        }

        debug_assert!(table.extensions(ExtensionKind::PrimaryKey).count() <= 1);
        Ok(table)
    }
}

impl SequenceDocument {
    pub fn into_definition(self, default_schema: &str) -> Result<SequenceDefinition> {
        let path = self.name.clone();
        self.validate()
            .map_err(|e| validation_error(&path, e.to_string()))?;

        let mut sequence = SequenceDefinition::new(parse_name(&self.name, default_schema)?);
        if let Some(raw) = &self.data_type {
            sequence.data_type = SequenceType::parse(raw).ok_or_else(|| {
                validation_error(
                    format!("{}.type", path),
                    format!("`{}` is not smallint, integer or bigint", raw),
                )
            })?;
        }

        let increment = self.increment.unwrap_or(1);
        if increment == 0 {
            return Err(validation_error(
                format!("{}.increment", path),
                "increment must not be zero",
            ));
        }
        sequence.increment = increment;
        sequence.start = self.start;
        sequence.min = self.min;
        sequence.max = self.max;
        sequence.cycle = self.cycle.unwrap_or(false);

        let (type_min, type_max) = sequence.data_type.bounds();
        let resolved = sequence.resolved();
        if resolved.min < type_min || resolved.max > type_max {
            return Err(validation_error(
                path,
                format!("bounds exceed the range of {}", sequence.data_type),
            ));
        }
        if resolved.min > resolved.max {
            return Err(validation_error(
                format!("{}.min", path),
                "min must not exceed max",
            ));
        }
        if resolved.start < resolved.min || resolved.start > resolved.max {
            return Err(validation_error(
                format!("{}.start", path),
                "start must lie between min and max",
            ));
        }

        Ok(sequence)
    }
}
