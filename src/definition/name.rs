//! Qualified object names

use crate::db::queries::quote_ident;
use serde::{Deserialize, Serialize};
use std::fmt;

/// PostgreSQL identifiers are truncated beyond this many bytes
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// `schema.name` pair identifying a table or sequence
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectName {
    pub schema: Option<String>,
    pub name: String,
}

impl ObjectName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Parse `name` or `schema.name`. At most two non-empty segments are
    /// accepted.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let segments: Vec<&str> = raw.split('.').map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(format!("`{}` contains an empty name segment", raw));
        }
        if let Some(long) = segments.iter().find(|s| s.len() > MAX_IDENTIFIER_LENGTH) {
            return Err(format!(
                "`{}` is longer than {} characters",
                long, MAX_IDENTIFIER_LENGTH
            ));
        }

        match segments.as_slice() {
            [name] => Ok(Self {
                schema: None,
                name: name.to_string(),
            }),
            [schema, name] => Ok(Self::new(*schema, *name)),
            _ => Err(format!(
                "`{}` has more than two dot-separated segments",
                raw
            )),
        }
    }

    /// Fill in `default_schema` when no schema was given
    pub fn with_default_schema(mut self, default_schema: &str) -> Self {
        if self.schema.is_none() {
            self.schema = Some(default_schema.to_string());
        }
        self
    }

    /// Quoted SQL identifier, e.g. `"public"."users"`
    pub fn quoted(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.name)),
            None => quote_ident(&self.name),
        }
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_qualified() {
        let plain = ObjectName::parse("users").unwrap();
        assert_eq!(plain.schema, None);
        assert_eq!(plain.name, "users");

        let qualified = ObjectName::parse("auth.users").unwrap();
        assert_eq!(qualified, ObjectName::new("auth", "users"));
    }

    #[test]
    fn test_parse_rejects_three_segments() {
        assert!(ObjectName::parse("db.auth.users").is_err());
        assert!(ObjectName::parse("auth.").is_err());
    }

    #[test]
    fn test_default_schema_and_quoting() {
        let name = ObjectName::parse("users")
            .unwrap()
            .with_default_schema("public");
        assert_eq!(name.quoted(), "\"public\".\"users\"");
        assert_eq!(name.to_string(), "public.users");
    }
}
