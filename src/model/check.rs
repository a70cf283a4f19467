//! Check-constraint canonicalization
//!
//! Declared check conditions are never compared as authored. Each table's
//! checks are applied to a scratch temporary table and the server's own
//! `pg_get_constraintdef` rendering is read back, so `id>10` and
//! `id > 10` compare equal. Results are cached per table for one sync.

use crate::db::{queries, Database};
use crate::definition::{ExtensionBody, ExtensionKind, ObjectName, TableDefinition};
use crate::error::{Error, Result};
use crate::query::table as sql;
use std::collections::HashMap;
use tracing::debug;

const SCRATCH_PREFIX: &str = "temp_constraint_check";

/// Per-sync cache of canonical check definitions
#[derive(Debug, Default)]
pub struct CheckCanonicalizer {
    cache: HashMap<ObjectName, Vec<String>>,
    next_scratch: usize,
}

impl CheckCanonicalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical definitions of `table`'s declared checks, in declaration
    /// order. Issues queries only the first time a table is asked for.
    pub async fn canonical(&mut self, db: &dyn Database, table: &TableDefinition) -> Result<&[String]> {
        if !self.cache.contains_key(&table.name) {
            let scratch = format!("{}_{}", SCRATCH_PREFIX, self.next_scratch);
            self.next_scratch += 1;
            let definitions = Self::render(db, &scratch, table).await?;
            self.cache.insert(table.name.clone(), definitions);
        }
        Ok(self
            .cache
            .get(&table.name)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    async fn render(db: &dyn Database, scratch: &str, table: &TableDefinition) -> Result<Vec<String>> {
        let checks: Vec<(String, &str)> = table
            .extensions(ExtensionKind::Check)
            .enumerate()
            .filter_map(|(j, e)| match &e.body {
                ExtensionBody::Check(condition) => Some((format!("{}_{}", scratch, j), condition.as_str())),
                _ => None,
            })
            .collect();
        if checks.is_empty() {
            return Ok(Vec::new());
        }

        debug!(table = %table.name, checks = checks.len(), "Canonicalizing check constraints");

        db.execute(&sql::create_scratch_table(scratch, &table.columns, &checks))
            .await?;
        let rows = db
            .query(queries::CONSTRAINT_DEFINITIONS, &[&queries::temporary_relation(scratch)])
            .await?;
        db.execute(&sql::drop_scratch_table(scratch)).await?;

        let rendered: HashMap<&str, &str> = rows
            .iter()
            .filter_map(|row| Some((row.get("name")?, row.get("definition")?)))
            .collect();

        checks
            .iter()
            .map(|(name, _)| {
                rendered
                    .get(name.as_str())
                    .map(|definition| definition.to_string())
                    .ok_or_else(|| {
                        Error::Query(format!(
                            "check constraint `{}` was not rendered for {}",
                            name, table.name
                        ))
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Row;
    use crate::definition::{ColumnDefinition, ExtensionDefinition};
    use crate::testing::MockDatabase;
    use crate::types::parse;
    use pretty_assertions::assert_eq;

    fn ranges() -> TableDefinition {
        let mut table = TableDefinition::new(ObjectName::new("public", "ranges"));
        table.columns = vec![ColumnDefinition::new("id", parse("bigint"))];
        table
            .extensions
            .push(ExtensionDefinition::new(ExtensionBody::Check("id>10 AND id<1000".to_string())));
        table
    }

    #[tokio::test]
    async fn test_renders_once_per_table() {
        let db = MockDatabase::new().respond(
            "pg_get_constraintdef",
            vec![Row::new([
                ("name", Some("temp_constraint_check_0_0")),
                ("definition", Some("CHECK (((id > 10) AND (id < 1000)))")),
            ])],
        );
        let table = ranges();
        let mut canonicalizer = CheckCanonicalizer::new();

        let first = canonicalizer.canonical(&db, &table).await.unwrap().to_vec();
        let second = canonicalizer.canonical(&db, &table).await.unwrap().to_vec();

        assert_eq!(first, vec!["CHECK (((id > 10) AND (id < 1000)))"]);
        assert_eq!(first, second);
        assert_eq!(
            db.parameters("pg_get_constraintdef"),
            Some(vec!["pg_temp.\"temp_constraint_check_0\"".to_string()])
        );
        assert_eq!(
            db.statements(),
            vec![
                "CREATE TEMPORARY TABLE \"temp_constraint_check_0\" (\"id\" bigint, \
                 CONSTRAINT \"temp_constraint_check_0_0\" CHECK (id>10 AND id<1000))"
                    .to_string(),
                queries::CONSTRAINT_DEFINITIONS.to_string(),
                "DROP TABLE IF EXISTS pg_temp.\"temp_constraint_check_0\"".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_tables_without_checks_issue_no_queries() {
        let mut table = ranges();
        table.extensions.clear();
        let db = MockDatabase::new();
        let mut canonicalizer = CheckCanonicalizer::new();

        assert!(canonicalizer.canonical(&db, &table).await.unwrap().is_empty());
        assert!(db.statements().is_empty());
    }
}
