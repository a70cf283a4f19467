//! Orchestrator - Two-stage schema synchronization
//!
//! `sync` first prepares the full statement list (introspection, diffing
//! and read-only lookups) and then executes it, each stage in its own
//! transaction. Prepare phases run in a fixed order so constraints are
//! dropped before the columns they cover change, and restored afterwards in
//! dependency order.

use super::SyncOptions;
use crate::changeset::ChangeSet;
use crate::db::Database;
use crate::definition::{
    Definition, Document, ExtensionKind, ObjectName, SequenceDefinition, TableDefinition,
};
use crate::error::{validation_error, Result};
use crate::introspection::{IntrospectionRequest, Introspector, PostgresIntrospector};
use crate::model::{actualize_identity, sequence_changes, CheckCanonicalizer, Renames, TablePlan};
use indexmap::IndexMap;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one `sync` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Executed statements, in execution order
    pub queries: Vec<String>,
}

/// Registry of declared objects bound to one database connection
pub struct Engine {
    db: Arc<dyn Database>,
    introspector: Box<dyn Introspector>,
    default_schema: String,
    tables: IndexMap<ObjectName, TableDefinition>,
    sequences: IndexMap<ObjectName, SequenceDefinition>,
}

impl Engine {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            introspector: Box::new(PostgresIntrospector),
            default_schema: "public".to_string(),
            tables: IndexMap::new(),
            sequences: IndexMap::new(),
        }
    }

    pub fn with_introspector(mut self, introspector: Box<dyn Introspector>) -> Self {
        self.introspector = introspector;
        self
    }

    /// Schema for names registered without one
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    /// Validate and register an authored document
    pub fn register(&mut self, document: Document) -> Result<()> {
        match document.into_definition(&self.default_schema)? {
            Definition::Table(table) => self.register_table(table),
            Definition::Sequence(sequence) => self.register_sequence(sequence),
        }
    }

    pub fn register_table(&mut self, mut table: TableDefinition) -> Result<()> {
        table.name = table.name.with_default_schema(&self.default_schema);
        self.ensure_unregistered(&table.name)?;
        debug!(table = %table.name, "Registered table");
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    pub fn register_sequence(&mut self, mut sequence: SequenceDefinition) -> Result<()> {
        sequence.name = sequence.name.with_default_schema(&self.default_schema);
        self.ensure_unregistered(&sequence.name)?;
        debug!(sequence = %sequence.name, "Registered sequence");
        self.sequences.insert(sequence.name.clone(), sequence);
        Ok(())
    }

    fn ensure_unregistered(&self, name: &ObjectName) -> Result<()> {
        if self.tables.contains_key(name) || self.sequences.contains_key(name) {
            return Err(validation_error(
                name.to_string(),
                "an object with this name is already registered",
            ));
        }
        Ok(())
    }

    /// Converge the database to the registered definitions
    pub async fn sync(&self, options: &SyncOptions) -> Result<SyncReport> {
        info!(
            tables = self.tables.len(),
            sequences = self.sequences.len(),
            force = options.force,
            "Synchronizing schema"
        );

        let queries = self
            .transaction(options.transaction, self.prepare(options))
            .await?
            .into_vec();

        if queries.is_empty() {
            info!("Schema is up to date");
            return Ok(SyncReport { queries });
        }

        self.transaction(options.transaction, self.execute(&queries))
            .await?;

        info!(statements = queries.len(), "Schema synchronized");
        Ok(SyncReport { queries })
    }

    /// Wrap `work` in `BEGIN`/`COMMIT`, rolling back on failure
    async fn transaction<T>(&self, enabled: bool, work: impl Future<Output = Result<T>>) -> Result<T> {
        if !enabled {
            return work.await;
        }

        self.db.execute("BEGIN").await?;
        match work.await {
            Ok(value) => {
                self.db.execute("COMMIT").await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.db.execute("ROLLBACK").await {
                    warn!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    /// Compute the ordered statement list
    async fn prepare(&self, options: &SyncOptions) -> Result<ChangeSet> {
        let db = self.db.as_ref();
        let request = IntrospectionRequest {
            tables: self.tables.keys().cloned().collect(),
            sequences: self.sequences.keys().cloned().collect(),
        };
        let observed = self.introspector.find(db, &request).await?;

        let mut changes = ChangeSet::new();

        for sequence in self.sequences.values() {
            changes.append(sequence_changes(
                sequence,
                observed.sequences.get(&sequence.name),
                options.force,
            )?);
        }

        // every unsafe column change fails here, before anything is emitted
        let mut plans = self
            .tables
            .values()
            .map(|table| TablePlan::new(table, observed.tables.get(&table.name), options.force))
            .collect::<Result<Vec<_>>>()?;
        let renames: Renames = plans
            .iter()
            .filter(|plan| !plan.renames().is_empty())
            .map(|plan| (plan.table.name.clone(), plan.renames().clone()))
            .collect();
        for plan in plans.iter_mut() {
            plan.set_referenced_renames(renames.clone());
        }
        let mut checks = CheckCanonicalizer::new();

        for kind in ExtensionKind::CLEANUP_ORDER {
            if !options.allow_clean.allows(kind) {
                continue;
            }
            for plan in &plans {
                let canonical = canonical_checks(db, &mut checks, plan, kind).await?;
                changes.append(plan.cleanup(kind, &canonical));
            }
        }

        for plan in &plans {
            changes.append(plan.column_changes());
        }

        for kind in ExtensionKind::ADDITION_ORDER {
            for plan in &plans {
                let canonical = canonical_checks(db, &mut checks, plan, kind).await?;
                changes.append(plan.additions(kind, &canonical));
            }
        }

        if options.adjust_identity_sequences {
            for plan in plans.iter().filter(|p| !p.is_recreated()) {
                let columns = plan.materialized_identity_columns();
                if !columns.is_empty() {
                    changes.append(actualize_identity(db, &plan.table.name, &columns).await?);
                }
            }
        }

        debug!(statements = changes.len(), "Prepared changes");
        Ok(changes)
    }

    /// Run statements strictly in order, logging each first
    async fn execute(&self, queries: &[String]) -> Result<()> {
        for query in queries {
            info!("{}", query);
            self.db.execute(query).await?;
        }
        Ok(())
    }
}

async fn canonical_checks(
    db: &dyn Database,
    checks: &mut CheckCanonicalizer,
    plan: &TablePlan<'_>,
    kind: ExtensionKind,
) -> Result<Vec<String>> {
    if kind != ExtensionKind::Check || !plan.needs_canonical_checks() {
        return Ok(Vec::new());
    }
    Ok(checks.canonical(db, plan.table).await?.to_vec())
}
