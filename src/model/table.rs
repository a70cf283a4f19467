//! Table model
//!
//! A [`TablePlan`] pairs a declared table with its observed structure and
//! computes, up front, everything the orchestrator later asks of it: column
//! matching, per-column diffs, renames and columns that must be recreated.
//! Unsafe changes fail while the plan is built, before any statement runs.

use super::extension::{structurally_equal, ObservedExtension, Renames};
use crate::changeset::ChangeSet;
use crate::definition::{
    defaults_match, ColumnDefinition, ExtensionKind, Identity, TableDefinition,
};
use crate::error::{synchronization_error, Result};
use crate::introspection::{ObservedColumn, ObservedTable};
use crate::query::table as sql;
use crate::query::{ColumnDiff, IdentityChange};
use crate::types::{self, is_widening_allowed};
use std::collections::{HashMap, HashSet};

/// What happens to one declared column
#[derive(Debug, Clone)]
enum ColumnPlan<'a> {
    Add,
    Alter {
        observed: &'a ObservedColumn,
        diff: ColumnDiff,
    },
    /// Lossy type change under force: drop and add back
    Recreate { observed: &'a ObservedColumn },
}

#[derive(Debug)]
pub struct TablePlan<'a> {
    pub table: &'a TableDefinition,
    /// `None` when the table is missing or forced
    observed: Option<&'a ObservedTable>,
    /// Whether a table existed before a forced recreate
    existed: bool,
    columns: Vec<(&'a ColumnDefinition, ColumnPlan<'a>)>,
    /// Observed name to declared name
    renames: HashMap<String, String>,
    /// Observed names of columns that are dropped and re-added
    recreated: HashSet<String>,
    /// Renames in every table of the sync, for foreign key targets
    referenced_renames: Renames,
}

impl<'a> TablePlan<'a> {
    pub fn new(table: &'a TableDefinition, observed: Option<&'a ObservedTable>, force: bool) -> Result<Self> {
        let mut plan = Self {
            table,
            observed: if force { None } else { observed },
            existed: observed.is_some(),
            columns: Vec::new(),
            renames: HashMap::new(),
            recreated: HashSet::new(),
            referenced_renames: Renames::new(),
        };

        let Some(observed) = plan.observed else {
            return Ok(plan);
        };

        for (declared, matched) in table.columns.iter().zip(match_columns(table, observed)) {
            let column_plan = match matched {
                None => ColumnPlan::Add,
                Some(observed_column) => plan.diff_column(declared, observed_column, observed)?,
            };

            match &column_plan {
                ColumnPlan::Recreate { observed } => {
                    plan.recreated.insert(observed.name.clone());
                }
                ColumnPlan::Alter { observed, .. } if observed.name != declared.name => {
                    plan.renames.insert(observed.name.clone(), declared.name.clone());
                }
                _ => {}
            }
            plan.columns.push((declared, column_plan));
        }

        Ok(plan)
    }

    fn diff_column(
        &self,
        declared: &'a ColumnDefinition,
        observed: &'a ObservedColumn,
        observed_table: &ObservedTable,
    ) -> Result<ColumnPlan<'a>> {
        let mut diff = ColumnDiff::default();

        let observed_type = types::parse(&observed.data_type);
        if !observed_type.same_storage(&declared.data_type) {
            if is_widening_allowed(&observed_type, &declared.data_type) {
                diff.data_type = Some((observed_type, declared.data_type.clone()));
            } else if declared.force {
                return Ok(ColumnPlan::Recreate { observed });
            } else {
                return Err(synchronization_error(format!(
                    "Changing {}.{} from {} to {} may lose data; set `force` on the column to drop and recreate it",
                    self.table.name, declared.name, observed_type, declared.data_type
                )));
            }
        }

        if observed.name != declared.name {
            diff.rename = Some((observed.name.clone(), declared.name.clone()));
        }

        if observed.nullable != declared.nullable {
            let sole_primary_key = observed_table.primary_key() == Some(&[observed.name.clone()][..]);
            // a single-column primary key stays NOT NULL
            if !(declared.nullable && sole_primary_key) {
                diff.nullable = Some(declared.nullable);
                if !declared.nullable {
                    diff.backfill = declared.default.clone();
                }
            }
        }

        if !defaults_match(declared.default.as_ref(), observed.default.as_deref()) {
            diff.default = Some(declared.default.clone());
        }

        if declared.collate != observed.collate {
            diff.collate = Some(declared.collate.clone());
        }

        diff.identity = identity_change(declared.identity.as_ref(), observed);

        Ok(ColumnPlan::Alter { observed, diff })
    }

    /// Columns renamed this sync, observed name to declared name
    pub fn renames(&self) -> &HashMap<String, String> {
        &self.renames
    }

    /// Let foreign keys follow columns renamed in the tables they reference
    pub fn set_referenced_renames(&mut self, renames: Renames) {
        self.referenced_renames = renames;
    }

    /// The table will be created from scratch this sync
    pub fn is_recreated(&self) -> bool {
        self.observed.is_none()
    }

    /// Create the table, or add and alter its columns
    pub fn column_changes(&self) -> ChangeSet {
        let mut changes = ChangeSet::new();
        let name = &self.table.name;

        if self.is_recreated() {
            if self.existed {
                changes.push(sql::drop_table(name));
            }
            changes.push(sql::create_table(self.table));
            return changes;
        }

        for (declared, plan) in &self.columns {
            match plan {
                ColumnPlan::Add => changes.push(sql::add_column(name, declared)),
                ColumnPlan::Recreate { observed } => {
                    changes.push(sql::drop_column(name, &observed.name));
                    changes.push(sql::add_column(name, declared));
                }
                ColumnPlan::Alter { diff, .. } => {
                    changes.extend(sql::alter_column(name, declared, diff))
                }
            }
        }
        changes
    }

    fn observed_extensions(&self, kind: ExtensionKind) -> Vec<ObservedExtension<'a>> {
        self.observed
            .map(|observed| {
                observed
                    .extensions(kind)
                    .map(|e| {
                        ObservedExtension::new(e, &self.renames, &self.referenced_renames, &self.recreated)
                    })
                    .filter(|e| !e.on_recreated_column)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether check comparison needs the server's rendering of the
    /// declared checks
    pub fn needs_canonical_checks(&self) -> bool {
        self.table.extensions(ExtensionKind::Check).next().is_some()
            && !self.observed_extensions(ExtensionKind::Check).is_empty()
    }

    /// Drop observed extensions of `kind` that nothing declared matches.
    /// `canonical_checks` lines up with the declared checks.
    pub fn cleanup(&self, kind: ExtensionKind, canonical_checks: &[String]) -> ChangeSet {
        let mut changes = ChangeSet::new();
        if self.is_recreated() {
            return changes;
        }

        for observed in self.observed_extensions(kind) {
            let declared = self
                .table
                .extensions(kind)
                .enumerate()
                .any(|(i, d)| structurally_equal(&d.body, canonical_checks.get(i).map(String::as_str), &observed.body));
            if !declared {
                changes.push_opt(sql::drop_extension(&self.table.name, observed.original));
            }
        }
        changes
    }

    /// Add declared extensions of `kind` with no structural match
    pub fn additions(&self, kind: ExtensionKind, canonical_checks: &[String]) -> ChangeSet {
        let observed = self.observed_extensions(kind);
        let mut changes = ChangeSet::new();

        for (i, declared) in self.table.extensions(kind).enumerate() {
            let canonical = canonical_checks.get(i).map(String::as_str);
            if !observed
                .iter()
                .any(|o| structurally_equal(&declared.body, canonical, &o.body))
            {
                changes.push(sql::add_extension(&self.table.name, declared));
            }
        }
        changes
    }

    /// Observed identity columns kept in place this sync
    pub fn materialized_identity_columns(&self) -> Vec<&'a ObservedColumn> {
        self.columns
            .iter()
            .filter(|(declared, _)| declared.identity.is_some())
            .filter_map(|(_, plan)| match plan {
                ColumnPlan::Alter { observed, .. } if observed.identity.is_some() => Some(*observed),
                _ => None,
            })
            .collect()
    }
}

/// Match each declared column to an observed one: by name first, then by
/// any former name among the columns nobody claimed.
fn match_columns<'a>(table: &TableDefinition, observed: &'a ObservedTable) -> Vec<Option<&'a ObservedColumn>> {
    let mut claimed = HashSet::new();
    let mut matches: Vec<Option<&ObservedColumn>> = table
        .columns
        .iter()
        .map(|declared| {
            let found = observed.column(&declared.name);
            if let Some(column) = found {
                claimed.insert(column.name.clone());
            }
            found
        })
        .collect();

    for (declared, slot) in table.columns.iter().zip(matches.iter_mut()) {
        if slot.is_some() {
            continue;
        }
        *slot = declared
            .former_names
            .iter()
            .filter(|former| !claimed.contains(*former))
            .find_map(|former| observed.column(former));
        if let Some(column) = slot {
            claimed.insert(column.name.clone());
        }
    }

    matches
}

fn identity_change(declared: Option<&Identity>, observed: &ObservedColumn) -> Option<IdentityChange> {
    match (declared, observed.identity) {
        (None, None) => None,
        (None, Some(_)) => Some(IdentityChange::Drop),
        (Some(identity), None) => Some(IdentityChange::Add(identity.clone())),
        (Some(identity), Some(generation)) => {
            let sequence = observed.identity_sequence;
            let differs = |declared: Option<i64>, observed: Option<i64>| match (declared, observed) {
                (Some(d), Some(o)) if d == o => None,
                (Some(d), _) => Some(d),
                (None, _) => None,
            };

            let generation = (identity.generation != generation).then_some(identity.generation);
            let start = differs(identity.start, sequence.map(|s| s.start));
            let increment = differs(identity.increment, sequence.map(|s| s.increment));
            let min = differs(identity.min, sequence.map(|s| s.min));
            let max = differs(identity.max, sequence.map(|s| s.max));
            let cycle = match (identity.cycle, sequence.map(|s| s.cycle)) {
                (Some(d), Some(o)) if d == o => None,
                (declared, _) => declared,
            };

            if generation.is_none()
                && start.is_none()
                && increment.is_none()
                && min.is_none()
                && max.is_none()
                && cycle.is_none()
            {
                None
            } else {
                Some(IdentityChange::Alter {
                    generation,
                    start,
                    increment,
                    min,
                    max,
                    cycle,
                })
            }
        }
    }
}
