//! Identity sequence actualization
//!
//! Rows inserted with explicit identity values bypass the backing sequence,
//! which then hands out values that already exist. For every identity
//! column already materialized, find the furthest in-range value past the
//! sequence position and restart the sequence one step beyond it.

use crate::changeset::ChangeSet;
use crate::db::{queries, Database};
use crate::definition::ObjectName;
use crate::error::{Error, Result};
use crate::introspection::ObservedColumn;
use crate::query::sequence as sql;
use tracing::{debug, warn};

struct SequenceState {
    increment: i64,
    min: i64,
    max: i64,
    current: i64,
    called: bool,
}

async fn sequence_state(db: &dyn Database, sequence: &str) -> Result<SequenceState> {
    let rows = db
        .query(&queries::sequence_state(sequence), &[&sequence])
        .await?;
    let row = rows
        .first()
        .ok_or_else(|| Error::Query(format!("sequence {} not found", sequence)))?;

    Ok(SequenceState {
        increment: row.require_i64("increment")?,
        min: row.require_i64("min")?,
        max: row.require_i64("max")?,
        current: row.require_i64("current")?,
        called: row.get_bool("called")?.unwrap_or(false),
    })
}

/// Restart statements for the identity sequences of `columns` that fell
/// behind the values stored in `table`
pub async fn actualize_identity(
    db: &dyn Database,
    table: &ObjectName,
    columns: &[&ObservedColumn],
) -> Result<ChangeSet> {
    let mut changes = ChangeSet::new();

    for column in columns {
        let rows = db
            .query(queries::IDENTITY_SEQUENCE, &[&queries::relation(table), &column.name])
            .await?;
        let Some(sequence) = rows.first().and_then(|row| row.get("sequence")).map(str::to_string) else {
            continue;
        };

        let state = sequence_state(db, &sequence).await?;
        let ascending = state.increment > 0;

        // an uncalled sequence hands out `current` itself next
        let rows = if ascending {
            let floor = if state.called { state.current } else { state.current.saturating_sub(1) };
            db.query(&queries::max_value_above(table, &column.name), &[&floor, &state.max])
                .await?
        } else {
            let ceiling = if state.called { state.current } else { state.current.saturating_add(1) };
            db.query(&queries::min_value_below(table, &column.name), &[&ceiling, &state.min])
                .await?
        };

        let Some(value) = rows.first().map(|row| row.get_i64("value")).transpose()?.flatten() else {
            debug!(table = %table, column = %column.name, "Identity sequence is up to date");
            continue;
        };

        match value.checked_add(state.increment) {
            Some(next) if next >= state.min && next <= state.max => {
                changes.push(sql::restart_sequence(&sequence, next));
            }
            _ => warn!(
                table = %table,
                column = %column.name,
                value,
                "Identity sequence {} cannot move past {} within its bounds; skipping restart",
                sequence,
                value
            ),
        }
    }

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Row, Value};
    use crate::testing::MockDatabase;
    use pretty_assertions::assert_eq;

    fn id_column() -> ObservedColumn {
        let mut column = ObservedColumn::new("id", "bigint");
        column.identity = Some(crate::definition::IdentityGeneration::ByDefault);
        column
    }

    fn database(current: i64, called: bool, value: Option<i64>) -> MockDatabase {
        MockDatabase::new()
            .respond(
                "pg_get_serial_sequence",
                vec![Row::new([("sequence", "public.users_id_seq")])],
            )
            .respond(
                "FROM pg_sequence s, public.users_id_seq q",
                vec![Row::new([
                    ("increment", Value::from(1i64)),
                    ("min", Value::from(1i64)),
                    ("max", Value::from(100i64)),
                    ("current", Value::from(current)),
                    ("called", Value::from(called)),
                ])],
            )
            .respond("SELECT max(\"id\")", vec![Row::new([("value", value)])])
    }

    #[tokio::test]
    async fn test_restarts_past_drifted_values() {
        let db = database(3, true, Some(41));
        let table = ObjectName::new("public", "users");
        let column = id_column();

        let changes = actualize_identity(&db, &table, &[&column]).await.unwrap();
        assert_eq!(
            changes.into_vec(),
            vec!["ALTER SEQUENCE public.users_id_seq RESTART WITH 42"]
        );
        assert_eq!(
            db.parameters("pg_get_serial_sequence"),
            Some(vec!["\"public\".\"users\"".to_string(), "id".to_string()])
        );
        assert_eq!(
            db.parameters("SELECT max(\"id\")"),
            Some(vec!["3".to_string(), "100".to_string()])
        );
    }

    #[tokio::test]
    async fn test_uncalled_sequence_counts_its_current_value() {
        let db = database(42, false, None);
        let table = ObjectName::new("public", "users");
        let column = id_column();

        let changes = actualize_identity(&db, &table, &[&column]).await.unwrap();
        assert!(changes.is_empty());
        assert_eq!(
            db.parameters("SELECT max(\"id\")"),
            Some(vec!["41".to_string(), "100".to_string()])
        );
    }

    #[tokio::test]
    async fn test_restart_beyond_bounds_is_skipped() {
        let db = database(3, true, Some(100));
        let table = ObjectName::new("public", "users");
        let column = id_column();

        let changes = actualize_identity(&db, &table, &[&column]).await.unwrap();
        assert!(changes.is_empty());
    }
}
