//! Sequence model

use crate::changeset::ChangeSet;
use crate::definition::{SequenceAttributes, SequenceDefinition};
use crate::error::{synchronization_error, Result};
use crate::query::sequence as sql;
use crate::query::SequenceDiff;

/// Diff declared against observed attributes. Raising `min` or lowering
/// `max` could orphan values already handed out and is refused.
pub fn sequence_diff(declared: &SequenceDefinition, observed: &SequenceAttributes) -> Result<SequenceDiff> {
    let target = declared.resolved();
    let mut diff = SequenceDiff::default();

    if target.data_type != observed.data_type {
        diff.data_type = Some(target.data_type);
    }
    if target.start != observed.start {
        diff.start = Some(target.start);
    }
    if target.increment != observed.increment {
        diff.increment = Some(target.increment);
    }
    if target.min != observed.min {
        if target.min > observed.min {
            return Err(synchronization_error(format!(
                "Raising the minimum of sequence {} from {} to {} is not supported",
                declared.name, observed.min, target.min
            )));
        }
        diff.min = Some(declared.min);
    }
    if target.max != observed.max {
        if target.max < observed.max {
            return Err(synchronization_error(format!(
                "Lowering the maximum of sequence {} from {} to {} is not supported",
                declared.name, observed.max, target.max
            )));
        }
        diff.max = Some(declared.max);
    }
    if target.cycle != observed.cycle {
        diff.cycle = Some(target.cycle);
    }

    Ok(diff)
}

/// Create, recreate or alter a sequence
pub fn sequence_changes(
    declared: &SequenceDefinition,
    observed: Option<&SequenceAttributes>,
    force: bool,
) -> Result<ChangeSet> {
    let mut changes = ChangeSet::new();

    match observed {
        None => changes.push(sql::create_sequence(declared)),
        Some(_) if force => {
            changes.push(sql::drop_sequence(&declared.name));
            changes.push(sql::create_sequence(declared));
        }
        Some(observed) => {
            let diff = sequence_diff(declared, observed)?;
            changes.push_opt(sql::alter_sequence(&declared.name, &diff));
        }
    }

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{ObjectName, SequenceType};
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    fn ids() -> SequenceDefinition {
        SequenceDefinition::new(ObjectName::new("public", "ids"))
    }

    fn live() -> SequenceAttributes {
        ids().resolved()
    }

    #[test]
    fn test_unchanged_sequence_emits_nothing() {
        assert!(sequence_changes(&ids(), Some(&live()), false).unwrap().is_empty());
    }

    #[test]
    fn test_missing_sequence_is_created() {
        assert_eq!(
            sequence_changes(&ids(), None, false).unwrap().into_vec(),
            vec!["CREATE SEQUENCE \"public\".\"ids\" AS bigint INCREMENT BY 1 NO MINVALUE NO MAXVALUE NO CYCLE"]
        );
    }

    #[test]
    fn test_force_recreates() {
        let changes = sequence_changes(&ids(), Some(&live()), true).unwrap().into_vec();
        assert_eq!(changes[0], "DROP SEQUENCE IF EXISTS \"public\".\"ids\"");
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_raising_min_is_rejected() {
        let mut declared = ids();
        declared.min = Some(2);
        declared.start = Some(2);
        let err = sequence_changes(&declared, Some(&live()), false).unwrap_err();
        assert!(matches!(err, Error::Synchronization(_)));
    }

    #[test]
    fn test_lowering_max_via_type_is_rejected() {
        let mut declared = ids();
        declared.data_type = SequenceType::Integer;
        assert!(sequence_changes(&declared, Some(&live()), false).is_err());
    }

    #[test]
    fn test_widening_and_options() {
        let mut declared = ids();
        declared.increment = 5;
        declared.cycle = true;
        let mut observed = live();
        observed.max = 1000;

        assert_eq!(
            sequence_changes(&declared, Some(&observed), false).unwrap().into_vec(),
            vec!["ALTER SEQUENCE \"public\".\"ids\" INCREMENT BY 5 NO MAXVALUE CYCLE"]
        );
    }
}
