//! Sequence statements

use crate::definition::{ObjectName, SequenceDefinition, SequenceType};

/// Sparse sequence diff. For `min`/`max`, `Some(None)` restores the type
/// default (`NO MINVALUE` / `NO MAXVALUE`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceDiff {
    pub data_type: Option<SequenceType>,
    pub start: Option<i64>,
    pub increment: Option<i64>,
    pub min: Option<Option<i64>>,
    pub max: Option<Option<i64>>,
    pub cycle: Option<bool>,
}

impl SequenceDiff {
    fn clauses(&self) -> Vec<String> {
        let mut clauses = Vec::new();
        if let Some(data_type) = self.data_type {
            clauses.push(format!("AS {}", data_type));
        }
        if let Some(start) = self.start {
            clauses.push(format!("START WITH {}", start));
        }
        if let Some(increment) = self.increment {
            clauses.push(format!("INCREMENT BY {}", increment));
        }
        match self.min {
            Some(Some(min)) => clauses.push(format!("MINVALUE {}", min)),
            Some(None) => clauses.push("NO MINVALUE".to_string()),
            None => {}
        }
        match self.max {
            Some(Some(max)) => clauses.push(format!("MAXVALUE {}", max)),
            Some(None) => clauses.push("NO MAXVALUE".to_string()),
            None => {}
        }
        match self.cycle {
            Some(true) => clauses.push("CYCLE".to_string()),
            Some(false) => clauses.push("NO CYCLE".to_string()),
            None => {}
        }
        clauses
    }
}

pub fn create_sequence(sequence: &SequenceDefinition) -> String {
    let diff = SequenceDiff {
        data_type: Some(sequence.data_type),
        start: sequence.start,
        increment: Some(sequence.increment),
        min: Some(sequence.min),
        max: Some(sequence.max),
        cycle: Some(sequence.cycle),
    };
    format!(
        "CREATE SEQUENCE {} {}",
        sequence.name.quoted(),
        diff.clauses().join(" ")
    )
}

pub fn drop_sequence(name: &ObjectName) -> String {
    format!("DROP SEQUENCE IF EXISTS {}", name.quoted())
}

/// `None` when the diff carries no clause
pub fn alter_sequence(name: &ObjectName, diff: &SequenceDiff) -> Option<String> {
    let clauses = diff.clauses();
    if clauses.is_empty() {
        return None;
    }
    Some(format!("ALTER SEQUENCE {} {}", name.quoted(), clauses.join(" ")))
}

/// Restart a sequence given by its server-rendered qualified name
pub fn restart_sequence(sequence: &str, value: i64) -> String {
    format!("ALTER SEQUENCE {} RESTART WITH {}", sequence, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_sequence() {
        let mut seq = SequenceDefinition::new(ObjectName::new("public", "ids"));
        seq.start = Some(100);
        seq.max = Some(1000);
        assert_eq!(
            create_sequence(&seq),
            "CREATE SEQUENCE \"public\".\"ids\" AS bigint START WITH 100 INCREMENT BY 1 NO MINVALUE MAXVALUE 1000 NO CYCLE"
        );
    }

    #[test]
    fn test_empty_diff_yields_nothing() {
        let name = ObjectName::new("public", "ids");
        assert_eq!(alter_sequence(&name, &SequenceDiff::default()), None);

        let diff = SequenceDiff {
            increment: Some(2),
            min: Some(None),
            cycle: Some(true),
            ..SequenceDiff::default()
        };
        assert_eq!(
            alter_sequence(&name, &diff).unwrap(),
            "ALTER SEQUENCE \"public\".\"ids\" INCREMENT BY 2 NO MINVALUE CYCLE"
        );
    }
}
