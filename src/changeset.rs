//! Change set
//!
//! Ordered, duplicate-suppressing collection of SQL statements. The first
//! occurrence of a statement fixes its position; later duplicates are
//! dropped.

use indexmap::IndexSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    statements: IndexSet<String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, statement: impl Into<String>) {
        self.statements.insert(statement.into());
    }

    /// Push a statement a generator may have declined to produce
    pub fn push_opt(&mut self, statement: Option<String>) {
        if let Some(statement) = statement {
            self.push(statement);
        }
    }

    /// Concatenate `other` after the statements already held
    pub fn append(&mut self, other: ChangeSet) {
        self.statements.extend(other.statements);
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.statements.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.statements.into_iter().collect()
    }
}

impl Extend<String> for ChangeSet {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.statements.extend(iter);
    }
}

impl FromIterator<String> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            statements: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_duplicates_keep_first_position() {
        let mut changes = ChangeSet::new();
        changes.push("A");
        changes.push("B");
        changes.push("A");
        changes.push_opt(None);
        changes.extend(vec!["C".to_string(), "B".to_string()]);

        assert_eq!(changes.into_vec(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_append_preserves_left_to_right_order() {
        let mut left: ChangeSet = vec!["A".to_string(), "B".to_string()].into_iter().collect();
        let right: ChangeSet = vec!["B".to_string(), "C".to_string()].into_iter().collect();
        left.append(right);

        assert_eq!(left.len(), 3);
        assert_eq!(left.iter().collect::<Vec<_>>(), vec!["A", "B", "C"]);
    }
}
