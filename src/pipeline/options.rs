//! Per-call synchronization options

use crate::definition::ExtensionKind;
use serde::{Deserialize, Serialize};

/// Which observed extension kinds may be dropped when nothing declared
/// matches them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowClean {
    pub primary_key: bool,
    pub foreign_key: bool,
    pub unique: bool,
    pub check: bool,
    pub index: bool,
}

impl AllowClean {
    /// Every kind may be cleaned
    pub fn all() -> Self {
        Self {
            primary_key: true,
            foreign_key: true,
            unique: true,
            check: true,
            index: true,
        }
    }

    pub fn allows(&self, kind: ExtensionKind) -> bool {
        match kind {
            ExtensionKind::PrimaryKey => self.primary_key,
            ExtensionKind::ForeignKey => self.foreign_key,
            ExtensionKind::Unique => self.unique,
            ExtensionKind::Check => self.check,
            ExtensionKind::Index => self.index,
        }
    }
}

/// Options for a single `sync` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Drop and recreate every registered object
    pub force: bool,
    /// Wrap each stage in `BEGIN`/`COMMIT`
    pub transaction: bool,
    pub allow_clean: AllowClean,
    /// Restart identity sequences that fell behind their column's values
    pub adjust_identity_sequences: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            force: false,
            transaction: true,
            allow_clean: AllowClean::default(),
            adjust_identity_sequences: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = SyncOptions::default();
        assert!(options.transaction);
        assert!(!options.force);
        assert!(!options.allow_clean.allows(ExtensionKind::ForeignKey));
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let options: SyncOptions =
            serde_json::from_str(r#"{"allow_clean": {"index": true}}"#).unwrap();
        assert!(options.transaction);
        assert!(options.allow_clean.allows(ExtensionKind::Index));
        assert!(!options.allow_clean.allows(ExtensionKind::Unique));
    }
}
