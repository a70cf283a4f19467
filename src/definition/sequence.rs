//! Sequence definitions

use super::ObjectName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer type backing a sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceType {
    Smallint,
    Integer,
    #[default]
    Bigint,
}

impl SequenceType {
    pub fn parse(raw: &str) -> Option<Self> {
        match crate::types::parse(raw).name.as_str() {
            "smallint" => Some(SequenceType::Smallint),
            "integer" => Some(SequenceType::Integer),
            "bigint" => Some(SequenceType::Bigint),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SequenceType::Smallint => "smallint",
            SequenceType::Integer => "integer",
            SequenceType::Bigint => "bigint",
        }
    }

    pub fn bounds(&self) -> (i64, i64) {
        match self {
            SequenceType::Smallint => (i16::MIN as i64, i16::MAX as i64),
            SequenceType::Integer => (i32::MIN as i64, i32::MAX as i64),
            SequenceType::Bigint => (i64::MIN, i64::MAX),
        }
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Concrete sequence attributes, as the server reports them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceAttributes {
    #[serde(rename = "type")]
    pub data_type: SequenceType,
    pub start: i64,
    pub increment: i64,
    pub min: i64,
    pub max: i64,
    pub cycle: bool,
}

/// A declared sequence. Unset bounds fall back to the server defaults for
/// the backing type and direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceDefinition {
    pub name: ObjectName,
    pub data_type: SequenceType,
    pub start: Option<i64>,
    pub increment: i64,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub cycle: bool,
}

impl SequenceDefinition {
    pub fn new(name: ObjectName) -> Self {
        Self {
            name,
            data_type: SequenceType::default(),
            start: None,
            increment: 1,
            min: None,
            max: None,
            cycle: false,
        }
    }

    /// Fill unset attributes with the values `CREATE SEQUENCE` would pick
    pub fn resolved(&self) -> SequenceAttributes {
        let (type_min, type_max) = self.data_type.bounds();
        let (default_min, default_max) = if self.increment > 0 {
            (1, type_max)
        } else {
            (type_min, -1)
        };
        let min = self.min.unwrap_or(default_min);
        let max = self.max.unwrap_or(default_max);
        let start = self
            .start
            .unwrap_or(if self.increment > 0 { min } else { max });

        SequenceAttributes {
            data_type: self.data_type,
            start,
            increment: self.increment,
            min,
            max,
            cycle: self.cycle,
        }
    }
}
