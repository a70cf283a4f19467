//! Type normalizer
//!
//! Parses textual type expressions (`varchar(255)`, `timestamptz(3)[]`,
//! `int8`, ...) into a canonical [`PgType`]. Parsing is pure and idempotent:
//! `parse(&parse(x).canonical()) == parse(x)`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static ARRAY_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\[\s*\d*\s*\]\s*$").expect("valid array suffix regex"));

static PARAMETERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<head>[^()]*?)\s*\((?P<args>[^()]*)\)\s*(?P<tail>[^()]*)$")
        .expect("valid parameter list regex")
});

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// A single type parameter, numeric where parseable
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeArgument {
    Number(i64),
    Text(String),
}

impl TypeArgument {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        raw.parse::<i64>()
            .map(TypeArgument::Number)
            .unwrap_or_else(|_| TypeArgument::Text(raw.to_string()))
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            TypeArgument::Number(n) => Some(*n),
            TypeArgument::Text(_) => None,
        }
    }
}

impl fmt::Display for TypeArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeArgument::Number(n) => write!(f, "{}", n),
            TypeArgument::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Canonical structural form of a column type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PgType {
    /// Canonical long-form name, e.g. `character varying`
    pub name: String,
    pub arguments: Vec<TypeArgument>,
    /// Number of array dimensions
    pub dimensions: usize,
}

impl PgType {
    /// Numeric argument at `index`, if present and numeric
    pub fn number_argument(&self, index: usize) -> Option<i64> {
        self.arguments.get(index).and_then(TypeArgument::as_number)
    }

    /// Whether this is one of the integer types an identity column accepts
    pub fn is_integer(&self) -> bool {
        self.dimensions == 0 && matches!(self.name.as_str(), "smallint" | "integer" | "bigint")
    }

    /// Whether values of both types are stored alike. PostgreSQL does not
    /// enforce declared array dimensions and `format_type` prints a single
    /// `[]` for any array, so only array-ness is compared.
    pub fn same_storage(&self, other: &PgType) -> bool {
        self.name == other.name
            && self.arguments == other.arguments
            && (self.dimensions > 0) == (other.dimensions > 0)
    }

    /// The canonical textual rendering, as PostgreSQL's `format_type` would
    /// print it.
    pub fn canonical(&self) -> String {
        let mut out = if self.arguments.is_empty() {
            self.name.clone()
        } else {
            let args = self
                .arguments
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");

            // time(3) with time zone: the parameter goes before the zone qualifier
            match zone_qualifier_split(&self.name) {
                Some((base, zone)) => format!("{}({}) {}", base, args, zone),
                None => format!("{}({})", self.name, args),
            }
        };

        for _ in 0..self.dimensions {
            out.push_str("[]");
        }
        out
    }
}

impl fmt::Display for PgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Parse a textual type expression into its canonical form
pub fn parse(raw: &str) -> PgType {
    let mut text = WHITESPACE.replace_all(raw.trim(), " ").into_owned();
    if !text.contains('"') {
        text = text.to_lowercase();
    }

    let mut dimensions = 0;
    loop {
        if let Some(m) = ARRAY_SUFFIX.find(&text) {
            text.truncate(m.start());
            dimensions += 1;
        } else if let Some(stripped) = text.strip_suffix(" array") {
            text = stripped.trim_end().to_string();
            dimensions += 1;
        } else {
            break;
        }
    }

    let (name, mut arguments) = match PARAMETERS.captures(&text) {
        Some(caps) => {
            let head = caps["head"].trim();
            let tail = caps["tail"].trim();
            let name = if tail.is_empty() {
                head.to_string()
            } else {
                format!("{} {}", head, tail)
            };
            let args = caps["args"]
                .split(',')
                .filter(|a| !a.trim().is_empty())
                .map(TypeArgument::parse)
                .collect::<Vec<_>>();
            (name, args)
        }
        None => (text.trim().to_string(), Vec::new()),
    };

    let mut name = resolve_alias(&name).to_string();

    match name.as_str() {
        // float(p) picks its storage from the requested precision
        "float" => {
            name = match arguments.first().and_then(TypeArgument::as_number) {
                Some(p) if p <= 24 => "real".to_string(),
                _ => "double precision".to_string(),
            };
            arguments.clear();
        }
        "numeric" if arguments.len() == 1 => arguments.push(TypeArgument::Number(0)),
        "character" | "bit" if arguments.is_empty() => arguments.push(TypeArgument::Number(1)),
        _ => {}
    }

    PgType {
        name,
        arguments,
        dimensions,
    }
}

fn resolve_alias(name: &str) -> &str {
    match name {
        "int" | "int4" | "integer" => "integer",
        "int2" | "smallint" => "smallint",
        "int8" | "bigint" => "bigint",
        "float4" | "real" => "real",
        "float8" | "double precision" => "double precision",
        "float" => "float",
        "decimal" | "numeric" => "numeric",
        "varchar" | "character varying" => "character varying",
        "char" | "character" | "bpchar" => "character",
        "bool" | "boolean" => "boolean",
        "varbit" | "bit varying" => "bit varying",
        "timestamp" | "timestamp without time zone" => "timestamp without time zone",
        "timestamptz" | "timestamp with time zone" => "timestamp with time zone",
        "time" | "time without time zone" => "time without time zone",
        "timetz" | "time with time zone" => "time with time zone",
        other => other,
    }
}

fn zone_qualifier_split(name: &str) -> Option<(&str, &str)> {
    ["time", "timestamp"].iter().find_map(|base| {
        let rest = name.strip_prefix(base)?.strip_prefix(' ')?;
        matches!(rest, "with time zone" | "without time zone").then_some((*base, rest))
    })
}
