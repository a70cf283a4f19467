//! Column definitions and default-value comparison

use crate::db::queries::quote_literal;
use crate::types::PgType;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TRAILING_CAST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"::(?:"[^"]+"|[a-z_][a-z0-9_ ]*)(?:\([0-9, ]*\))?(?:\[\])*$"#)
        .expect("valid cast regex")
});

// a cast applied directly to a quoted literal, anywhere in an expression
static LITERAL_CAST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(?P<literal>'(?:[^']|'')*')::(?:character varying|double precision|(?:timestamp|time)(?:\([0-9]+\))? with(?:out)? time zone|bit varying|"[^"]+"|(?:[a-z_][a-z0-9_]*\.)?[a-z_][a-z0-9_]*)(?:\([0-9, ]*\))?(?:\[\])*"#,
    )
    .expect("valid literal cast regex")
});

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Identity generation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityGeneration {
    #[serde(rename = "ALWAYS", alias = "always")]
    Always,
    #[serde(rename = "BY DEFAULT", alias = "by default")]
    ByDefault,
}

impl IdentityGeneration {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IdentityGeneration::Always => "ALWAYS",
            IdentityGeneration::ByDefault => "BY DEFAULT",
        }
    }
}

/// Declared identity options; unset sequence attributes are left to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub generation: IdentityGeneration,
    pub start: Option<i64>,
    pub increment: Option<i64>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub cycle: Option<bool>,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            generation: IdentityGeneration::ByDefault,
            start: None,
            increment: None,
            min: None,
            max: None,
            cycle: None,
        }
    }
}

/// Declared column default
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// A string, number or boolean literal
    Literal(serde_json::Value),
    /// A JSON document stored as a quoted literal
    Json(serde_json::Value),
    /// A raw SQL expression, inserted as written
    Sql(String),
}

impl DefaultValue {
    /// SQL text for `DEFAULT ...` clauses and backfills
    pub fn to_sql(&self) -> String {
        match self {
            DefaultValue::Literal(serde_json::Value::String(s)) => quote_literal(s),
            DefaultValue::Literal(serde_json::Value::Bool(b)) => {
                if *b { "TRUE" } else { "FALSE" }.to_string()
            }
            DefaultValue::Literal(other) => other.to_string(),
            DefaultValue::Json(value) => quote_literal(&value.to_string()),
            DefaultValue::Sql(expression) => expression.clone(),
        }
    }

    /// Does the server-rendered `observed` default express this value?
    pub fn matches(&self, raw: &str) -> bool {
        let observed = strip_casts(raw);
        match self {
            DefaultValue::Literal(serde_json::Value::String(s)) => {
                unquote(&observed).as_deref() == Some(s.as_str())
            }
            DefaultValue::Literal(serde_json::Value::Bool(b)) => {
                let text = unquote(&observed).unwrap_or(observed);
                matches!(
                    (text.to_lowercase().as_str(), b),
                    ("true" | "t", true) | ("false" | "f", false)
                )
            }
            DefaultValue::Literal(serde_json::Value::Number(n)) => {
                let text = unquote(&observed).unwrap_or(observed);
                match (text.trim().parse::<f64>(), n.as_f64()) {
                    (Ok(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            DefaultValue::Literal(other) => other.to_string() == observed,
            DefaultValue::Json(value) => unquote(&observed)
                .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
                .is_some_and(|parsed| &parsed == value),
            DefaultValue::Sql(expression) => {
                sql_expression(expression) == sql_expression(raw)
            }
        }
    }
}

/// Compare a declared default with the observed one
pub fn defaults_match(declared: Option<&DefaultValue>, observed: Option<&str>) -> bool {
    match (declared, observed) {
        (None, None) => true,
        (Some(declared), Some(observed)) => declared.matches(observed),
        _ => false,
    }
}

/// Strip literal `::type` casts and redundant outer parentheses
fn strip_casts(raw: &str) -> String {
    let mut text = raw.trim().to_string();
    loop {
        let before = text.len();
        if let Some(m) = TRAILING_CAST.find(&text) {
            // only when the cast applies to the whole expression
            if is_whole_operand(&text[..m.start()]) {
                text.truncate(m.start());
            }
        }
        if let Some(inner) = strip_outer_parens(&text) {
            text = inner.trim().to_string();
        }
        if text.len() == before {
            return text;
        }
    }
}

fn is_whole_operand(text: &str) -> bool {
    let text = text.trim();
    (text.starts_with('\'') && text.ends_with('\'') && text.len() >= 2)
        || strip_outer_parens(text).is_some()
        || !text.chars().any(|c| c.is_whitespace() || "()+-*/|".contains(c))
}

fn strip_outer_parens(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    let mut depth = 0i32;
    let mut in_string = false;
    for c in inner.chars() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    (depth == 0).then_some(inner)
}

/// Text of a single-quoted literal, with doubled quotes collapsed
fn unquote(text: &str) -> Option<String> {
    let text = text.trim();
    let inner = text
        .strip_prefix("E'")
        .or_else(|| text.strip_prefix('\''))?
        .strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}

/// Comparable form of a SQL expression: literal casts the server adds are
/// dropped wherever they appear
fn sql_expression(text: &str) -> String {
    let uncast = LITERAL_CAST.replace_all(text, "$literal");
    normalize_expression(&strip_casts(&uncast))
}

fn normalize_expression(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").to_lowercase()
}

/// A declared column, ready for comparison
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: PgType,
    pub nullable: bool,
    pub default: Option<DefaultValue>,
    pub collate: Option<String>,
    pub identity: Option<Identity>,
    /// Earlier names this column may still carry in the database
    pub former_names: Vec<String>,
    /// Drop and re-add the column when its type change is lossy
    pub force: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: PgType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            default: None,
            collate: None,
            identity: None,
            former_names: Vec::new(),
            force: false,
        }
    }

    /// Does this column answer to `name`, directly or through a former name?
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.former_names.iter().any(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_literal_defaults_ignore_casts() {
        let text = DefaultValue::Literal(json!("active"));
        assert!(text.matches("'active'::character varying"));
        assert!(!text.matches("'inactive'::character varying"));

        let number = DefaultValue::Literal(json!(1.5));
        assert!(number.matches("1.50"));
        assert!(number.matches("'1.5'::numeric"));

        let flag = DefaultValue::Literal(json!(false));
        assert!(flag.matches("false"));
        assert!(!flag.matches("true"));
    }

    #[test]
    fn test_json_defaults_compare_as_values() {
        let value = DefaultValue::Json(json!({"a": 1, "b": [true]}));
        assert!(value.matches(r#"'{"b": [true], "a": 1}'::jsonb"#));
        assert_eq!(value.to_sql(), r#"'{"a":1,"b":[true]}'"#);
    }

    #[test]
    fn test_sql_defaults_normalize_whitespace_and_case() {
        let expression = DefaultValue::Sql("NOW()".to_string());
        assert!(expression.matches("now()"));
        let sum = DefaultValue::Sql("1 +  2".to_string());
        assert!(sum.matches("(1 + 2)"));
    }

    #[test]
    fn test_sql_defaults_ignore_embedded_literal_casts() {
        let next = DefaultValue::Sql("nextval('ids')".to_string());
        assert!(next.matches("nextval('ids'::regclass)"));
        assert!(!next.matches("nextval('other_ids'::regclass)"));

        let joined = DefaultValue::Sql("'a' || 'b'".to_string());
        assert!(joined.matches("('a'::text || 'b'::text)"));

        let stamp = DefaultValue::Sql("'2020-01-01'::timestamp".to_string());
        assert!(!stamp.matches("'2020-01-01 00:00:00'::timestamp without time zone"));
        assert!(stamp.matches("'2020-01-01'::timestamp without time zone"));

        let quoted = DefaultValue::Sql("lower('A::B')".to_string());
        assert!(quoted.matches("lower('A::B'::text)"));
    }

    #[test]
    fn test_missing_defaults() {
        assert!(defaults_match(None, None));
        assert!(!defaults_match(None, Some("0")));
        assert!(!defaults_match(Some(&DefaultValue::Literal(json!(0))), None));
    }

    #[test]
    fn test_literal_rendering_escapes_quotes() {
        assert_eq!(DefaultValue::Literal(json!("it's")).to_sql(), "'it''s'");
        assert_eq!(DefaultValue::Literal(json!(true)).to_sql(), "TRUE");
        assert_eq!(DefaultValue::Literal(json!(42)).to_sql(), "42");
    }
}
