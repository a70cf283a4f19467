//! Structural extension matching
//!
//! Extensions are compared by shape only: ordered columns for keys and
//! indexes, the full reference and its options for foreign keys, and the
//! server's canonical rendering for checks. Names never participate.

use crate::db::queries::quote_ident;
use crate::definition::{ExtensionBody, ExtensionDefinition, ObjectName};
use std::collections::{HashMap, HashSet};

/// Observed name to declared name, per table
pub type Renames = HashMap<ObjectName, HashMap<String, String>>;

/// Observed extension rewritten into declared column names
#[derive(Debug, Clone)]
pub struct ObservedExtension<'a> {
    pub original: &'a ExtensionDefinition,
    pub body: ExtensionBody,
    /// Covers a column that is being dropped and re-added
    pub on_recreated_column: bool,
}

impl<'a> ObservedExtension<'a> {
    /// `renames` covers this table's columns, `referenced` those of every
    /// table a foreign key may point at
    pub fn new(
        original: &'a ExtensionDefinition,
        renames: &HashMap<String, String>,
        referenced: &Renames,
        recreated: &HashSet<String>,
    ) -> Self {
        let body = match original
            .body
            .map_columns(|c| renames.get(c).cloned().unwrap_or_else(|| c.to_string()))
        {
            ExtensionBody::Check(definition) => ExtensionBody::Check(rename_identifiers(&definition, renames)),
            ExtensionBody::ForeignKey(mut fk) => {
                if let Some(target) = referenced.get(&fk.references.table) {
                    for column in fk.references.columns.iter_mut() {
                        if let Some(name) = target.get(column.as_str()) {
                            *column = name.clone();
                        }
                    }
                }
                ExtensionBody::ForeignKey(fk)
            }
            other => other,
        };

        Self {
            original,
            body,
            on_recreated_column: original.body.columns().iter().any(|c| recreated.contains(c)),
        }
    }
}

/// Rewrite column references in a server-rendered check definition. String
/// literals, qualified names, cast targets and function names are left alone.
fn rename_identifiers(definition: &str, renames: &HashMap<String, String>) -> String {
    if renames.is_empty() {
        return definition.to_string();
    }

    let chars: Vec<char> = definition.chars().collect();
    let mut out = String::with_capacity(definition.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            let end = closing_quote(&chars, i, '\'');
            out.extend(&chars[i..end]);
            i = end;
        } else if c == '"' || c.is_alphabetic() || c == '_' {
            let (word, end) = if c == '"' {
                let end = closing_quote(&chars, i, '"');
                let inner: String = chars[i + 1..end.saturating_sub(1).max(i + 1)].iter().collect();
                (inner.replace("\"\"", "\""), end)
            } else {
                let mut end = i;
                while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_' || chars[end] == '$') {
                    end += 1;
                }
                (chars[i..end].iter().collect(), end)
            };

            let qualified = out.ends_with('.') || out.ends_with("::");
            let called = chars[end..].iter().find(|c| !c.is_whitespace()) == Some(&'(');
            match renames.get(&word) {
                Some(name) if !qualified && !called => out.push_str(&render_identifier(name)),
                _ => out.extend(&chars[i..end]),
            }
            i = end;
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

/// Index just past the quote closing the one at `start`; doubled quotes
/// are escapes
fn closing_quote(chars: &[char], start: usize, quote: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

fn render_identifier(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if plain {
        name.to_string()
    } else {
        quote_ident(name)
    }
}

/// Does a declared extension describe the observed one? `canonical` is the
/// server rendering of a declared check, when one was computed.
pub fn structurally_equal(declared: &ExtensionBody, canonical: Option<&str>, observed: &ExtensionBody) -> bool {
    match (declared, observed) {
        (ExtensionBody::Check(_), ExtensionBody::Check(rendered)) => {
            canonical.is_some_and(|c| c == rendered)
        }
        _ => declared == observed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{ForeignKey, MatchType, ObjectName, Reference, ReferentialAction};

    fn fk(on_delete: ReferentialAction) -> ExtensionBody {
        ExtensionBody::ForeignKey(ForeignKey {
            columns: vec!["role".to_string()],
            references: Reference {
                table: ObjectName::new("public", "roles"),
                columns: vec!["id".to_string()],
            },
            on_update: ReferentialAction::NoAction,
            on_delete,
            match_type: MatchType::Simple,
        })
    }

    #[test]
    fn test_names_are_ignored() {
        let declared = ExtensionDefinition::new(ExtensionBody::Unique(vec!["id".to_string()]));
        let observed = ExtensionDefinition::named("x_id_key", ExtensionBody::Unique(vec!["id".to_string()]));
        assert!(structurally_equal(&declared.body, None, &observed.body));
    }

    #[test]
    fn test_column_order_matters() {
        let declared = ExtensionBody::Index(vec!["a".to_string(), "b".to_string()]);
        let observed = ExtensionBody::Index(vec!["b".to_string(), "a".to_string()]);
        assert!(!structurally_equal(&declared, None, &observed));
    }

    #[test]
    fn test_foreign_key_options_participate() {
        assert!(structurally_equal(&fk(ReferentialAction::Cascade), None, &fk(ReferentialAction::Cascade)));
        assert!(!structurally_equal(&fk(ReferentialAction::Cascade), None, &fk(ReferentialAction::NoAction)));
    }

    #[test]
    fn test_checks_compare_canonical_form() {
        let declared = ExtensionBody::Check("id>10".to_string());
        let observed = ExtensionBody::Check("CHECK ((id > 10))".to_string());
        assert!(structurally_equal(&declared, Some("CHECK ((id > 10))"), &observed));
        assert!(!structurally_equal(&declared, None, &observed));
    }

    #[test]
    fn test_observed_columns_follow_renames() {
        let observed = ExtensionDefinition::named("t_mail_key", ExtensionBody::Unique(vec!["mail".to_string()]));
        let renames = HashMap::from([("mail".to_string(), "email".to_string())]);
        let mapped = ObservedExtension::new(&observed, &renames, &Renames::new(), &HashSet::new());
        assert_eq!(mapped.body, ExtensionBody::Unique(vec!["email".to_string()]));
        assert!(!mapped.on_recreated_column);

        let recreated = HashSet::from(["mail".to_string()]);
        assert!(ObservedExtension::new(&observed, &renames, &Renames::new(), &recreated).on_recreated_column);
    }

    #[test]
    fn test_check_definitions_follow_renames() {
        let observed = ExtensionDefinition::named(
            "t_mail_check",
            ExtensionBody::Check("CHECK ((mail <> 'mail'::text) AND (lower(mail) = mail))".to_string()),
        );
        let renames = HashMap::from([
            ("mail".to_string(), "email".to_string()),
            ("lower".to_string(), "other".to_string()),
        ]);
        let mapped = ObservedExtension::new(&observed, &renames, &Renames::new(), &HashSet::new());
        assert_eq!(
            mapped.body,
            ExtensionBody::Check("CHECK ((email <> 'mail'::text) AND (lower(email) = email))".to_string())
        );

        let quoted = HashMap::from([("mail".to_string(), "eMail".to_string())]);
        let mapped = ObservedExtension::new(&observed, &quoted, &Renames::new(), &HashSet::new());
        assert_eq!(
            mapped.body,
            ExtensionBody::Check("CHECK ((\"eMail\" <> 'mail'::text) AND (lower(\"eMail\") = \"eMail\"))".to_string())
        );
    }

    #[test]
    fn test_referenced_columns_follow_the_referenced_table() {
        let observed = ExtensionDefinition::named("t_role_fkey", fk(ReferentialAction::Cascade));
        let mut body = fk(ReferentialAction::Cascade);
        if let ExtensionBody::ForeignKey(key) = &mut body {
            key.references.columns = vec!["role_id".to_string()];
        }

        let referenced = Renames::from([(
            ObjectName::new("public", "roles"),
            HashMap::from([("id".to_string(), "role_id".to_string())]),
        )]);
        let mapped = ObservedExtension::new(&observed, &HashMap::new(), &referenced, &HashSet::new());
        assert_eq!(mapped.body, body);

        let elsewhere = Renames::from([(
            ObjectName::new("public", "users"),
            HashMap::from([("id".to_string(), "role_id".to_string())]),
        )]);
        let untouched = ObservedExtension::new(&observed, &HashMap::new(), &elsewhere, &HashSet::new());
        assert_eq!(untouched.body, fk(ReferentialAction::Cascade));
    }
}
