//! Table, column and extension statements

use crate::db::queries::quote_ident;
use crate::definition::{
    ColumnDefinition, DefaultValue, ExtensionBody, ExtensionDefinition, Identity,
    IdentityGeneration, MatchType, ObjectName, TableDefinition,
};
use crate::types::PgType;

/// Change to a column's identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityChange {
    Add(Identity),
    Drop,
    /// Only the attributes that differ are set
    Alter {
        generation: Option<IdentityGeneration>,
        start: Option<i64>,
        increment: Option<i64>,
        min: Option<i64>,
        max: Option<i64>,
        cycle: Option<bool>,
    },
}

/// Sparse per-column diff. `None` means unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnDiff {
    /// `(previous name, declared name)`
    pub rename: Option<(String, String)>,
    pub nullable: Option<bool>,
    /// Value used to fill NULLs before `SET NOT NULL`
    pub backfill: Option<DefaultValue>,
    /// `(observed, declared)`
    pub data_type: Option<(PgType, PgType)>,
    /// `Some(None)` drops the default
    pub default: Option<Option<DefaultValue>>,
    /// `Some(None)` resets to the type's default collation
    pub collate: Option<Option<String>>,
    pub identity: Option<IdentityChange>,
}

impl ColumnDiff {
    pub fn is_empty(&self) -> bool {
        self.rename.is_none()
            && self.nullable.is_none()
            && self.data_type.is_none()
            && self.default.is_none()
            && self.collate.is_none()
            && self.identity.is_none()
    }
}

fn quote_columns(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn collate_clause(collate: &Option<String>) -> String {
    match collate {
        Some(collation) => format!(" COLLATE {}", quote_ident(collation)),
        None => String::new(),
    }
}

fn identity_options(identity: &Identity) -> String {
    let mut options = Vec::new();
    if let Some(start) = identity.start {
        options.push(format!("START WITH {}", start));
    }
    if let Some(increment) = identity.increment {
        options.push(format!("INCREMENT BY {}", increment));
    }
    if let Some(min) = identity.min {
        options.push(format!("MINVALUE {}", min));
    }
    if let Some(max) = identity.max {
        options.push(format!("MAXVALUE {}", max));
    }
    match identity.cycle {
        Some(true) => options.push("CYCLE".to_string()),
        Some(false) => options.push("NO CYCLE".to_string()),
        None => {}
    }

    if options.is_empty() {
        String::new()
    } else {
        format!(" ({})", options.join(" "))
    }
}

/// Column clause for `CREATE TABLE` and `ADD COLUMN`. Scratch tables get
/// neither defaults nor identity.
pub fn column_clause(column: &ColumnDefinition, scratch: bool) -> String {
    let mut clause = format!(
        "{} {}{}",
        quote_ident(&column.name),
        column.data_type,
        collate_clause(&column.collate)
    );

    if !scratch {
        if let Some(default) = &column.default {
            clause.push_str(&format!(" DEFAULT {}", default.to_sql()));
        }
    }
    if !column.nullable {
        clause.push_str(" NOT NULL");
    }
    if !scratch {
        if let Some(identity) = &column.identity {
            clause.push_str(&format!(
                " GENERATED {} AS IDENTITY{}",
                identity.generation.as_sql(),
                identity_options(identity)
            ));
        }
    }
    clause
}

pub fn create_table(table: &TableDefinition) -> String {
    let columns = table
        .columns
        .iter()
        .map(|c| column_clause(c, false))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({})", table.name.quoted(), columns)
}

/// Temporary table holding `columns` and the named check constraints
pub fn create_scratch_table(name: &str, columns: &[ColumnDefinition], checks: &[(String, &str)]) -> String {
    let mut clauses = columns
        .iter()
        .map(|c| column_clause(c, true))
        .collect::<Vec<_>>();
    clauses.extend(
        checks
            .iter()
            .map(|(constraint, condition)| format!("CONSTRAINT {} CHECK ({})", quote_ident(constraint), condition)),
    );
    format!(
        "CREATE TEMPORARY TABLE {} ({})",
        quote_ident(name),
        clauses.join(", ")
    )
}

pub fn drop_scratch_table(name: &str) -> String {
    format!("DROP TABLE IF EXISTS pg_temp.{}", quote_ident(name))
}

pub fn drop_table(name: &ObjectName) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE", name.quoted())
}

pub fn add_column(table: &ObjectName, column: &ColumnDefinition) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        table.quoted(),
        column_clause(column, false)
    )
}

pub fn drop_column(table: &ObjectName, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        table.quoted(),
        quote_ident(column)
    )
}

/// Statements for one column diff. `column` is the declared column; renames
/// run before anything that addresses the column by its new name.
pub fn alter_column(table: &ObjectName, column: &ColumnDefinition, diff: &ColumnDiff) -> Vec<String> {
    let table_sql = table.quoted();
    let name = quote_ident(&column.name);
    let alter = |action: String| format!("ALTER TABLE {} ALTER COLUMN {} {}", table_sql, name, action);
    let mut statements = Vec::new();

    if let Some(IdentityChange::Drop) = &diff.identity {
        // still addressed by the old name if a rename is pending
        let current = diff
            .rename
            .as_ref()
            .map(|(prev, _)| quote_ident(prev))
            .unwrap_or_else(|| name.clone());
        statements.push(format!(
            "ALTER TABLE {} ALTER COLUMN {} DROP IDENTITY IF EXISTS",
            table_sql, current
        ));
    }

    if let Some((prev, next)) = &diff.rename {
        statements.push(format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            table_sql,
            quote_ident(prev),
            quote_ident(next)
        ));
    }

    match diff.nullable {
        Some(false) => {
            if let Some(backfill) = &diff.backfill {
                statements.push(format!(
                    "UPDATE {} SET {} = {} WHERE {} IS NULL",
                    table_sql,
                    name,
                    backfill.to_sql(),
                    name
                ));
            }
            statements.push(alter("SET NOT NULL".to_string()));
        }
        Some(true) => statements.push(alter("DROP NOT NULL".to_string())),
        None => {}
    }

    if let Some((_, next)) = &diff.data_type {
        let collate = match &diff.collate {
            Some(collate) => collate_clause(collate),
            None => String::new(),
        };
        statements.push(alter(format!(
            "TYPE {}{} USING {}::{}",
            next, collate, name, next
        )));
    }

    match &diff.default {
        Some(Some(default)) => statements.push(alter(format!("SET DEFAULT {}", default.to_sql()))),
        Some(None) => statements.push(alter("DROP DEFAULT".to_string())),
        None => {}
    }

    // a type change already carried the collation
    if diff.data_type.is_none() {
        if let Some(collate) = &diff.collate {
            let collation = collate.as_deref().unwrap_or("default");
            statements.push(alter(format!(
                "TYPE {} COLLATE {}",
                column.data_type,
                quote_ident(collation)
            )));
        }
    }

    match &diff.identity {
        Some(IdentityChange::Add(identity)) => statements.push(alter(format!(
            "ADD GENERATED {} AS IDENTITY{}",
            identity.generation.as_sql(),
            identity_options(identity)
        ))),
        Some(IdentityChange::Alter {
            generation,
            start,
            increment,
            min,
            max,
            cycle,
        }) => {
            let mut actions = Vec::new();
            if let Some(generation) = generation {
                actions.push(format!("SET GENERATED {}", generation.as_sql()));
            }
            if let Some(start) = start {
                actions.push(format!("SET START WITH {}", start));
            }
            if let Some(increment) = increment {
                actions.push(format!("SET INCREMENT BY {}", increment));
            }
            if let Some(min) = min {
                actions.push(format!("SET MINVALUE {}", min));
            }
            if let Some(max) = max {
                actions.push(format!("SET MAXVALUE {}", max));
            }
            match cycle {
                Some(true) => actions.push("SET CYCLE".to_string()),
                Some(false) => actions.push("SET NO CYCLE".to_string()),
                None => {}
            }
            if !actions.is_empty() {
                statements.push(alter(actions.join(" ")));
            }
        }
        Some(IdentityChange::Drop) | None => {}
    }

    statements
}

/// Drop an observed extension by its server name
pub fn drop_extension(table: &ObjectName, extension: &ExtensionDefinition) -> Option<String> {
    let name = extension.name.as_deref()?;
    Some(match extension.body {
        ExtensionBody::Index(_) => {
            let index = ObjectName {
                schema: table.schema.clone(),
                name: name.to_string(),
            };
            format!("DROP INDEX {}", index.quoted())
        }
        _ => format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            table.quoted(),
            quote_ident(name)
        ),
    })
}

/// Add a declared extension; checks use the condition as authored
pub fn add_extension(table: &ObjectName, extension: &ExtensionDefinition) -> String {
    let constraint = match &extension.name {
        Some(name) => format!("CONSTRAINT {} ", quote_ident(name)),
        None => String::new(),
    };
    let add = |body: String| format!("ALTER TABLE {} ADD {}{}", table.quoted(), constraint, body);

    match &extension.body {
        ExtensionBody::PrimaryKey(columns) => add(format!("PRIMARY KEY ({})", quote_columns(columns))),
        ExtensionBody::Unique(columns) => add(format!("UNIQUE ({})", quote_columns(columns))),
        ExtensionBody::Check(condition) => add(format!("CHECK ({})", condition)),
        ExtensionBody::ForeignKey(fk) => {
            let match_clause = match fk.match_type {
                MatchType::Full => " MATCH FULL",
                MatchType::Simple => "",
            };
            add(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({}){} ON UPDATE {} ON DELETE {}",
                quote_columns(&fk.columns),
                fk.references.table.quoted(),
                quote_columns(&fk.references.columns),
                match_clause,
                fk.on_update.as_sql(),
                fk.on_delete.as_sql()
            ))
        }
        ExtensionBody::Index(columns) => {
            let name = match &extension.name {
                Some(name) => format!("{} ", quote_ident(name)),
                None => String::new(),
            };
            format!(
                "CREATE INDEX {}ON {} ({})",
                name,
                table.quoted(),
                quote_columns(columns)
            )
        }
    }
}
