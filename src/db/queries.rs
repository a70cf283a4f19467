//! SQL queries and quoting helpers
//!
//! Catalog queries are constants taking the relation as `$1`, bound as its
//! quoted qualified name and resolved with `::regclass`. Only the lookups that
//! read from a table or sequence by name interpolate quoted identifiers.

use crate::definition::ObjectName;

/// Quote an identifier (table/column name) safely
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a string literal safely
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Does relation `$1` exist? One row with boolean `found`.
pub const RELATION_EXISTS: &str = "SELECT to_regclass($1::text) IS NOT NULL AS found";

/// Columns of table `$1` in attribute order. The `sequence_*` columns are
/// set only for identity columns.
pub const TABLE_COLUMNS: &str = r#"
    SELECT
        a.attname::text AS name,
        format_type(a.atttypid, a.atttypmod) AS type,
        NOT a.attnotnull AS nullable,
        pg_get_expr(d.adbin, d.adrelid) AS "default",
        CASE WHEN a.attcollation <> t.typcollation THEN co.collname::text END AS "collate",
        CASE a.attidentity WHEN 'a' THEN 'ALWAYS' WHEN 'd' THEN 'BY DEFAULT' END AS identity,
        s.seqstart AS sequence_start,
        s.seqincrement AS sequence_increment,
        s.seqmin AS sequence_min,
        s.seqmax AS sequence_max,
        s.seqcycle AS sequence_cycle
    FROM pg_attribute a
    JOIN pg_type t ON t.oid = a.atttypid
    LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
    LEFT JOIN pg_collation co ON co.oid = a.attcollation
    LEFT JOIN pg_sequence s ON a.attidentity <> ''
        AND s.seqrelid = pg_get_serial_sequence(a.attrelid::regclass::text, a.attname)::regclass
    WHERE a.attrelid = $1::text::regclass
        AND a.attnum > 0
        AND NOT a.attisdropped
    ORDER BY a.attnum
"#;

/// Primary key, unique, foreign key and check constraints of table `$1`
pub const TABLE_CONSTRAINTS: &str = r#"
    SELECT
        c.conname::text AS name,
        c.contype::text AS kind,
        ARRAY(
            SELECT a.attname::text
            FROM unnest(c.conkey) WITH ORDINALITY AS k(num, ord)
            JOIN pg_attribute a ON a.attrelid = c.conrelid AND a.attnum = k.num
            ORDER BY k.ord
        ) AS columns,
        rn.nspname::text AS referenced_schema,
        r.relname::text AS referenced_table,
        ARRAY(
            SELECT a.attname::text
            FROM unnest(c.confkey) WITH ORDINALITY AS k(num, ord)
            JOIN pg_attribute a ON a.attrelid = c.confrelid AND a.attnum = k.num
            ORDER BY k.ord
        ) AS referenced_columns,
        c.confupdtype::text AS on_update,
        c.confdeltype::text AS on_delete,
        c.confmatchtype::text AS match_type,
        pg_get_constraintdef(c.oid) AS definition
    FROM pg_constraint c
    LEFT JOIN pg_class r ON r.oid = c.confrelid
    LEFT JOIN pg_namespace rn ON rn.oid = r.relnamespace
    WHERE c.conrelid = $1::text::regclass
        AND c.contype IN ('p', 'u', 'f', 'c')
    ORDER BY c.conname
"#;

/// Plain indexes of table `$1`; indexes backing a constraint are excluded
pub const TABLE_INDEXES: &str = r#"
    SELECT
        i.relname::text AS name,
        ARRAY(
            SELECT a.attname::text
            FROM unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(num, ord)
            JOIN pg_attribute a ON a.attrelid = ix.indrelid AND a.attnum = k.num
            ORDER BY k.ord
        ) AS columns
    FROM pg_index ix
    JOIN pg_class i ON i.oid = ix.indexrelid
    WHERE ix.indrelid = $1::text::regclass
        AND NOT EXISTS (
            SELECT 1 FROM pg_constraint c
            WHERE c.conindid = ix.indexrelid AND c.conrelid = ix.indrelid
        )
    ORDER BY i.relname
"#;

/// Attributes of standalone sequence `$1`; no row when it does not exist
pub const SEQUENCE_ATTRIBUTES: &str = r#"
    SELECT
        format_type(s.seqtypid, NULL) AS type,
        s.seqstart AS start,
        s.seqincrement AS increment,
        s.seqmin AS min,
        s.seqmax AS max,
        s.seqcycle AS cycle
    FROM pg_sequence s
    WHERE s.seqrelid = to_regclass($1::text)
"#;

/// Rendered definitions of every constraint on relation `$1`
pub const CONSTRAINT_DEFINITIONS: &str = r#"
    SELECT conname::text AS name, pg_get_constraintdef(oid) AS definition
    FROM pg_constraint
    WHERE conrelid = $1::text::regclass
"#;

/// Name of the sequence backing identity column `$2` of table `$1`
pub const IDENTITY_SEQUENCE: &str = "SELECT pg_get_serial_sequence($1::text, $2::text) AS sequence";

/// Bound parameter naming a table
pub fn relation(name: &ObjectName) -> String {
    name.quoted()
}

/// Bound parameter naming a scratch table in `pg_temp`
pub fn temporary_relation(name: &str) -> String {
    format!("pg_temp.{}", quote_ident(name))
}

/// Current position and bounds of a sequence given by its qualified text
/// name, as returned by `pg_get_serial_sequence`. The same name is bound as
/// `$1`.
pub fn sequence_state(sequence: &str) -> String {
    format!(
        "SELECT s.seqincrement AS increment, s.seqmin AS min, s.seqmax AS max, \
         q.last_value AS current, q.is_called AS called \
         FROM pg_sequence s, {} q \
         WHERE s.seqrelid = $1::text::regclass",
        sequence
    )
}

/// Largest column value above `$1` that still fits below `$2`
pub fn max_value_above(table: &ObjectName, column: &str) -> String {
    let column = quote_ident(column);
    format!(
        "SELECT max({column})::bigint AS value FROM {} WHERE {column} > $1::bigint AND {column} <= $2::bigint",
        table.quoted()
    )
}

/// Smallest column value below `$1` that still fits above `$2`, for
/// descending sequences
pub fn min_value_below(table: &ObjectName, column: &str) -> String {
    let column = quote_ident(column);
    format!(
        "SELECT min({column})::bigint AS value FROM {} WHERE {column} < $1::bigint AND {column} >= $2::bigint",
        table.quoted()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_quote_literal_escapes_quotes() {
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_relation_parameters_are_quoted() {
        assert_eq!(relation(&ObjectName::new("Sales", "orders")), "\"Sales\".\"orders\"");
        assert_eq!(temporary_relation("temp_constraint_check_0"), "pg_temp.\"temp_constraint_check_0\"");
    }

    #[test]
    fn test_value_scan_binds_its_bounds() {
        let table = ObjectName::new("public", "users");
        assert_eq!(
            max_value_above(&table, "id"),
            "SELECT max(\"id\")::bigint AS value FROM \"public\".\"users\" WHERE \"id\" > $1::bigint AND \"id\" <= $2::bigint"
        );
    }

    #[test]
    fn test_catalog_queries_take_the_relation_as_a_parameter() {
        for query in [TABLE_COLUMNS, TABLE_CONSTRAINTS, TABLE_INDEXES, CONSTRAINT_DEFINITIONS] {
            assert!(query.contains("$1::text::regclass"));
        }
    }
}
