//! Type-change policy
//!
//! Decides whether `ALTER COLUMN ... TYPE` from one canonical type to another
//! is guaranteed not to lose data for any value of the source type.

use super::PgType;

const TIME: &str = "time without time zone";
const TIME_TZ: &str = "time with time zone";
const TIMESTAMP: &str = "timestamp without time zone";
const TIMESTAMP_TZ: &str = "timestamp with time zone";
const VARCHAR: &str = "character varying";
const CHAR: &str = "character";

/// Directional widening check. Equal types are always allowed, array
/// dimension changes never are, and pairs not covered below are refused.
pub fn is_widening_allowed(prev: &PgType, next: &PgType) -> bool {
    if prev == next {
        return true;
    }
    if prev.dimensions != next.dimensions {
        return false;
    }

    match (prev.name.as_str(), next.name.as_str()) {
        ("numeric", "numeric") => numeric_widens(prev, next),

        ("smallint", "integer" | "bigint" | "real" | "double precision") => true,
        ("integer", "bigint" | "real" | "double precision") => true,
        ("bigint", "real" | "double precision") => true,
        ("real", "double precision") => true,

        (VARCHAR | CHAR, "text") => true,
        (VARCHAR | CHAR, VARCHAR | CHAR) => length_widens(prev, next),

        (TIME | TIME_TZ, TIME | TIME_TZ) => true,
        (TIMESTAMP | TIMESTAMP_TZ, TIMESTAMP | TIMESTAMP_TZ) => true,

        _ => false,
    }
}

fn numeric_widens(prev: &PgType, next: &PgType) -> bool {
    match (prev.arguments.is_empty(), next.arguments.is_empty()) {
        // unconstrained numeric holds anything
        (_, true) => true,
        (true, false) => false,
        (false, false) => {
            let (Some(p), Some(s)) = (prev.number_argument(0), prev.number_argument(1)) else {
                return false;
            };
            let (Some(p2), Some(s2)) = (next.number_argument(0), next.number_argument(1)) else {
                return false;
            };
            p2 >= p && s2 >= s
        }
    }
}

fn length_widens(prev: &PgType, next: &PgType) -> bool {
    match (prev.number_argument(0), next.number_argument(0)) {
        (_, None) => next.name == VARCHAR,
        (None, Some(_)) => false,
        (Some(n), Some(n2)) => n2 >= n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse;

    fn allowed(prev: &str, next: &str) -> bool {
        is_widening_allowed(&parse(prev), &parse(next))
    }

    #[test]
    fn test_integer_widening_is_directional() {
        assert!(allowed("smallint", "integer"));
        assert!(!allowed("integer", "smallint"));
        assert!(allowed("integer", "bigint"));
        assert!(allowed("bigint", "double precision"));
        assert!(!allowed("bigint", "integer"));
        assert!(!allowed("real", "integer"));
    }

    #[test]
    fn test_equal_types_are_allowed() {
        assert!(allowed("varchar(10)", "character varying(10)"));
        assert!(allowed("numeric(10,2)", "numeric(10,2)"));
        assert!(allowed("uuid", "uuid"));
    }

    #[test]
    fn test_numeric_scale_may_only_grow() {
        assert!(allowed("numeric(10,2)", "numeric(10,4)"));
        assert!(!allowed("numeric(10,4)", "numeric(10,2)"));
        assert!(!allowed("numeric(12,2)", "numeric(10,2)"));
    }

    #[test]
    fn test_character_lengths() {
        assert!(allowed("varchar(10)", "varchar(20)"));
        assert!(allowed("varchar(10)", "char(10)"));
        assert!(allowed("char(5)", "text"));
        assert!(!allowed("varchar(20)", "varchar(10)"));
        assert!(!allowed("text", "varchar(10)"));
    }

    #[test]
    fn test_time_zone_toggles() {
        assert!(allowed("timestamp", "timestamptz"));
        assert!(allowed("timestamptz", "timestamp"));
        assert!(allowed("time", "timetz"));
        assert!(!allowed("timestamp", "time"));
    }

    #[test]
    fn test_dimension_changes_are_refused() {
        assert!(!allowed("integer", "integer[]"));
        assert!(!allowed("smallint[]", "integer"));
        assert!(allowed("smallint[]", "integer[]"));
    }
}
