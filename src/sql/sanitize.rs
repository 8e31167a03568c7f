//! SQL Identifier Sanitization Utilities
//!
//! Store and field names come from callers, so every identifier that reaches
//! SQL text is either quoted here or rejected.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{RecordStoreError, Result};

static IDENTIFIER_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").unwrap()
});

static AGGREGATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(COUNT|SUM|MIN|MAX|AVG)\(\s*(\*|[A-Za-z_][A-Za-z0-9_]*)\s*\)$").unwrap()
});

/// Quote a SQL identifier to make it safe for use in queries
///
/// # Example
/// ```
/// use runtara_record_store::sql::quote_identifier;
///
/// assert_eq!(quote_identifier("Widget"), "\"Widget\"");
/// ```
pub fn quote_identifier(identifier: &str) -> String {
    let escaped = identifier.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Quote a column reference
///
/// `table.column` is split and each part quoted only when the query reads
/// from several `tables` and `table` is one of them. Anything else names a
/// single column, so record fields such as `user.id` stay intact.
pub fn quote_qualified(field: &str, tables: &[String]) -> String {
    match qualified_parts(field, tables) {
        Some((table, column)) => {
            format!("{}.{}", quote_identifier(table), quote_identifier(column))
        }
        None => quote_identifier(field),
    }
}

fn qualified_parts<'a>(field: &'a str, tables: &[String]) -> Option<(&'a str, &'a str)> {
    if tables.len() < 2 || !IDENTIFIER_PATH.is_match(field) {
        return None;
    }
    let (table, column) = field.split_once('.')?;
    tables
        .iter()
        .any(|known| known.eq_ignore_ascii_case(table))
        .then_some((table, column))
}

/// Validate a store (table) name
///
/// Blank names and names in SQLite's internal `sqlite_` namespace are rejected.
pub fn validate_target(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(RecordStoreError::invalid_target("No table available"));
    }
    if name.contains('\0') {
        return Err(RecordStoreError::invalid_target(format!(
            "Table name '{}' contains a NUL character",
            name.escape_default()
        )));
    }
    if name.to_lowercase().starts_with("sqlite_") {
        return Err(RecordStoreError::invalid_target(format!(
            "Table name '{}' is reserved for SQLite internals",
            name
        )));
    }
    Ok(())
}

/// Render a projection or grouping field
///
/// Accepts `*`, a plain or table-qualified column name, or a single-column
/// aggregate such as `COUNT(*)` / `max(age)`. Anything else is rejected so
/// that raw expressions can never be smuggled in as a field name.
pub fn render_field(field: &str, tables: &[String]) -> Result<String> {
    let field = field.trim();
    if field == "*" {
        return Ok("*".to_string());
    }
    if IDENTIFIER_PATH.is_match(field) {
        return Ok(quote_qualified(field, tables));
    }
    if let Some(captures) = AGGREGATE.captures(field) {
        let function = captures[1].to_uppercase();
        let argument = match &captures[2] {
            "*" => "*".to_string(),
            column => quote_identifier(column),
        };
        return Ok(format!("{}({})", function, argument));
    }
    Err(RecordStoreError::invalid_target(format!(
        "Field '{}' is neither a column name nor a supported aggregate",
        field
    )))
}

/// Parameter-name fragment for a field (`.` replaced with `_`)
pub fn parameter_suffix(field: &str) -> String {
    field
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // quote_identifier Tests
    // =========================================================================

    #[test]
    fn test_quote_identifier_simple() {
        assert_eq!(quote_identifier("Widget"), "\"Widget\"");
        assert_eq!(quote_identifier("LASTUPDATE"), "\"LASTUPDATE\"");
    }

    #[test]
    fn test_quote_identifier_with_quotes() {
        assert_eq!(
            quote_identifier("table\"with\"quotes"),
            "\"table\"\"with\"\"quotes\""
        );
    }

    #[test]
    fn test_quote_identifier_injection_attempt() {
        assert_eq!(
            quote_identifier("x\"; DROP TABLE t; --"),
            "\"x\"\"; DROP TABLE t; --\""
        );
    }

    // =========================================================================
    // quote_qualified Tests
    // =========================================================================

    fn tables(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_quote_qualified_across_tables() {
        let joined = tables(&["Widget", "Person"]);
        assert_eq!(quote_qualified("name", &joined), "\"name\"");
        assert_eq!(quote_qualified("Widget.name", &joined), "\"Widget\".\"name\"");
        assert_eq!(quote_qualified("person.name", &joined), "\"person\".\"name\"");
        assert_eq!(quote_qualified("my field", &joined), "\"my field\"");
    }

    #[test]
    fn test_quote_qualified_keeps_dotted_fields() {
        let joined = tables(&["Widget", "Person"]);
        assert_eq!(quote_qualified("user.id", &joined), "\"user.id\"");
        assert_eq!(quote_qualified("Widget.id", &tables(&["Widget"])), "\"Widget.id\"");
        assert_eq!(quote_qualified("user.id", &[]), "\"user.id\"");
    }

    // =========================================================================
    // validate_target Tests
    // =========================================================================

    #[test]
    fn test_validate_target_valid() {
        assert!(validate_target("Widget").is_ok());
        assert!(validate_target("Person").is_ok());
        assert!(validate_target("my store").is_ok());
    }

    #[test]
    fn test_validate_target_blank() {
        assert!(matches!(
            validate_target(""),
            Err(RecordStoreError::InvalidTarget(_))
        ));
        assert!(matches!(
            validate_target("   "),
            Err(RecordStoreError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_validate_target_reserved() {
        assert!(validate_target("sqlite_master").is_err());
        assert!(validate_target("SQLITE_sequence").is_err());
    }

    // =========================================================================
    // render_field Tests
    // =========================================================================

    #[test]
    fn test_render_field_columns() {
        let joined = tables(&["Widget", "Person"]);
        assert_eq!(render_field("*", &[]).unwrap(), "*");
        assert_eq!(render_field("name", &[]).unwrap(), "\"name\"");
        assert_eq!(render_field("Widget.name", &joined).unwrap(), "\"Widget\".\"name\"");
        assert_eq!(render_field("user.id", &tables(&["Widget"])).unwrap(), "\"user.id\"");
    }

    #[test]
    fn test_render_field_aggregates() {
        assert_eq!(render_field("COUNT(*)", &[]).unwrap(), "COUNT(*)");
        assert_eq!(render_field("max(age)", &[]).unwrap(), "MAX(\"age\")");
    }

    #[test]
    fn test_render_field_rejects_expressions() {
        assert!(render_field("1; DROP TABLE x", &[]).is_err());
        assert!(render_field("name, secret", &[]).is_err());
        assert!(render_field("", &[]).is_err());
    }

    #[test]
    fn test_parameter_suffix() {
        assert_eq!(parameter_suffix("Widget.name"), "Widget_name");
        assert_eq!(parameter_suffix("id"), "id");
    }
}
