//! DDL Generation for Dynamic Schema Management
//!
//! Generates SQLite DDL statements for creating and extending store tables.

use crate::error::{RecordStoreError, Result};
use crate::schema::ColumnDefinition;
use crate::sql::literal::format_literal;
use crate::sql::sanitize::{quote_identifier, validate_target};

/// DDL Generator for store tables
#[derive(Debug, Clone, Copy, Default)]
pub struct DdlGenerator;

impl DdlGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate CREATE TABLE IF NOT EXISTS for a store
    ///
    /// Columns with a blank name are skipped. Fails with
    /// [`RecordStoreError::EmptyInput`] when no column is left.
    pub fn generate_create_table(
        &self,
        table_name: &str,
        columns: &[ColumnDefinition],
    ) -> Result<String> {
        validate_target(table_name)?;

        let column_defs: Vec<String> = named(columns)
            .map(Self::format_column_definition)
            .collect();

        if column_defs.is_empty() {
            return Err(RecordStoreError::empty_input(format!(
                "No columns to create table '{}' with",
                table_name
            )));
        }

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_identifier(table_name),
            column_defs.join(", ")
        ))
    }

    /// Generate one ALTER TABLE ... ADD COLUMN per column
    ///
    /// SQLite adds a single column per statement. Columns with a blank name are
    /// skipped; primary and auto-increment columns cannot be added to an
    /// existing table.
    pub fn generate_add_columns(
        &self,
        table_name: &str,
        columns: &[ColumnDefinition],
    ) -> Result<Vec<String>> {
        validate_target(table_name)?;
        let quoted_table = quote_identifier(table_name);

        let mut statements = Vec::new();
        for col in named(columns) {
            if col.primary || col.auto_increment {
                return Err(RecordStoreError::validation(format!(
                    "Column '{}' cannot be added to '{}' as a primary or auto-increment column",
                    col.name, table_name
                )));
            }
            statements.push(format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quoted_table,
                Self::format_column_definition(col)
            ));
        }

        Ok(statements)
    }

    /// Format a single column definition for CREATE TABLE or ALTER TABLE ADD COLUMN
    pub fn format_column_definition(col: &ColumnDefinition) -> String {
        let name = quote_identifier(&col.name);

        // Auto-increment is only valid on an INTEGER PRIMARY KEY
        if col.auto_increment {
            return format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", name);
        }

        let mut parts = vec![name, col.kind.to_sql_type().to_string()];

        if col.primary {
            parts.push("PRIMARY KEY".to_string());
        }

        parts.push(if col.nullable { "NULL" } else { "NOT NULL" }.to_string());

        if let Some(default) = &col.default_value {
            parts.push(format!("DEFAULT {}", format_literal(default)));
        }

        parts.join(" ")
    }
}

fn named(columns: &[ColumnDefinition]) -> impl Iterator<Item = &ColumnDefinition> {
    columns.iter().filter(|col| !col.name.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueKind;

    // ==================== CREATE TABLE Tests ====================

    #[test]
    fn test_generate_create_table_primary_first() {
        let columns = vec![
            ColumnDefinition::new("id", ValueKind::Int64).primary(),
            ColumnDefinition::new("name", ValueKind::String),
        ];

        let ddl = DdlGenerator::new()
            .generate_create_table("Widget", &columns)
            .unwrap();

        assert_eq!(
            ddl,
            "CREATE TABLE IF NOT EXISTS \"Widget\" (\"id\" number PRIMARY KEY NULL, \"name\" nvarchar(255) NULL)"
        );
    }

    #[test]
    fn test_generate_create_table_auto_increment() {
        let columns = vec![
            ColumnDefinition::new("id", ValueKind::String)
                .primary()
                .auto_increment(),
            ColumnDefinition::new("created", ValueKind::DateTime).not_null(),
        ];

        let ddl = DdlGenerator::new()
            .generate_create_table("Log", &columns)
            .unwrap();

        assert!(ddl.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(ddl.contains("\"created\" datetime NOT NULL"));
    }

    #[test]
    fn test_generate_create_table_skips_blank_columns() {
        let columns = vec![
            ColumnDefinition::new("  ", ValueKind::String),
            ColumnDefinition::new("name", ValueKind::String),
        ];

        let ddl = DdlGenerator::new()
            .generate_create_table("Widget", &columns)
            .unwrap();

        assert!(ddl.ends_with("(\"name\" nvarchar(255) NULL)"));
    }

    #[test]
    fn test_generate_create_table_empty_columns() {
        let result = DdlGenerator::new().generate_create_table("Widget", &[]);
        assert!(matches!(result, Err(RecordStoreError::EmptyInput(_))));
    }

    #[test]
    fn test_generate_create_table_blank_table() {
        let columns = vec![ColumnDefinition::new("id", ValueKind::Int64)];
        let result = DdlGenerator::new().generate_create_table(" ", &columns);
        assert!(matches!(result, Err(RecordStoreError::InvalidTarget(_))));
    }

    #[test]
    fn test_generate_create_table_special_table_name() {
        let columns = vec![ColumnDefinition::new("id", ValueKind::Int64)];
        let ddl = DdlGenerator::new()
            .generate_create_table("my\"table", &columns)
            .unwrap();
        assert!(ddl.contains("\"my\"\"table\""));
    }

    // ==================== ALTER TABLE Tests ====================

    #[test]
    fn test_generate_add_columns() {
        let columns = vec![
            ColumnDefinition::new("extra", ValueKind::Int64),
            ColumnDefinition::new("", ValueKind::Int64),
            ColumnDefinition::new("status", ValueKind::String).default("new"),
        ];

        let statements = DdlGenerator::new()
            .generate_add_columns("Widget", &columns)
            .unwrap();

        assert_eq!(
            statements,
            vec![
                "ALTER TABLE \"Widget\" ADD COLUMN \"extra\" number NULL".to_string(),
                "ALTER TABLE \"Widget\" ADD COLUMN \"status\" nvarchar(255) NULL DEFAULT 'new'"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_generate_add_columns_rejects_primary() {
        let columns = vec![ColumnDefinition::new("id", ValueKind::Int64).primary()];
        assert!(
            DdlGenerator::new()
                .generate_add_columns("Widget", &columns)
                .is_err()
        );
    }

    #[test]
    fn test_generate_add_columns_none() {
        let statements = DdlGenerator::new()
            .generate_add_columns("Widget", &[])
            .unwrap();
        assert!(statements.is_empty());
    }

    // ==================== Column Definition Tests ====================

    #[test]
    fn test_format_column_definition_basic() {
        let col = ColumnDefinition::new("payload", ValueKind::Binary);
        assert_eq!(
            DdlGenerator::format_column_definition(&col),
            "\"payload\" blob NULL"
        );
    }

    #[test]
    fn test_format_column_definition_full() {
        let col = ColumnDefinition::new("price", ValueKind::Currency)
            .not_null()
            .default(0.5);
        assert_eq!(
            DdlGenerator::format_column_definition(&col),
            "\"price\" float NOT NULL DEFAULT 0.5"
        );
    }

    #[test]
    fn test_format_column_definition_escapes_default() {
        let col = ColumnDefinition::new("owner", ValueKind::String).default("O'Brien");
        assert!(DdlGenerator::format_column_definition(&col).ends_with("DEFAULT 'O''Brien'"));
    }

    #[test]
    fn test_format_column_definition_nan_default() {
        let col = ColumnDefinition::new("ratio", ValueKind::Double).default(f64::NAN);
        assert_eq!(
            DdlGenerator::format_column_definition(&col),
            "\"ratio\" float NULL DEFAULT NULL"
        );
    }
}
