//! Schema-related types for Record Store
//!
//! Includes ColumnDefinition and StoreSchema.

use serde::Serialize;

use crate::record::Record;
use crate::types::{Value, ValueKind};

/// Column definition for a dynamically managed store
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,

    /// Abstract kind, mapped to a column type at table-definition time
    pub kind: ValueKind,

    /// Whether this is the store's primary column
    pub primary: bool,

    /// Auto-increment columns always render as an integer primary key
    pub auto_increment: bool,

    /// Whether the column allows NULL values (default: true)
    pub nullable: bool,

    /// Default value, rendered as a literal
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "default")]
    pub default_value: Option<Value>,
}

impl ColumnDefinition {
    /// Create a new nullable column definition with a name and kind
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            primary: false,
            auto_increment: false,
            nullable: true,
            default_value: None,
        }
    }

    /// Column for a record field, typed from the field's value
    ///
    /// Null values carry no kind and become text columns.
    pub fn infer(name: impl Into<String>, value: &Value) -> Self {
        Self::new(name, value.kind().unwrap_or(ValueKind::String))
    }

    /// Mark the column as the primary column
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Mark the column as auto-increment
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Set the column as non-nullable
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set a default value
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Columns of one store as recorded by the backend catalog
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoreSchema {
    #[serde(rename = "tableName")]
    pub table_name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl StoreSchema {
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
        }
    }

    /// Schema a brand new store gets for a record
    ///
    /// The first field becomes the primary column. Every column is nullable and
    /// none auto-increments.
    pub fn for_record(table_name: impl Into<String>, record: &Record) -> Self {
        let columns = record
            .iter()
            .enumerate()
            .map(|(position, (field, value))| {
                let column = ColumnDefinition::infer(field, value);
                if position == 0 { column.primary() } else { column }
            })
            .collect();
        Self::new(table_name, columns)
    }

    pub fn primary_column(&self) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|column| column.primary)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Columns for the record fields this schema does not have yet
    pub fn missing_columns(&self, record: &Record) -> Vec<ColumnDefinition> {
        record
            .iter()
            .filter(|(field, _)| !self.contains(field))
            .map(|(field, value)| ColumnDefinition::infer(field, value))
            .collect()
    }

    /// Keep the kinds of `known` wherever the catalog agrees with them
    ///
    /// Several kinds share one column type (`Boolean` and `Int64` are both
    /// `number`), so a schema read from the catalog cannot tell them apart.
    pub fn refine_kinds(&mut self, known: &StoreSchema) {
        for column in &mut self.columns {
            let Some(previous) = known.column(&column.name) else {
                continue;
            };
            if ValueKind::from_sql_type(previous.kind.to_sql_type()).ok() == Some(column.kind) {
                column.kind = previous.kind;
            }
        }
    }

    /// Convert a stored row to the kinds of its columns
    ///
    /// Fields without a column keep their stored values.
    pub fn typed(&self, record: Record) -> Record {
        let mut typed = Record::new();
        for (field, value) in record {
            let value = match self.column(&field) {
                Some(column) => value.into_kind(column.kind),
                None => value,
            };
            typed.insert(field, value);
        }
        typed
    }
}
