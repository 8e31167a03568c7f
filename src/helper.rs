//! SqliteHelper - connection-per-operation execution against the database file
//!
//! Every operation opens its own connection and closes it before returning.
//! Commands built by [`CommandBuilder`](crate::sql::CommandBuilder) are bound
//! and executed here, and result rows are materialized into [`Record`]s.

use std::error::Error as _;
use std::path::{Path, PathBuf};

use rust_decimal::prelude::ToPrimitive;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Connection, Row, Sqlite, TypeInfo, ValueRef};

use crate::config::StoreConfig;
use crate::error::{RecordStoreError, Result};
use crate::record::Record;
use crate::schema::{ColumnDefinition, StoreSchema};
use crate::sql::command::Command;
use crate::sql::sanitize::quote_identifier;
use crate::types::{Value, ValueKind};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Runs commands against one SQLite database file
#[derive(Debug, Clone)]
pub struct SqliteHelper {
    options: SqliteConnectOptions,
    database_file: PathBuf,
}

impl SqliteHelper {
    /// Helper for the database file named by the configuration
    ///
    /// The file is created on first connect if it does not exist.
    pub fn new(config: &StoreConfig) -> Self {
        let database_file = config.database_file();
        let options = SqliteConnectOptions::new()
            .filename(&database_file)
            .create_if_missing(true)
            .busy_timeout(config.busy_timeout);

        Self {
            options,
            database_file,
        }
    }

    pub fn database_file(&self) -> &Path {
        &self.database_file
    }

    // =========================================================================
    // Connection Lifecycle
    // =========================================================================

    /// Open a connection to the database file
    pub async fn connect(&self) -> Result<SqliteConnection> {
        self.options.connect().await.map_err(|e| {
            tracing::error!(
                error = %e,
                source = ?e.source().map(|s| s.to_string()),
                database = %self.database_file.display(),
                "Failed to open database connection"
            );
            tracing::debug!(error = ?e, "Connection failure detail");
            RecordStoreError::ConnectionUnavailable(format!(
                "{}: {}",
                self.database_file.display(),
                e
            ))
        })
    }

    /// Close a connection, logging failures
    pub async fn close(&self, conn: SqliteConnection) {
        if let Err(e) = conn.close().await {
            tracing::warn!(error = %e, "Failed to close database connection");
        }
    }

    /// Execute a command on its own connection
    pub async fn run_non_query(&self, command: &Command) -> Result<u64> {
        let mut conn = self.connect().await?;
        let result = self.execute(&mut conn, command).await;
        self.close(conn).await;
        result
    }

    /// Run a query on its own connection
    pub async fn run_query(&self, command: &Command) -> Result<Vec<Record>> {
        let mut conn = self.connect().await?;
        let result = self.fetch(&mut conn, command).await;
        self.close(conn).await;
        result
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Execute a command, returning the number of affected rows
    pub async fn execute(&self, conn: &mut SqliteConnection, command: &Command) -> Result<u64> {
        tracing::debug!(sql = %command.sql, params = command.params.len(), "Executing command");

        let result = bind_command(command)
            .execute(&mut *conn)
            .await
            .map_err(|e| backend_error(command, e))?;

        Ok(result.rows_affected())
    }

    /// Run a query and materialize every row
    pub async fn fetch(&self, conn: &mut SqliteConnection, command: &Command) -> Result<Vec<Record>> {
        tracing::debug!(sql = %command.sql, params = command.params.len(), "Running query");

        let rows = bind_command(command)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| backend_error(command, e))?;

        rows.iter().map(row_to_record).collect()
    }

    /// Run a query against a store, reading each column back as its kind
    pub async fn fetch_typed(
        &self,
        conn: &mut SqliteConnection,
        command: &Command,
        schema: &StoreSchema,
    ) -> Result<Vec<Record>> {
        let records = self.fetch(conn, command).await?;
        Ok(records.into_iter().map(|record| schema.typed(record)).collect())
    }

    /// Start a write transaction, taking the database write lock up front
    pub async fn begin_immediate(&self, conn: &mut SqliteConnection) -> Result<()> {
        self.execute(conn, &Command::new("BEGIN IMMEDIATE")).await?;
        Ok(())
    }

    pub async fn commit(&self, conn: &mut SqliteConnection) -> Result<()> {
        self.execute(conn, &Command::new("COMMIT")).await?;
        Ok(())
    }

    /// Roll back the open transaction, logging failures
    pub async fn rollback(&self, conn: &mut SqliteConnection) {
        if let Err(e) = self.execute(conn, &Command::new("ROLLBACK")).await {
            tracing::warn!(error = %e, "Failed to roll back transaction");
        }
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Names of all user tables, ordered by name
    pub async fn store_names(&self, conn: &mut SqliteConnection) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' ORDER BY name",
        )
        .fetch_all(&mut *conn)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(Into::into))
            .collect()
    }

    /// Read a table's columns from the catalog
    ///
    /// Returns `None` when the table does not exist.
    pub async fn load_schema(
        &self,
        conn: &mut SqliteConnection,
        table: &str,
    ) -> Result<Option<StoreSchema>> {
        let definition = sqlx::query_scalar::<Sqlite, Option<String>>(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = $1",
        )
        .bind(table)
        .fetch_optional(&mut *conn)
        .await?
        .flatten();

        let Some(definition) = definition else {
            return Ok(None);
        };
        let autoincrement = definition.to_uppercase().contains("AUTOINCREMENT");

        let pragma = format!("PRAGMA table_info({})", quote_identifier(table));
        let rows = sqlx::query(&pragma).fetch_all(&mut *conn).await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.try_get("name")?;
            let declared: String = row.try_get("type")?;
            let not_null: i64 = row.try_get("notnull")?;
            let default: Option<String> = row.try_get("dflt_value")?;
            let pk: i64 = row.try_get("pk")?;

            let kind = ValueKind::from_sql_type(&declared).unwrap_or_else(|e| {
                tracing::warn!(table = %table, column = %name, error = %e, "Reading column as text");
                ValueKind::String
            });

            let mut column = ColumnDefinition::new(name, kind);
            if pk > 0 {
                column = column.primary();
                if autoincrement {
                    column = column.auto_increment();
                }
            }
            if not_null != 0 {
                column = column.not_null();
            }
            if let Some(default) = default {
                column.default_value = Some(parse_default_literal(&default));
            }
            columns.push(column);
        }

        Ok(Some(StoreSchema::new(table, columns)))
    }

    // =========================================================================
    // Database Files
    // =========================================================================

    /// Copy the database file to `destination`
    ///
    /// Returns `false` without copying when the destination already exists.
    pub fn copy_database(&self, destination: impl AsRef<Path>) -> Result<bool> {
        let destination = destination.as_ref();
        if destination.exists() {
            tracing::debug!(destination = %destination.display(), "Copy destination exists");
            return Ok(false);
        }

        std::fs::copy(&self.database_file, destination)?;
        tracing::info!(
            source = %self.database_file.display(),
            destination = %destination.display(),
            "Copied database"
        );
        Ok(true)
    }

    /// Delete a database file if it exists
    pub fn delete_database(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path)?;
            tracing::info!(path = %path.display(), "Deleted database");
        }
        Ok(())
    }
}

fn backend_error(command: &Command, e: sqlx::Error) -> RecordStoreError {
    tracing::error!(error = %e, sql = %command.sql, "Statement failed");
    RecordStoreError::Sql(e)
}

fn bind_command(command: &Command) -> SqliteQuery<'_> {
    command
        .params
        .iter()
        .fold(sqlx::query(&command.sql), |query, param| {
            bind_value(query, &param.value)
        })
}

/// Bind a value with the SQLite storage class that fits it
fn bind_value<'q>(query: SqliteQuery<'q>, value: &'q Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Boolean(b) => query.bind(*b),
        Value::Byte(b) => query.bind(i64::from(*b)),
        Value::Integer(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Decimal(d) => match d.to_f64() {
            Some(f) => query.bind(f),
            None => query.bind(d.to_string()),
        },
        Value::String(s) => query.bind(s.as_str()),
        Value::Guid(g) => query.bind(g.hyphenated().to_string()),
        Value::DateTime(dt) => query.bind(*dt),
        Value::Date(d) => query.bind(*d),
        Value::Binary(bytes) => query.bind(bytes.as_slice()),
        Value::Json(serde_json::Value::Null) => query.bind(None::<String>),
        Value::Json(serde_json::Value::String(s)) => query.bind(s.as_str()),
        Value::Json(other) => query.bind(other.to_string()),
    }
}

/// Convert a row into a record, typed by each value's storage class
fn row_to_record(row: &SqliteRow) -> Result<Record> {
    let mut record = Record::new();
    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let storage = raw.type_info().name().to_string();
            match storage.as_str() {
                "INTEGER" => Value::Integer(row.try_get_unchecked::<i64, _>(index)?),
                "REAL" => Value::Float(row.try_get_unchecked::<f64, _>(index)?),
                "BLOB" => Value::Binary(row.try_get_unchecked::<Vec<u8>, _>(index)?),
                _ => Value::String(row.try_get_unchecked::<String, _>(index)?),
            }
        };
        record.insert(column.name(), value);
    }
    Ok(record)
}

/// Interpret a column default as reported by `PRAGMA table_info`
fn parse_default_literal(text: &str) -> Value {
    let text = text.trim();
    if text.eq_ignore_ascii_case("NULL") {
        return Value::Null;
    }
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        return Value::String(text[1..text.len() - 1].replace("''", "'"));
    }
    if let Ok(i) = text.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = text.parse::<f64>() {
        return Value::Float(f);
    }
    Value::String(text.to_string())
}
