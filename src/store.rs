//! StoreProvider - schema-evolving record storage on SQLite
//!
//! Stores are tables created and extended on demand: saving a record creates
//! its store when needed, adds columns for unseen fields, and then updates or
//! inserts the row identified by the store's primary column.

use std::collections::HashMap;

use sqlx::sqlite::SqliteConnection;
use tokio::sync::RwLock;

use crate::config::StoreConfig;
use crate::error::{RecordStoreError, Result};
use crate::helper::SqliteHelper;
use crate::record::Record;
use crate::schema::StoreSchema;
use crate::sql::command::{CommandBuilder, SelectQuery};
use crate::sql::sanitize::validate_target;
use crate::statement::{Comparison, WhereClause, WhereStatement};
use crate::types::Value;

/// Field stamped onto a record when it is deleted
pub const LAST_UPDATE_FIELD: &str = "LASTUPDATE";

/// Schema-evolving store over one SQLite database
///
/// Holds a per-store cache of the schemas it has seen. Every save refreshes the
/// cache from the catalog; reads fill it from the catalog on a miss.
pub struct StoreProvider {
    helper: SqliteHelper,
    builder: CommandBuilder,
    schemas: RwLock<HashMap<String, StoreSchema>>,
}

impl StoreProvider {
    /// Create a provider on top of an execution helper
    pub fn new(helper: SqliteHelper) -> Self {
        Self {
            helper,
            builder: CommandBuilder::new(),
            schemas: RwLock::new(HashMap::new()),
        }
    }

    /// Create a provider for the database file named by the configuration
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(SqliteHelper::new(config))
    }

    /// Get a reference to the execution helper
    pub fn helper(&self) -> &SqliteHelper {
        &self.helper
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Save a record into a store
    ///
    /// This will, inside one write transaction:
    /// 1. Create the store if it does not exist (first field becomes primary)
    /// 2. Add columns for fields the store does not have yet
    /// 3. Update the row with the record's primary value, or insert it
    ///
    /// An empty record is logged and ignored.
    pub async fn save(&self, store: &str, record: &Record) -> Result<()> {
        if record.is_empty() {
            tracing::warn!(store = %store, "Ignoring save of an empty record");
            return Ok(());
        }
        validate_target(store)?;
        if record.keys().any(|field| field.trim().is_empty()) {
            return Err(RecordStoreError::validation(format!(
                "Record for '{}' has a blank field name",
                store
            )));
        }

        let mut conn = self.helper.connect().await?;
        let result = self.save_in_transaction(&mut conn, store, record).await;
        self.helper.close(conn).await;
        result
    }

    async fn save_in_transaction(
        &self,
        conn: &mut SqliteConnection,
        store: &str,
        record: &Record,
    ) -> Result<()> {
        self.helper.begin_immediate(conn).await?;

        let written = match self.evolve_and_write(conn, store, record).await {
            Ok(schema) => self.helper.commit(conn).await.map(|_| schema),
            Err(e) => Err(e),
        };

        match written {
            Ok(schema) => {
                self.schemas
                    .write()
                    .await
                    .insert(store.to_string(), schema);
                Ok(())
            }
            Err(e) => {
                self.helper.rollback(conn).await;
                self.schemas.write().await.remove(store);
                Err(e)
            }
        }
    }

    async fn evolve_and_write(
        &self,
        conn: &mut SqliteConnection,
        store: &str,
        record: &Record,
    ) -> Result<StoreSchema> {
        let schema = self.evolve_schema(conn, store, record).await?;
        let filter = primary_filter(&schema, record)?;

        if self.row_exists(conn, store, &filter).await? {
            let command = self.builder.update(store, record, Some(&filter))?;
            self.helper.execute(conn, &command).await?;
            tracing::debug!(store = %store, "Updated record");
        } else {
            let command = self.builder.insert(store, std::slice::from_ref(record))?;
            self.helper.execute(conn, &command).await?;
            tracing::debug!(store = %store, "Inserted record");
        }

        Ok(schema)
    }

    /// Create the store or add missing columns so the record fits
    async fn evolve_schema(
        &self,
        conn: &mut SqliteConnection,
        store: &str,
        record: &Record,
    ) -> Result<StoreSchema> {
        let Some(mut schema) = self.load_known_schema(conn, store).await? else {
            let schema = StoreSchema::for_record(store, record);
            let command = self.builder.create(store, &schema.columns)?;
            self.helper.execute(conn, &command).await?;
            tracing::info!(
                store = %store,
                primary = ?record.first_key(),
                columns = schema.columns.len(),
                "Created store"
            );
            return Ok(schema);
        };

        let missing = schema.missing_columns(record);
        if !missing.is_empty() {
            for command in self.builder.add_columns(store, &missing)? {
                self.helper.execute(conn, &command).await?;
            }
            tracing::info!(
                store = %store,
                columns = ?missing.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "Added columns"
            );
            schema.columns.extend(missing);
        }

        Ok(schema)
    }

    /// Delete the row identified by the record's primary value
    ///
    /// Stamps [`LAST_UPDATE_FIELD`] onto the record. Never creates a store: an
    /// unknown store, or a record whose row does not exist, is a no-op. An
    /// empty record is logged and ignored.
    pub async fn delete(&self, store: &str, record: &mut Record) -> Result<()> {
        if record.is_empty() {
            tracing::warn!(store = %store, "Ignoring delete of an empty record");
            return Ok(());
        }
        record.insert(
            LAST_UPDATE_FIELD,
            Value::DateTime(chrono::Local::now().naive_local()),
        );
        validate_target(store)?;

        let mut conn = self.helper.connect().await?;
        let result = self.delete_in_transaction(&mut conn, store, record).await;
        self.helper.close(conn).await;
        result
    }

    async fn delete_in_transaction(
        &self,
        conn: &mut SqliteConnection,
        store: &str,
        record: &Record,
    ) -> Result<()> {
        self.helper.begin_immediate(conn).await?;

        let result = match self.delete_existing(conn, store, record).await {
            Ok(()) => self.helper.commit(conn).await,
            Err(e) => Err(e),
        };

        if result.is_err() {
            self.helper.rollback(conn).await;
        }
        result
    }

    async fn delete_existing(
        &self,
        conn: &mut SqliteConnection,
        store: &str,
        record: &Record,
    ) -> Result<()> {
        let Some(schema) = self.schema_for(conn, store).await? else {
            tracing::debug!(store = %store, "Delete on unknown store, nothing to do");
            return Ok(());
        };

        let filter = primary_filter(&schema, record)?;
        if self.row_exists(conn, store, &filter).await? {
            let command = self.builder.delete(store, Some(&filter))?;
            self.helper.execute(conn, &command).await?;
            tracing::debug!(store = %store, "Deleted record");
        }
        Ok(())
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Records whose `field` equals `value`
    ///
    /// Fails with [`RecordStoreError::StoreNotFound`] for an unknown store and
    /// [`RecordStoreError::Validation`] when `field` is not one of its columns.
    pub async fn search(
        &self,
        store: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<Vec<Record>> {
        let value = value.into();
        validate_target(store)?;

        let mut conn = self.helper.connect().await?;
        let result = self.search_in(&mut conn, store, field, value, None).await;
        self.helper.close(conn).await;
        result
    }

    /// First record whose `field` equals `value`
    pub async fn single(
        &self,
        store: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<Option<Record>> {
        let value = value.into();
        validate_target(store)?;

        let mut conn = self.helper.connect().await?;
        let result = self.search_in(&mut conn, store, field, value, Some(1)).await;
        self.helper.close(conn).await;
        Ok(result?.into_iter().next())
    }

    async fn search_in(
        &self,
        conn: &mut SqliteConnection,
        store: &str,
        field: &str,
        value: Value,
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        let mut schema = self
            .schema_for(conn, store)
            .await?
            .ok_or_else(|| RecordStoreError::store_not_found(store))?;

        if !schema.contains(field) {
            // Another writer may have added the column since it was cached
            schema = self
                .refresh_schema(conn, store)
                .await?
                .ok_or_else(|| RecordStoreError::store_not_found(store))?;
        }
        if !schema.contains(field) {
            return Err(RecordStoreError::validation(format!(
                "Store '{}' has no column '{}'",
                store, field
            )));
        }

        let mut query = SelectQuery::new(store)
            .filter(WhereClause::new(field, Comparison::Equals, value.stored()).into());
        query.limit = limit;
        let command = self.builder.select(&query)?;
        self.helper.fetch_typed(conn, &command, &schema).await
    }

    /// Records matching a predicate statement
    pub async fn search_where(&self, store: &str, statement: &WhereStatement) -> Result<Vec<Record>> {
        validate_target(store)?;

        let mut conn = self.helper.connect().await?;
        let result = self.search_where_in(&mut conn, store, statement).await;
        self.helper.close(conn).await;
        result
    }

    async fn search_where_in(
        &self,
        conn: &mut SqliteConnection,
        store: &str,
        statement: &WhereStatement,
    ) -> Result<Vec<Record>> {
        let Some(schema) = self.schema_for(conn, store).await? else {
            return Err(RecordStoreError::store_not_found(store));
        };
        let query = SelectQuery::new(store).filter(statement.clone());
        let command = self.builder.select(&query)?;
        self.helper.fetch_typed(conn, &command, &schema).await
    }

    /// Every record of a store, optionally projected onto `fields`
    ///
    /// An unknown store has no records.
    pub async fn get_all(&self, store: &str, fields: &[&str]) -> Result<Vec<Record>> {
        validate_target(store)?;

        let mut conn = self.helper.connect().await?;
        let result = self.get_all_in(&mut conn, store, fields).await;
        self.helper.close(conn).await;
        result
    }

    async fn get_all_in(
        &self,
        conn: &mut SqliteConnection,
        store: &str,
        fields: &[&str],
    ) -> Result<Vec<Record>> {
        let Some(schema) = self.schema_for(conn, store).await? else {
            tracing::debug!(store = %store, "Store does not exist yet");
            return Ok(Vec::new());
        };
        let query = SelectQuery::new(store).fields(fields.iter().copied());
        let command = self.builder.select(&query)?;
        self.helper.fetch_typed(conn, &command, &schema).await
    }

    /// Whether a row matches every field of the record
    ///
    /// False for an empty record, an unknown store, or a record with fields the
    /// store has no column for.
    pub async fn exists(&self, store: &str, record: &Record) -> Result<bool> {
        if record.is_empty() {
            return Ok(false);
        }
        validate_target(store)?;

        let mut conn = self.helper.connect().await?;
        let result = self.exists_in(&mut conn, store, record).await;
        self.helper.close(conn).await;
        result
    }

    async fn exists_in(
        &self,
        conn: &mut SqliteConnection,
        store: &str,
        record: &Record,
    ) -> Result<bool> {
        let Some(schema) = self.schema_for(conn, store).await? else {
            return Ok(false);
        };
        if record.keys().any(|field| !schema.contains(field)) {
            return Ok(false);
        }
        self.row_exists(conn, store, &WhereStatement::matching_all(record))
            .await
    }

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Names of every store in the database
    pub async fn store_names(&self) -> Result<Vec<String>> {
        let mut conn = self.helper.connect().await?;
        let result = self.helper.store_names(&mut conn).await;
        self.helper.close(conn).await;
        result
    }

    /// Current schema of a store, read from the catalog
    pub async fn store_schema(&self, store: &str) -> Result<Option<StoreSchema>> {
        validate_target(store)?;

        let mut conn = self.helper.connect().await?;
        let result = self.refresh_schema(&mut conn, store).await;
        self.helper.close(conn).await;
        result
    }

    // =========================================================================
    // Internal Helper Methods
    // =========================================================================

    /// Cached schema, read from the catalog on a miss
    async fn schema_for(
        &self,
        conn: &mut SqliteConnection,
        store: &str,
    ) -> Result<Option<StoreSchema>> {
        if let Some(schema) = self.schemas.read().await.get(store) {
            return Ok(Some(schema.clone()));
        }
        self.refresh_schema(conn, store).await
    }

    async fn refresh_schema(
        &self,
        conn: &mut SqliteConnection,
        store: &str,
    ) -> Result<Option<StoreSchema>> {
        let schema = self.load_known_schema(conn, store).await?;
        let mut schemas = self.schemas.write().await;
        match &schema {
            Some(schema) => {
                schemas.insert(store.to_string(), schema.clone());
            }
            None => {
                schemas.remove(store);
            }
        }
        Ok(schema)
    }

    /// Catalog schema, keeping the kinds this provider already knows
    ///
    /// The catalog stores a flag as `number` and a guid as `nvarchar`, so
    /// kinds seen when the columns were created take precedence.
    async fn load_known_schema(
        &self,
        conn: &mut SqliteConnection,
        store: &str,
    ) -> Result<Option<StoreSchema>> {
        let Some(mut schema) = self.helper.load_schema(conn, store).await? else {
            return Ok(None);
        };
        if let Some(known) = self.schemas.read().await.get(store) {
            schema.refine_kinds(known);
        }
        Ok(Some(schema))
    }

    /// Whether any row matches the filter
    async fn row_exists(
        &self,
        conn: &mut SqliteConnection,
        store: &str,
        filter: &WhereStatement,
    ) -> Result<bool> {
        let query = SelectQuery::new(store).filter(filter.clone()).limit(1);
        let command = self.builder.select(&query)?;
        Ok(!self.helper.fetch(conn, &command).await?.is_empty())
    }
}

/// `primary = record[primary]` for the store's pinned primary column
fn primary_filter(schema: &StoreSchema, record: &Record) -> Result<WhereStatement> {
    let primary = schema.primary_column().ok_or_else(|| {
        RecordStoreError::validation(format!(
            "Store '{}' has no primary column",
            schema.table_name
        ))
    })?;
    let key = record.get(&primary.name).ok_or_else(|| {
        RecordStoreError::validation(format!(
            "Record for '{}' has no value for primary column '{}'",
            schema.table_name, primary.name
        ))
    })?;

    Ok(WhereClause::new(primary.name.as_str(), Comparison::Equals, key.stored()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDefinition;
    use crate::types::ValueKind;
    use tempfile::TempDir;

    fn provider_in(dir: &TempDir) -> StoreProvider {
        let config = StoreConfig::builder()
            .database_path(dir.path())
            .database_name("store.sqlite")
            .build();
        StoreProvider::from_config(&config)
    }

    #[test]
    fn test_primary_filter() {
        let schema = StoreSchema::new(
            "Widget",
            vec![
                ColumnDefinition::new("name", ValueKind::String),
                ColumnDefinition::new("id", ValueKind::Int64).primary(),
            ],
        );
        let record = Record::new().with("name", "a").with("id", 7);

        let filter = primary_filter(&schema, &record).unwrap();
        let clause = &filter.levels()[0][0];
        assert_eq!(clause.field, "id");
        assert_eq!(clause.value, Value::Integer(7));

        let without_key = Record::new().with("name", "a");
        assert!(matches!(
            primary_filter(&schema, &without_key),
            Err(RecordStoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_record_is_ignored() {
        let dir = TempDir::new().unwrap();
        let provider = provider_in(&dir);

        provider.save("Widget", &Record::new()).await.unwrap();
        provider.delete("Widget", &mut Record::new()).await.unwrap();

        assert!(provider.store_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_store_name_is_rejected() {
        let dir = TempDir::new().unwrap();
        let provider = provider_in(&dir);

        let err = provider
            .save(" ", &Record::new().with("id", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordStoreError::InvalidTarget(_)));
    }

    #[tokio::test]
    async fn test_blank_field_name_is_rejected() {
        let dir = TempDir::new().unwrap();
        let provider = provider_in(&dir);

        let record = Record::new().with("id", 1).with("", "x");
        let err = provider.save("Widget", &record).await.unwrap_err();
        assert!(matches!(err, RecordStoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_save_caches_schema() {
        let dir = TempDir::new().unwrap();
        let provider = provider_in(&dir);

        provider
            .save("Widget", &Record::new().with("id", 1).with("name", "a"))
            .await
            .unwrap();

        let cached = provider.schemas.read().await.get("Widget").cloned().unwrap();
        assert_eq!(cached.primary_column().unwrap().name, "id");
        assert_eq!(cached.columns.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_stamps_last_update() {
        let dir = TempDir::new().unwrap();
        let provider = provider_in(&dir);

        let mut record = Record::new().with("id", 1);
        provider.delete("Unknown", &mut record).await.unwrap();

        assert!(matches!(
            record.get(LAST_UPDATE_FIELD),
            Some(Value::DateTime(_))
        ));
    }
}
