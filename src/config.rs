//! Configuration for RecordStore
//!
//! Provides a builder pattern for configuring the database file, plus loading
//! from a JSON file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

const DEFAULT_DATABASE_PATH: &str = ".";
const DEFAULT_DATABASE_NAME: &str = "data.sqlite";
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the record store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Directory holding the database file (default: ".")
    pub database_path: PathBuf,
    /// Database file name (default: "data.sqlite")
    pub database_name: String,
    /// How long a write waits for a competing writer's lock (default: 5s)
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfigBuilder::new().build()
    }
}

/// On-disk shape of the configuration file
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(rename = "DatabasePath")]
    database_path: Option<String>,
    #[serde(rename = "DatabaseName")]
    database_name: Option<String>,
}

impl StoreConfig {
    /// Create a new configuration builder
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::new()
    }

    /// Load configuration from a JSON file
    ///
    /// The file holds `{"DatabasePath": "...", "DatabaseName": "..."}`; missing
    /// keys keep their defaults. A missing file yields the default
    /// configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&text)?;

        let mut builder = Self::builder();
        if let Some(database_path) = file.database_path {
            builder = builder.database_path(database_path);
        }
        if let Some(database_name) = file.database_name {
            builder = builder.database_name(database_name);
        }
        Ok(builder.build())
    }

    /// Full path of the database file
    pub fn database_file(&self) -> PathBuf {
        self.database_path.join(&self.database_name)
    }
}

/// Builder for StoreConfig
#[derive(Debug)]
pub struct StoreConfigBuilder {
    database_path: PathBuf,
    database_name: String,
    busy_timeout: Duration,
}

impl Default for StoreConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Set the directory holding the database file
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Set the database file name
    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    /// Set the lock wait timeout
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Build the configuration
    pub fn build(self) -> StoreConfig {
        StoreConfig {
            database_path: self.database_path,
            database_name: self.database_name,
            busy_timeout: self.busy_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // =========================================================================
    // Builder Tests
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.database_path, PathBuf::from("."));
        assert_eq!(config.database_name, "data.sqlite");
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_overrides() {
        let config = StoreConfig::builder()
            .database_path("/var/lib/records")
            .database_name("records.db")
            .busy_timeout(Duration::from_millis(250))
            .build();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/records"));
        assert_eq!(config.database_name, "records.db");
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_builder_order_independence() {
        let a = StoreConfig::builder()
            .database_name("a.db")
            .database_path("dir")
            .build();
        let b = StoreConfig::builder()
            .database_path("dir")
            .database_name("a.db")
            .build();
        assert_eq!(a, b);
    }

    #[test]
    fn test_database_file() {
        let config = StoreConfig::builder()
            .database_path("dir")
            .database_name("x.sqlite")
            .build();
        assert_eq!(config.database_file(), PathBuf::from("dir").join("x.sqlite"));
    }

    // =========================================================================
    // File Loading Tests
    // =========================================================================

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::load(dir.path().join("missing.json")).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("store.json");
        std::fs::write(
            &file,
            r#"{"DatabasePath": "/data", "DatabaseName": "people.sqlite"}"#,
        )
        .unwrap();

        let config = StoreConfig::load(&file).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/data"));
        assert_eq!(config.database_name, "people.sqlite");
        assert_eq!(config.busy_timeout, DEFAULT_BUSY_TIMEOUT);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("store.json");
        std::fs::write(&file, r#"{"DatabaseName": "only-name.sqlite"}"#).unwrap();

        let config = StoreConfig::load(&file).unwrap();
        assert_eq!(config.database_path, PathBuf::from("."));
        assert_eq!(config.database_name, "only-name.sqlite");
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("store.json");
        std::fs::write(&file, "not json").unwrap();

        let err = StoreConfig::load(&file).unwrap_err();
        assert!(matches!(err, crate::error::RecordStoreError::Json(_)));
    }

    #[test]
    fn test_config_clone() {
        let config = StoreConfig::builder().database_name("c.db").build();
        let cloned = config.clone();
        assert_eq!(cloned.database_name, "c.db");
    }
}
