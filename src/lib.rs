//! # runtara-record-store
//!
//! A schema-evolving record store on SQLite.
//!
//! Records are flat, ordered maps of field names to typed values. Saving a
//! record into a named store creates the store's table on first use and adds
//! columns for fields it has not seen before, so callers never declare a
//! schema up front.
//!
//! ## Features
//!
//! - **Schema Evolution**: Tables and columns are created on demand; the first field of the first record becomes the primary column
//! - **Upsert by Primary Key**: Saves update the existing row or insert a new one inside a single write transaction
//! - **Predicate Algebra**: Multi-level filters (OR across levels, AND within a level, chained sub-clauses per field)
//! - **Parameterized SQL**: Every caller value is bound; identifiers are quoted and validated
//! - **Typed Datasets**: Statically declared field lists via the `Dataset` trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use runtara_record_store::{
//!     Comparison, LogicOperator, Record, StoreConfig, StoreProvider, WhereClause, WhereStatement,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoreConfig::builder()
//!         .database_path("/var/lib/app")
//!         .database_name("data.sqlite")
//!         .build();
//!     let store = StoreProvider::from_config(&config);
//!
//!     // Creates the "Widget" store with "id" as its primary column
//!     store
//!         .save("Widget", &Record::new().with("id", 1).with("name", "Blue Widget"))
//!         .await?;
//!
//!     // Updates the same row and adds a "price" column
//!     store
//!         .save(
//!             "Widget",
//!             &Record::new().with("id", 1).with("name", "Blue Widget").with("price", 29.99),
//!         )
//!         .await?;
//!
//!     let blue = store.search("Widget", "name", "Blue Widget").await?;
//!
//!     // name LIKE 'Blue%' OR name LIKE '%Red'
//!     let mut statement = WhereStatement::new();
//!     statement.add(
//!         WhereClause::new("name", Comparison::Begins, "Blue")
//!             .with_subclause(LogicOperator::Or, Comparison::Ends, "Red"),
//!     )?;
//!     let colored = store.search_where("Widget", &statement).await?;
//!
//!     println!("{} / {}", blue.len(), colored.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! The store is configured using `StoreConfig`, either through its builder or
//! from a JSON file:
//!
//! ```rust,no_run
//! use runtara_record_store::StoreConfig;
//!
//! // {"DatabasePath": "/var/lib/app", "DatabaseName": "data.sqlite"}
//! let config = StoreConfig::load("store.json")?;
//! # Ok::<(), runtara_record_store::RecordStoreError>(())
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod helper;
pub mod record;
pub mod schema;
pub mod sql;
pub mod statement;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use config::{StoreConfig, StoreConfigBuilder};
pub use dataset::{Dataset, DatasetController};
pub use error::{RecordStoreError, Result};
pub use helper::SqliteHelper;
pub use record::Record;
pub use schema::{ColumnDefinition, StoreSchema};
pub use statement::{
    Comparison, LogicOperator, OrderByClause, Sorting, SubClause, WhereClause, WhereStatement,
};
pub use store::{LAST_UPDATE_FIELD, StoreProvider};
pub use types::{Value, ValueKind};

// Re-export SQL utilities for advanced users
pub use sql::command::{Command, CommandBuilder, SelectQuery};
pub use sql::condition::{Parameter, build_order_by_clause, build_where_clause};
pub use sql::ddl::DdlGenerator;
pub use sql::literal::format_literal;
pub use sql::sanitize::quote_identifier;
