//! # sqlite-pg-migrate
//!
//! One-shot SQLite to PostgreSQL migration library.
//!
//! The core is a type reconciliation pipeline:
//!
//! - **Type mapping** from SQLite's free-form declared types to PostgreSQL
//! - **DDL synthesis** with primary keys, identities, defaults and unique indexes
//! - **Destination classification** from the types PostgreSQL actually created
//! - **Row sanitization** of loosely typed values against those classes
//! - **Paged transfer** with optional row-by-row failure diagnosis
//! - **Deferred foreign keys** linked after all data is loaded
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlite_pg_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run(false).await?;
//!     println!("Migrated {} rows", result.rows_transferred);
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod config;
pub mod core;
pub mod ddl;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod sanitize;
pub mod transfer;
pub mod typemap;

// Re-exports for convenient access
pub use classify::{classify, ColumnClasses, DestinationTypeClass, TableMetadataCache};
pub use config::{Config, MigrationConfig, SourceConfig, TableFilter, TargetConfig};
pub use core::{
    Batch, Column, ForeignKey, Index, Row, SourceReader, SqlValue, Table, TargetColumn,
    TargetWriter,
};
pub use drivers::{PostgresWriter, SqliteReader, SslMode};
pub use error::{MigrateError, Result};
pub use orchestrator::{
    HealthCheckResult, MigrationResult, Orchestrator, TableSummary, TableValidation,
};
pub use sanitize::Sanitizer;
pub use transfer::{TransferConfig, TransferEngine, TransferStats};
pub use typemap::{map_type, PortableType};
