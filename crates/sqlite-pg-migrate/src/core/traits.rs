//! Core traits for the migration engine.
//!
//! - [`SourceReader`]: reads schema and rows from the source database
//! - [`TargetWriter`]: writes schema, rows and constraints to the target
//!
//! The orchestrator and transfer engine only see these traits, so every
//! phase can be exercised against in-memory implementations.

use async_trait::async_trait;

use crate::error::Result;

use super::schema::{ForeignKey, Index, Table};
use super::value::{Batch, Row};

/// A column as materialized by the target, with its native type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetColumn {
    /// Column name.
    pub name: String,
    /// Native type name reported by the target catalog.
    pub data_type: String,
}

/// Read schema and data from a source database.
///
/// Implementations never modify the source.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// List user tables in a stable order.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Load the full descriptor of a table: columns, primary key,
    /// foreign keys and indexes.
    ///
    /// Fails with `MigrateError::Schema` when the table does not exist.
    async fn introspect_table(&self, name: &str) -> Result<Table>;

    /// Get the row count for a table.
    async fn get_row_count(&self, table: &str) -> Result<u64>;

    /// Read up to `limit` rows starting at `offset`, in the source's native
    /// order, with values in `table.columns` order.
    async fn read_page(&self, table: &Table, limit: usize, offset: u64) -> Result<Batch>;

    /// Get the database type identifier (e.g., "sqlite").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}

/// Write schema and data to a target database.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    // ===== Schema Operations =====

    /// Create a schema if it doesn't exist.
    async fn create_schema(&self, schema: &str) -> Result<()>;

    /// Drop a table if it exists.
    async fn drop_table(&self, schema: &str, table: &str) -> Result<()>;

    /// Create a table, including its primary key.
    async fn create_table(&self, table: &Table, target_schema: &str) -> Result<()>;

    /// Create a unique index on a table.
    async fn create_unique_index(
        &self,
        table: &Table,
        idx: &Index,
        target_schema: &str,
    ) -> Result<()>;

    /// Read back the columns of a table as the target materialized them.
    async fn column_types(&self, schema: &str, table: &str) -> Result<Vec<TargetColumn>>;

    // ===== Constraint Operations =====

    /// Create a deferred foreign key constraint.
    ///
    /// `fk.ref_columns` must already be resolved.
    async fn create_foreign_key(
        &self,
        table: &Table,
        fk: &ForeignKey,
        target_schema: &str,
    ) -> Result<()>;

    // ===== Data Operations =====

    /// Insert rows with a single multi-row statement.
    async fn insert_rows(
        &self,
        schema: &str,
        table: &str,
        cols: &[String],
        rows: &[Row],
    ) -> Result<u64>;

    // ===== Utility Operations =====

    /// Get the row count for a table.
    async fn get_row_count(&self, schema: &str, table: &str) -> Result<u64>;

    /// Restart identity values after data load.
    async fn reset_sequence(&self, schema: &str, table: &Table) -> Result<()>;

    /// Get the database type identifier (e.g., "postgres").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}
