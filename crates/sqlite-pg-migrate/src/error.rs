//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source or target could not be reached at startup.
    #[error("Connection to {endpoint} failed: {message}")]
    Connection { endpoint: String, message: String },

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Introspection found an inconsistency (e.g. a named table is missing).
    #[error("Schema error: {0}")]
    Schema(String),

    /// Target rejected a table, index or constraint statement.
    #[error("DDL failed for table {table}: {message}")]
    Ddl { table: String, message: String },

    /// Target rejected a page of rows.
    #[error("Batch insert failed for table {table} at offset {offset}: {message}")]
    BatchInsert {
        table: String,
        offset: u64,
        message: String,
    },

    /// A single row was rejected while diagnosing a failed page.
    #[error("Row insert failed for table {table} at row {row}: {message}")]
    RowInsert {
        table: String,
        row: u64,
        message: String,
    },

    /// Source database query error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Target database query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Connection error
    pub fn connection(endpoint: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Connection {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Create a DDL error
    pub fn ddl(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Ddl {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a BatchInsert error
    pub fn batch_insert(table: impl Into<String>, offset: u64, message: impl ToString) -> Self {
        MigrateError::BatchInsert {
            table: table.into(),
            offset,
            message: message.to_string(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 1,
            MigrateError::Connection { .. } | MigrateError::Pool { .. } => 2,
            MigrateError::Schema(_) => 3,
            MigrateError::Ddl { .. } => 4,
            MigrateError::BatchInsert { .. } | MigrateError::RowInsert { .. } => 5,
            MigrateError::Source(_) | MigrateError::Target(_) => 6,
            MigrateError::Io(_) => 7,
            MigrateError::Json(_) => 8,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        // Add error chain for wrapped errors
        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_phase() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), 1);
        assert_eq!(MigrateError::connection("source", "gone").exit_code(), 2);
        assert_eq!(MigrateError::Schema("missing".into()).exit_code(), 3);
        assert_eq!(MigrateError::ddl("users", "bad type").exit_code(), 4);
        assert_eq!(MigrateError::batch_insert("users", 0, "boom").exit_code(), 5);
    }

    #[test]
    fn test_batch_insert_message_names_table_and_offset() {
        let err = MigrateError::batch_insert("orders", 2000, "invalid input syntax");
        let msg = err.to_string();
        assert!(msg.contains("orders"));
        assert!(msg.contains("2000"));
        assert!(msg.contains("invalid input syntax"));
    }

    #[test]
    fn test_format_detailed_includes_cause_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = MigrateError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error: no such file"));
    }
}
