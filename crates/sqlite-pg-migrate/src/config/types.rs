//! Configuration type definitions.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{MigrateError, Result};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (SQLite).
    pub source: SourceConfig,

    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database (SQLite) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the SQLite database file. Opened read-only.
    pub path: PathBuf,
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Full connection string (`postgres://...` or `key=value` form).
    /// When set, host/port/database/user/password are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Database host.
    #[serde(default)]
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    #[serde(default)]
    pub database: String,

    /// Username.
    #[serde(default)]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Target schema (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// SSL mode (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows fetched and inserted per page (default: 1000).
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Create foreign keys after all data is copied (default: false).
    #[serde(default)]
    pub create_foreign_keys: bool,

    /// Tables to include (names or glob patterns). Empty means all tables.
    #[serde(default)]
    pub include_tables: Vec<String>,

    /// Tables to exclude (names or glob patterns).
    #[serde(default)]
    pub exclude_tables: Vec<String>,

    /// Convert whitespace-only strings to NULL in typed columns (default: true).
    #[serde(default = "default_true")]
    pub empty_string_as_null: bool,

    /// Retry a failed page row by row to pinpoint the offending row (default: false).
    #[serde(default)]
    pub row_fallback: bool,

    /// Maximum PostgreSQL connections (default: 4).
    #[serde(default = "default_max_pg_connections")]
    pub max_pg_connections: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            create_foreign_keys: false,
            include_tables: Vec::new(),
            exclude_tables: Vec::new(),
            empty_string_as_null: true,
            row_fallback: false,
            max_pg_connections: default_max_pg_connections(),
        }
    }
}

impl MigrationConfig {
    /// Compile the include/exclude patterns.
    ///
    /// Fails with `MigrateError::Config` on an invalid pattern.
    pub fn table_filter(&self) -> Result<TableFilter> {
        Ok(TableFilter {
            include: build_glob_set(&self.include_tables, "include_tables")?,
            exclude: build_glob_set(&self.exclude_tables, "exclude_tables")?,
        })
    }
}

/// Compiled table include/exclude filters.
#[derive(Debug, Clone)]
pub struct TableFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl TableFilter {
    /// Check whether a table passes the filters. Exclusion wins over inclusion.
    pub fn matches(&self, table: &str) -> bool {
        let included = self.include.as_ref().map_or(true, |set| set.is_match(table));
        included && !self.exclude.as_ref().is_some_and(|set| set.is_match(table))
    }
}

/// `None` when there are no patterns.
fn build_glob_set(patterns: &[String], field: &str) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            MigrateError::Config(format!("migration.{}: invalid pattern '{}': {}", field, pattern, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map(Some)
        .map_err(|e| MigrateError::Config(format!("migration.{}: {}", field, e)))
}

// Default value functions for serde
fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_page_size() -> usize {
    1000
}

fn default_max_pg_connections() -> usize {
    4
}

fn default_true() -> bool {
    true
}
