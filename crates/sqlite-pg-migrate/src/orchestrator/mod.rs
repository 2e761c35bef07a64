//! Migration orchestrator - main workflow coordinator.
//!
//! Phases run strictly one after another: discover and introspect source
//! tables, create every target table and classify its columns, copy every
//! table, then optionally link foreign keys and finally restart identities.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classify::{classify_table, TableMetadataCache};
use crate::config::Config;
use crate::core::schema::Table;
use crate::core::traits::{SourceReader, TargetWriter};
use crate::ddl;
use crate::drivers::{PostgresWriter, SqliteReader};
use crate::error::{MigrateError, Result};
use crate::transfer::{TransferConfig, TransferEngine};

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
}

/// Per-table outcome of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSummary {
    pub name: String,
    pub rows: u64,
    pub pages: u64,
    pub duration_ms: u64,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status ("completed" or "dry_run").
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Tables selected by the include/exclude filters.
    pub tables_total: usize,

    /// Tables created and copied.
    pub tables_migrated: usize,

    /// Total rows transferred.
    pub rows_transferred: u64,

    /// Average throughput (rows/second).
    pub rows_per_second: u64,

    /// Foreign key constraints created.
    pub foreign_keys_created: usize,

    /// Per-table details, in copy order.
    #[serde(default)]
    pub tables: Vec<TableSummary>,

    /// Statements a dry run would execute.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub planned_ddl: Vec<String>,
}

impl MigrationResult {
    fn empty(run_id: String, status: &str, started_at: DateTime<Utc>) -> Self {
        let completed_at = Utc::now();
        Self {
            run_id,
            status: status.to_string(),
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            started_at,
            completed_at,
            tables_total: 0,
            tables_migrated: 0,
            rows_transferred: 0,
            rows_per_second: 0,
            foreign_keys_created: 0,
            tables: Vec::new(),
            planned_ddl: Vec::new(),
        }
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Row counts for one table, source vs target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableValidation {
    pub table: String,
    pub source_rows: u64,
    /// `None` when the target table could not be counted.
    pub target_rows: Option<u64>,
    pub matches: bool,
}

/// Connectivity of both endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_version: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_version: Option<String>,
    pub healthy: bool,
}

impl HealthCheckResult {
    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Orchestrator {
    /// Open the source file and connect to the target.
    pub async fn new(config: Config) -> Result<Self> {
        let source = SqliteReader::new(&config.source).await?;
        let target =
            PostgresWriter::new(&config.target, config.migration.max_pg_connections).await?;

        Ok(Self::with_endpoints(
            config,
            Arc::new(source),
            Arc::new(target),
        ))
    }

    /// Build an orchestrator over already-connected endpoints.
    pub fn with_endpoints(
        config: Config,
        source: Arc<dyn SourceReader>,
        target: Arc<dyn TargetWriter>,
    ) -> Self {
        Self {
            config,
            source,
            target,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the migration.
    ///
    /// With `dry_run` set, the source is introspected and the planned DDL is
    /// returned without writing anything to the target.
    pub async fn run(&self, dry_run: bool) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let timer = Instant::now();
        let schema = self.config.target.schema.clone();

        info!(
            "Starting migration run: {} ({} -> {})",
            run_id,
            self.source.db_type(),
            self.target.db_type()
        );

        // Phase 1: Introspect
        info!("Phase 1: Extracting schema from source");
        let tables = self.extract_schema().await?;
        if tables.is_empty() {
            info!("No tables matched the include/exclude filters; nothing to do");
            let status = if dry_run { "dry_run" } else { "completed" };
            return Ok(MigrationResult::empty(run_id, status, started_at));
        }

        if dry_run {
            let planned_ddl = self.plan(&tables)?;
            for sql in &planned_ddl {
                info!("{};", sql);
            }
            info!(
                "Dry run: {} tables, {} statements planned",
                tables.len(),
                planned_ddl.len()
            );
            let mut result = MigrationResult::empty(run_id, "dry_run", started_at);
            result.tables_total = tables.len();
            result.planned_ddl = planned_ddl;
            return Ok(result);
        }

        // Phase 2: Create target tables
        info!("Phase 2: Creating target tables in schema '{}'", schema);
        let cache = self.create_tables(&tables).await?;

        // Phase 3: Copy data
        info!("Phase 3: Transferring data");
        let summaries = self.copy_tables(&tables, &cache).await?;

        // Phase 4: Foreign keys
        let foreign_keys_created = if self.config.migration.create_foreign_keys {
            info!("Phase 4: Creating foreign keys");
            self.link_constraints(&tables).await?
        } else {
            info!("Phase 4: Skipping foreign keys (create_foreign_keys = false)");
            0
        };

        // Phase 5: Identity sequences
        info!("Phase 5: Resetting identity sequences");
        for table in tables.iter().filter(|t| t.identity_column().is_some()) {
            self.target.reset_sequence(&schema, table).await?;
        }

        let elapsed = timer.elapsed();
        let rows_transferred: u64 = summaries.iter().map(|s| s.rows).sum();
        let secs = elapsed.as_secs_f64();
        let rows_per_second = if secs > 0.0 {
            (rows_transferred as f64 / secs) as u64
        } else {
            0
        };

        let result = MigrationResult {
            run_id,
            status: "completed".to_string(),
            duration_seconds: secs,
            started_at,
            completed_at: Utc::now(),
            tables_total: tables.len(),
            tables_migrated: summaries.len(),
            rows_transferred,
            rows_per_second,
            foreign_keys_created,
            tables: summaries,
            planned_ddl: Vec::new(),
        };

        info!(
            "Migration completed: {} tables, {} rows in {:.1}s ({} rows/sec)",
            result.tables_migrated, result.rows_transferred, secs, result.rows_per_second
        );
        Ok(result)
    }

    /// List the source tables that pass the filters and introspect each one.
    async fn extract_schema(&self) -> Result<Vec<Table>> {
        let names = self.source.list_tables().await?;
        let filter = self.config.migration.table_filter()?;

        let mut tables = Vec::new();
        for name in names.iter().filter(|n| filter.matches(n)) {
            tables.push(self.source.introspect_table(name).await?);
        }

        info!(
            "Selected {} of {} source tables{}",
            tables.len(),
            names.len(),
            if tables.is_empty() {
                String::new()
            } else {
                format!(
                    ": {}",
                    tables
                        .iter()
                        .map(|t| t.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
        );
        Ok(tables)
    }

    /// Statements a real run would send, in order.
    pub fn plan(&self, tables: &[Table]) -> Result<Vec<String>> {
        let schema = &self.config.target.schema;
        let mut statements = vec![ddl::create_schema_sql(schema)];

        for table in tables {
            statements.push(ddl::drop_table_sql(schema, &table.name));
            statements.push(ddl::create_table_sql(table, schema));
            for idx in table.unique_indexes() {
                statements.push(ddl::create_unique_index_sql(table, idx, schema));
            }
        }

        if self.config.migration.create_foreign_keys {
            let by_name = index_by_name(tables);
            for table in tables {
                for fk in &table.foreign_keys {
                    let Some(referenced) = by_name.get(&fk.ref_table.to_ascii_lowercase()) else {
                        continue;
                    };
                    let fk = ddl::resolve_ref_columns(fk, Some(referenced))?;
                    statements.push(ddl::foreign_key_sql(table, &fk, schema));
                }
            }
        }

        statements.extend(
            tables
                .iter()
                .filter_map(|t| ddl::reset_identity_sql(t, schema)),
        );
        Ok(statements)
    }

    /// Drop, create and index every table, then classify what the target built.
    async fn create_tables(&self, tables: &[Table]) -> Result<TableMetadataCache> {
        let schema = &self.config.target.schema;
        self.target.create_schema(schema).await?;

        let mut cache = TableMetadataCache::new();
        for table in tables {
            self.target.drop_table(schema, &table.name).await?;
            self.target.create_table(table, schema).await?;

            for idx in table.indexes.iter().filter(|i| i.is_unique && i.is_partial) {
                warn!(
                    "Skipping partial unique index {} on {}: not supported",
                    idx.name, table.name
                );
            }
            for idx in table.unique_indexes() {
                self.target.create_unique_index(table, idx, schema).await?;
            }

            classify_table(self.target.as_ref(), schema, &table.name, &mut cache).await?;
            info!("Created table {}.{}", schema, table.name);
        }
        Ok(cache)
    }

    /// Copy every table in order, stopping at the first failure.
    async fn copy_tables(
        &self,
        tables: &[Table],
        cache: &TableMetadataCache,
    ) -> Result<Vec<TableSummary>> {
        let migration = &self.config.migration;
        let engine = TransferEngine::new(
            self.source.clone(),
            self.target.clone(),
            TransferConfig {
                page_size: migration.page_size,
                row_fallback: migration.row_fallback,
                empty_string_as_null: migration.empty_string_as_null,
                target_schema: self.config.target.schema.clone(),
            },
        );

        let mut summaries = Vec::with_capacity(tables.len());
        for table in tables {
            let classes = cache.get(&table.name).ok_or_else(|| {
                MigrateError::Schema(format!(
                    "No column classification recorded for table {}",
                    table.name
                ))
            })?;

            let stats = engine.copy_table(table, classes).await?;
            summaries.push(TableSummary {
                name: table.name.clone(),
                rows: stats.rows,
                pages: stats.pages,
                duration_ms: stats.elapsed.as_millis() as u64,
            });
        }
        Ok(summaries)
    }

    /// Add every foreign key group as a deferred constraint.
    ///
    /// Groups whose referenced table is not part of this run are skipped.
    pub async fn link_constraints(&self, tables: &[Table]) -> Result<usize> {
        let schema = &self.config.target.schema;
        let by_name = index_by_name(tables);

        let mut created = 0;
        for table in tables {
            for fk in &table.foreign_keys {
                let Some(referenced) = by_name.get(&fk.ref_table.to_ascii_lowercase()) else {
                    warn!(
                        "Skipping foreign key {} on {}: referenced table {} is not being migrated",
                        ddl::constraint_name(&table.name, fk.id),
                        table.name,
                        fk.ref_table
                    );
                    continue;
                };
                let fk = ddl::resolve_ref_columns(fk, Some(referenced))?;
                self.target.create_foreign_key(table, &fk, schema).await?;
                created += 1;
            }
        }

        info!("Created {} foreign keys", created);
        Ok(created)
    }

    /// Compare row counts between source and target for every selected table.
    pub async fn validate(&self) -> Result<Vec<TableValidation>> {
        let schema = &self.config.target.schema;
        let names = self.source.list_tables().await?;
        let filter = self.config.migration.table_filter()?;

        let mut results = Vec::new();
        for name in names.into_iter().filter(|n| filter.matches(n)) {
            let source_rows = self.source.get_row_count(&name).await?;
            let target_rows = match self.target.get_row_count(schema, &name).await {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!("{}: cannot count target rows: {}", name, e);
                    None
                }
            };
            let matches = target_rows == Some(source_rows);

            if matches {
                info!("{}: {} rows (match)", name, source_rows);
            } else {
                warn!(
                    "{}: source={}, target={} (MISMATCH)",
                    name,
                    source_rows,
                    target_rows.map_or_else(|| "missing".to_string(), |n| n.to_string())
                );
            }

            results.push(TableValidation {
                table: name,
                source_rows,
                target_rows,
                matches,
            });
        }
        Ok(results)
    }

    /// Try to reach both endpoints independently and report their versions.
    pub async fn health_check(config: &Config) -> HealthCheckResult {
        let start = Instant::now();
        let source = match SqliteReader::new(&config.source).await {
            Ok(reader) => {
                let version = reader.version().await;
                reader.close().await;
                version
            }
            Err(e) => Err(e),
        };
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let target = match PostgresWriter::new(&config.target, 1).await {
            Ok(writer) => {
                let version = writer.version().await;
                writer.close().await;
                version
            }
            Err(e) => Err(e),
        };
        let target_latency_ms = start.elapsed().as_millis() as u64;

        let (source_version, source_error) = split_outcome(source);
        let (target_version, target_error) = split_outcome(target);

        HealthCheckResult {
            source_connected: source_error.is_none(),
            source_latency_ms,
            target_connected: target_error.is_none(),
            target_latency_ms,
            healthy: source_error.is_none() && target_error.is_none(),
            source_error,
            source_version,
            target_error,
            target_version,
        }
    }

    /// Close both connection pools.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }
}

fn split_outcome(outcome: Result<String>) -> (Option<String>, Option<String>) {
    match outcome {
        Ok(version) => (Some(version), None),
        Err(e) => (None, Some(e.to_string())),
    }
}

/// Tables keyed by lowercased name, matching SQLite's case-insensitive lookup.
fn index_by_name(tables: &[Table]) -> HashMap<String, &Table> {
    tables
        .iter()
        .map(|t| (t.name.to_ascii_lowercase(), t))
        .collect()
}
