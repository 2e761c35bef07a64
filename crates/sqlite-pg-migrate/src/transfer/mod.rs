//! Paged data transfer.
//!
//! Each table is copied page by page: read with `LIMIT`/`OFFSET`, sanitize
//! every value against the target's column classes, then send the page as
//! one multi-row insert. Reads and writes never overlap.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::classify::{ColumnClasses, DestinationTypeClass};
use crate::core::schema::Table;
use crate::core::traits::{SourceReader, TargetWriter};
use crate::core::value::{Row, SqlValue};
use crate::error::{MigrateError, Result};
use crate::sanitize::Sanitizer;

/// Transfer engine configuration.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Rows per page.
    pub page_size: usize,

    /// Retry a failed page row by row to locate the offending row.
    pub row_fallback: bool,

    /// Empty-string policy handed to the sanitizer.
    pub empty_string_as_null: bool,

    /// Destination schema.
    pub target_schema: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            row_fallback: false,
            empty_string_as_null: true,
            target_schema: "public".to_string(),
        }
    }
}

/// Statistics for one table copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferStats {
    /// Rows inserted.
    pub rows: u64,

    /// Pages inserted.
    pub pages: u64,

    /// Wall-clock time for the copy.
    pub elapsed: Duration,
}

impl TransferStats {
    pub fn rows_per_sec(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.rows as f64 / secs) as u64
        } else {
            0
        }
    }
}

/// Outcome of inserting one row of a failed page on its own.
#[derive(Debug)]
pub struct RowDiagnosis {
    /// Absolute row position in the table.
    pub row: u64,

    /// The row-level rejection.
    pub error: MigrateError,

    /// Numeric, decimal and blank values in the row, as `column=value`.
    pub suspects: Vec<String>,
}

/// Copies table data from source to target.
pub struct TransferEngine {
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
    config: TransferConfig,
    sanitizer: Sanitizer,
}

impl TransferEngine {
    pub fn new(
        source: Arc<dyn SourceReader>,
        target: Arc<dyn TargetWriter>,
        config: TransferConfig,
    ) -> Self {
        let sanitizer = Sanitizer::new(config.empty_string_as_null);
        Self {
            source,
            target,
            config,
            sanitizer,
        }
    }

    /// Copy all rows of `table`.
    ///
    /// A failed page aborts the copy with `MigrateError::BatchInsert`. With
    /// row fallback enabled the page is diagnosed first.
    pub async fn copy_table(&self, table: &Table, classes: &ColumnClasses) -> Result<TransferStats> {
        let start = Instant::now();
        let total = self.source.get_row_count(&table.name).await?;

        if total == 0 {
            info!("{}: no rows to copy", table.name);
            return Ok(TransferStats::default());
        }

        info!("{}: copying {} rows", table.name, total);

        let columns = table.column_names();
        let page_size = self.config.page_size.max(1);
        let mut stats = TransferStats::default();
        let mut offset = 0u64;

        while offset < total {
            let batch = self.source.read_page(table, page_size, offset).await?;
            if batch.is_empty() {
                warn!(
                    "{}: source returned no rows at offset {} (expected {})",
                    table.name, offset, total
                );
                break;
            }
            let fetched = batch.len() as u64;

            let rows: Vec<Row> = batch
                .rows
                .into_iter()
                .map(|row| self.sanitizer.sanitize_row(classes, &columns, row))
                .collect();

            if let Err(e) = self
                .target
                .insert_rows(&self.config.target_schema, &table.name, &columns, &rows)
                .await
            {
                error!(
                    "{}: batch insert failed at offset {}: {}",
                    table.name, offset, e
                );
                if self.config.row_fallback {
                    self.diagnose_page(table, classes, &columns, &rows, offset)
                        .await;
                }
                return Err(MigrateError::batch_insert(&table.name, offset, e));
            }

            stats.rows += fetched;
            stats.pages += 1;
            offset += fetched;

            info!("{}: {}/{} rows", table.name, offset.min(total), total);
        }

        stats.elapsed = start.elapsed();
        info!(
            "{}: transferred {} rows in {:?} ({} rows/sec)",
            table.name,
            stats.rows,
            stats.elapsed,
            stats.rows_per_sec()
        );
        Ok(stats)
    }

    /// Insert a failed page one row at a time and report each rejected row.
    ///
    /// Rows that succeed stay inserted. The caller still fails the run.
    pub async fn diagnose_page(
        &self,
        table: &Table,
        classes: &ColumnClasses,
        columns: &[String],
        rows: &[Row],
        offset: u64,
    ) -> Vec<RowDiagnosis> {
        warn!(
            "{}: retrying page at offset {} row by row to locate the failure",
            table.name, offset
        );

        let mut failures = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let position = offset + i as u64;
            let result = self
                .target
                .insert_rows(
                    &self.config.target_schema,
                    &table.name,
                    columns,
                    std::slice::from_ref(row),
                )
                .await;

            if let Err(e) = result {
                let error = MigrateError::RowInsert {
                    table: table.name.clone(),
                    row: position,
                    message: e.to_string(),
                };
                let suspects = suspect_values(classes, columns, row);
                error!("{}", error);
                if !suspects.is_empty() {
                    error!("  suspect values: {}", suspects.join(", "));
                }
                failures.push(RowDiagnosis {
                    row: position,
                    error,
                    suspects,
                });
            }
        }

        if failures.is_empty() {
            warn!(
                "{}: every row at offset {} inserted on its own; the page failed as a whole",
                table.name, offset
            );
        }
        failures
    }
}

/// Values likely to cause a type rejection: anything in a numeric column
/// and any blank string.
pub fn suspect_values(classes: &ColumnClasses, columns: &[String], row: &Row) -> Vec<String> {
    columns
        .iter()
        .zip(row.iter())
        .filter(|(col, value)| {
            let numeric = matches!(
                classes.get(col),
                DestinationTypeClass::Int | DestinationTypeClass::Float | DestinationTypeClass::Decimal
            );
            (numeric && !value.is_null()) || value.is_blank_text()
        })
        .map(|(col, value)| format!("{}={}", col, describe(value)))
        .collect()
}

fn describe(value: &SqlValue) -> String {
    match value {
        SqlValue::Text(s) | SqlValue::Decimal(s) => format!("{:?}", s),
        SqlValue::I64(n) => n.to_string(),
        SqlValue::F64(f) => f.to_string(),
        other => format!("{:?}", other),
    }
}
