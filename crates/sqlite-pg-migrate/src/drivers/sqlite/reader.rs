//! SQLite source reader implementation.
//!
//! Implements the `SourceReader` trait over a read-only SQLx SQLite pool.
//! Catalog metadata comes from the `pragma_*` table-valued functions.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, TypeInfo, ValueRef};
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::core::schema::{Column, ForeignKey, Index, Table};
use crate::core::traits::SourceReader;
use crate::core::value::{Batch, SqlValue};
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite source reader implementation.
pub struct SqliteReader {
    pool: SqlitePool,
    endpoint: String,
}

impl SqliteReader {
    /// Open the database file read-only.
    ///
    /// Fails with `MigrateError::Connection` when the file is missing or is
    /// not a SQLite database.
    pub async fn new(config: &SourceConfig) -> Result<Self> {
        let endpoint = format!("SQLite {}", config.path.display());

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::connection(&endpoint, e))?;

        let reader = Self { pool, endpoint };
        reader
            .test_connection()
            .await
            .map_err(|e| MigrateError::connection(&reader.endpoint, e))?;

        info!("Connected to {}", reader.endpoint);
        Ok(reader)
    }

    /// Run a query that touches the file header.
    pub async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT COUNT(*) FROM sqlite_master")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    /// SQLite library version.
    pub async fn version(&self) -> Result<String> {
        let row: SqliteRow = sqlx::query("SELECT sqlite_version()")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<String, _>(0)?)
    }

    /// Quote a SQLite identifier.
    fn quote_ident(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let row: SqliteRow =
            sqlx::query("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.try_get::<i64, _>(0)? > 0)
    }

    /// Load columns and the primary key.
    async fn load_columns(&self, table: &mut Table) -> Result<()> {
        let query = r#"
            SELECT cid, name, type, "notnull", dflt_value, pk
            FROM pragma_table_info(?)
            ORDER BY cid
        "#;

        let rows: Vec<SqliteRow> = sqlx::query(query)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await?;

        let mut pk: Vec<(i64, String)> = Vec::new();
        for row in rows {
            let name: String = row.try_get("name")?;
            let pk_pos: i64 = row.try_get("pk")?;
            if pk_pos > 0 {
                pk.push((pk_pos, name.clone()));
            }

            table.columns.push(Column {
                name,
                data_type: row.try_get::<Option<String>, _>("type")?.unwrap_or_default(),
                is_nullable: row.try_get::<i64, _>("notnull")? == 0,
                default_value: row.try_get("dflt_value")?,
                is_primary_key: pk_pos > 0,
            });
        }

        pk.sort_by_key(|(pos, _)| *pos);
        table.primary_key = pk.into_iter().map(|(_, name)| name).collect();
        Ok(())
    }

    /// Load foreign keys, grouping column pairs by constraint id.
    async fn load_foreign_keys(&self, table: &mut Table) -> Result<()> {
        let query = r#"
            SELECT id, seq, "table", "from", "to", on_update, on_delete
            FROM pragma_foreign_key_list(?)
            ORDER BY id, seq
        "#;

        let rows: Vec<SqliteRow> = sqlx::query(query)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await?;

        let mut groups: BTreeMap<i64, (ForeignKey, bool)> = BTreeMap::new();
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let from: String = row.try_get("from")?;
            let to: Option<String> = row.try_get("to")?;

            let (fk, implicit) = match groups.entry(id) {
                std::collections::btree_map::Entry::Occupied(e) => e.into_mut(),
                std::collections::btree_map::Entry::Vacant(e) => e.insert((
                    ForeignKey {
                        id,
                        columns: Vec::new(),
                        ref_table: row.try_get("table")?,
                        ref_columns: Vec::new(),
                        on_update: row.try_get("on_update")?,
                        on_delete: row.try_get("on_delete")?,
                    },
                    false,
                )),
            };

            fk.columns.push(from);
            match to {
                Some(col) => fk.ref_columns.push(col),
                None => *implicit = true,
            }
        }

        // A NULL "to" means the referenced primary key; resolved at link time.
        table.foreign_keys = groups
            .into_values()
            .map(|(mut fk, implicit)| {
                if implicit {
                    fk.ref_columns.clear();
                }
                fk
            })
            .collect();
        Ok(())
    }

    /// Load indexes with their columns in index order.
    async fn load_indexes(&self, table: &mut Table) -> Result<()> {
        let query = r#"
            SELECT name, "unique", origin, partial
            FROM pragma_index_list(?)
            ORDER BY seq
        "#;

        let rows: Vec<SqliteRow> = sqlx::query(query)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await?;

        for row in rows {
            let name: String = row.try_get("name")?;
            let origin: String = row.try_get("origin")?;

            let col_rows: Vec<SqliteRow> =
                sqlx::query("SELECT name FROM pragma_index_info(?) ORDER BY seqno")
                    .bind(&name)
                    .fetch_all(&self.pool)
                    .await?;

            let columns: Option<Vec<String>> = col_rows
                .iter()
                .map(|r| r.try_get::<Option<String>, _>("name"))
                .collect::<std::result::Result<Vec<_>, _>>()?
                .into_iter()
                .collect();

            // Expression indexes report NULL column names.
            let Some(columns) = columns else {
                warn!(
                    "Skipping expression index {} on {}: not supported",
                    name, table.name
                );
                continue;
            };

            table.indexes.push(Index {
                name,
                columns,
                is_unique: row.try_get::<i64, _>("unique")? != 0,
                is_primary: origin == "pk",
                is_partial: row.try_get::<i64, _>("partial")? != 0,
            });
        }
        Ok(())
    }

    /// Decode one cell by its runtime storage class.
    fn decode_value(row: &SqliteRow, idx: usize) -> Result<SqlValue> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(SqlValue::Null);
        }
        let storage = raw.type_info().name().to_string();

        let value = match storage.as_str() {
            "INTEGER" | "BIGINT" | "INT4" | "BOOLEAN" => {
                SqlValue::I64(row.try_get_unchecked::<i64, _>(idx)?)
            }
            "REAL" | "FLOAT" | "DOUBLE" => SqlValue::F64(row.try_get_unchecked::<f64, _>(idx)?),
            "BLOB" => SqlValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
            _ => match row.try_get_unchecked::<String, _>(idx) {
                Ok(s) => SqlValue::Text(s),
                // Invalid UTF-8 stored as TEXT.
                Err(_) => SqlValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
            },
        };
        Ok(value)
    }

    fn row_to_values(row: &SqliteRow, width: usize) -> Result<Vec<SqlValue>> {
        (0..width).map(|i| Self::decode_value(row, i)).collect()
    }
}

#[async_trait]
impl SourceReader for SqliteReader {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let query = r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND substr(name, 1, 7) <> 'sqlite_'
            ORDER BY name
        "#;

        let rows: Vec<SqliteRow> = sqlx::query(query).fetch_all(&self.pool).await?;
        let tables = rows
            .iter()
            .map(|r| r.try_get::<String, _>("name"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        info!("Found {} tables in {}", tables.len(), self.endpoint);
        Ok(tables)
    }

    async fn introspect_table(&self, name: &str) -> Result<Table> {
        if !self.table_exists(name).await? {
            return Err(MigrateError::Schema(format!(
                "Table '{}' does not exist in source",
                name
            )));
        }

        let mut table = Table::new(name);
        self.load_columns(&mut table).await?;
        self.load_foreign_keys(&mut table).await?;
        self.load_indexes(&mut table).await?;

        debug!(
            "Introspected {}: {} columns, pk {:?}, {} foreign keys, {} indexes",
            table.name,
            table.columns.len(),
            table.primary_key,
            table.foreign_keys.len(),
            table.indexes.len()
        );
        Ok(table)
    }

    async fn get_row_count(&self, table: &str) -> Result<u64> {
        let query = format!("SELECT COUNT(*) FROM {}", Self::quote_ident(table));
        let row: SqliteRow = sqlx::query(&query).fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>(0)?.max(0) as u64)
    }

    async fn read_page(&self, table: &Table, limit: usize, offset: u64) -> Result<Batch> {
        let cols: Vec<String> = table
            .columns
            .iter()
            .map(|c| Self::quote_ident(&c.name))
            .collect();

        // No ORDER BY: pages follow the table's native rowid order.
        let query = format!(
            "SELECT {} FROM {} LIMIT ? OFFSET ?",
            cols.join(", "),
            Self::quote_ident(&table.name)
        );

        let rows: Vec<SqliteRow> = sqlx::query(&query)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;

        let width = table.columns.len();
        let values = rows
            .iter()
            .map(|r| Self::row_to_values(r, width))
            .collect::<Result<Vec<_>>>()?;

        Ok(Batch::new(values, offset))
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
