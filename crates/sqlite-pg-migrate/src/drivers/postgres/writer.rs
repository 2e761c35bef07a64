//! PostgreSQL target writer implementation.
//!
//! Implements the `TargetWriter` trait on a deadpool-postgres pool. Rows are
//! sent as multi-row `INSERT` statements with literal values over the simple
//! query protocol, so one rejected value fails the whole page atomically.

use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::SimpleQueryMessage;
use tracing::{debug, info, warn};

use crate::config::TargetConfig;
use crate::core::schema::{ForeignKey, Index, Table};
use crate::core::traits::{TargetColumn, TargetWriter};
use crate::core::value::{Row, SqlValue};
use crate::ddl;
use crate::drivers::common::TlsBuilder;
use crate::error::{MigrateError, Result};

/// How long to wait for a pooled connection.
const POOL_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL target writer implementation.
pub struct PostgresWriter {
    pool: Pool,
    endpoint: String,
}

impl PostgresWriter {
    /// Connect to the target and verify the connection.
    ///
    /// Fails with `MigrateError::Connection` when the server cannot be reached.
    pub async fn new(config: &TargetConfig, max_conns: usize) -> Result<Self> {
        let mut pg_config = config.pg_config()?;
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let tls = TlsBuilder::parse(&config.ssl_mode)?;
        let mgr = match tls.build()? {
            Some(connector) => Manager::from_config(pg_config, connector, mgr_config),
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
            }
        };

        let pool = Pool::builder(mgr)
            .max_size(max_conns.max(1))
            .wait_timeout(Some(POOL_WAIT_TIMEOUT))
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .build()
            .map_err(|e| MigrateError::pool(e, "creating PostgreSQL target pool"))?;

        let endpoint = config.endpoint();
        let writer = Self { pool, endpoint };
        writer
            .test_connection()
            .await
            .map_err(|e| MigrateError::connection(&writer.endpoint, e))?;

        info!("Connected to PostgreSQL target: {}", writer.endpoint);
        Ok(writer)
    }

    async fn client(&self) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting PostgreSQL connection"))
    }

    /// Test the database connection.
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.client().await?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }

    /// Server version string.
    pub async fn version(&self) -> Result<String> {
        let client = self.client().await?;
        let row = client.query_one("SELECT version()", &[]).await?;
        Ok(row.try_get::<_, String>(0)?)
    }

    /// Execute a DDL statement, reporting rejections as `MigrateError::Ddl`.
    async fn execute_ddl(&self, table: &str, sql: &str) -> Result<()> {
        debug!("DDL: {}", sql);
        let client = self.client().await?;
        client
            .batch_execute(sql)
            .await
            .map_err(|e| MigrateError::ddl(table, pg_error_message(&e)))
    }
}

#[async_trait]
impl TargetWriter for PostgresWriter {
    async fn create_schema(&self, schema: &str) -> Result<()> {
        self.execute_ddl(schema, &ddl::create_schema_sql(schema))
            .await?;
        debug!("Created schema '{}'", schema);
        Ok(())
    }

    async fn drop_table(&self, schema: &str, table: &str) -> Result<()> {
        self.execute_ddl(table, &ddl::drop_table_sql(schema, table))
            .await?;
        debug!("Dropped table {}.{}", schema, table);
        Ok(())
    }

    async fn create_table(&self, table: &Table, target_schema: &str) -> Result<()> {
        self.execute_ddl(&table.name, &ddl::create_table_sql(table, target_schema))
            .await?;
        debug!("Created table {}.{}", target_schema, table.name);
        Ok(())
    }

    async fn create_unique_index(
        &self,
        table: &Table,
        idx: &Index,
        target_schema: &str,
    ) -> Result<()> {
        self.execute_ddl(
            &table.name,
            &ddl::create_unique_index_sql(table, idx, target_schema),
        )
        .await?;
        debug!(
            "Created unique index {} for {}.{}",
            ddl::unique_index_name(table, idx),
            target_schema,
            table.name
        );
        Ok(())
    }

    async fn column_types(&self, schema: &str, table: &str) -> Result<Vec<TargetColumn>> {
        let client = self.client().await?;

        let sql = r#"
            SELECT column_name::text, data_type::text
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
        "#;

        let rows = client.query(sql, &[&schema, &table]).await?;
        if rows.is_empty() {
            return Err(MigrateError::Schema(format!(
                "Table {}.{} not found in target after creation",
                schema, table
            )));
        }

        rows.iter()
            .map(|row| -> Result<TargetColumn> {
                Ok(TargetColumn {
                    name: row.try_get(0)?,
                    data_type: row.try_get(1)?,
                })
            })
            .collect()
    }

    async fn create_foreign_key(
        &self,
        table: &Table,
        fk: &ForeignKey,
        target_schema: &str,
    ) -> Result<()> {
        self.execute_ddl(&table.name, &ddl::foreign_key_sql(table, fk, target_schema))
            .await?;
        debug!(
            "Created foreign key {} for {}.{}",
            ddl::constraint_name(&table.name, fk.id),
            target_schema,
            table.name
        );
        Ok(())
    }

    async fn insert_rows(
        &self,
        schema: &str,
        table: &str,
        cols: &[String],
        rows: &[Row],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let sql = build_insert_sql(schema, table, cols, rows);
        let client = self.client().await?;
        let messages = client.simple_query(&sql).await?;

        let inserted = messages
            .iter()
            .find_map(|m| match m {
                SimpleQueryMessage::CommandComplete(n) => Some(*n),
                _ => None,
            })
            .unwrap_or(rows.len() as u64);
        Ok(inserted)
    }

    async fn get_row_count(&self, schema: &str, table: &str) -> Result<u64> {
        let client = self.client().await?;
        let sql = format!(
            "SELECT COUNT(*)::int8 FROM {}",
            ddl::qualify_table(schema, table)
        );
        let row = client.query_one(&sql, &[]).await?;
        Ok(row.try_get::<_, i64>(0)?.max(0) as u64)
    }

    async fn reset_sequence(&self, schema: &str, table: &Table) -> Result<()> {
        let Some(sql) = ddl::reset_identity_sql(table, schema) else {
            return Ok(());
        };
        self.execute_ddl(&table.name, &sql).await?;
        debug!("Reset identity for {}.{}", schema, table.name);
        Ok(())
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(&self) {
        self.pool.close();
    }
}

/// Extract the server's message (and detail) from a driver error.
fn pg_error_message(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => match db.detail() {
            Some(detail) => format!("{} ({}): {}", db.message(), db.code().code(), detail),
            None => format!("{} ({})", db.message(), db.code().code()),
        },
        None => e.to_string(),
    }
}

/// Escape a string for SQL literal use.
fn escape_sql_string(s: &str) -> String {
    s.replace('\'', "''")
}

/// Render a value as a PostgreSQL literal.
///
/// Text stays untyped so the server coerces it to the column type.
fn sql_value_to_literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        SqlValue::I64(n) => n.to_string(),
        SqlValue::F64(f) if f.is_nan() => "'NaN'::float8".to_string(),
        SqlValue::F64(f) if f.is_infinite() => {
            if *f > 0.0 {
                "'Infinity'::float8".to_string()
            } else {
                "'-Infinity'::float8".to_string()
            }
        }
        SqlValue::F64(f) => format!("{:?}", f),
        SqlValue::Text(s) => format!("'{}'", escape_sql_string(s)),
        SqlValue::Bytes(b) => format!("'\\x{}'::bytea", hex::encode(b)),
        SqlValue::Decimal(d) => format!("'{}'::numeric", escape_sql_string(d)),
        SqlValue::DateTime(dt) => format!(
            "'{}'::timestamptz",
            dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
        ),
    }
}

/// Build a multi-row INSERT with literal values.
fn build_insert_sql(schema: &str, table: &str, cols: &[String], rows: &[Row]) -> String {
    let col_list: Vec<String> = cols.iter().map(|c| ddl::quote_ident(c)).collect();

    let value_rows: Vec<String> = rows
        .iter()
        .map(|row| {
            let values: Vec<String> = row.iter().map(sql_value_to_literal).collect();
            format!("({})", values.join(", "))
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        ddl::qualify_table(schema, table),
        col_list.join(", "),
        value_rows.join(", ")
    )
}
