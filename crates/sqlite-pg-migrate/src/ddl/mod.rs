//! PostgreSQL DDL generation.
//!
//! Statement builders are pure functions over [`Table`] so they can be
//! checked without a live server. `PostgresWriter` executes what they return.

pub mod constraints;
pub mod defaults;

use crate::core::schema::{Index, Table};
use crate::typemap::map_type;

pub use constraints::{constraint_name, foreign_key_sql, normalize_action, resolve_ref_columns};
pub use defaults::DefaultExpr;

/// PostgreSQL truncates identifiers longer than this many bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Quote a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Qualify a table name with schema.
pub fn qualify_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Truncate a generated identifier to [`MAX_IDENTIFIER_LEN`] bytes without
/// splitting a UTF-8 character.
pub fn truncate_ident(mut name: String) -> String {
    if name.len() > MAX_IDENTIFIER_LEN {
        let mut end = MAX_IDENTIFIER_LEN;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
    }
    name
}

pub fn create_schema_sql(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema))
}

pub fn drop_table_sql(schema: &str, table: &str) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE", qualify_table(schema, table))
}

/// Generate `CREATE TABLE` with column types, nullability, defaults, the
/// identity column and the primary key constraint.
pub fn create_table_sql(table: &Table, target_schema: &str) -> String {
    let identity = table.identity_column().map(|c| c.name.as_str());

    let mut defs: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let ty = map_type(&c.data_type);
            let mut def = format!("{} {}", quote_ident(&c.name), ty.to_postgres());

            let is_identity = identity == Some(c.name.as_str());
            if is_identity {
                def.push_str(" GENERATED BY DEFAULT AS IDENTITY");
            }
            if !c.is_nullable || is_identity {
                def.push_str(" NOT NULL");
            }
            // Identity columns cannot carry a DEFAULT as well.
            if !is_identity {
                if let Some(raw) = &c.default_value {
                    def.push_str(" DEFAULT ");
                    def.push_str(&DefaultExpr::parse(raw).to_postgres_for(ty));
                }
            }
            def
        })
        .collect();

    if table.has_pk() {
        let pk_cols: Vec<String> = table.primary_key.iter().map(|c| quote_ident(c)).collect();
        defs.push(format!("PRIMARY KEY ({})", pk_cols.join(", ")));
    }

    format!(
        "CREATE TABLE {} (\n    {}\n)",
        qualify_table(target_schema, &table.name),
        defs.join(",\n    ")
    )
}

/// Target name for a recreated unique index.
pub fn unique_index_name(table: &Table, idx: &Index) -> String {
    truncate_ident(format!("idx_{}_{}", table.name, idx.name))
}

pub fn create_unique_index_sql(table: &Table, idx: &Index, target_schema: &str) -> String {
    let cols: Vec<String> = idx.columns.iter().map(|c| quote_ident(c)).collect();
    format!(
        "CREATE UNIQUE INDEX {} ON {} ({})",
        quote_ident(&unique_index_name(table, idx)),
        qualify_table(target_schema, &table.name),
        cols.join(", ")
    )
}

/// Restart the identity column after a bulk load.
///
/// The next value is clamped to 1 so empty tables and tables holding only
/// non-positive keys stay within the sequence bounds.
///
/// Returns `None` when the table has no identity column.
pub fn reset_identity_sql(table: &Table, target_schema: &str) -> Option<String> {
    let col = table.identity_column()?;
    let qualified = qualify_table(target_schema, &table.name);
    // pg_get_serial_sequence takes the table name as text, so quote it again.
    Some(format!(
        "SELECT setval(pg_get_serial_sequence('{}', '{}'), GREATEST(COALESCE((SELECT MAX({}) FROM {}), 0) + 1, 1), false)",
        qualified.replace('\'', "''"),
        col.name.replace('\'', "''"),
        quote_ident(&col.name),
        qualified
    ))
}
