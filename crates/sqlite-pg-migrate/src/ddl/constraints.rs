//! Foreign key constraint generation.

use crate::core::schema::{ForeignKey, Table};
use crate::error::{MigrateError, Result};

use super::{qualify_table, quote_ident, truncate_ident};

/// Map a source referential action to PostgreSQL.
///
/// RESTRICT is applied as NO ACTION so that deferral still works.
/// Unrecognized actions fall back to NO ACTION.
pub fn normalize_action(action: &str) -> &'static str {
    match action.trim().to_uppercase().replace('_', " ").as_str() {
        "CASCADE" => "CASCADE",
        "SET NULL" => "SET NULL",
        "SET DEFAULT" => "SET DEFAULT",
        _ => "NO ACTION",
    }
}

/// Constraint name: `fk_<table>_<id>`, truncated to the identifier limit.
pub fn constraint_name(table: &str, id: i64) -> String {
    truncate_ident(format!("fk_{}_{}", table, id))
}

/// Resolve a foreign key against the referenced table.
///
/// SQLite matches identifiers case-insensitively but PostgreSQL quotes them
/// here, so the referenced table and columns are rewritten to their declared
/// spelling. Omitted referenced columns are filled in from the primary key.
pub fn resolve_ref_columns(fk: &ForeignKey, ref_table: Option<&Table>) -> Result<ForeignKey> {
    let Some(referenced) = ref_table else {
        if fk.ref_columns.is_empty() {
            return Err(missing_pk(fk));
        }
        return Ok(fk.clone());
    };

    let ref_columns = if fk.ref_columns.is_empty() {
        if referenced.primary_key.len() != fk.columns.len() {
            return Err(missing_pk(fk));
        }
        referenced.primary_key.clone()
    } else {
        fk.ref_columns
            .iter()
            .map(|name| {
                referenced
                    .columns
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(name))
                    .map_or_else(|| name.clone(), |c| c.name.clone())
            })
            .collect()
    };

    Ok(ForeignKey {
        ref_table: referenced.name.clone(),
        ref_columns,
        ..fk.clone()
    })
}

fn missing_pk(fk: &ForeignKey) -> MigrateError {
    MigrateError::Schema(format!(
        "Foreign key {} references {} without columns and no matching primary key was found",
        fk.id, fk.ref_table
    ))
}

/// Generate a deferred `ALTER TABLE … ADD CONSTRAINT … FOREIGN KEY`.
pub fn foreign_key_sql(table: &Table, fk: &ForeignKey, target_schema: &str) -> String {
    let cols: Vec<String> = fk.columns.iter().map(|c| quote_ident(c)).collect();
    let ref_cols: Vec<String> = fk.ref_columns.iter().map(|c| quote_ident(c)).collect();

    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON UPDATE {} ON DELETE {} DEFERRABLE INITIALLY DEFERRED",
        qualify_table(target_schema, &table.name),
        quote_ident(&constraint_name(&table.name, fk.id)),
        cols.join(", "),
        qualify_table(target_schema, &fk.ref_table),
        ref_cols.join(", "),
        normalize_action(&fk.on_update),
        normalize_action(&fk.on_delete)
    )
}
