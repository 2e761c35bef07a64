//! Schema and metadata types for tables, columns, indexes, and constraints.
//!
//! These are produced once by source introspection and only read afterwards.

use serde::{Deserialize, Serialize};

use crate::typemap::{map_type, PortableType};

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Column definitions in declaration order.
    pub columns: Vec<Column>,

    /// Primary key column names in key order.
    pub primary_key: Vec<String>,

    /// Foreign key constraints, one entry per constraint id.
    pub foreign_keys: Vec<ForeignKey>,

    /// Indexes (unique and non-unique).
    pub indexes: Vec<Index>,
}

impl Table {
    /// Create an empty table descriptor.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check if the table has a primary key.
    pub fn has_pk(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// The auto-incrementing column, if any.
    ///
    /// Only a single-column primary key whose declared type maps to an
    /// integer qualifies.
    pub fn identity_column(&self) -> Option<&Column> {
        if self.primary_key.len() != 1 {
            return None;
        }
        self.column(&self.primary_key[0])
            .filter(|c| map_type(&c.data_type) == PortableType::Integer)
    }

    /// Unique indexes that must be recreated on the target.
    ///
    /// The index backing the primary key and partial indexes are left out.
    pub fn unique_indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes
            .iter()
            .filter(|idx| idx.is_unique && !idx.is_primary && !idx.is_partial)
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Declared type exactly as the source reports it (may be empty).
    pub data_type: String,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Raw default literal, untyped.
    pub default_value: Option<String>,

    /// Whether the column is part of the primary key.
    pub is_primary_key: bool,
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,

    /// Indexed column names in index order.
    pub columns: Vec<String>,

    /// Whether the index is unique.
    pub is_unique: bool,

    /// Whether the index backs the primary key.
    pub is_primary: bool,

    /// Whether the index has a WHERE predicate.
    pub is_partial: bool,
}

/// Foreign key metadata: all column pairs sharing one constraint id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Source constraint id.
    pub id: i64,

    /// Source column names.
    pub columns: Vec<String>,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced column names. Empty when the source omits them, meaning
    /// the referenced table's primary key.
    pub ref_columns: Vec<String>,

    /// ON UPDATE action as reported by the source.
    pub on_update: String,

    /// ON DELETE action as reported by the source.
    pub on_delete: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_column(name: &str, data_type: &str, pk: bool) -> Column {
        Column {
            name: name.to_string(),
            data_type: data_type.to_string(),
            is_nullable: !pk,
            default_value: None,
            is_primary_key: pk,
        }
    }

    fn make_test_index(name: &str, unique: bool, primary: bool, partial: bool) -> Index {
        Index {
            name: name.to_string(),
            columns: vec!["email".to_string()],
            is_unique: unique,
            is_primary: primary,
            is_partial: partial,
        }
    }

    #[test]
    fn test_identity_column_integer_pk() {
        let mut table = Table::new("users");
        table.columns = vec![
            make_test_column("id", "INTEGER", true),
            make_test_column("name", "TEXT", false),
        ];
        table.primary_key = vec!["id".to_string()];
        assert_eq!(table.identity_column().map(|c| c.name.as_str()), Some("id"));
    }

    #[test]
    fn test_identity_column_text_pk() {
        let mut table = Table::new("codes");
        table.columns = vec![make_test_column("code", "VARCHAR(8)", true)];
        table.primary_key = vec!["code".to_string()];
        assert!(table.identity_column().is_none());
    }

    #[test]
    fn test_identity_column_composite_pk() {
        let mut table = Table::new("links");
        table.columns = vec![
            make_test_column("a", "INTEGER", true),
            make_test_column("b", "INTEGER", true),
        ];
        table.primary_key = vec!["a".to_string(), "b".to_string()];
        assert!(table.identity_column().is_none());
    }

    #[test]
    fn test_unique_indexes_filter() {
        let mut table = Table::new("users");
        table.indexes = vec![
            make_test_index("sqlite_autoindex_users_1", true, true, false),
            make_test_index("users_email", true, false, false),
            make_test_index("users_name", false, false, false),
            make_test_index("users_active_email", true, false, true),
        ];
        let names: Vec<&str> = table.unique_indexes().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["users_email"]);
    }

    #[test]
    fn test_column_names_preserve_order() {
        let mut table = Table::new("t");
        table.columns = vec![
            make_test_column("z", "TEXT", false),
            make_test_column("a", "TEXT", false),
        ];
        assert_eq!(table.column_names(), vec!["z", "a"]);
    }
}
