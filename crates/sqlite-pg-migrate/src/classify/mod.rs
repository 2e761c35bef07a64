//! Destination type classification.
//!
//! After a table is created the target is asked what it actually built.
//! Those native type names, not the source's declared types, decide how
//! each value is sanitized during transfer.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::core::traits::TargetWriter;
use crate::error::Result;

/// Sanitization class of a materialized target column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DestinationTypeClass {
    Date,
    Boolean,
    Int,
    Float,
    Decimal,
    Other,
}

/// Classify a native target type name.
pub fn classify(native_type: &str) -> DestinationTypeClass {
    let t = native_type.trim().to_lowercase();

    if t.contains("timestamp") || t == "date" || t.starts_with("time") {
        DestinationTypeClass::Date
    } else if t.contains("boolean") {
        DestinationTypeClass::Boolean
    } else if t.contains("double") || t.contains("real") || t.contains("float") {
        DestinationTypeClass::Float
    } else if t.contains("numeric") || t.contains("decimal") {
        DestinationTypeClass::Decimal
    } else if t.contains("int") {
        DestinationTypeClass::Int
    } else {
        DestinationTypeClass::Other
    }
}

/// Column name → class for one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnClasses {
    classes: HashMap<String, DestinationTypeClass>,
}

impl ColumnClasses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, class: DestinationTypeClass) {
        self.classes.insert(column.into(), class);
    }

    /// Class of a column; unknown columns are `Other`.
    pub fn get(&self, column: &str) -> DestinationTypeClass {
        self.classes
            .get(column)
            .copied()
            .unwrap_or(DestinationTypeClass::Other)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl FromIterator<(String, DestinationTypeClass)> for ColumnClasses {
    fn from_iter<I: IntoIterator<Item = (String, DestinationTypeClass)>>(iter: I) -> Self {
        Self {
            classes: iter.into_iter().collect(),
        }
    }
}

/// Per-run cache of column classes, keyed by table name.
///
/// Filled while tables are created and read during the copy phase.
#[derive(Debug, Default)]
pub struct TableMetadataCache {
    tables: HashMap<String, ColumnClasses>,
}

impl TableMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: impl Into<String>, classes: ColumnClasses) {
        self.tables.insert(table.into(), classes);
    }

    pub fn get(&self, table: &str) -> Option<&ColumnClasses> {
        self.tables.get(table)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Read back a created table's column types and record their classes.
pub async fn classify_table(
    writer: &dyn TargetWriter,
    schema: &str,
    table: &str,
    cache: &mut TableMetadataCache,
) -> Result<()> {
    let columns = writer.column_types(schema, table).await?;

    let classes: ColumnClasses = columns
        .into_iter()
        .map(|c| {
            let class = classify(&c.data_type);
            debug!("{}.{}: {} -> {:?}", table, c.name, c.data_type, class);
            (c.name, class)
        })
        .collect();

    cache.insert(table, classes);
    Ok(())
}
