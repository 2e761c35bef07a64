//! Core abstractions for the migration engine.
//!
//! - [`schema`]: Table, column, index and foreign key metadata
//! - [`value`]: Cell values and row batches
//! - [`traits`]: Source reader and target writer seams

pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{Column, ForeignKey, Index, Table};
pub use traits::{SourceReader, TargetColumn, TargetWriter};
pub use value::{Batch, Row, SqlValue};
