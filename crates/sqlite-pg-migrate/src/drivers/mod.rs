//! Database driver implementations.
//!
//! - [`sqlite`]: source reader over a read-only SQLite file
//! - [`postgres`]: target writer for PostgreSQL
//! - [`common`]: shared utilities (TLS)
//!
//! Everything above this module talks to the drivers only through
//! [`SourceReader`](crate::core::SourceReader) and
//! [`TargetWriter`](crate::core::TargetWriter).

pub mod common;
pub mod postgres;
pub mod sqlite;

pub use common::{SslMode, TlsBuilder};
pub use postgres::PostgresWriter;
pub use sqlite::SqliteReader;
