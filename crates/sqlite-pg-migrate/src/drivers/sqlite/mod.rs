//! SQLite driver.
//!
//! - [`SqliteReader`]: read-only source reader

mod reader;

pub use reader::SqliteReader;
