//! Configuration validation.

use super::Config;
use crate::drivers::common::SslMode;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.path.as_os_str().is_empty() {
        return Err(MigrateError::Config("source.path is required".into()));
    }

    // Target validation
    if config.target.url.is_none() {
        if config.target.host.is_empty() {
            return Err(MigrateError::Config(
                "target.host is required when target.url is not set".into(),
            ));
        }
        if config.target.database.is_empty() {
            return Err(MigrateError::Config(
                "target.database is required when target.url is not set".into(),
            ));
        }
        if config.target.user.is_empty() {
            return Err(MigrateError::Config(
                "target.user is required when target.url is not set".into(),
            ));
        }
    }
    if config.target.schema.is_empty() {
        return Err(MigrateError::Config("target.schema must not be empty".into()));
    }
    SslMode::parse(&config.target.ssl_mode)?;

    // Migration config validation
    if config.migration.page_size == 0 {
        return Err(MigrateError::Config(
            "migration.page_size must be at least 1".into(),
        ));
    }
    if config.migration.max_pg_connections == 0 {
        return Err(MigrateError::Config(
            "migration.max_pg_connections must be at least 1".into(),
        ));
    }
    config.migration.table_filter()?;

    Ok(())
}
