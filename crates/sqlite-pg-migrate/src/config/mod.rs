//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};
use std::path::Path;
use std::time::Duration;
use tokio_postgres::Config as PgConfig;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl TargetConfig {
    /// Build a tokio-postgres configuration.
    pub fn pg_config(&self) -> Result<PgConfig> {
        let mut pg_config = match &self.url {
            Some(url) => url
                .parse::<PgConfig>()
                .map_err(|e| MigrateError::Config(format!("invalid target.url: {}", e)))?,
            None => {
                let mut pg_config = PgConfig::new();
                pg_config.host(&self.host);
                pg_config.port(self.port);
                pg_config.dbname(&self.database);
                pg_config.user(&self.user);
                pg_config.password(&self.password);
                pg_config
            }
        };
        pg_config.connect_timeout(Duration::from_secs(30));
        Ok(pg_config)
    }

    /// Human-readable endpoint for logs and errors, without credentials.
    pub fn endpoint(&self) -> String {
        match &self.url {
            Some(_) => "PostgreSQL (target.url)".to_string(),
            None => format!("{}:{}/{}", self.host, self.port, self.database),
        }
    }
}
