mod database;
mod migrations;

pub use database::DatabaseConfig;
pub use migrations::{LedgerTable, MigrationsConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PgChangeError, Result};

/// Environment variable consulted when no database URL is configured.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Root configuration for pgchange.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PgChangeConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Migration directory and ledger configuration.
    #[serde(default)]
    pub migrations: MigrationsConfig,
}

impl PgChangeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| PgChangeError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        // Substitute environment variables
        let content = substitute_env_vars(content);

        toml::from_str(&content)
            .map_err(|e| PgChangeError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load the config file if it exists, otherwise start from defaults.
    ///
    /// An empty database URL is filled from `DATABASE_URL`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            tracing::debug!("Loading configuration from {}", path.display());
            Self::from_file(path)?
        } else {
            Self::default()
        };

        if config.database.url.trim().is_empty() {
            if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
                config.database.url = url;
            }
        }

        Ok(config)
    }

    /// Fail unless a database connection can be attempted.
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(PgChangeError::Config(format!(
                "No database connection configured. Set {} or [database].url in pgchange.toml.",
                DATABASE_URL_ENV
            )));
        }
        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .expect("placeholder pattern is valid");

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}
