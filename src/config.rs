use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Where the office database lives.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub db_path: PathBuf,
}

/// Platform data directory fallback used when `DOCKET_DB_PATH` is unset.
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docket")
        .join("office.db")
}

fn db_path_from_env_value(raw: &str) -> Result<PathBuf, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "DOCKET_DB_PATH".to_string(),
            message: "database path must not be empty".to_string(),
        });
    }
    Ok(PathBuf::from(trimmed))
}

impl DatabaseConfig {
    /// Resolve from the environment (a `.env` file is honored), falling back
    /// to the platform data directory.
    pub fn resolve() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let db_path = match std::env::var("DOCKET_DB_PATH") {
            Ok(raw) => db_path_from_env_value(&raw)?,
            Err(_) => default_db_path(),
        };
        Ok(Self { db_path })
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: path.into(),
        }
    }
}
