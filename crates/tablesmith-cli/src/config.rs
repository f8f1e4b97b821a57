use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tablesmith_store::{PostgresOptions, SqliteOptions};
use thiserror::Error;

/// File read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "tablesmith.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("config file not found: {0}")]
    Missing(PathBuf),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub connection: Option<String>,
    pub definitions: PathBuf,
    pub run_dir: PathBuf,
    pub log_level: String,
    pub postgres: PostgresSettings,
    pub sqlite: SqliteSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            connection: None,
            definitions: PathBuf::from("schemas"),
            run_dir: PathBuf::from("runs"),
            log_level: "info".to_string(),
            postgres: PostgresSettings::default(),
            sqlite: SqliteSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PostgresSettings {
    pub schema: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PostgresSettings {
    fn default() -> Self {
        let defaults = PostgresOptions::default();
        Self {
            schema: defaults.schema,
            max_connections: defaults.max_connections,
            acquire_timeout_secs: defaults.acquire_timeout.as_secs(),
        }
    }
}

impl PostgresSettings {
    pub fn options(&self) -> PostgresOptions {
        PostgresOptions {
            schema: self.schema.clone(),
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SqliteSettings {
    pub foreign_keys: bool,
    pub max_connections: u32,
}

impl Default for SqliteSettings {
    fn default() -> Self {
        let defaults = SqliteOptions::default();
        Self {
            foreign_keys: defaults.foreign_keys,
            max_connections: defaults.max_connections,
        }
    }
}

impl SqliteSettings {
    pub fn options(&self) -> SqliteOptions {
        SqliteOptions {
            foreign_keys: self.foreign_keys,
            max_connections: self.max_connections,
        }
    }
}

/// Load settings from `path`, or from [`DEFAULT_CONFIG_FILE`] when it exists.
///
/// An explicitly named file must exist; the default one is optional.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };

    if !path.exists() {
        return if explicit {
            Err(ConfigError::Missing(path))
        } else {
            Ok(Settings::default())
        };
    }

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Toml { path, source })
}
