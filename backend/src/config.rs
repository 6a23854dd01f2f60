//! Service configuration.
//!
//! Values come from an optional TOML file (`REGISTRY_CONFIG`, default
//! `registry.toml`) and are then overridden by `REGISTRY_*` environment
//! variables. A missing file means defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {var}: {value}")]
    Env { var: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub import: ImportConfig,
    pub retry: RetryConfig,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub json_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for uploaded registry files.
    pub root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub default_chunk_size: usize,
    pub max_chunk_size: usize,
    /// Rows buffered by the streaming front end before a merge.
    pub stream_batch_size: usize,
    /// Pause between batches of a self-driving job.
    pub yield_interval_ms: u64,
    /// Cap on rejected-row samples kept per job.
    pub max_error_samples: usize,
    /// Number of parsed sources kept in memory.
    pub source_cache_entries: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            import: ImportConfig::default(),
            retry: RetryConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            json_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("registry.sqlite"),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("uploads"),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            default_chunk_size: 5_000,
            max_chunk_size: 50_000,
            stream_batch_size: 5_000,
            yield_interval_ms: 10,
            max_error_samples: 50,
            source_cache_entries: 4,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl AppConfig {
    /// Load configuration from the file named by `REGISTRY_CONFIG` (or
    /// `registry.toml`) and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("REGISTRY_CONFIG").unwrap_or_else(|_| "registry.toml".to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply `REGISTRY_*` overrides through a lookup function.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(host) = lookup("REGISTRY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("REGISTRY_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::Env {
                var: "REGISTRY_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(path) = lookup("REGISTRY_DATABASE") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(root) = lookup("REGISTRY_STORAGE_DIR") {
            self.storage.root = PathBuf::from(root);
        }
        if let Some(level) = lookup("REGISTRY_LOG") {
            self.log_level = level;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            log_level = "debug"

            [import]
            default_chunk_size = 2000

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.import.default_chunk_size, 2000);
        assert_eq!(config.import.max_error_samples, 50);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = AppConfig::default();
        config
            .apply_env(|var| match var {
                "REGISTRY_PORT" => Some("9090".to_string()),
                "REGISTRY_STORAGE_DIR" => Some("/srv/registry".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.storage.root, PathBuf::from("/srv/registry"));

        let err = config
            .apply_env(|var| (var == "REGISTRY_PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "REGISTRY_PORT", .. }));
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = AppConfig::from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.database.path, PathBuf::from("registry.sqlite"));
    }
}
