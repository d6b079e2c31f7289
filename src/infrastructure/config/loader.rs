use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("store path cannot be empty")]
    EmptyStorePath,

    #[error("invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("invalid poll_interval_ms: {0}. Must be greater than 0")]
    InvalidPollInterval(u64),

    #[error("invalid retry_cap: {0}. Must be at least 1")]
    InvalidRetryCap(u32),

    #[error("jwt_secret must not be empty")]
    EmptyJwtSecret,

    #[error("internal_secret must not be empty")]
    EmptyInternalSecret,

    #[error("invalid bind_addr: {0}")]
    InvalidBindAddr(String),

    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `.todo-core/config.yaml` (project config)
    /// 3. `.todo-core/local.yaml` (project local overrides, optional)
    /// 4. Environment variables (`TODO_CORE_*` prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".todo-core/config.yaml"))
            .merge(Yaml::file(".todo-core/local.yaml"))
            .merge(Env::prefixed("TODO_CORE_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("TODO_CORE_").split("__"))
            .extract()
            .context(format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.store.path.is_empty() {
            return Err(ConfigError::EmptyStorePath);
        }
        if config.store.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.store.max_connections));
        }

        if config.outbox.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval(config.outbox.poll_interval_ms));
        }
        if config.outbox.retry_cap == 0 {
            return Err(ConfigError::InvalidRetryCap(config.outbox.retry_cap));
        }

        if config.scheduler.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval(config.scheduler.poll_interval_ms));
        }
        if config.scheduler.retry_cap == 0 {
            return Err(ConfigError::InvalidRetryCap(config.scheduler.retry_cap));
        }

        if config.auth.jwt_secret.is_empty() {
            return Err(ConfigError::EmptyJwtSecret);
        }
        if config.auth.internal_secret.is_empty() {
            return Err(ConfigError::EmptyInternalSecret);
        }

        if !config.server.bind_addr.contains(':') {
            return Err(ConfigError::InvalidBindAddr(config.server.bind_addr.clone()));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.auth.jwt_secret = "secret".to_string();
        config.auth.internal_secret = "internal-secret".to_string();
        config
    }

    #[test]
    fn default_fields_plus_secrets_validate() {
        let config = valid_config();
        ConfigLoader::validate(&config).expect("config with secrets set should be valid");
    }

    #[test]
    fn empty_jwt_secret_is_rejected() {
        let mut config = valid_config();
        config.auth.jwt_secret = String::new();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyJwtSecret)));
    }

    #[test]
    fn empty_store_path_is_rejected() {
        let mut config = valid_config();
        config.store.path = String::new();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyStorePath)));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut config = valid_config();
        config.outbox.poll_interval_ms = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidPollInterval(0))
        ));
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut config = valid_config();
        config.logging.level = "verbose".to_string();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidLogLevel(_))));
    }

    #[test]
    fn hierarchical_merging_lets_override_file_win() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(base_file, "store:\n  path: base.db\nauth:\n  jwt_secret: s\n  internal_secret: i").unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "store:\n  path: override.db").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.store.path, "override.db");
        assert_eq!(config.auth.jwt_secret, "s", "base value should persist when not overridden");
    }
}
