//! Configuration Loader
//!
//! Environment-aware layered loading built on the `config` crate.

use super::error::{ConfigResult, ConfigurationError};
use super::NotificationConfig;
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE_STEM: &str = "notification";
const ENV_PREFIX: &str = "NOTIFY";
const ENV_SEPARATOR: &str = "__";

/// Loaded, validated configuration plus where it came from
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: NotificationConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment,
    /// reading overrides from the process environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_overrides(config_dir, environment, None)
    }

    /// Load configuration with an explicit override map in place of the
    /// process environment. Keys use the `NOTIFY__SECTION__FIELD` form.
    pub fn load_with_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        overrides: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment = environment,
            directory = %config_directory.display(),
            "Loading notification configuration"
        );

        let config = Self::build(&config_directory, environment, overrides)?;
        config.validate()?;

        info!(
            environment = environment,
            max_attempts = config.retry.max_attempts,
            workers_per_channel = config.workers.concurrency_per_channel,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: NotificationConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            config_directory: PathBuf::from("config"),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect the deployment environment from NOTIFY_ENV, then APP_ENV
    pub fn detect_environment() -> String {
        env::var("NOTIFY_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn build(
        config_directory: &Path,
        environment: &str,
        overrides: Option<HashMap<String, String>>,
    ) -> ConfigResult<NotificationConfig> {
        let base_file = config_directory.join(format!("{BASE_FILE_STEM}.toml"));
        let environment_file =
            config_directory.join(format!("{BASE_FILE_STEM}.{environment}.toml"));

        if base_file.is_dir() {
            return Err(ConfigurationError::file_read_error(
                base_file.display().to_string(),
                "expected a file, found a directory",
            ));
        }

        let mut env_source = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true);
        if let Some(overrides) = overrides {
            env_source = env_source.source(Some(overrides.into_iter().collect()));
        }

        let config = Config::builder()
            .add_source(Config::try_from(&NotificationConfig::default())?)
            .add_source(File::from(base_file).format(FileFormat::Toml).required(false))
            .add_source(
                File::from(environment_file)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(env_source)
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
