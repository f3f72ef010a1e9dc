//! Configuration Loader
//!
//! Environment-aware configuration loading: base file plus optional
//! per-environment override, topped by `ARCHIVER__`-prefixed environment
//! variables. All loading failures and validation failures are fatal.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::{Config, Environment, File};
use tracing::debug;

use super::{ArchiverConfig, ConfigurationError};

/// Loads and owns the archiver configuration.
pub struct ConfigManager {
    config: ArchiverConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection from the default
    /// `config/` directory.
    pub fn load() -> Result<Arc<ConfigManager>, ConfigurationError> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory.
    pub fn load_from_directory(
        config_dir: Option<PathBuf>,
    ) -> Result<Arc<ConfigManager>, ConfigurationError> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with an explicit
    /// environment, useful in tests that must not touch process globals.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> Result<Arc<ConfigManager>, ConfigurationError> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment,
            directory = %config_directory.display(),
            "loading archiver configuration"
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        debug!(
            environment,
            products = config.products.len(),
            populators = config.message_populators.len(),
            post_actions = config.post_actions.len(),
            "configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    fn load_and_merge_config(
        directory: &Path,
        environment: &str,
    ) -> Result<ArchiverConfig, ConfigurationError> {
        let base = directory.join("archiver");
        let overlay = directory.join(format!("archiver.{environment}"));

        let config = Config::builder()
            .add_source(File::from(base).required(true))
            .add_source(File::from(overlay).required(false))
            .add_source(Environment::with_prefix("ARCHIVER").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    fn detect_environment() -> String {
        env::var("ARCHIVER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    pub fn config(&self) -> &ArchiverConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }
}
