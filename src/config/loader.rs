//! Configuration Loader
//!
//! Layered loading of [`QueueConfig`] with the `config` crate: built-in
//! defaults, then an optional file (TOML/YAML/JSON by extension), then
//! environment variables such as `MESSENGER__QUEUE_NAME=emails`.

use std::path::PathBuf;

use config::{Config, Environment, File};
use tracing::debug;

use super::QueueConfig;
use crate::constants::{defaults, options};
use crate::messaging::errors::MessagingResult;

/// Default environment variable prefix
pub const DEFAULT_ENV_PREFIX: &str = "MESSENGER";

/// Builder for layered configuration loading
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            file: None,
            env_prefix: Some(DEFAULT_ENV_PREFIX.to_string()),
        }
    }
}

impl ConfigLoader {
    /// Loader reading defaults and `MESSENGER__*` environment variables
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a required configuration file
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Use a different environment variable prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Ignore the environment entirely
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Load and validate the configuration
    pub fn load(&self) -> MessagingResult<QueueConfig> {
        let mut builder = Config::builder()
            .set_default(options::COLLECTION_NAME, defaults::COLLECTION_NAME)?
            .set_default(options::QUEUE_NAME, defaults::QUEUE_NAME)?
            .set_default(
                options::REDELIVER_TIMEOUT,
                defaults::REDELIVER_TIMEOUT_SECONDS as i64,
            )?
            .set_default(options::AUTO_SETUP, defaults::AUTO_SETUP)?;

        if let Some(path) = &self.file {
            debug!("Loading queue configuration file: {}", path.display());
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("__")
                    .try_parsing(true),
            );
        }

        let config: QueueConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            collection_name = %config.collection_name,
            queue_name = %config.queue_name,
            redeliver_timeout = config.redeliver_timeout,
            auto_setup = config.auto_setup,
            "Queue configuration loaded"
        );

        Ok(config)
    }
}
