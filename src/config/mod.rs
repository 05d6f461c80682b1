//! # Queue Configuration
//!
//! Options recognised by a queue connection, their defaults, and validation.
//!
//! Configuration reaches a connection through one of three paths:
//!
//! - programmatically via [`QueueConfig`] builder methods,
//! - from a connection string with [`build_configuration`] (DSN query > options > defaults),
//! - from layered sources (defaults, file, environment) with [`ConfigLoader`].
//!
//! ## Usage
//!
//! ```rust
//! use messenger_queue::config::QueueConfig;
//!
//! let config = QueueConfig::default()
//!     .with_queue_name("emails")
//!     .with_redeliver_timeout(120);
//!
//! assert_eq!(config.collection_name, "messenger_messages");
//! assert!(config.validate().is_ok());
//! ```

pub mod dsn;
pub mod loader;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{defaults, MAX_COLLECTION_NAME_LENGTH, MAX_QUEUE_NAME_LENGTH};
use crate::messaging::errors::{MessagingError, MessagingResult};

pub use dsn::{build_configuration, ConnectionDsn};
pub use loader::ConfigLoader;

/// Connection options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    /// Backing collection / table name
    pub collection_name: String,

    /// Logical partition produced to and consumed from
    pub queue_name: String,

    /// Seconds before a leased, unacknowledged message is delivered again
    pub redeliver_timeout: u64,

    /// Provision the backing schema on first use when it is missing
    pub auto_setup: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            collection_name: defaults::COLLECTION_NAME.to_string(),
            queue_name: defaults::QUEUE_NAME.to_string(),
            redeliver_timeout: defaults::REDELIVER_TIMEOUT_SECONDS,
            auto_setup: defaults::AUTO_SETUP,
        }
    }
}

impl QueueConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection_name<S: Into<String>>(mut self, collection_name: S) -> Self {
        self.collection_name = collection_name.into();
        self
    }

    pub fn with_queue_name<S: Into<String>>(mut self, queue_name: S) -> Self {
        self.queue_name = queue_name.into();
        self
    }

    /// Set the redeliver timeout in seconds
    pub fn with_redeliver_timeout(mut self, seconds: u64) -> Self {
        self.redeliver_timeout = seconds;
        self
    }

    pub fn with_auto_setup(mut self, enabled: bool) -> Self {
        self.auto_setup = enabled;
        self
    }

    /// Redeliver timeout as a `Duration`
    pub fn redeliver_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.redeliver_timeout)
    }

    /// Validate the configuration
    pub fn validate(&self) -> MessagingResult<()> {
        if !is_valid_collection_name(&self.collection_name) {
            return Err(MessagingError::configuration(
                "collection_name",
                format!(
                    "'{}' must start with a letter or underscore, contain only ASCII letters, \
                     digits and underscores, and be at most {MAX_COLLECTION_NAME_LENGTH} characters",
                    self.collection_name
                ),
            ));
        }

        if self.queue_name.is_empty() {
            return Err(MessagingError::configuration(
                "queue_name",
                "queue name cannot be empty",
            ));
        }

        if self.queue_name.chars().count() > MAX_QUEUE_NAME_LENGTH {
            return Err(MessagingError::configuration(
                "queue_name",
                format!("queue name exceeds {MAX_QUEUE_NAME_LENGTH} characters"),
            ));
        }

        Ok(())
    }
}

/// Whether `name` can be used verbatim as a collection / table identifier
pub fn is_valid_collection_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    name.len() <= MAX_COLLECTION_NAME_LENGTH
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a boolean option value
///
/// Accepts `1/0`, `true/false`, `on/off`, `yes/no` in any case.
pub fn parse_bool(key: &str, value: &str) -> MessagingResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(MessagingError::configuration(
            key,
            format!("'{value}' is not a boolean"),
        )),
    }
}
