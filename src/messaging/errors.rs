//! # Messaging Error Types
//!
//! Structured error handling for the queue connection and its stores using
//! thiserror instead of `Box<dyn Error>` patterns.

use thiserror::Error;

/// PostgreSQL SQLSTATE for `undefined_table`
const UNDEFINED_TABLE: &str = "42P01";

/// Queue connection error kinds
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Configuration error: {component}: {message}")]
    Configuration { component: String, message: String },

    #[error("Backing schema missing for collection: {collection}")]
    SchemaMissing { collection: String },

    #[error("Message store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Message {message_id} could not be decoded: {message}")]
    Decoding { message_id: String, message: String },

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Message store error: {operation}: {message}")]
    Store { operation: String, message: String },
}

impl MessagingError {
    /// Create a configuration error
    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a missing schema error
    pub fn schema_missing(collection: impl Into<String>) -> Self {
        Self::SchemaMissing {
            collection: collection.into(),
        }
    }

    /// Create a store unavailable error
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Create a decoding error for a stored message
    pub fn decoding(message_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decoding {
            message_id: message_id.into(),
            message: message.into(),
        }
    }

    /// Create a message serialization error
    pub fn message_serialization(message: impl Into<String>) -> Self {
        Self::MessageSerialization {
            message: message.into(),
        }
    }

    /// Create a generic store error
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether this error triggers the auto-setup retry
    pub fn is_schema_missing(&self) -> bool {
        matches!(self, Self::SchemaMissing { .. })
    }

    /// Whether retrying later may succeed without any intervention
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }

    /// Map a sqlx error raised while operating on `collection`
    ///
    /// Unlike the plain `From` conversion this keeps the collection name on
    /// `SchemaMissing` so callers know what needs provisioning.
    pub fn from_sqlx(err: sqlx::Error, collection: &str, operation: &str) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                if db_err.code().as_deref() == Some(UNDEFINED_TABLE) {
                    MessagingError::schema_missing(collection)
                } else {
                    MessagingError::store(operation, db_err.to_string())
                }
            }
            other => other.into(),
        }
    }
}

/// Conversion from sqlx::Error to MessagingError
impl From<sqlx::Error> for MessagingError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                if db_err.code().as_deref() == Some(UNDEFINED_TABLE) {
                    MessagingError::schema_missing(
                        db_err.table().unwrap_or("unknown").to_string(),
                    )
                } else {
                    MessagingError::store("database", db_err.to_string())
                }
            }
            sqlx::Error::PoolTimedOut => {
                MessagingError::store_unavailable("timed out acquiring a pooled connection")
            }
            sqlx::Error::PoolClosed => MessagingError::store_unavailable("database pool is closed"),
            sqlx::Error::Io(io_err) => MessagingError::store_unavailable(io_err.to_string()),
            sqlx::Error::Tls(tls_err) => MessagingError::store_unavailable(tls_err.to_string()),
            sqlx::Error::WorkerCrashed => {
                MessagingError::store_unavailable("database connection worker crashed")
            }
            sqlx::Error::Configuration(config_err) => {
                MessagingError::configuration("database", config_err.to_string())
            }
            other => MessagingError::store("query", other.to_string()),
        }
    }
}

/// Conversion from serde_json::Error to MessagingError
impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        MessagingError::message_serialization(err.to_string())
    }
}

impl From<url::ParseError> for MessagingError {
    fn from(err: url::ParseError) -> Self {
        MessagingError::configuration("dsn", format!("The given DSN is invalid: {err}"))
    }
}

impl From<config::ConfigError> for MessagingError {
    fn from(err: config::ConfigError) -> Self {
        MessagingError::configuration("loader", err.to_string())
    }
}

/// Result type alias for messaging operations
pub type MessagingResult<T> = Result<T, MessagingError>;
