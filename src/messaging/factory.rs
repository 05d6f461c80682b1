//! DSN-driven construction of a [`Connection`].
//!
//! The backing store is chosen here, once, from the DSN scheme:
//!
//! | scheme                      | store                      |
//! |-----------------------------|----------------------------|
//! | `postgres`, `postgresql`    | [`PostgresMessageStore`]   |
//! | `memory`                    | [`InMemoryMessageStore`]   |

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::connection::Connection;
use super::errors::{MessagingError, MessagingResult};
use super::store::{InMemoryMessageStore, MessageStore, PostgresMessageStore};
use crate::config::build_configuration;
use crate::constants::schemes;

/// Pool size used for PostgreSQL stores built from a DSN
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Whether `dsn` names a scheme this factory can connect to
pub fn supports(dsn: &str) -> bool {
    dsn.split_once("://")
        .map(|(scheme, _)| schemes::ALL.contains(&scheme.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Parse `dsn` and `options`, build the matching store and return a connection
///
/// ```rust
/// use std::collections::HashMap;
/// use messenger_queue::messaging::factory;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let connection = factory::connect("memory://local?queue_name=emails", &HashMap::new()).await?;
/// assert_eq!(connection.configuration().queue_name, "emails");
/// # Ok(())
/// # }
/// ```
pub async fn connect(dsn: &str, options: &HashMap<String, String>) -> MessagingResult<Connection> {
    let (connection_dsn, config) = build_configuration(dsn, options)?;

    let store: Arc<dyn MessageStore> = match connection_dsn.scheme() {
        schemes::POSTGRES | schemes::POSTGRESQL => Arc::new(
            PostgresMessageStore::connect(connection_dsn.connection_url(), DEFAULT_MAX_CONNECTIONS).await?,
        ),
        schemes::MEMORY => Arc::new(InMemoryMessageStore::new()),
        other => {
            return Err(MessagingError::configuration(
                "dsn",
                format!(
                    "Unsupported DSN scheme '{other}'. Supported schemes are [{}].",
                    schemes::ALL.join(", ")
                ),
            ))
        }
    };

    info!(
        provider = store.provider_name(),
        host = connection_dsn.host().unwrap_or("-"),
        collection_name = %config.collection_name,
        queue_name = %config.queue_name,
        "Connecting message queue"
    );

    Connection::new(config, store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports() {
        assert!(supports("postgres://localhost/app"));
        assert!(supports("postgresql://user:pass@db:5432/app?queue_name=q"));
        assert!(supports("memory://local"));
        assert!(!supports("mongodb://localhost"));
        assert!(!supports("not a dsn"));
    }

    #[tokio::test]
    async fn test_connect_memory() {
        let mut options = HashMap::new();
        options.insert("redeliver_timeout".to_string(), "30".to_string());

        let connection = connect("memory://local?auto_setup=on", &options).await.unwrap();

        assert_eq!(connection.provider_name(), "in_memory");
        assert_eq!(connection.configuration().redeliver_timeout, 30);
        assert!(connection.configuration().auto_setup);
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        let err = connect("redis://localhost", &HashMap::new()).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported DSN scheme"));
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_option() {
        let err = connect("memory://local?visibility=1", &HashMap::new()).await.unwrap_err();
        assert!(matches!(err, MessagingError::Configuration { .. }));
    }
}
