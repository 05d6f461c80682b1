//! # Polling Consumer
//!
//! Drives [`Connection::get`] until shutdown is signalled, handing each
//! delivery to a user handler. A handler returning `Ok` acknowledges the
//! message; `Err` rejects it.
//!
//! While the connection reports the queue as emptied the loop sleeps with an
//! exponential idle backoff, capped at `max_idle_backoff` and reset on the
//! next delivery.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::connection::Connection;
use super::errors::{MessagingError, MessagingResult};
use super::message::QueuedMessage;
use crate::logging::log_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    pub idle_backoff: Duration,
    pub max_idle_backoff: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            idle_backoff: Duration::from_millis(100),
            max_idle_backoff: Duration::from_secs(5),
        }
    }
}

/// Outcome counters of a consumer run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Messages handled successfully and acknowledged
    pub processed: u64,
    /// Messages whose handler failed, plus poison messages
    pub failed: u64,
}

#[derive(Debug, Clone)]
pub struct PollingConsumer {
    connection: Arc<Connection>,
    config: PollingConfig,
}

impl PollingConsumer {
    pub fn new(connection: Arc<Connection>) -> Self {
        Self::with_config(connection, PollingConfig::default())
    }

    pub fn with_config(connection: Arc<Connection>, config: PollingConfig) -> Self {
        Self { connection, config }
    }

    /// Consume until `shutdown` becomes `true` or its sender is dropped
    pub async fn run<F, Fut>(
        &self,
        handler: F,
        mut shutdown: watch::Receiver<bool>,
    ) -> MessagingResult<ConsumerStats>
    where
        F: Fn(QueuedMessage) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let queue_name = self.connection.configuration().queue_name.clone();
        let mut stats = ConsumerStats::default();
        let mut backoff = self.config.idle_backoff;

        info!(queue_name = %queue_name, "Starting polling consumer");

        while !*shutdown.borrow() {
            match self.connection.get().await {
                Ok(Some(message)) => {
                    backoff = self.config.idle_backoff;
                    let id = message.id.clone();

                    let handled = match handler(message).await {
                        Ok(()) => true,
                        Err(err) => {
                            warn!(queue_name = %queue_name, message_id = %id, error = %err, "Handler failed, rejecting message");
                            false
                        }
                    };
                    let settled = if handled {
                        self.connection.ack(&id).await
                    } else {
                        self.connection.reject(&id).await
                    };

                    match settled {
                        Ok(_) => {
                            if handled {
                                stats.processed += 1;
                            } else {
                                stats.failed += 1;
                            }
                            continue;
                        }
                        // Left leased; delivered again once the lease expires
                        Err(err) if err.is_transient() => {
                            log_error("polling_consumer", "settle", &err.to_string(), Some(id.as_str()));
                        }
                        Err(err) => {
                            error!(queue_name = %queue_name, message_id = %id, error = %err, "Polling consumer stopped");
                            return Err(err);
                        }
                    }
                }
                Ok(None) => {
                    if self.connection.queue_emptied_at().is_none() {
                        continue;
                    }
                    debug!(queue_name = %queue_name, backoff_ms = backoff.as_millis() as u64, "Queue empty");
                }
                Err(MessagingError::Decoding { message_id, message }) => {
                    warn!(queue_name = %queue_name, message_id = %message_id, error = %message, "Skipped poison message");
                    stats.failed += 1;
                    continue;
                }
                Err(err) if err.is_transient() => {
                    log_error("polling_consumer", "get", &err.to_string(), Some(&queue_name));
                }
                Err(err) => {
                    error!(queue_name = %queue_name, error = %err, "Polling consumer stopped");
                    return Err(err);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(backoff) => {},
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            backoff = (backoff * 2).min(self.config.max_idle_backoff);
        }

        info!(
            queue_name = %queue_name,
            processed = stats.processed,
            failed = stats.failed,
            "Polling consumer stopped"
        );
        Ok(stats)
    }
}
