//! # Queue Connection
//!
//! Durable delivery of opaque messages for one `queue_name`, with delayed
//! availability, single-consumer leasing and timeout-based recovery.
//!
//! ## Lifecycle of a message
//!
//! ```text
//! send ──► PENDING ──(available_at reached)──► VISIBLE ──get──► LEASED
//!                                                 ▲                │
//!                                                 └─(redeliver_timeout elapsed)
//!                                      ack / reject ──► DELETED
//! ```
//!
//! No state column exists; the state is derived from `available_at`,
//! `delivered_at` and the configured `redeliver_timeout` on every read.
//!
//! ## Auto-setup
//!
//! When `auto_setup` is enabled, an operation failing with
//! [`MessagingError::SchemaMissing`](crate::messaging::MessagingError::SchemaMissing) provisions the schema once and is retried
//! exactly once. Otherwise the error is returned unchanged.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::errors::MessagingResult;
use super::message::{Headers, MessageId, NewMessage, QueuedMessage};
use super::store::{MessageStore, VisibilityFilter};
use crate::config::QueueConfig;
use crate::logging::log_queue_operation;

/// Polling queue connection over a [`MessageStore`]
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use messenger_queue::config::QueueConfig;
/// use messenger_queue::messaging::{Connection, Headers, InMemoryMessageStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let connection = Connection::new(QueueConfig::default(), Arc::new(InMemoryMessageStore::new()))?;
///
/// let id = connection.send(b"hello".to_vec(), &Headers::new(), 0).await?;
/// let message = connection.get().await?.expect("message should be visible");
/// assert_eq!(message.id, id);
///
/// assert!(connection.ack(&message.id).await?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Connection {
    config: QueueConfig,
    store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
    queue_emptied_at: Mutex<Option<DateTime<Utc>>>,
}

impl Connection {
    /// Create a connection using the system clock
    pub fn new(config: QueueConfig, store: Arc<dyn MessageStore>) -> MessagingResult<Self> {
        Self::from_parts(config, store, Arc::new(SystemClock))
    }

    /// Create a connection with every dependency supplied explicitly
    pub fn from_parts(
        config: QueueConfig,
        store: Arc<dyn MessageStore>,
        clock: Arc<dyn Clock>,
    ) -> MessagingResult<Self> {
        config.validate()?;

        debug!(
            provider = store.provider_name(),
            collection_name = %config.collection_name,
            queue_name = %config.queue_name,
            "Queue connection created"
        );

        Ok(Self {
            config,
            store,
            clock,
            queue_emptied_at: Mutex::new(None),
        })
    }

    /// Configuration this connection was built with
    pub fn configuration(&self) -> &QueueConfig {
        &self.config
    }

    /// Name of the backing store
    pub fn provider_name(&self) -> &'static str {
        self.store.provider_name()
    }

    /// When `get` last found the queue empty, cleared by any delivery
    pub fn queue_emptied_at(&self) -> Option<DateTime<Utc>> {
        *self.queue_emptied_at.lock()
    }

    /// Forget the "queue emptied" marker
    pub fn reset(&self) {
        *self.queue_emptied_at.lock() = None;
    }

    fn collection(&self) -> &str {
        &self.config.collection_name
    }

    fn visibility_filter(&self, now: DateTime<Utc>) -> VisibilityFilter {
        VisibilityFilter::new(&self.config.queue_name, now, self.config.redeliver_timeout)
    }

    /// Run `operation`, provisioning the schema and retrying once if it is missing
    async fn with_auto_setup<T, F, Fut>(&self, name: &'static str, mut operation: F) -> MessagingResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = MessagingResult<T>>,
    {
        let mut retried = false;
        loop {
            match operation().await {
                Err(err) if err.is_schema_missing() && self.config.auto_setup && !retried => {
                    warn!(
                        operation = name,
                        collection_name = %self.config.collection_name,
                        "Backing schema missing, running auto-setup"
                    );
                    self.setup().await?;
                    retried = true;
                }
                result => return result,
            }
        }
    }

    /// Enqueue a message that becomes deliverable after `delay_ms` milliseconds
    pub async fn send(&self, body: Vec<u8>, headers: &Headers, delay_ms: u64) -> MessagingResult<MessageId> {
        let message = NewMessage::new(body, headers, &self.config.queue_name, self.clock.now(), delay_ms)?;
        let store = &self.store;
        let collection = self.collection();

        let id = self
            .with_auto_setup("send", move || store.insert_one(collection, message.clone()))
            .await?;

        log_queue_operation("send", &self.config.queue_name, Some(id.as_str()), "enqueued", None);
        Ok(id)
    }

    /// Lease the earliest visible message
    ///
    /// A claimed record whose headers cannot be decoded is deleted and
    /// reported as [`MessagingError::Decoding`](crate::messaging::MessagingError::Decoding) so it cannot block the queue.
    pub async fn get(&self) -> MessagingResult<Option<QueuedMessage>> {
        let now = self.clock.now();
        let filter = self.visibility_filter(now);
        let store = &self.store;
        let collection = self.collection();
        let filter_ref = &filter;

        let claimed = self
            .with_auto_setup("get", move || store.claim_next(collection, filter_ref, now))
            .await?;

        let Some(stored) = claimed else {
            *self.queue_emptied_at.lock() = Some(now);
            debug!(queue_name = %self.config.queue_name, "No visible message");
            return Ok(None);
        };

        // Bursty producers may have refilled the queue, so clear the marker
        *self.queue_emptied_at.lock() = None;

        let id = stored.id.clone();
        match stored.decode() {
            Ok(message) => {
                debug!(queue_name = %self.config.queue_name, message_id = %id, "Message leased");
                Ok(Some(message))
            }
            Err(err) => {
                warn!(
                    queue_name = %self.config.queue_name,
                    message_id = %id,
                    error = %err,
                    "Rejecting message that cannot be decoded"
                );
                self.reject(&id).await?;
                Err(err)
            }
        }
    }

    /// Delete a message; `false` when it was already gone
    pub async fn ack(&self, id: &MessageId) -> MessagingResult<bool> {
        let deleted = self
            .store
            .delete_one(self.collection(), &self.config.queue_name, id)
            .await?
            > 0;

        log_queue_operation(
            "ack",
            &self.config.queue_name,
            Some(id.as_str()),
            if deleted { "deleted" } else { "already_removed" },
            None,
        );
        Ok(deleted)
    }

    /// Same as [`ack`](Self::ack); retry and dead-letter policies live above the connection
    pub async fn reject(&self, id: &MessageId) -> MessagingResult<bool> {
        self.ack(id).await
    }

    /// Number of messages currently matching the visibility filter
    pub async fn message_count(&self) -> MessagingResult<u64> {
        let filter = self.visibility_filter(self.clock.now());
        let store = &self.store;
        let collection = self.collection();
        let filter_ref = &filter;

        self.with_auto_setup("message_count", move || store.count(collection, filter_ref))
            .await
    }

    /// Visible messages in delivery order, without leasing them
    ///
    /// Undecodable records are reported but left in place.
    pub async fn find_all(&self, limit: Option<usize>) -> MessagingResult<Vec<QueuedMessage>> {
        let filter = self.visibility_filter(self.clock.now());
        let store = &self.store;
        let collection = self.collection();
        let filter_ref = &filter;

        let stored = self
            .with_auto_setup("find_all", move || store.find_visible(collection, filter_ref, limit))
            .await?;

        stored.into_iter().map(|message| message.decode()).collect()
    }

    /// Fetch one message of this queue by id, whatever its state
    pub async fn find(&self, id: &MessageId) -> MessagingResult<Option<QueuedMessage>> {
        let store = &self.store;
        let collection = self.collection();
        let queue_name = self.config.queue_name.as_str();

        let stored = self
            .with_auto_setup("find", move || store.find_by_id(collection, queue_name, id))
            .await?;

        stored.map(|message| message.decode()).transpose()
    }

    /// Ensure the backing collection and its indexes exist
    pub async fn setup(&self) -> MessagingResult<()> {
        self.store.ensure_schema(self.collection()).await?;
        info!(
            provider = self.store.provider_name(),
            collection_name = %self.config.collection_name,
            "Message store schema ready"
        );
        Ok(())
    }

    /// Verify the backing store is reachable
    pub async fn health_check(&self) -> MessagingResult<bool> {
        self.store.health_check().await
    }
}
