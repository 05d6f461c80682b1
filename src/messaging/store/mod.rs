//! # Message Store Abstraction
//!
//! Backend-agnostic persistence contract used by the queue connection.
//!
//! ```text
//! Connection ──► Arc<dyn MessageStore>
//!                  ├── InMemoryMessageStore   <- document-store semantics, atomic find-and-modify
//!                  └── PostgresMessageStore   <- relational, UPDATE .. FOR UPDATE SKIP LOCKED
//! ```
//!
//! The store is picked once when the connection is built. Every method takes
//! the collection (table) name so a single pool can serve several queues.
//!
//! Operations against a collection that has not been provisioned must fail
//! with [`MessagingError::SchemaMissing`](super::MessagingError::SchemaMissing);
//! the connection relies on that to run its auto-setup.

pub mod in_memory;
pub mod postgres;

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::MessagingResult;
use super::message::{MessageId, NewMessage, StoredMessage};

pub use in_memory::InMemoryMessageStore;
pub use postgres::PostgresMessageStore;

/// Selection criteria for deliverable messages of one queue
///
/// A record matches when `available_at <= now` and it is either not leased or
/// its lease started before `redeliver_limit` (`now - redeliver_timeout`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityFilter {
    pub queue_name: String,
    pub now: DateTime<Utc>,
    pub redeliver_limit: DateTime<Utc>,
}

impl VisibilityFilter {
    /// Build the filter for `queue_name` as seen at `now`
    pub fn new(queue_name: impl Into<String>, now: DateTime<Utc>, redeliver_timeout_secs: u64) -> Self {
        let redeliver_limit = i64::try_from(redeliver_timeout_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|timeout| now.checked_sub_signed(timeout))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        Self {
            queue_name: queue_name.into(),
            now,
            redeliver_limit,
        }
    }

    /// Evaluate the filter against a record's fields
    pub fn matches(
        &self,
        queue_name: &str,
        available_at: DateTime<Utc>,
        delivered_at: Option<DateTime<Utc>>,
    ) -> bool {
        queue_name == self.queue_name
            && available_at <= self.now
            && delivered_at.map_or(true, |delivered| delivered < self.redeliver_limit)
    }
}

/// Persistence operations required by the queue connection
#[async_trait]
pub trait MessageStore: Send + Sync + Debug + 'static {
    /// Create the collection and its indexes if missing (idempotent)
    ///
    /// Provisions a unique `id` plus secondary indexes on `queue_name`,
    /// `available_at` and `delivered_at`.
    async fn ensure_schema(&self, collection: &str) -> MessagingResult<()>;

    /// Insert a record and return its generated id
    async fn insert_one(&self, collection: &str, message: NewMessage) -> MessagingResult<MessageId>;

    /// Atomically lease the first visible record ordered by `available_at`
    ///
    /// Sets `delivered_at` and returns the updated record. Concurrent callers
    /// must never receive the same record.
    async fn claim_next(
        &self,
        collection: &str,
        filter: &VisibilityFilter,
        delivered_at: DateTime<Utc>,
    ) -> MessagingResult<Option<StoredMessage>>;

    /// Delete one record of `queue_name`, returning the number removed (0 or 1)
    async fn delete_one(
        &self,
        collection: &str,
        queue_name: &str,
        id: &MessageId,
    ) -> MessagingResult<u64>;

    /// Count records matching `filter`
    async fn count(&self, collection: &str, filter: &VisibilityFilter) -> MessagingResult<u64>;

    /// List records matching `filter` in delivery order, without leasing them
    async fn find_visible(
        &self,
        collection: &str,
        filter: &VisibilityFilter,
        limit: Option<usize>,
    ) -> MessagingResult<Vec<StoredMessage>>;

    /// Fetch one record of `queue_name` regardless of its visibility
    async fn find_by_id(
        &self,
        collection: &str,
        queue_name: &str,
        id: &MessageId,
    ) -> MessagingResult<Option<StoredMessage>>;

    /// Verify the backend is reachable
    async fn health_check(&self) -> MessagingResult<bool>;

    /// Store name for logging
    fn provider_name(&self) -> &'static str;
}
