//! # In-Memory Message Store
//!
//! Thread-safe document-store style backend for tests and development.
//!
//! Each collection is guarded by its own `parking_lot::Mutex`; the claim is a
//! find-and-modify performed while holding that lock, which gives the same
//! single-winner guarantee a document database offers natively. Collections
//! only exist after [`MessageStore::ensure_schema`], so the connection's
//! auto-setup path is exercised exactly like against a real database.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{MessageStore, VisibilityFilter};
use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::message::{MessageId, NewMessage, StoredMessage};

/// Record plus its insertion sequence, used to break `available_at` ties
#[derive(Debug, Clone)]
struct InMemoryRecord {
    sequence: u64,
    message: StoredMessage,
}

#[derive(Debug, Default)]
struct InMemoryCollection {
    records: Vec<InMemoryRecord>,
}

impl InMemoryCollection {
    /// Visible records in delivery order
    fn visible<'a>(&'a self, filter: &'a VisibilityFilter) -> impl Iterator<Item = &'a InMemoryRecord> {
        let mut visible: Vec<&InMemoryRecord> = self
            .records
            .iter()
            .filter(|record| record.message.is_visible(filter))
            .collect();
        visible.sort_by_key(|record| (record.message.available_at, record.sequence));
        visible.into_iter()
    }
}

/// In-memory message store
///
/// # Example
///
/// ```rust
/// use messenger_queue::messaging::store::{InMemoryMessageStore, MessageStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryMessageStore::new();
/// store.ensure_schema("messenger_messages").await?;
/// assert_eq!(store.len("messenger_messages"), Some(0));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct InMemoryMessageStore {
    collections: DashMap<String, Mutex<InMemoryCollection>>,
    next_sequence: AtomicU64,
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessageStore {
    /// Create an empty store with no provisioned collections
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
            next_sequence: AtomicU64::new(1),
        }
    }

    /// Create with pre-provisioned collections
    pub fn with_collections(collections: &[&str]) -> Self {
        let store = Self::new();
        for name in collections {
            store
                .collections
                .insert((*name).to_string(), Mutex::new(InMemoryCollection::default()));
        }
        store
    }

    /// Number of records in a collection, `None` if it was never provisioned
    pub fn len(&self, collection: &str) -> Option<usize> {
        self.collections
            .get(collection)
            .map(|entry| entry.lock().records.len())
    }

    /// Whether the collection has been provisioned
    pub fn has_collection(&self, collection: &str) -> bool {
        self.collections.contains_key(collection)
    }

    /// Remove a collection and all its records (for testing)
    pub fn drop_collection(&self, collection: &str) {
        self.collections.remove(collection);
    }

    fn with_collection<T>(
        &self,
        collection: &str,
        f: impl FnOnce(&mut InMemoryCollection) -> T,
    ) -> MessagingResult<T> {
        let entry = self
            .collections
            .get(collection)
            .ok_or_else(|| MessagingError::schema_missing(collection))?;
        let mut guard = entry.lock();
        Ok(f(&mut guard))
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn ensure_schema(&self, collection: &str) -> MessagingResult<()> {
        self.collections
            .entry(collection.to_string())
            .or_insert_with(|| Mutex::new(InMemoryCollection::default()));
        Ok(())
    }

    async fn insert_one(&self, collection: &str, message: NewMessage) -> MessagingResult<MessageId> {
        let id = MessageId::new(Uuid::new_v4().to_string());
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);

        self.with_collection(collection, |records| {
            records.records.push(InMemoryRecord {
                sequence,
                message: StoredMessage {
                    id: id.clone(),
                    body: message.body,
                    headers: message.headers,
                    queue_name: message.queue_name,
                    created_at: message.created_at,
                    available_at: message.available_at,
                    delivered_at: None,
                },
            });
        })?;

        Ok(id)
    }

    async fn claim_next(
        &self,
        collection: &str,
        filter: &VisibilityFilter,
        delivered_at: DateTime<Utc>,
    ) -> MessagingResult<Option<StoredMessage>> {
        self.with_collection(collection, |records| {
            let sequence = records.visible(filter).next()?.sequence;
            let record = records
                .records
                .iter_mut()
                .find(|record| record.sequence == sequence)?;

            record.message.delivered_at = Some(delivered_at);
            debug!(message_id = %record.message.id, "Claimed in-memory message");
            Some(record.message.clone())
        })
    }

    async fn delete_one(
        &self,
        collection: &str,
        queue_name: &str,
        id: &MessageId,
    ) -> MessagingResult<u64> {
        self.with_collection(collection, |records| {
            let before = records.records.len();
            records
                .records
                .retain(|record| !(record.message.id == *id && record.message.queue_name == queue_name));
            (before - records.records.len()) as u64
        })
    }

    async fn count(&self, collection: &str, filter: &VisibilityFilter) -> MessagingResult<u64> {
        self.with_collection(collection, |records| {
            records
                .records
                .iter()
                .filter(|record| record.message.is_visible(filter))
                .count() as u64
        })
    }

    async fn find_visible(
        &self,
        collection: &str,
        filter: &VisibilityFilter,
        limit: Option<usize>,
    ) -> MessagingResult<Vec<StoredMessage>> {
        self.with_collection(collection, |records| {
            records
                .visible(filter)
                .take(limit.unwrap_or(usize::MAX))
                .map(|record| record.message.clone())
                .collect()
        })
    }

    async fn find_by_id(
        &self,
        collection: &str,
        queue_name: &str,
        id: &MessageId,
    ) -> MessagingResult<Option<StoredMessage>> {
        self.with_collection(collection, |records| {
            records
                .records
                .iter()
                .find(|record| record.message.id == *id && record.message.queue_name == queue_name)
                .map(|record| record.message.clone())
        })
    }

    async fn health_check(&self) -> MessagingResult<bool> {
        // In-memory store is always healthy
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}
