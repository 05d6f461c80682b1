//! # Message Records
//!
//! Persisted message shapes. Stores exchange [`NewMessage`] and
//! [`StoredMessage`], where headers are still the JSON text that was
//! persisted; the connection decodes them into a [`QueuedMessage`].

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{MessagingError, MessagingResult};
use super::store::VisibilityFilter;

/// Transport metadata attached to a message
pub type Headers = HashMap<String, String>;

/// Opaque message identifier assigned by the store at insert time
///
/// The format is store-specific:
/// - PostgreSQL: `BIGSERIAL` id as string
/// - InMemory: UUID as string
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new message ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Try to parse the id as an i64 (PostgreSQL ids)
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Record handed to a store for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub body: Vec<u8>,
    /// JSON-encoded [`Headers`]
    pub headers: String,
    pub queue_name: String,
    pub created_at: DateTime<Utc>,
    pub available_at: DateTime<Utc>,
}

impl NewMessage {
    /// Build a record becoming available `delay_ms` after `now`
    pub fn new(
        body: Vec<u8>,
        headers: &Headers,
        queue_name: impl Into<String>,
        now: DateTime<Utc>,
        delay_ms: u64,
    ) -> MessagingResult<Self> {
        let available_at = i64::try_from(delay_ms)
            .ok()
            .and_then(chrono::Duration::try_milliseconds)
            .and_then(|delay| now.checked_add_signed(delay))
            .ok_or_else(|| {
                MessagingError::configuration(
                    "send",
                    format!("delay of {delay_ms}ms is out of range"),
                )
            })?;

        Ok(Self {
            body,
            headers: serde_json::to_string(headers)?,
            queue_name: queue_name.into(),
            created_at: now,
            available_at,
        })
    }
}

/// Record as persisted by a store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub id: MessageId,
    pub body: Vec<u8>,
    /// JSON-encoded headers, decoded lazily
    pub headers: String,
    pub queue_name: String,
    pub created_at: DateTime<Utc>,
    pub available_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl StoredMessage {
    /// Whether this record would be delivered under `filter`
    pub fn is_visible(&self, filter: &VisibilityFilter) -> bool {
        filter.matches(&self.queue_name, self.available_at, self.delivered_at)
    }

    /// Decode the stored headers into a [`QueuedMessage`]
    pub fn decode(self) -> MessagingResult<QueuedMessage> {
        let headers: Headers = serde_json::from_str(&self.headers)
            .map_err(|e| MessagingError::decoding(self.id.as_str(), e.to_string()))?;

        Ok(QueuedMessage {
            id: self.id,
            body: self.body,
            headers,
            queue_name: self.queue_name,
            created_at: self.created_at,
            available_at: self.available_at,
            delivered_at: self.delivered_at,
        })
    }
}

/// A decoded message returned by the connection
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    pub id: MessageId,
    pub body: Vec<u8>,
    pub headers: Headers,
    pub queue_name: String,
    pub created_at: DateTime<Utc>,
    pub available_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl QueuedMessage {
    /// Look up a header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Whether a consumer currently holds (or last held) a lease
    pub fn is_leased(&self) -> bool {
        self.delivered_at.is_some()
    }

    /// Body as UTF-8 text, if valid
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}
