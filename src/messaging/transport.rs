//! Typed transport over a [`Connection`].
//!
//! Message bodies are JSON-encoded and tagged with a `content-type` header.
//! Deliveries carry a [`ReceivedStamp`] naming the stored message so the
//! consumer can acknowledge or reject exactly that record.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use super::connection::Connection;
use super::errors::{MessagingError, MessagingResult};
use super::message::{Headers, MessageId, QueuedMessage};
use crate::constants::headers::{CONTENT_TYPE, JSON_CONTENT_TYPE};

/// Types that can travel through a [`Transport`]
pub trait QueueMessage: Serialize + DeserializeOwned + Send + Sync {
    fn to_bytes(&self) -> MessagingResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    fn from_bytes(bytes: &[u8]) -> MessagingResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl<T> QueueMessage for T where T: Serialize + DeserializeOwned + Send + Sync {}

/// Identifies the stored record a delivery came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedStamp {
    pub id: MessageId,
}

/// A decoded delivery
#[derive(Debug, Clone)]
pub struct ReceivedMessage<T> {
    pub stamp: ReceivedStamp,
    pub message: T,
    pub headers: Headers,
    pub delivered_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl<T> ReceivedMessage<T> {
    pub fn id(&self) -> &MessageId {
        &self.stamp.id
    }
}

#[derive(Debug, Clone)]
pub struct Transport {
    connection: Arc<Connection>,
}

impl Transport {
    pub fn new(connection: Arc<Connection>) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Serialize and enqueue `message`
    pub async fn send<T: QueueMessage>(
        &self,
        message: &T,
        headers: Headers,
        delay_ms: u64,
    ) -> MessagingResult<MessageId> {
        let mut headers = headers;
        headers
            .entry(CONTENT_TYPE.to_string())
            .or_insert_with(|| JSON_CONTENT_TYPE.to_string());

        self.connection.send(message.to_bytes()?, &headers, delay_ms).await
    }

    /// Lease and decode the next message
    ///
    /// A body that does not decode as `T` is rejected and reported as
    /// [`MessagingError::Decoding`].
    pub async fn get<T: QueueMessage>(&self) -> MessagingResult<Option<ReceivedMessage<T>>> {
        let Some(queued) = self.connection.get().await? else {
            return Ok(None);
        };
        self.decode(queued).await.map(Some)
    }

    async fn decode<T: QueueMessage>(&self, queued: QueuedMessage) -> MessagingResult<ReceivedMessage<T>> {
        match T::from_bytes(&queued.body) {
            Ok(message) => Ok(ReceivedMessage {
                stamp: ReceivedStamp { id: queued.id },
                message,
                headers: queued.headers,
                delivered_at: queued.delivered_at,
            }),
            Err(err) => {
                warn!(message_id = %queued.id, error = %err, "Rejecting message with undecodable body");
                self.connection.reject(&queued.id).await?;
                Err(MessagingError::decoding(queued.id.as_str(), err.to_string()))
            }
        }
    }

    pub async fn ack<T>(&self, received: &ReceivedMessage<T>) -> MessagingResult<bool> {
        self.connection.ack(received.id()).await
    }

    pub async fn reject<T>(&self, received: &ReceivedMessage<T>) -> MessagingResult<bool> {
        self.connection.reject(received.id()).await
    }

    pub async fn message_count(&self) -> MessagingResult<u64> {
        self.connection.message_count().await
    }

    pub async fn setup(&self) -> MessagingResult<()> {
        self.connection.setup().await
    }
}
