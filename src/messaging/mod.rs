//! # Messaging Module
//!
//! Polling message queue over a pluggable [`MessageStore`]: the
//! [`Connection`] with its lease and redelivery semantics, a typed JSON
//! [`Transport`], a [`PollingConsumer`] loop and the DSN [`factory`].

pub mod clock;
pub mod connection;
pub mod consumer;
pub mod errors;
pub mod factory;
pub mod message;
pub mod store;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use connection::Connection;
pub use consumer::{ConsumerStats, PollingConfig, PollingConsumer};
pub use errors::{MessagingError, MessagingResult};
pub use message::{Headers, MessageId, NewMessage, QueuedMessage, StoredMessage};
pub use store::{InMemoryMessageStore, MessageStore, PostgresMessageStore, VisibilityFilter};
pub use transport::{QueueMessage, ReceivedMessage, ReceivedStamp, Transport};
