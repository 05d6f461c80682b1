#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Messenger Queue
//!
//! Polling message queue connection with leasing, redelivery timeouts and lazy
//! schema provisioning.
//!
//! ## Overview
//!
//! Messages are stored as records in a shared collection, partitioned by
//! `queue_name`. A consumer polls with [`Connection::get`], which atomically
//! leases the earliest visible message. The message stays leased until it is
//! acknowledged or rejected; a consumer that disappears simply lets the lease
//! expire after `redeliver_timeout` seconds, after which another consumer gets
//! it again.
//!
//! ## Module Organization
//!
//! - [`messaging`] - Connection, stores, typed transport, polling consumer and factory
//! - [`config`] - Queue options, DSN parsing and layered loading
//! - [`constants`] - Option names, defaults and column names
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use messenger_queue::messaging::{factory, Headers};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! messenger_queue::logging::init_structured_logging();
//!
//! let connection = factory::connect(
//!     "postgresql://localhost/app?queue_name=emails&redeliver_timeout=300",
//!     &HashMap::new(),
//! ).await?;
//!
//! connection.send(b"{\"to\":\"ops@example.com\"}".to_vec(), &Headers::new(), 0).await?;
//!
//! if let Some(message) = connection.get().await? {
//!     // handle it, then
//!     connection.ack(&message.id).await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Unit tests run against [`messaging::InMemoryMessageStore`] with a
//! [`messaging::ManualClock`]. PostgreSQL integration tests run when
//! `TEST_DATABASE_URL` is set.

pub mod config;
pub mod constants;
pub mod logging;
pub mod messaging;

pub use config::{build_configuration, ConfigLoader, ConnectionDsn, QueueConfig};
pub use messaging::{
    Connection, Headers, InMemoryMessageStore, MessageId, MessageStore, MessagingError,
    MessagingResult, PollingConsumer, PostgresMessageStore, QueuedMessage, Transport,
};
