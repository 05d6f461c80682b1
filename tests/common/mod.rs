//! Shared helpers for integration tests
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use messenger_queue::messaging::{Connection, InMemoryMessageStore, ManualClock};
use messenger_queue::QueueConfig;
use uuid::Uuid;

/// Fixed starting instant so timestamps in assertions are predictable
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

/// In-memory connection driven by a manual clock
pub struct MemoryQueue {
    pub connection: Arc<Connection>,
    pub store: Arc<InMemoryMessageStore>,
    pub clock: Arc<ManualClock>,
}

impl MemoryQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self::on_store(config, Arc::new(InMemoryMessageStore::new()), Arc::new(ManualClock::new(epoch())))
    }

    /// Another connection over the same store and clock
    pub fn sibling(&self, config: QueueConfig) -> Arc<Connection> {
        Arc::new(Connection::from_parts(config, self.store.clone(), self.clock.clone()).unwrap())
    }

    fn on_store(config: QueueConfig, store: Arc<InMemoryMessageStore>, clock: Arc<ManualClock>) -> Self {
        let connection = Arc::new(Connection::from_parts(config, store.clone(), clock.clone()).unwrap());
        Self {
            connection,
            store,
            clock,
        }
    }
}

/// Database URL for PostgreSQL tests, if configured
pub fn test_database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL")
        .ok()
        .filter(|url| !url.is_empty())
}

/// Collection name unique to one test run
pub fn unique_collection(prefix: &str) -> String {
    format!("{prefix}_{}", &Uuid::new_v4().simple().to_string()[..8])
}

pub mod strategies {
    use proptest::prelude::*;

    /// Valid collection identifiers
    pub fn collection_name_strategy() -> impl Strategy<Value = String> {
        "[a-z_][a-z0-9_]{0,40}"
    }

    /// Queue names of allowed length
    pub fn queue_name_strategy() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9._-]{0,60}"
    }

    /// Send delays up to one day, in milliseconds
    pub fn delay_ms_strategy() -> impl Strategy<Value = u64> {
        0u64..86_400_000
    }
}
