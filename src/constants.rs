//! # Queue Constants
//!
//! Option names, default values and storage column names shared by the
//! configuration layer and both message store backends.

/// Recognised connection option keys
pub mod options {
    pub const COLLECTION_NAME: &str = "collection_name";
    pub const QUEUE_NAME: &str = "queue_name";
    pub const REDELIVER_TIMEOUT: &str = "redeliver_timeout";
    pub const AUTO_SETUP: &str = "auto_setup";

    /// Every key accepted in a DSN query string or an options map
    pub const ALLOWED: [&str; 4] = [COLLECTION_NAME, QUEUE_NAME, REDELIVER_TIMEOUT, AUTO_SETUP];
}

/// Default option values
pub mod defaults {
    pub const COLLECTION_NAME: &str = "messenger_messages";
    pub const QUEUE_NAME: &str = "default";
    /// Seconds a leased message stays invisible before it is redelivered
    pub const REDELIVER_TIMEOUT_SECONDS: u64 = 3600;
    pub const AUTO_SETUP: bool = true;
}

/// Column / field names of a stored message record
pub mod columns {
    pub const ID: &str = "id";
    pub const BODY: &str = "body";
    pub const HEADERS: &str = "headers";
    pub const QUEUE_NAME: &str = "queue_name";
    pub const CREATED_AT: &str = "created_at";
    pub const AVAILABLE_AT: &str = "available_at";
    pub const DELIVERED_AT: &str = "delivered_at";

    /// Columns that carry a secondary index
    pub const INDEXED: [&str; 3] = [QUEUE_NAME, AVAILABLE_AT, DELIVERED_AT];
}

/// Well-known header names
pub mod headers {
    pub const CONTENT_TYPE: &str = "content-type";
    pub const JSON_CONTENT_TYPE: &str = "application/json";
}

/// DSN schemes understood by the connection factory
pub mod schemes {
    pub const POSTGRES: &str = "postgres";
    pub const POSTGRESQL: &str = "postgresql";
    pub const MEMORY: &str = "memory";

    pub const ALL: [&str; 3] = [POSTGRES, POSTGRESQL, MEMORY];
}

/// Maximum length of a queue name (matches the `VARCHAR(190)` column)
pub const MAX_QUEUE_NAME_LENGTH: usize = 190;

/// PostgreSQL identifier length limit
pub const MAX_COLLECTION_NAME_LENGTH: usize = 63;
