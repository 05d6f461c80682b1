//! # PostgreSQL Message Store
//!
//! Relational backend on a shared sqlx `PgPool`.
//!
//! ## Claim
//!
//! The lease is taken with a single statement:
//!
//! ```sql
//! UPDATE "messenger_messages" SET delivered_at = $1
//! WHERE id = (
//!     SELECT id FROM "messenger_messages"
//!     WHERE queue_name = $2 AND available_at <= $3
//!       AND (delivered_at IS NULL OR delivered_at < $4)
//!     ORDER BY available_at ASC, id ASC
//!     LIMIT 1
//!     FOR UPDATE SKIP LOCKED
//! )
//! RETURNING ...
//! ```
//!
//! Rows locked by a concurrent claim are skipped rather than waited on, so
//! competing consumers each get a different message or none.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use super::{MessageStore, VisibilityFilter};
use crate::config::is_valid_collection_name;
use crate::constants::{columns, MAX_QUEUE_NAME_LENGTH};
use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::message::{MessageId, NewMessage, StoredMessage};

/// SQLSTATEs raised when a concurrent `CREATE ... IF NOT EXISTS` won the race
const DUPLICATE_TABLE: &str = "42P07";
const UNIQUE_VIOLATION: &str = "23505";

const RETURNING_COLUMNS: &str =
    "id, body, headers, queue_name, created_at, available_at, delivered_at";

/// `redeliver_limit` clamped into the range TIMESTAMPTZ can hold
fn lease_cutoff(filter: &VisibilityFilter) -> DateTime<Utc> {
    filter.redeliver_limit.max(DateTime::<Utc>::UNIX_EPOCH)
}

/// PostgreSQL-backed message store
#[derive(Debug, Clone)]
pub struct PostgresMessageStore {
    pool: PgPool,
}

impl PostgresMessageStore {
    /// Create a store using an existing connection pool (BYOP - Bring Your Own Pool)
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool from a database URL
    pub async fn connect(database_url: &str, max_connections: u32) -> MessagingResult<Self> {
        info!("Connecting PostgreSQL message store");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Get reference to underlying connection pool for advanced operations
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Validated, double-quoted table name
    fn table(collection: &str) -> MessagingResult<String> {
        if !is_valid_collection_name(collection) {
            return Err(MessagingError::configuration(
                "collection_name",
                format!("'{collection}' is not a valid table name"),
            ));
        }
        Ok(format!("\"{collection}\""))
    }

    fn row_to_message(row: &PgRow) -> Result<StoredMessage, sqlx::Error> {
        let id: i64 = row.try_get(columns::ID)?;
        Ok(StoredMessage {
            id: MessageId::from(id),
            body: row.try_get(columns::BODY)?,
            headers: row.try_get(columns::HEADERS)?,
            queue_name: row.try_get(columns::QUEUE_NAME)?,
            created_at: row.try_get(columns::CREATED_AT)?,
            available_at: row.try_get(columns::AVAILABLE_AT)?,
            delivered_at: row.try_get(columns::DELIVERED_AT)?,
        })
    }

    fn schema_sql(collection: &str, table: &str) -> String {
        let mut sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id BIGSERIAL PRIMARY KEY,
                body BYTEA NOT NULL,
                headers TEXT NOT NULL,
                queue_name VARCHAR({MAX_QUEUE_NAME_LENGTH}) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                available_at TIMESTAMPTZ NOT NULL,
                delivered_at TIMESTAMPTZ NULL
            );
            "#
        );
        for column in columns::INDEXED {
            sql.push_str(&format!(
                "CREATE INDEX IF NOT EXISTS \"{collection}_{column}_idx\" ON {table} ({column});\n"
            ));
        }
        sql
    }
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    async fn ensure_schema(&self, collection: &str) -> MessagingResult<()> {
        let table = Self::table(collection)?;
        info!(collection = %collection, "Ensuring message table and indexes");

        match sqlx::raw_sql(&Self::schema_sql(collection, &table))
            .execute(&self.pool)
            .await
        {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err))
                if matches!(
                    db_err.code().as_deref(),
                    Some(DUPLICATE_TABLE) | Some(UNIQUE_VIOLATION)
                ) =>
            {
                debug!(collection = %collection, "Schema created concurrently by another connection");
                Ok(())
            }
            Err(e) => Err(MessagingError::from_sqlx(e, collection, "ensure_schema")),
        }
    }

    async fn insert_one(&self, collection: &str, message: NewMessage) -> MessagingResult<MessageId> {
        let table = Self::table(collection)?;
        let sql = format!(
            "INSERT INTO {table} (body, headers, queue_name, created_at, available_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id"
        );

        let id: i64 = sqlx::query_scalar(&sql)
            .bind(&message.body)
            .bind(&message.headers)
            .bind(&message.queue_name)
            .bind(message.created_at)
            .bind(message.available_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MessagingError::from_sqlx(e, collection, "insert_one"))?;

        Ok(MessageId::from(id))
    }

    async fn claim_next(
        &self,
        collection: &str,
        filter: &VisibilityFilter,
        delivered_at: DateTime<Utc>,
    ) -> MessagingResult<Option<StoredMessage>> {
        let table = Self::table(collection)?;
        let sql = format!(
            "UPDATE {table} SET delivered_at = $1 \
             WHERE id = ( \
                 SELECT id FROM {table} \
                 WHERE queue_name = $2 AND available_at <= $3 \
                   AND (delivered_at IS NULL OR delivered_at < $4) \
                 ORDER BY available_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {RETURNING_COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(delivered_at)
            .bind(&filter.queue_name)
            .bind(filter.now)
            .bind(lease_cutoff(filter))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MessagingError::from_sqlx(e, collection, "claim_next"))?;

        row.as_ref()
            .map(Self::row_to_message)
            .transpose()
            .map_err(|e| MessagingError::from_sqlx(e, collection, "claim_next"))
    }

    async fn delete_one(
        &self,
        collection: &str,
        queue_name: &str,
        id: &MessageId,
    ) -> MessagingResult<u64> {
        let table = Self::table(collection)?;
        // Ids not produced by this store cannot match any row
        let Some(id) = id.as_i64() else {
            return Ok(0);
        };

        let sql = format!("DELETE FROM {table} WHERE id = $1 AND queue_name = $2");
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(queue_name)
            .execute(&self.pool)
            .await
            .map_err(|e| MessagingError::from_sqlx(e, collection, "delete_one"))?;

        Ok(result.rows_affected())
    }

    async fn count(&self, collection: &str, filter: &VisibilityFilter) -> MessagingResult<u64> {
        let table = Self::table(collection)?;
        let sql = format!(
            "SELECT COUNT(id) FROM {table} \
             WHERE queue_name = $1 AND available_at <= $2 \
               AND (delivered_at IS NULL OR delivered_at < $3)"
        );

        let count: i64 = sqlx::query_scalar(&sql)
            .bind(&filter.queue_name)
            .bind(filter.now)
            .bind(lease_cutoff(filter))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MessagingError::from_sqlx(e, collection, "count"))?;

        Ok(count.max(0) as u64)
    }

    async fn find_visible(
        &self,
        collection: &str,
        filter: &VisibilityFilter,
        limit: Option<usize>,
    ) -> MessagingResult<Vec<StoredMessage>> {
        let table = Self::table(collection)?;
        let sql = format!(
            "SELECT {RETURNING_COLUMNS} FROM {table} \
             WHERE queue_name = $1 AND available_at <= $2 \
               AND (delivered_at IS NULL OR delivered_at < $3) \
             ORDER BY available_at ASC, id ASC \
             LIMIT $4"
        );
        // LIMIT NULL means no limit in PostgreSQL
        let limit = limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX));

        let rows = sqlx::query(&sql)
            .bind(&filter.queue_name)
            .bind(filter.now)
            .bind(lease_cutoff(filter))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MessagingError::from_sqlx(e, collection, "find_visible"))?;

        rows.iter()
            .map(Self::row_to_message)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| MessagingError::from_sqlx(e, collection, "find_visible"))
    }

    async fn find_by_id(
        &self,
        collection: &str,
        queue_name: &str,
        id: &MessageId,
    ) -> MessagingResult<Option<StoredMessage>> {
        let table = Self::table(collection)?;
        let Some(id) = id.as_i64() else {
            return Ok(None);
        };

        let sql = format!("SELECT {RETURNING_COLUMNS} FROM {table} WHERE id = $1 AND queue_name = $2");
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(queue_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MessagingError::from_sqlx(e, collection, "find_by_id"))?;

        row.as_ref()
            .map(Self::row_to_message)
            .transpose()
            .map_err(|e| MessagingError::from_sqlx(e, collection, "find_by_id"))
    }

    async fn health_check(&self) -> MessagingResult<bool> {
        match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool).await {
            Ok(value) => Ok(value == 1),
            Err(e) => {
                debug!(error = %e, "PostgreSQL health check failed");
                Err(e.into())
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "postgres"
    }
}
