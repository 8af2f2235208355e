//! The async store interface the agent and the supervisor API depend on.

use async_trait::async_trait;
use handoff_db::{run_migrations, DbPool};
use handoff_types::{EscalationRecord, EscalationUpdate, RequestState};
use rusqlite::Connection;
use std::time::{Duration, Instant};

use crate::error::EscalationError;
use crate::store;

/// Durable escalation records keyed by room.
///
/// Implementations must make a write atomic per room key. Concurrent writes
/// for the same room may resolve last-writer-wins.
#[async_trait]
pub trait EscalationStore: Send + Sync {
    /// Creates or overwrites the record for `room_id`.
    async fn upsert(
        &self,
        room_id: &str,
        update: EscalationUpdate,
    ) -> Result<EscalationRecord, EscalationError>;

    /// Like [`upsert`](Self::upsert), but gives up after `limit`.
    ///
    /// On `EscalationError::Timeout` no record may have been written. The
    /// default drops the pending `upsert` future, which is only correct for
    /// backends whose writes stop when their future is dropped; backends
    /// that hand the write to another thread must override this.
    async fn upsert_within(
        &self,
        room_id: &str,
        update: EscalationUpdate,
        limit: Duration,
    ) -> Result<EscalationRecord, EscalationError> {
        tokio::time::timeout(limit, self.upsert(room_id, update))
            .await
            .map_err(|_| EscalationError::Timeout {
                seconds: limit.as_secs(),
            })?
    }

    async fn get(&self, room_id: &str) -> Result<Option<EscalationRecord>, EscalationError>;

    /// Marks the room's request resolved. `None` if the room has no record.
    async fn resolve(&self, room_id: &str) -> Result<Option<EscalationRecord>, EscalationError>;

    async fn list(
        &self,
        state: Option<RequestState>,
    ) -> Result<Vec<EscalationRecord>, EscalationError>;
}

/// [`EscalationStore`] backed by the pooled SQLite database.
///
/// Every call checks out a connection and runs on tokio's blocking pool.
#[derive(Clone)]
pub struct SqliteEscalationStore {
    pool: DbPool,
}

impl SqliteEscalationStore {
    /// Opens the store, applying any pending migrations first.
    ///
    /// # Errors
    ///
    /// Returns `EscalationError` if no connection can be checked out or a
    /// migration fails.
    pub async fn open(pool: DbPool) -> Result<Self, EscalationError> {
        let store = Self { pool };
        let applied = store
            .with_conn(|conn| Ok(run_migrations(conn)?))
            .await?;
        if applied > 0 {
            tracing::info!(count = applied, "applied escalation store migrations");
        }
        Ok(store)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, EscalationError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, EscalationError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| EscalationError::Task(e.to_string()))?
    }
}

#[async_trait]
impl EscalationStore for SqliteEscalationStore {
    async fn upsert(
        &self,
        room_id: &str,
        update: EscalationUpdate,
    ) -> Result<EscalationRecord, EscalationError> {
        let room = room_id.to_string();
        let record = self
            .with_conn(move |conn| store::upsert_record(conn, &room, &update))
            .await?;
        tracing::debug!(
            room = %record.room_id,
            state = %record.request_state,
            "escalation record written"
        );
        Ok(record)
    }

    async fn upsert_within(
        &self,
        room_id: &str,
        update: EscalationUpdate,
        limit: Duration,
    ) -> Result<EscalationRecord, EscalationError> {
        // The clock starts before the pool checkout so queueing counts too.
        let started = Instant::now();
        let room = room_id.to_string();
        let record = self
            .with_conn(move |conn| {
                store::upsert_record_within(conn, &room, &update, started, limit)
            })
            .await?;
        tracing::debug!(
            room = %record.room_id,
            state = %record.request_state,
            "escalation record written within deadline"
        );
        Ok(record)
    }

    async fn get(&self, room_id: &str) -> Result<Option<EscalationRecord>, EscalationError> {
        let room = room_id.to_string();
        self.with_conn(move |conn| store::get_record(conn, &room))
            .await
    }

    async fn resolve(&self, room_id: &str) -> Result<Option<EscalationRecord>, EscalationError> {
        let room = room_id.to_string();
        self.with_conn(move |conn| store::resolve_record(conn, &room))
            .await
    }

    async fn list(
        &self,
        state: Option<RequestState>,
    ) -> Result<Vec<EscalationRecord>, EscalationError> {
        self.with_conn(move |conn| store::list_records(conn, state))
            .await
    }
}
