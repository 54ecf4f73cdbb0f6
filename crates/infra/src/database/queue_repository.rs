//! SQLite-backed implementation of the operation queue port.
//!
//! All SQL runs on the blocking pool via `spawn_blocking`; the async port
//! methods never hold a connection across an await point.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use ordersync_core::OperationQueue;
use ordersync_domain::{NewOperation, OperationState, OrderSyncError, QueuedOperation, Result};
use rusqlite::{params, Row};
use tokio::task;
use tracing::warn;

use super::manager::{DbConnection, DbManager};
use crate::errors::{map_join_error, InfraError};

/// SQLite-backed operation queue.
pub struct SqliteOperationQueue {
    db: Arc<DbManager>,
}

impl SqliteOperationQueue {
    /// Construct a repository backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn insert_row(conn: &DbConnection, op: &NewOperation) -> Result<i64> {
        conn.execute(
            QUEUE_INSERT_SQL,
            params![
                op.kind,
                op.method,
                op.target_url,
                op.payload_json,
                op.priority,
                op.created_at,
                op.attempt_limit,
                OperationState::Pending.to_string(),
            ],
        )
        .map_err(InfraError::from)?;
        Ok(conn.last_insert_rowid())
    }

    fn fetch_by_state(
        conn: &DbConnection,
        state: OperationState,
    ) -> Result<Vec<QueuedOperation>> {
        let mut stmt = conn.prepare(QUEUE_SELECT_BY_STATE_SQL).map_err(InfraError::from)?;
        let rows = stmt
            .query_map(params![state.to_string()], map_operation_row)
            .map_err(InfraError::from)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| InfraError::from(e).into())
    }

    /// Run `f` on a pooled connection from the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&DbConnection) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<T> {
            let conn = db.get_connection()?;
            f(&conn)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl OperationQueue for SqliteOperationQueue {
    async fn insert(&self, op: &NewOperation) -> Result<i64> {
        let to_insert = op.clone();
        self.with_conn(move |conn| Self::insert_row(conn, &to_insert)).await
    }

    async fn get(&self, id: i64) -> Result<Option<QueuedOperation>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(QUEUE_SELECT_BY_ID_SQL).map_err(InfraError::from)?;
            let mut rows =
                stmt.query_map(params![id], map_operation_row).map_err(InfraError::from)?;
            match rows.next() {
                Some(row) => Ok(Some(row.map_err(InfraError::from)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn list_by_state(&self, state: OperationState) -> Result<Vec<QueuedOperation>> {
        self.with_conn(move |conn| Self::fetch_by_state(conn, state)).await
    }

    async fn mark_in_flight(&self, id: i64) -> Result<()> {
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE sync_queue SET state = 'in_flight' WHERE id = ?1 AND state = 'pending'",
                    params![id],
                )
                .map_err(InfraError::from)?;
            if changed == 0 {
                return Err(OrderSyncError::NotFound(format!("pending operation {id}")));
            }
            Ok(())
        })
        .await
    }

    async fn recover_in_flight(&self) -> Result<u64> {
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE sync_queue SET state = 'pending' WHERE state = 'in_flight'",
                    [],
                )
                .map_err(InfraError::from)?;
            Ok(u64::try_from(changed).unwrap_or(0))
        })
        .await
    }

    async fn record_retry(&self, id: i64, attempt: i32, last_error: &str) -> Result<()> {
        let last_error = last_error.to_string();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE sync_queue SET state = 'pending', attempt = ?2, last_error = ?3
                     WHERE id = ?1",
                    params![id, attempt, last_error],
                )
                .map_err(InfraError::from)?;
            if changed == 0 {
                return Err(OrderSyncError::NotFound(format!("operation {id}")));
            }
            Ok(())
        })
        .await
    }

    async fn mark_failed(&self, id: i64, error: &str) -> Result<()> {
        let error = error.to_string();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE sync_queue SET state = 'failed', attempt = attempt + 1, last_error = ?2
                     WHERE id = ?1",
                    params![id, error],
                )
                .map_err(InfraError::from)?;
            if changed == 0 {
                return Err(OrderSyncError::NotFound(format!("operation {id}")));
            }
            Ok(())
        })
        .await
    }

    async fn reset_for_retry(&self, id: i64) -> Result<()> {
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE sync_queue SET state = 'pending', attempt = 0, last_error = NULL
                     WHERE id = ?1 AND state = 'failed'",
                    params![id],
                )
                .map_err(InfraError::from)?;
            if changed == 0 {
                return Err(OrderSyncError::NotFound(format!("failed operation {id}")));
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM sync_queue WHERE id = ?1", params![id])
                .map_err(InfraError::from)?;
            Ok(())
        })
        .await
    }

    async fn count_by_state(&self, state: OperationState) -> Result<u64> {
        self.with_conn(move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sync_queue WHERE state = ?1",
                    params![state.to_string()],
                    |row| row.get(0),
                )
                .map_err(InfraError::from)?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM sync_queue", []).map_err(InfraError::from)?;
            Ok(())
        })
        .await
    }
}

const QUEUE_INSERT_SQL: &str = "INSERT INTO sync_queue (
        kind, method, target_url, payload_json, priority, created_at,
        attempt_limit, state
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

const QUEUE_SELECT_BY_STATE_SQL: &str = "SELECT
        id, kind, method, target_url, payload_json, priority,
        created_at, attempt, attempt_limit, state, last_error
    FROM sync_queue
    WHERE state = ?1
    ORDER BY priority ASC, created_at ASC, id ASC";

const QUEUE_SELECT_BY_ID_SQL: &str = "SELECT
        id, kind, method, target_url, payload_json, priority,
        created_at, attempt, attempt_limit, state, last_error
    FROM sync_queue
    WHERE id = ?1";

fn map_operation_row(row: &Row<'_>) -> rusqlite::Result<QueuedOperation> {
    let id: i64 = row.get(0)?;
    let state_raw: String = row.get(9)?;
    let state = parse_state(id, &state_raw);

    Ok(QueuedOperation {
        id,
        kind: row.get(1)?,
        method: row.get(2)?,
        target_url: row.get(3)?,
        payload_json: row.get(4)?,
        priority: row.get(5)?,
        created_at: row.get(6)?,
        attempt: row.get(7)?,
        attempt_limit: row.get(8)?,
        state,
        last_error: row.get(10)?,
    })
}

fn parse_state(id: i64, raw: &str) -> OperationState {
    match OperationState::from_str(raw) {
        Ok(state) => state,
        Err(err) => {
            warn!(
                operation_id = id,
                raw_state = %raw,
                error = %err,
                "invalid operation state in store, defaulting to pending"
            );
            OperationState::Pending
        }
    }
}
