//! SQLite-backed implementation of the conflict inbox port.

use std::sync::Arc;

use async_trait::async_trait;
use ordersync_core::ConflictInbox;
use ordersync_domain::{ConflictRecord, NewConflict, Result};
use rusqlite::{params, Row};
use tokio::task;

use super::manager::{DbConnection, DbManager};
use crate::errors::{map_join_error, InfraError};

/// SQLite-backed conflict inbox.
pub struct SqliteConflictInbox {
    db: Arc<DbManager>,
}

impl SqliteConflictInbox {
    /// Construct a repository backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

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
impl ConflictInbox for SqliteConflictInbox {
    async fn insert(&self, conflict: &NewConflict) -> Result<i64> {
        let to_insert = conflict.clone();
        self.with_conn(move |conn| {
            conn.execute(
                CONFLICT_INSERT_SQL,
                params![
                    to_insert.entity_id,
                    to_insert.kind,
                    to_insert.method,
                    to_insert.target_url,
                    to_insert.local_version,
                    to_insert.local_payload,
                    to_insert.remote_version,
                    to_insert.remote_payload,
                    to_insert.detected_at,
                ],
            )
            .map_err(InfraError::from)?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn get(&self, id: i64) -> Result<Option<ConflictRecord>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(CONFLICT_SELECT_BY_ID_SQL).map_err(InfraError::from)?;
            let mut rows =
                stmt.query_map(params![id], map_conflict_row).map_err(InfraError::from)?;
            match rows.next() {
                Some(row) => Ok(Some(row.map_err(InfraError::from)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn list(&self) -> Result<Vec<ConflictRecord>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(CONFLICT_LIST_SQL).map_err(InfraError::from)?;
            let rows = stmt.query_map([], map_conflict_row).map_err(InfraError::from)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| InfraError::from(e).into())
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM conflict_inbox WHERE id = ?1", params![id])
                .map_err(InfraError::from)?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM conflict_inbox", []).map_err(InfraError::from)?;
            Ok(())
        })
        .await
    }
}

const CONFLICT_INSERT_SQL: &str = "INSERT INTO conflict_inbox (
        entity_id, kind, method, target_url, local_version, local_payload,
        remote_version, remote_payload, detected_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

const CONFLICT_SELECT_BY_ID_SQL: &str = "SELECT
        id, entity_id, kind, method, target_url, local_version, local_payload,
        remote_version, remote_payload, detected_at
    FROM conflict_inbox
    WHERE id = ?1";

const CONFLICT_LIST_SQL: &str = "SELECT
        id, entity_id, kind, method, target_url, local_version, local_payload,
        remote_version, remote_payload, detected_at
    FROM conflict_inbox
    ORDER BY detected_at ASC, id ASC";

fn map_conflict_row(row: &Row<'_>) -> rusqlite::Result<ConflictRecord> {
    Ok(ConflictRecord {
        id: row.get(0)?,
        entity_id: row.get(1)?,
        kind: row.get(2)?,
        method: row.get(3)?,
        target_url: row.get(4)?,
        local_version: row.get(5)?,
        local_payload: row.get(6)?,
        remote_version: row.get(7)?,
        remote_payload: row.get(8)?,
        detected_at: row.get(9)?,
    })
}
