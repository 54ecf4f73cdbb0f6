//! Conversions from adapter-level errors into the domain error type.

use ordersync_domain::OrderSyncError;
use thiserror::Error;

/// Infrastructure-level error wrapper. Exists so `?` works against the
/// third-party error types inside adapters before the result crosses a
/// port boundary as an [`OrderSyncError`].
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<InfraError> for OrderSyncError {
    fn from(err: InfraError) -> Self {
        match err {
            InfraError::Sqlite(e) => Self::Database(e.to_string()),
            InfraError::Pool(e) => Self::Database(e.to_string()),
            InfraError::Http(e) => Self::Network(e.to_string()),
            InfraError::Serde(e) => Self::Internal(e.to_string()),
        }
    }
}

/// Map a blocking-task join failure onto the domain error type.
pub(crate) fn map_join_error(err: tokio::task::JoinError) -> OrderSyncError {
    if err.is_cancelled() {
        OrderSyncError::Internal("blocking task cancelled".into())
    } else {
        OrderSyncError::Internal(format!("blocking task failed: {err}"))
    }
}
