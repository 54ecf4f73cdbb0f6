//! Transport request/response types and the failure taxonomy.
//!
//! Every remote-call failure is translated into a [`TransportError`] before
//! it reaches the dispatcher; the dispatcher only ever branches on
//! [`TransportError::classify`]. No raw HTTP-client error escapes a drain.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A request the queue replays against the remote authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRequest {
    pub method: String,
    pub url: String,
    /// Opaque JSON body captured at enqueue time.
    pub payload_json: String,
}

/// Successful remote execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: String,
}

/// Server-reported snapshot attached to a 409 response. Carries what the
/// conflict resolver needs to build both sides of the three-way choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictBody {
    pub entity_id: String,
    pub remote_version: i64,
    pub remote_payload: serde_json::Value,
}

/// Classified remote-call failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {code}: {message}")]
    Status {
        code: u16,
        message: String,
        /// Present when the server rejected the write for version
        /// mismatch and included its own snapshot.
        conflict: Option<ConflictBody>,
    },
}

/// Routing decision the dispatcher makes per failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Network error, timeout, or 5xx: retried with backoff.
    Retryable,
    /// Version mismatch (409): moved to the conflict inbox, never retried
    /// blindly.
    Conflict,
    /// Other 4xx: same bookkeeping as retryable, expected to exhaust the
    /// attempt limit quickly.
    Fatal,
}

impl TransportError {
    /// Map this failure onto the retry/conflict/fatal taxonomy.
    pub fn classify(&self) -> FailureClass {
        match self {
            Self::Network(_) | Self::Timeout(_) => FailureClass::Retryable,
            Self::Status { code: 409, .. } => FailureClass::Conflict,
            Self::Status { code, .. } if *code >= 500 => FailureClass::Retryable,
            Self::Status { .. } => FailureClass::Fatal,
        }
    }

    /// Take the server conflict snapshot, if this is a 409 carrying one.
    pub fn into_conflict_body(self) -> Option<ConflictBody> {
        match self {
            Self::Status { code: 409, conflict, .. } => conflict,
            _ => None,
        }
    }
}
