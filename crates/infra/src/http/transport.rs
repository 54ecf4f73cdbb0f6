//! reqwest-backed implementation of the remote transport port.
//!
//! The transport executes exactly one attempt per call and classifies the
//! outcome; retry scheduling belongs to the dispatcher, so an internal
//! retry loop here would multiply attempts behind the queue's back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ordersync_core::{
    AccessTokenProvider, ConflictBody, RemoteRequest, RemoteResponse, RemoteTransport,
    TransportError,
};
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, warn};

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Base URL prefixed to relative target URLs.
    pub base_url: String,
    /// Per-request timeout. The queue itself never cancels an in-flight
    /// call; this is the only timeout in play.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(30),
            user_agent: "ordersync/0.1".to_string(),
        }
    }
}

/// Remote transport over HTTP with bearer-token authentication.
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl HttpTransport {
    /// Build a transport from the given configuration and credential
    /// provider.
    pub fn new(
        config: HttpTransportConfig,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build client: {e}")))?;

        Ok(Self { client, config, tokens })
    }

    fn resolve_url(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            return target.to_string();
        }
        format!("{}{}", self.config.base_url.trim_end_matches('/'), target)
    }

    /// Best-effort token lookup: an unavailable credential degrades to an
    /// unauthenticated request rather than failing the drain.
    async fn bearer_token(&self) -> String {
        match self.tokens.access_token().await {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "access token unavailable, sending unauthenticated");
                String::new()
            }
        }
    }
}

#[async_trait]
impl RemoteTransport for HttpTransport {
    async fn execute(&self, request: &RemoteRequest) -> Result<RemoteResponse, TransportError> {
        let method = Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            // Malformed methods can only come from corrupted rows; classify
            // as fatal so the attempt limit parks them quickly.
            TransportError::Status {
                code: 400,
                message: format!("invalid HTTP method: {}", request.method),
                conflict: None,
            }
        })?;
        let url = self.resolve_url(&request.url);

        debug!(method = %method, url = %url, "executing remote request");

        let mut builder = self
            .client
            .request(method, &url)
            .header("Content-Type", "application/json")
            .body(request.payload_json.clone());

        let token = self.bearer_token().await;
        if !token.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }

        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::Timeout(self.config.timeout)
            } else {
                TransportError::Network(err.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| TransportError::Network(format!("failed to read body: {err}")))?;

        if status.is_success() {
            return Ok(RemoteResponse { status: status.as_u16(), body });
        }

        let conflict = if status == StatusCode::CONFLICT {
            parse_conflict_body(&body)
        } else {
            None
        };

        Err(TransportError::Status {
            code: status.as_u16(),
            message: truncate_message(&body),
            conflict,
        })
    }
}

/// A 409 body is expected to carry the server's snapshot. Servers that
/// return an empty or unparseable body still classify as a conflict; the
/// dispatcher falls back to the local snapshot for the missing side.
fn parse_conflict_body(body: &str) -> Option<ConflictBody> {
    match serde_json::from_str::<ConflictBody>(body) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(error = %err, "409 response body is not a conflict snapshot");
            None
        }
    }
}

fn truncate_message(body: &str) -> String {
    const MAX_LEN: usize = 256;
    if body.len() <= MAX_LEN {
        return body.to_string();
    }
    let mut truncated = body.chars().take(MAX_LEN.saturating_sub(3)).collect::<String>();
    truncated.push_str("...");
    truncated
}
