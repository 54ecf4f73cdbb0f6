//! Credential providers for the HTTP transport.

use async_trait::async_trait;
use ordersync_core::AccessTokenProvider;
use ordersync_domain::Result;

/// Fixed-token provider for wiring and tests. Production deployments plug
/// in their own keychain- or session-backed implementation of
/// [`AccessTokenProvider`].
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}
