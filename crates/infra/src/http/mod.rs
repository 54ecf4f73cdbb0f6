//! HTTP adapter: remote transport and credential providers.

mod auth;
mod transport;

pub use auth::StaticTokenProvider;
pub use transport::{HttpTransport, HttpTransportConfig};
