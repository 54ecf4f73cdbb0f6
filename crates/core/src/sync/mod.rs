//! Sync ports and policies.

pub mod merge;
pub mod ports;
pub mod retry;
pub mod transport;
