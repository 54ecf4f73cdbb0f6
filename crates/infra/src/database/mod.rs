//! Durable store: connection management and the two sync repositories.

mod conflict_repository;
mod manager;
mod queue_repository;

pub use conflict_repository::SqliteConflictInbox;
pub use manager::DbManager;
pub use queue_repository::SqliteOperationQueue;
