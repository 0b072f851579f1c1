//! SQLite-backed persistence for topologies and usage statistics, built on
//! `tokio-rusqlite` so every query runs on the connection's dedicated
//! background thread instead of blocking an async worker.

pub mod error;
pub mod topology_store;
pub mod usage_store;

pub use error::StorageError;
pub use topology_store::SqliteTopologyStore;
pub use usage_store::SqliteUsageStore;
