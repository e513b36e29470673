//! # certflow-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the storage port traits defined in `certflow-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//! - Provide the per-candidate transaction used by batch discovery
//!
//! ## Dependency rule
//! Depends on `certflow-app` (for port traits) and `certflow-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod row;

pub mod certificate_repo;
pub mod discovery_repo;
pub mod error;
pub mod history_repo;
pub mod item_store;
pub mod key_repo;
pub mod pool;
pub mod trigger_repo;

pub use certificate_repo::SqliteCertificateRepository;
pub use discovery_repo::SqliteDiscoveryRepository;
pub use error::StorageError;
pub use history_repo::SqliteTriggerHistoryRepository;
pub use item_store::{SqliteItemStore, SqliteItemTransaction};
pub use key_repo::SqliteKeyRepository;
pub use pool::{Config, Database};
pub use trigger_repo::SqliteTriggerRepository;
