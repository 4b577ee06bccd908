//! Index Store Adapter (spec component C3): record + vector + relationship
//! store backed by the Firestore REST API, plus Backup/Restore (C10) which
//! snapshots Index Store tables to the Blob Store.
//!
//! ## Modules
//! - `client` - Firestore REST API client (auth, CRUD, batch write, retry)
//! - `retry` - Retry policy with exponential backoff and full jitter
//! - `store` - The `IndexStore` trait and its Firestore-backed implementation
//! - `backup` - Point-in-time backup/restore of Index Store tables
//! - `types` - Firestore document types and value conversions

pub mod backup;
pub mod client;
pub mod error;
pub mod retry;
pub mod store;
pub mod types;

pub use backup::{BackupJob, BackupService, BackupStatus, BACKUP_TABLES};
pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use retry::RetryConfig;
pub use store::{FirestoreIndexStore, IndexRecord, IndexStore, ScoredRecord};
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};

