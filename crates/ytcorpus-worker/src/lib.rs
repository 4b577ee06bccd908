//! Ingestion worker binary support.
//!
//! Wires the Queue Processor and a periodic Backfill scheduler as two
//! tokio tasks behind one shutdown channel, over the adapter crates
//! (archive, blob, index, embeddings) and the Step Library.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{BlobBackend, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use logging::init_tracing;
