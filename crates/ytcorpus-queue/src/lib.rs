//! Queue Processor (spec component C9): a filesystem CSV directory watcher
//! over `pending/`, `processing/`, `completed/`. Each poll claims one or
//! more pending CSV files by atomic rename, runs the Pipeline Runner over
//! every row, then files the CSV under `completed/`.

pub mod error;
pub mod processor;
pub mod row;

pub use error::{QueueError, QueueResult};
pub use processor::{channel_context_for, QueueConfig, QueueProcessor};
pub use row::{infer_source_type, parse_rows, QueueRow};
