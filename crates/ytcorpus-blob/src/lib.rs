//! Blob Store adapter (spec component C2): an opaque key/bytes/JSON
//! store for large artifacts (transcripts, LLM outputs, backups), with
//! a local-filesystem implementation for development and an
//! S3-compatible implementation for production.

pub mod error;
pub mod local;
pub mod s3;
pub mod store;

pub use error::{BlobError, BlobResult};
pub use local::LocalBlobStore;
pub use s3::{S3BlobStore, S3Config};
pub use store::{BlobStore, ObjectInfo};
