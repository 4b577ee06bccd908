//! The `BlobStore` trait: an opaque key/bytes/JSON store for large
//! artifacts (transcripts, LLM outputs, backups). Keys are hierarchical
//! strings, e.g. `youtube:video:abc123` or `backups/2024-05/index.json`.
//!
//! Implementation is swappable: a local-filesystem store for development
//! and a S3-compatible object store (e.g. Cloudflare R2) for production.
//! The core treats absence as "first write"; no locking is assumed, and
//! concurrent writers to the same key resolve to last-writer-wins.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::BlobResult;

/// Information about a stored object, returned by [`BlobStore::list`].
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write raw bytes under `key`, overwriting any prior value.
    async fn put_bytes(&self, key: &str, bytes: Vec<u8>) -> BlobResult<()>;

    /// Read raw bytes stored under `key`. `NotFound` if absent.
    async fn get_bytes(&self, key: &str) -> BlobResult<Vec<u8>>;

    /// Serialize `value` to JSON and store it under `key`.
    ///
    /// Generic, so not dispatchable through `dyn BlobStore` (`Self: Sized`)
    /// — callers needing a trait object use [`BlobStore::put_bytes`] with
    /// `serde_json::to_vec` directly.
    async fn put_json<T>(&self, key: &str, value: &T) -> BlobResult<()>
    where
        T: Serialize + Sync,
        Self: Sized,
    {
        let bytes = serde_json::to_vec(value)?;
        self.put_bytes(key, bytes).await
    }

    /// Read and deserialize the JSON value stored under `key`.
    async fn get_json<T>(&self, key: &str) -> BlobResult<T>
    where
        T: DeserializeOwned,
        Self: Sized,
    {
        let bytes = self.get_bytes(key).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// True iff `key` currently has a value.
    async fn exists(&self, key: &str) -> BlobResult<bool>;

    /// Remove `key`. Not an error if it was already absent.
    async fn delete(&self, key: &str) -> BlobResult<()>;

    /// List keys beginning with `prefix`.
    async fn list(&self, prefix: &str) -> BlobResult<Vec<ObjectInfo>>;
}
