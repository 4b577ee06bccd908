//! Local-filesystem `BlobStore` implementation, used in development and
//! in tests. Keys map to paths by replacing `/` and `:` with the platform
//! separator beneath a configured root directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{BlobError, BlobResult};
use crate::store::{BlobStore, ObjectInfo};

#[derive(Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> BlobResult<PathBuf> {
        if key.is_empty() || key.contains("..") {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        let relative: PathBuf = key.split(|c| c == '/' || c == ':').collect();
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put_bytes(&self, key: &str, bytes: Vec<u8>) -> BlobResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!(%key, bytes = bytes.len(), "writing blob");
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn get_bytes(&self, key: &str) -> BlobResult<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BlobError::not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> BlobResult<bool> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> BlobResult<Vec<ObjectInfo>> {
        let mut results = Vec::new();
        walk(&self.root, &self.root, prefix, &mut results).await?;
        Ok(results)
    }
}

fn walk<'a>(
    root: &'a Path,
    dir: &'a Path,
    prefix: &'a str,
    out: &'a mut Vec<ObjectInfo>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = BlobResult<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                walk(root, &path, prefix, out).await?;
                continue;
            }
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, "/");
            if relative.starts_with(prefix) {
                let size = entry.metadata().await?.len();
                out.push(ObjectInfo { key: relative, size });
            }
        }
        Ok(())
    })
}
