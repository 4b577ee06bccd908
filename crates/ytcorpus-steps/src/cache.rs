//! `cache_to_blob` (spec §4.6 step 7): writes the canonical archive record
//! as JSON to the Blob Store under `youtube:video:<video_id>`, skipping the
//! write if the key already exists. Grounded on `steps.py`'s
//! `cache_to_blob` ("idempotent: a cached video is never re-uploaded").

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as Json};
use ytcorpus_archive::ArchiveStore;
use ytcorpus_blob::BlobStore;
use ytcorpus_pipeline::{Context, Step};

use crate::error::StepError;

fn blob_key(video_id: &str) -> String {
    format!("youtube:video:{video_id}")
}

pub struct CacheToBlob {
    archive: Arc<ArchiveStore>,
    blob: Arc<dyn BlobStore>,
}

impl CacheToBlob {
    pub fn new(archive: Arc<ArchiveStore>, blob: Arc<dyn BlobStore>) -> Self {
        Self { archive, blob }
    }
}

#[async_trait]
impl Step for CacheToBlob {
    async fn run(&self, ctx: &mut Context) -> Result<Json, String> {
        let key = blob_key(ctx.video_id.as_str());

        if self.blob.exists(&key).await.map_err(StepError::from).map_err(String::from)? {
            return Ok(json!({"key": key, "cached": true}));
        }

        let record = self
            .archive
            .get(&ctx.video_id)
            .await
            .map_err(StepError::from)
            .map_err(String::from)?
            .ok_or_else(|| String::from(StepError::NotFound(format!("archive record for {}", ctx.video_id))))?;

        let bytes = serde_json::to_vec(&record).map_err(|e| String::from(StepError::IntegrityError(e.to_string())))?;
        self.blob.put_bytes(&key, bytes).await.map_err(StepError::from).map_err(String::from)?;

        Ok(json!({"key": key, "cached": false}))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::tempdir;
    use ytcorpus_archive::ArchiveConfig;
    use ytcorpus_blob::LocalBlobStore;
    use ytcorpus_models::{ImportMetadata, ImportMethod, SourceType, VideoId};

    use super::*;

    #[tokio::test]
    async fn writes_record_once_then_skips() {
        let archive_dir = tempdir().unwrap();
        let blob_dir = tempdir().unwrap();
        let archive = Arc::new(ArchiveStore::new(ArchiveConfig::new(archive_dir.path())));
        let blob: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(blob_dir.path()));

        let video_id = VideoId::from("abc123");
        archive
            .update_transcript(
                &video_id,
                "u",
                "hello",
                None,
                Some(ImportMetadata::new(SourceType::SingleImport, ImportMethod::Cli)),
            )
            .await
            .unwrap();

        let step = CacheToBlob::new(archive.clone(), blob.clone());
        let mut ctx = Context::new(video_id.clone(), "u", HashMap::new());

        let first = step.run(&mut ctx).await.unwrap();
        assert_eq!(first["cached"], json!(false));

        let second = step.run(&mut ctx).await.unwrap();
        assert_eq!(second["cached"], json!(true));

        assert!(blob.exists(&blob_key("abc123")).await.unwrap());
    }

    #[tokio::test]
    async fn missing_archive_record_fails() {
        let archive_dir = tempdir().unwrap();
        let blob_dir = tempdir().unwrap();
        let archive = Arc::new(ArchiveStore::new(ArchiveConfig::new(archive_dir.path())));
        let blob: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(blob_dir.path()));

        let step = CacheToBlob::new(archive, blob);
        let mut ctx = Context::new(VideoId::from("nope0000000"), "u", HashMap::new());
        let err = step.run(&mut ctx).await.unwrap_err();
        assert!(err.starts_with("NotFound"));
    }
}
