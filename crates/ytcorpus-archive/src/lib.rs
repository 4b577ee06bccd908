//! Archive Store (spec component C1): a content-addressed, append-only,
//! month-partitioned JSON archive of `VideoRecord`s with an atomic
//! write-then-fsync-then-rename protocol.

pub mod config;
pub mod error;
mod store;

pub use config::{ArchiveConfig, Compression};
pub use error::{ArchiveError, ArchiveResult};
pub use store::ArchiveStore;

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::tempdir;
    use ytcorpus_models::video::{ImportMetadata, ImportMethod, SourceType};
    use ytcorpus_models::VideoId;

    use super::*;

    fn import_meta() -> ImportMetadata {
        ImportMetadata::new(SourceType::SingleImport, ImportMethod::Cli)
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let store = ArchiveStore::new(ArchiveConfig::new(dir.path()));
        let id = VideoId::from("abc12345678");

        assert!(!store.exists(&id).await.unwrap());

        store
            .update_transcript(&id, "https://youtu.be/abc12345678", "hello world", None, Some(import_meta()))
            .await
            .unwrap();

        assert!(store.exists(&id).await.unwrap());
        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.raw_transcript, "hello world");
        assert!(record.archive_path.starts_with("youtube/"));
    }

    #[tokio::test]
    async fn merge_is_order_independent() {
        let dir_a = tempdir().unwrap();
        let dir_b = tempdir().unwrap();
        let store_a = ArchiveStore::new(ArchiveConfig::new(dir_a.path()));
        let store_b = ArchiveStore::new(ArchiveConfig::new(dir_b.path()));
        let id = VideoId::from("xyz98765432");

        let mut metadata = HashMap::new();
        metadata.insert("title".to_string(), serde_json::json!("T"));

        // transcript then metadata
        store_a
            .update_transcript(&id, "u", "hello", None, Some(import_meta()))
            .await
            .unwrap();
        store_a.update_metadata(&id, "u", metadata.clone(), None).await.unwrap();

        // metadata then transcript
        store_b.update_metadata(&id, "u", metadata, Some(import_meta())).await.unwrap();
        store_b.update_transcript(&id, "u", "hello", None, None).await.unwrap();

        let a = store_a.get(&id).await.unwrap().unwrap();
        let b = store_b.get(&id).await.unwrap().unwrap();
        assert_eq!(a.raw_transcript, b.raw_transcript);
        assert_eq!(a.youtube_metadata, b.youtube_metadata);
    }

    #[tokio::test]
    async fn append_without_prior_record_is_not_found() {
        let dir = tempdir().unwrap();
        let store = ArchiveStore::new(ArchiveConfig::new(dir.path()));
        let id = VideoId::from("missing0000");

        let err = store
            .append_llm_output(&id, ytcorpus_models::LLMOutput::new("tags", serde_json::json!([]), "gpt"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn appends_preserve_order() {
        let dir = tempdir().unwrap();
        let store = ArchiveStore::new(ArchiveConfig::new(dir.path()));
        let id = VideoId::from("ordertest01");

        store
            .update_transcript(&id, "u", "t", None, Some(import_meta()))
            .await
            .unwrap();

        for i in 0..3 {
            store
                .append_processing_record(&id, ytcorpus_models::ProcessingRecord::new(format!("v{i}")))
                .await
                .unwrap();
        }

        let record = store.get(&id).await.unwrap().unwrap();
        let versions: Vec<_> = record.processing_history.iter().map(|p| p.version.as_str()).collect();
        assert_eq!(versions, vec!["v0", "v1", "v2"]);
    }

    #[tokio::test]
    async fn flat_mode_skips_month_partitioning() {
        let dir = tempdir().unwrap();
        let config = ArchiveConfig::new(dir.path()).with_organize_by_month(false);
        let store = ArchiveStore::new(config);
        let id = VideoId::from("flatmode001");

        store
            .update_transcript(&id, "u", "t", None, Some(import_meta()))
            .await
            .unwrap();

        let path = dir.path().join("youtube").join("flatmode001.json");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn count_and_month_counts() {
        let dir = tempdir().unwrap();
        let store = ArchiveStore::new(ArchiveConfig::new(dir.path()));

        for i in 0..3 {
            let id = VideoId::from(format!("vid{i:08}"));
            store
                .update_transcript(&id, "u", "t", None, Some(import_meta()))
                .await
                .unwrap();
        }

        assert_eq!(store.count().await.unwrap(), 3);
        let counts = store.month_counts().await.unwrap();
        assert_eq!(counts.values().sum::<usize>(), 3);
    }

    #[tokio::test]
    async fn gzip_compression_round_trips() {
        let dir = tempdir().unwrap();
        let config = ArchiveConfig::new(dir.path()).with_compression(Some(Compression::Gzip));
        let store = ArchiveStore::new(config);
        let id = VideoId::from("gzipcase001");

        store
            .update_transcript(&id, "u", "compressed hello", None, Some(import_meta()))
            .await
            .unwrap();

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.raw_transcript, "compressed hello");
    }
}
