//! Backup/Restore (spec component C10): point-in-time snapshot of Index
//! Store tables to the Blob Store and restore from a completed snapshot.
//!
//! Grounded on `original_source/compose/services/backup.py`: a backup job
//! record with states `pending -> in_progress -> (completed|failed)`,
//! serializing each table to a blob under `backups/<timestamp>/<table>.json`
//! plus a `manifest.json` summary (spec §4.9).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{error, info, warn};
use uuid::Uuid;
use ytcorpus_blob::BlobStore;

use crate::error::{FirestoreError, FirestoreResult};
use crate::store::IndexStore;

/// Tables snapshotted by `start_backup`/`restore_backup` (spec §6).
pub const BACKUP_TABLES: &[&str] = &["video", "channel", "topic", "video_chunk"];

const BACKUP_JOB_TABLE: &str = "backup";

/// Lifecycle state of a backup job (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl BackupStatus {
    fn as_str(self) -> &'static str {
        match self {
            BackupStatus::Pending => "pending",
            BackupStatus::InProgress => "in_progress",
            BackupStatus::Completed => "completed",
            BackupStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "in_progress" => BackupStatus::InProgress,
            "completed" => BackupStatus::Completed,
            "failed" => BackupStatus::Failed,
            _ => BackupStatus::Pending,
        }
    }
}

/// A backup job record (spec §4.9).
#[derive(Debug, Clone)]
pub struct BackupJob {
    pub id: String,
    pub status: BackupStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub tables: Vec<String>,
    pub blob_prefix: String,
    pub total_size_bytes: u64,
    pub error: Option<String>,
}

impl BackupJob {
    fn to_fields(&self) -> HashMap<String, Json> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), Json::String(self.status.as_str().to_string()));
        fields.insert("started_at".to_string(), Json::String(self.started_at.to_rfc3339()));
        if let Some(completed_at) = self.completed_at {
            fields.insert("completed_at".to_string(), Json::String(completed_at.to_rfc3339()));
        }
        fields.insert(
            "tables".to_string(),
            Json::Array(self.tables.iter().cloned().map(Json::String).collect()),
        );
        fields.insert("blob_prefix".to_string(), Json::String(self.blob_prefix.clone()));
        fields.insert("total_size_bytes".to_string(), Json::Number(self.total_size_bytes.into()));
        if let Some(err) = &self.error {
            fields.insert("error".to_string(), Json::String(err.clone()));
        }
        fields
    }

    fn from_record(id: String, fields: &HashMap<String, Json>) -> Self {
        Self {
            id,
            status: fields
                .get("status")
                .and_then(|v| v.as_str())
                .map(BackupStatus::parse)
                .unwrap_or(BackupStatus::Pending),
            started_at: fields
                .get("started_at")
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(Utc::now),
            completed_at: fields
                .get("completed_at")
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc)),
            tables: fields
                .get("tables")
                .and_then(|v| v.as_array())
                .map(|a| a.iter().filter_map(|t| t.as_str().map(String::from)).collect())
                .unwrap_or_default(),
            blob_prefix: fields
                .get("blob_prefix")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            total_size_bytes: fields.get("total_size_bytes").and_then(|v| v.as_u64()).unwrap_or(0),
            error: fields.get("error").and_then(|v| v.as_str()).map(String::from),
        }
    }
}

/// A table snapshot: every record's id paired with its fields, the shape
/// written to `backups/<ts>/<table>.json`.
#[derive(Debug, Serialize, Deserialize)]
struct TableSnapshot {
    table: String,
    records: Vec<SnapshotRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    id: String,
    fields: HashMap<String, Json>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    backup_id: String,
    timestamp: String,
    tables: Vec<String>,
    total_size_bytes: u64,
}

/// Service wrapping an [`IndexStore`] and [`BlobStore`] to snapshot and
/// restore `BACKUP_TABLES`.
pub struct BackupService {
    index: Arc<dyn IndexStore>,
    blob: Arc<dyn BlobStore>,
}

impl BackupService {
    pub fn new(index: Arc<dyn IndexStore>, blob: Arc<dyn BlobStore>) -> Self {
        Self { index, blob }
    }

    /// Create a backup job record in `pending` status and run it to
    /// completion. The spec's `start_backup()` returns immediately with a
    /// `pending` job in the original (background task); this adapter runs
    /// synchronously to completion and returns the final `BackupJob` since
    /// the core has no task-spawning contract of its own — callers that
    /// want async dispatch wrap this in `tokio::spawn` themselves.
    pub async fn start_backup(&self) -> FirestoreResult<BackupJob> {
        let id = Uuid::new_v4().to_string();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let blob_prefix = format!("backups/{timestamp}");

        let mut job = BackupJob {
            id: id.clone(),
            status: BackupStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            tables: BACKUP_TABLES.iter().map(|t| t.to_string()).collect(),
            blob_prefix,
            total_size_bytes: 0,
            error: None,
        };
        self.save(&job).await?;

        job.status = BackupStatus::InProgress;
        self.save(&job).await?;

        match self.run_backup(&job).await {
            Ok(total_size_bytes) => {
                job.status = BackupStatus::Completed;
                job.completed_at = Some(Utc::now());
                job.total_size_bytes = total_size_bytes;
                info!(backup_id = %job.id, total_size_bytes, "backup completed");
            }
            Err(e) => {
                job.status = BackupStatus::Failed;
                job.completed_at = Some(Utc::now());
                job.error = Some(e.to_string());
                error!(backup_id = %job.id, error = %e, "backup failed");
            }
        }
        self.save(&job).await?;
        Ok(job)
    }

    async fn run_backup(&self, job: &BackupJob) -> FirestoreResult<u64> {
        let mut total_size_bytes = 0u64;

        for table in &job.tables {
            let records = self.index.query(table, &HashMap::new()).await?;
            let snapshot = TableSnapshot {
                table: table.clone(),
                records: records
                    .into_iter()
                    .map(|r| SnapshotRecord { id: r.id, fields: r.fields })
                    .collect(),
            };
            let body = serde_json::to_vec(&snapshot)?;
            total_size_bytes += body.len() as u64;
            let key = format!("{}/{}.json", job.blob_prefix, table);
            self.blob
                .put_bytes(&key, body)
                .await
                .map_err(|e| FirestoreError::BackupError(format!("writing {key}: {e}")))?;
        }

        let manifest = Manifest {
            backup_id: job.id.clone(),
            timestamp: job
                .blob_prefix
                .strip_prefix("backups/")
                .unwrap_or(&job.blob_prefix)
                .to_string(),
            tables: job.tables.clone(),
            total_size_bytes,
        };
        let manifest_key = format!("{}/manifest.json", job.blob_prefix);
        let manifest_body = serde_json::to_vec(&manifest)?;
        total_size_bytes += manifest_body.len() as u64;
        self.blob
            .put_bytes(&manifest_key, manifest_body)
            .await
            .map_err(|e| FirestoreError::BackupError(format!("writing {manifest_key}: {e}")))?;

        Ok(total_size_bytes)
    }

    /// Restore a completed backup: deletes current rows of the backed-up
    /// tables and re-creates records preserving original ids. Only allowed
    /// when the job's stored status is `completed` (spec §4.9).
    pub async fn restore_backup(&self, backup_id: &str) -> FirestoreResult<BackupJob> {
        let job = self.get(backup_id).await?.ok_or_else(|| {
            FirestoreError::NotFound(format!("backup job {backup_id}"))
        })?;

        if job.status != BackupStatus::Completed {
            return Err(FirestoreError::BackupError(format!(
                "backup {backup_id} is {:?}, not completed; refusing to restore",
                job.status
            )));
        }

        for table in &job.tables {
            let key = format!("{}/{}.json", job.blob_prefix, table);
            let bytes = self
                .blob
                .get_bytes(&key)
                .await
                .map_err(|e| FirestoreError::BackupError(format!("reading {key}: {e}")))?;
            let snapshot: TableSnapshot = serde_json::from_slice(&bytes)?;

            let existing = self.index.query(table, &HashMap::new()).await?;
            for record in existing {
                if let Err(e) = self.index.delete(table, &record.id).await {
                    warn!(table, id = %record.id, error = %e, "failed to clear existing row before restore");
                }
            }

            for record in snapshot.records {
                self.index.upsert(table, &record.id, record.fields).await?;
            }
        }

        Ok(job)
    }

    /// List all backup job records, most recent first.
    pub async fn list_backups(&self) -> FirestoreResult<Vec<BackupJob>> {
        let records = self.index.query(BACKUP_JOB_TABLE, &HashMap::new()).await?;
        let mut jobs: Vec<BackupJob> = records
            .into_iter()
            .map(|r| BackupJob::from_record(r.id, &r.fields))
            .collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(jobs)
    }

    async fn get(&self, backup_id: &str) -> FirestoreResult<Option<BackupJob>> {
        let record = self.index.get(BACKUP_JOB_TABLE, backup_id).await?;
        Ok(record.map(|r| BackupJob::from_record(r.id, &r.fields)))
    }

    async fn save(&self, job: &BackupJob) -> FirestoreResult<()> {
        self.index.upsert(BACKUP_JOB_TABLE, &job.id, job.to_fields()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use ytcorpus_blob::{BlobResult, ObjectInfo};

    use crate::store::{IndexRecord, ScoredRecord};

    #[derive(Default)]
    struct MemIndex {
        tables: Mutex<HashMap<String, HashMap<String, HashMap<String, Json>>>>,
    }

    #[async_trait]
    impl IndexStore for MemIndex {
        async fn upsert(&self, table: &str, id: &str, fields: HashMap<String, Json>) -> FirestoreResult<()> {
            self.tables
                .lock()
                .unwrap()
                .entry(table.to_string())
                .or_default()
                .insert(id.to_string(), fields);
            Ok(())
        }

        async fn get(&self, table: &str, id: &str) -> FirestoreResult<Option<IndexRecord>> {
            Ok(self
                .tables
                .lock()
                .unwrap()
                .get(table)
                .and_then(|t| t.get(id))
                .map(|fields| IndexRecord { id: id.to_string(), fields: fields.clone() }))
        }

        async fn delete(&self, table: &str, id: &str) -> FirestoreResult<()> {
            if let Some(t) = self.tables.lock().unwrap().get_mut(table) {
                t.remove(id);
            }
            Ok(())
        }

        async fn query(&self, table: &str, _filter: &HashMap<String, Json>) -> FirestoreResult<Vec<IndexRecord>> {
            Ok(self
                .tables
                .lock()
                .unwrap()
                .get(table)
                .map(|t| {
                    t.iter()
                        .map(|(id, fields)| IndexRecord { id: id.clone(), fields: fields.clone() })
                        .collect()
                })
                .unwrap_or_default())
        }

        async fn link(&self, _src: &str, _relation: &str, _dst: &str, _attrs: Option<HashMap<String, Json>>) -> FirestoreResult<()> {
            Ok(())
        }

        async fn unlink(&self, _src: &str, _relation: &str, _dst: &str) -> FirestoreResult<()> {
            Ok(())
        }

        async fn vector_search(
            &self,
            _table: &str,
            _field: &str,
            _query_vector: &[f32],
            _k: usize,
            _filter: Option<&HashMap<String, Json>>,
        ) -> FirestoreResult<Vec<ScoredRecord>> {
            Ok(vec![])
        }

        async fn init_schema(&self) -> FirestoreResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemBlob {
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl BlobStore for MemBlob {
        async fn put_bytes(&self, key: &str, bytes: Vec<u8>) -> BlobResult<()> {
            self.objects.lock().unwrap().insert(key.to_string(), bytes);
            Ok(())
        }

        async fn get_bytes(&self, key: &str) -> BlobResult<Vec<u8>> {
            self.objects
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| ytcorpus_blob::BlobError::not_found(key))
        }

        async fn exists(&self, key: &str) -> BlobResult<bool> {
            Ok(self.objects.lock().unwrap().contains_key(key))
        }

        async fn delete(&self, key: &str) -> BlobResult<()> {
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }

        async fn list(&self, prefix: &str) -> BlobResult<Vec<ObjectInfo>> {
            Ok(self
                .objects
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| ObjectInfo { key: k.clone(), size: v.len() as u64 })
                .collect())
        }
    }

    #[tokio::test]
    async fn backup_then_restore_round_trips() {
        let index = Arc::new(MemIndex::default());
        let blob = Arc::new(MemBlob::default());
        let mut fields = HashMap::new();
        fields.insert("title".to_string(), Json::String("T".to_string()));
        index.upsert("video", "abc123", fields.clone()).await.unwrap();

        let service = BackupService::new(index.clone(), blob.clone());
        let job = service.start_backup().await.unwrap();
        assert_eq!(job.status, BackupStatus::Completed);
        assert!(blob.exists(&format!("{}/manifest.json", job.blob_prefix)).await.unwrap());

        index.delete("video", "abc123").await.unwrap();
        assert!(index.get("video", "abc123").await.unwrap().is_none());

        service.restore_backup(&job.id).await.unwrap();
        let restored = index.get("video", "abc123").await.unwrap().unwrap();
        assert_eq!(restored.fields, fields);
    }

    #[tokio::test]
    async fn restore_refuses_non_completed_job() {
        let index = Arc::new(MemIndex::default());
        let blob = Arc::new(MemBlob::default());
        let service = BackupService::new(index.clone(), blob.clone());

        let pending = BackupJob {
            id: "job1".to_string(),
            status: BackupStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            tables: vec!["video".to_string()],
            blob_prefix: "backups/x".to_string(),
            total_size_bytes: 0,
            error: None,
        };
        service.save(&pending).await.unwrap();
        let err = service.restore_backup("job1").await.unwrap_err();
        assert!(err.to_string().contains("not completed"));
    }
}
