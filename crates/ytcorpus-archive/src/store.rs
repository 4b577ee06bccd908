//! Local-filesystem Archive Store (spec §4.1, component C1).
//!
//! Records are JSON documents under `<root>/youtube/YYYY-MM/<video_id>.json`
//! (or `<root>/youtube/<video_id>.json` in flat mode). Every mutation goes
//! through the atomic write-then-fsync-then-rename protocol in
//! `write_record_at`: a writer never mutates the target file in place and a
//! crash mid-write leaves the previous record intact.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::fs;
use tracing::warn;
use ytcorpus_models::{
    outputs::{DerivedOutput, LLMOutput, ProcessingRecord},
    video::{ImportMetadata, TimedTranscriptEntry},
    VideoId, VideoRecord,
};

use crate::config::{ArchiveConfig, Compression};
use crate::error::{ArchiveError, ArchiveResult};

const EXT: &str = "json";
const GZ_EXT: &str = "json.gz";

/// Local-filesystem implementation of the Archive Store contract (C1).
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    config: ArchiveConfig,
}

impl ArchiveStore {
    pub fn new(config: ArchiveConfig) -> Self {
        Self { config }
    }

    fn youtube_dir(&self) -> PathBuf {
        self.config.base_dir.join("youtube")
    }

    fn file_ext(&self) -> &'static str {
        match self.config.compression {
            Some(Compression::Gzip) => GZ_EXT,
            None => EXT,
        }
    }

    fn month_dir(&self, fetched_at: DateTime<Utc>) -> PathBuf {
        self.youtube_dir().join(fetched_at.format("%Y-%m").to_string())
    }

    fn flat_path(&self, video_id: &VideoId) -> PathBuf {
        self.youtube_dir().join(format!("{}.{}", video_id.as_str(), self.file_ext()))
    }

    /// Find the file currently holding `video_id`'s record, if any. In
    /// month-organized mode this scans month directories (bounded by the
    /// number of months the archive has been running, not by video count),
    /// mirroring the original's `LocalArchiveReader.get()`.
    async fn locate(&self, video_id: &VideoId) -> ArchiveResult<Option<PathBuf>> {
        if !self.config.organize_by_month {
            let path = self.flat_path(video_id);
            return Ok(if fs::try_exists(&path).await? { Some(path) } else { None });
        }

        let yt_dir = self.youtube_dir();
        if !fs::try_exists(&yt_dir).await? {
            return Ok(None);
        }

        let mut entries = fs::read_dir(&yt_dir).await?;
        let mut month_dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                month_dirs.push(entry.path());
            }
        }
        month_dirs.sort();

        let filename = format!("{}.{}", video_id.as_str(), self.file_ext());
        for dir in month_dirs {
            let candidate = dir.join(&filename);
            if fs::try_exists(&candidate).await? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    async fn read_record_at(&self, path: &Path) -> ArchiveResult<VideoRecord> {
        let bytes = fs::read(path).await?;
        let bytes = match self.config.compression {
            Some(Compression::Gzip) => decompress_gzip(&bytes)?,
            None => bytes,
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Atomic write-then-fsync-then-rename of `record` to `path`'s directory.
    async fn write_record_at(&self, path: &Path, record: &VideoRecord) -> ArchiveResult<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let body = serde_json::to_vec_pretty(record)?;
        let body = match self.config.compression {
            Some(Compression::Gzip) => compress_gzip(&body)?,
            None => body,
        };

        let tmp_name = format!(
            ".{}.tmp-{}",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("archive"),
            uuid_like_suffix()
        );
        let tmp_path = path.with_file_name(tmp_name);

        {
            let mut f = std::fs::File::create(&tmp_path)?;
            f.write_all(&body)?;
            f.sync_all()?;
        }
        fs::rename(&tmp_path, path).await?;
        Ok(())
    }

    /// `exists(video_id) → bool`.
    pub async fn exists(&self, video_id: &VideoId) -> ArchiveResult<bool> {
        Ok(self.locate(video_id).await?.is_some())
    }

    /// `get(video_id) → VideoRecord?`.
    pub async fn get(&self, video_id: &VideoId) -> ArchiveResult<Option<VideoRecord>> {
        match self.locate(video_id).await? {
            Some(path) => Ok(Some(self.read_record_at(&path).await?)),
            None => Ok(None),
        }
    }

    fn path_for_new_record(&self, video_id: &VideoId, fetched_at: DateTime<Utc>) -> PathBuf {
        if self.config.organize_by_month {
            self.month_dir(fetched_at)
                .join(format!("{}.{}", video_id.as_str(), self.file_ext()))
        } else {
            self.flat_path(video_id)
        }
    }

    fn archive_path_string(&self, path: &Path) -> String {
        path.strip_prefix(&self.config.base_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    async fn load_or_create(
        &self,
        video_id: &VideoId,
        url: &str,
        import_metadata: Option<ImportMetadata>,
    ) -> ArchiveResult<(PathBuf, VideoRecord)> {
        if let Some(path) = self.locate(video_id).await? {
            let record = self.read_record_at(&path).await?;
            Ok((path, record))
        } else {
            let import_metadata = import_metadata.ok_or_else(|| {
                ArchiveError::integrity(format!(
                    "cannot create record for {video_id}: import_metadata is required on first write"
                ))
            })?;
            let mut record = VideoRecord::new(video_id.clone(), url, import_metadata);
            let path = self.path_for_new_record(video_id, record.fetched_at);
            record.archive_path = self.archive_path_string(&path);
            Ok((path, record))
        }
    }

    /// `update_transcript(video_id, url, transcript, timed_transcript?, import_metadata?)`.
    ///
    /// Creates the record if absent; merges transcript fields only. Merging
    /// is order-independent with `update_metadata` (spec §4.1 "Merging
    /// rules"): fields absent in this partial update remain unchanged.
    pub async fn update_transcript(
        &self,
        video_id: &VideoId,
        url: &str,
        transcript: impl Into<String>,
        timed_transcript: Option<Vec<TimedTranscriptEntry>>,
        import_metadata: Option<ImportMetadata>,
    ) -> ArchiveResult<VideoRecord> {
        let (path, mut record) = self.load_or_create(video_id, url, import_metadata).await?;
        record.raw_transcript = transcript.into();
        if timed_transcript.is_some() {
            record.timed_transcript = timed_transcript;
        }
        self.write_record_at(&path, &record).await?;
        Ok(record)
    }

    /// `update_metadata(video_id, url, metadata)`.
    ///
    /// Creates the record if absent; shallow-merges `youtube_metadata`.
    pub async fn update_metadata(
        &self,
        video_id: &VideoId,
        url: &str,
        metadata: HashMap<String, Value>,
        import_metadata: Option<ImportMetadata>,
    ) -> ArchiveResult<VideoRecord> {
        let (path, mut record) = self.load_or_create(video_id, url, import_metadata).await?;
        for (k, v) in metadata {
            record.youtube_metadata.insert(k, v);
        }
        self.write_record_at(&path, &record).await?;
        Ok(record)
    }

    /// `append_llm_output(video_id, LLMOutput)`. Fails with `NotFound` if
    /// the record is missing.
    pub async fn append_llm_output(&self, video_id: &VideoId, output: LLMOutput) -> ArchiveResult<VideoRecord> {
        let path = self
            .locate(video_id)
            .await?
            .ok_or_else(|| ArchiveError::not_found(video_id.to_string()))?;
        let mut record = self.read_record_at(&path).await?;
        record.llm_outputs.push(output);
        self.write_record_at(&path, &record).await?;
        Ok(record)
    }

    /// `append_derived_output(video_id, DerivedOutput)`.
    pub async fn append_derived_output(
        &self,
        video_id: &VideoId,
        output: DerivedOutput,
    ) -> ArchiveResult<VideoRecord> {
        let path = self
            .locate(video_id)
            .await?
            .ok_or_else(|| ArchiveError::not_found(video_id.to_string()))?;
        let mut record = self.read_record_at(&path).await?;
        record.derived_outputs.push(output);
        self.write_record_at(&path, &record).await?;
        Ok(record)
    }

    /// `append_processing_record(video_id, ProcessingRecord)`.
    pub async fn append_processing_record(
        &self,
        video_id: &VideoId,
        entry: ProcessingRecord,
    ) -> ArchiveResult<VideoRecord> {
        let path = self
            .locate(video_id)
            .await?
            .ok_or_else(|| ArchiveError::not_found(video_id.to_string()))?;
        let mut record = self.read_record_at(&path).await?;
        record.processing_history.push(entry);
        self.write_record_at(&path, &record).await?;
        Ok(record)
    }

    /// Sets the document-level global embedding (spec §4.6 `update_graph`).
    pub async fn set_embedding(&self, video_id: &VideoId, embedding: Vec<f32>) -> ArchiveResult<VideoRecord> {
        let path = self
            .locate(video_id)
            .await?
            .ok_or_else(|| ArchiveError::not_found(video_id.to_string()))?;
        let mut record = self.read_record_at(&path).await?;
        record.embedding = Some(embedding);
        self.write_record_at(&path, &record).await?;
        Ok(record)
    }

    /// Best-effort update of `pipeline_state[step]`, used by the Pipeline
    /// Runner (spec §4.5 step c). Does not fail the caller's step on error;
    /// the caller logs and moves on.
    pub async fn set_pipeline_state(
        &self,
        video_id: &VideoId,
        step: &str,
        version_hash: &str,
    ) -> ArchiveResult<()> {
        let path = self
            .locate(video_id)
            .await?
            .ok_or_else(|| ArchiveError::not_found(video_id.to_string()))?;
        let mut record = self.read_record_at(&path).await?;
        record.pipeline_state.insert(step.to_string(), version_hash.to_string());
        record.backfill_failures.remove(step);
        self.write_record_at(&path, &record).await?;
        Ok(())
    }

    /// Increment the soft-quarantine failure counter for `(video_id, step)`
    /// (spec §4.7, SPEC_FULL.md §C.4). Returns the new count.
    pub async fn record_backfill_failure(&self, video_id: &VideoId, step: &str) -> ArchiveResult<u32> {
        let path = self
            .locate(video_id)
            .await?
            .ok_or_else(|| ArchiveError::not_found(video_id.to_string()))?;
        let mut record = self.read_record_at(&path).await?;
        let count = record.backfill_failures.entry(step.to_string()).or_insert(0);
        *count += 1;
        let result = *count;
        self.write_record_at(&path, &record).await?;
        Ok(result)
    }

    async fn month_dirs_in_range(
        &self,
        start_month: Option<&str>,
        end_month: Option<&str>,
    ) -> ArchiveResult<Vec<PathBuf>> {
        let yt_dir = self.youtube_dir();
        if !fs::try_exists(&yt_dir).await? {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&yt_dir).await?;
        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                let name = entry.file_name().to_string_lossy().to_string();
                if start_month.is_some_and(|m| name.as_str() < m) {
                    continue;
                }
                if end_month.is_some_and(|m| name.as_str() > m) {
                    continue;
                }
                dirs.push((name, entry.path()));
            }
        }
        dirs.sort();
        Ok(dirs.into_iter().map(|(_, p)| p).collect())
    }

    /// `iter(start_month?, end_month?) → sequence<VideoRecord>`. Finite and
    /// restartable: each call produces a fresh, independent read.
    pub async fn iter(
        &self,
        start_month: Option<&str>,
        end_month: Option<&str>,
    ) -> ArchiveResult<Vec<VideoRecord>> {
        let dirs = if self.config.organize_by_month {
            self.month_dirs_in_range(start_month, end_month).await?
        } else {
            vec![self.youtube_dir()]
        };

        let mut records = Vec::new();
        for dir in dirs {
            if !fs::try_exists(&dir).await? {
                continue;
            }
            let mut entries = fs::read_dir(&dir).await?;
            let mut paths = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json")
                    || path.to_string_lossy().ends_with(".json.gz")
                {
                    paths.push(path);
                }
            }
            paths.sort();
            for path in paths {
                match self.read_record_at(&path).await {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(path = %path.display(), error = %e, "failed to load archive record, skipping"),
                }
            }
        }
        Ok(records)
    }

    /// `count()`.
    pub async fn count(&self) -> ArchiveResult<usize> {
        Ok(self.iter(None, None).await?.len())
    }

    /// `month_counts() → map<YYYY-MM,int>`.
    pub async fn month_counts(&self) -> ArchiveResult<HashMap<String, usize>> {
        let mut counts = HashMap::new();
        if !self.config.organize_by_month {
            return Ok(counts);
        }
        for dir in self.month_dirs_in_range(None, None).await? {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let mut entries = fs::read_dir(&dir).await?;
            let mut n = 0usize;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json")
                    || path.to_string_lossy().ends_with(".json.gz")
                {
                    n += 1;
                }
            }
            counts.insert(name, n);
        }
        Ok(counts)
    }

    /// `get_total_llm_cost()` — aggregate sum of `cost_usd` across every
    /// `llm_outputs` entry of every record (supplemented feature, see
    /// SPEC_FULL.md §C.2).
    pub async fn get_total_llm_cost(&self) -> ArchiveResult<f64> {
        let records = self.iter(None, None).await?;
        Ok(records
            .iter()
            .flat_map(|r| r.llm_outputs.iter())
            .filter_map(|o| o.cost_usd)
            .sum())
    }
}

fn compress_gzip(data: &[u8]) -> ArchiveResult<Vec<u8>> {
    use flate2::write::GzEncoder;
    use flate2::Compression as GzLevel;

    let mut encoder = GzEncoder::new(Vec::new(), GzLevel::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn decompress_gzip(data: &[u8]) -> ArchiveResult<Vec<u8>> {
    use flate2::read::GzDecoder;
    use std::io::Read;

    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// A short, process-unique suffix for temp files. Not a full UUID — this
/// crate has no dependency on the `uuid` crate and a timestamp + counter is
/// sufficient for temp-file collision avoidance within one process.
fn uuid_like_suffix() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{nanos:x}-{n:x}")
}
