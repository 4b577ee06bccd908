//! Archive Store configuration.

use std::path::PathBuf;

use crate::error::{ArchiveError, ArchiveResult};

/// Compression applied to archive JSON bodies before the atomic write.
///
/// Only `Gzip` is supported: the original system's `bz2` option is dropped
/// here because nothing else in this workspace's dependency stack provides
/// a maintained bzip2 crate, while `flate2` (gzip) is already a dependency
/// (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
}

/// Configuration for the local-filesystem Archive Store.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Base directory for archives, e.g. `/data/archive`.
    pub base_dir: PathBuf,
    /// Whether to organize records under `youtube/YYYY-MM/<video_id>.json`
    /// (spec §4.1 Layout). When `false`, records live flat under
    /// `youtube/<video_id>.json`.
    pub organize_by_month: bool,
    /// Optional compression of the JSON body (supplemented feature, see
    /// SPEC_FULL.md §C.1).
    pub compression: Option<Compression>,
}

impl ArchiveConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            organize_by_month: true,
            compression: None,
        }
    }

    pub fn with_organize_by_month(mut self, organize: bool) -> Self {
        self.organize_by_month = organize;
        self
    }

    pub fn with_compression(mut self, compression: Option<Compression>) -> Self {
        self.compression = compression;
        self
    }

    /// Build from `ARCHIVE_ROOT` and optional `ARCHIVE_ORGANIZE_BY_MONTH` /
    /// `ARCHIVE_COMPRESSION` env vars (spec §6).
    pub fn from_env() -> ArchiveResult<Self> {
        let base_dir = std::env::var("ARCHIVE_ROOT")
            .map_err(|_| ArchiveError::InvalidConfig("ARCHIVE_ROOT is not set".to_string()))?;

        let organize_by_month = std::env::var("ARCHIVE_ORGANIZE_BY_MONTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(true);

        let compression = match std::env::var("ARCHIVE_COMPRESSION").ok().as_deref() {
            None | Some("") => None,
            Some("gzip") => Some(Compression::Gzip),
            Some(other) => {
                return Err(ArchiveError::InvalidConfig(format!(
                    "invalid ARCHIVE_COMPRESSION: {other} (expected \"gzip\" or unset)"
                )))
            }
        };

        Ok(Self {
            base_dir: PathBuf::from(base_dir),
            organize_by_month,
            compression,
        })
    }
}
