//! CSV row parsing and provenance inference (spec §4.8).
//!
//! Grounded on `original_source/compose/worker/queue_processor.py`'s
//! `process_csv`: a row carries at least `url`, optionally `video_id`,
//! `title`, `channel_id`, `channel_title`; the file's `source_type` is
//! inferred once from the set of distinct `channel_id`s across all rows.

use std::collections::HashSet;

use serde::Deserialize;
use ytcorpus_models::{extract_youtube_id, SourceType};

use crate::error::{QueueError, QueueResult};

#[derive(Debug, Clone, Deserialize)]
pub struct QueueRow {
    pub url: String,
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub channel_title: Option<String>,
}

impl QueueRow {
    /// The row's `video_id`, falling back to extracting it from `url`.
    pub fn resolved_video_id(&self) -> QueueResult<String> {
        if let Some(id) = &self.video_id {
            if !id.trim().is_empty() {
                return Ok(id.trim().to_string());
            }
        }
        extract_youtube_id(&self.url).map_err(|e| QueueError::InvalidUrl(self.url.clone(), e.to_string()))
    }
}

/// Parse `csv_bytes` into rows, skipping rows with an empty `url` (matching
/// `process_csv`'s `if not url: continue`).
pub fn parse_rows(csv_bytes: &[u8]) -> QueueResult<Vec<QueueRow>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(csv_bytes);
    let mut rows = Vec::new();
    for result in reader.deserialize::<QueueRow>() {
        let row: QueueRow = result?;
        if row.url.trim().is_empty() {
            continue;
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Infer `source_type` for a whole file from the distinct, non-empty
/// `channel_id`s across its rows: zero or one distinct id means every
/// video came from (at most) a single channel; two or more means the
/// file mixes channels (spec §4.8).
pub fn infer_source_type(rows: &[QueueRow]) -> SourceType {
    let distinct: HashSet<&str> =
        rows.iter().filter_map(|r| r.channel_id.as_deref()).map(str::trim).filter(|s| !s.is_empty()).collect();
    if distinct.len() >= 2 {
        SourceType::BulkMultiChannel
    } else {
        SourceType::BulkChannel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_and_skips_blank_urls() {
        let csv = "url,video_id,title,channel_id,channel_title\n\
                    https://youtu.be/abc12345678,abc12345678,T1,C1,Chan1\n\
                    ,,,,\n\
                    https://youtu.be/def98765432,,T2,C1,Chan1\n";
        let rows = parse_rows(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].resolved_video_id().unwrap(), "def98765432");
    }

    #[test]
    fn infers_bulk_channel_for_single_distinct_channel() {
        let rows = vec![
            QueueRow { url: "u1".to_string(), video_id: None, title: None, channel_id: Some("C1".to_string()), channel_title: None },
            QueueRow { url: "u2".to_string(), video_id: None, title: None, channel_id: Some("C1".to_string()), channel_title: None },
        ];
        assert_eq!(infer_source_type(&rows), SourceType::BulkChannel);
    }

    #[test]
    fn infers_bulk_channel_when_no_channel_id_present() {
        let rows = vec![QueueRow { url: "u1".to_string(), video_id: None, title: None, channel_id: None, channel_title: None }];
        assert_eq!(infer_source_type(&rows), SourceType::BulkChannel);
    }

    #[test]
    fn infers_bulk_multi_channel_for_two_or_more_distinct_channels() {
        let rows = vec![
            QueueRow { url: "u1".to_string(), video_id: None, title: None, channel_id: Some("C1".to_string()), channel_title: None },
            QueueRow { url: "u2".to_string(), video_id: None, title: None, channel_id: Some("C2".to_string()), channel_title: None },
        ];
        assert_eq!(infer_source_type(&rows), SourceType::BulkMultiChannel);
    }
}
