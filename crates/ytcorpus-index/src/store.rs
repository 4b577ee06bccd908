//! The `IndexStore` trait (spec component C3): the boundary between the
//! core and the underlying record/vector/relationship database. The core
//! never issues raw query strings and never relies on nested
//! transactions across records.
//!
//! [`FirestoreIndexStore`] backs this trait with the Firestore REST API
//! client in [`crate::client`]. Firestore has no native vector index
//! reachable from the REST surface this client uses, so `vector_search`
//! fetches candidate records and ranks them by cosine similarity in
//! process; fine at this corpus's scale, and isolated behind the trait
//! so a dedicated vector engine can replace it without touching callers.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value as Json;
use tracing::debug;

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{firestore_value_to_json, json_to_firestore_value};

/// A record returned from the Index Store: an opaque id plus untyped
/// fields.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub id: String,
    pub fields: HashMap<String, Json>,
}

/// A record returned from [`IndexStore::vector_search`], ranked by
/// descending cosine similarity.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub id: String,
    pub score: f32,
    pub fields: HashMap<String, Json>,
}

#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Insert or fully replace the record `id` in `table`.
    async fn upsert(&self, table: &str, id: &str, fields: HashMap<String, Json>) -> FirestoreResult<()>;

    /// Fetch a record by id. `None` if absent.
    async fn get(&self, table: &str, id: &str) -> FirestoreResult<Option<IndexRecord>>;

    /// Remove a record. Idempotent: deleting an absent id is not an error.
    async fn delete(&self, table: &str, id: &str) -> FirestoreResult<()>;

    /// Records in `table` whose fields match every entry in `filter`
    /// (equality only).
    async fn query(&self, table: &str, filter: &HashMap<String, Json>) -> FirestoreResult<Vec<IndexRecord>>;

    /// Create a directed, named edge `src --relation--> dst`.
    async fn link(
        &self,
        src: &str,
        relation: &str,
        dst: &str,
        attrs: Option<HashMap<String, Json>>,
    ) -> FirestoreResult<()>;

    /// Remove the edge `src --relation--> dst`, if present.
    async fn unlink(&self, src: &str, relation: &str, dst: &str) -> FirestoreResult<()>;

    /// Cosine-similar k-NN over `field` (a stored vector) within `table`,
    /// optionally narrowed by an equality `filter`. Descending by score.
    async fn vector_search(
        &self,
        table: &str,
        field: &str,
        query_vector: &[f32],
        k: usize,
        filter: Option<&HashMap<String, Json>>,
    ) -> FirestoreResult<Vec<ScoredRecord>>;

    /// Idempotent schema initialization. A no-op for a schemaless
    /// document database, but still part of the contract so a future
    /// engine with real schemas (indexes, vector dimensions) has a
    /// place to hook in.
    async fn init_schema(&self) -> FirestoreResult<()>;
}

/// The relationship-edge collection name. Edge documents are keyed by
/// `"{relation}:{src}:{dst}"` so `link` is naturally idempotent (upsert)
/// and `unlink` is a direct delete by id.
const RELATIONSHIPS_TABLE: &str = "relationships";

fn edge_id(relation: &str, src: &str, dst: &str) -> String {
    format!("{relation}:{src}:{dst}")
}

pub struct FirestoreIndexStore {
    client: FirestoreClient,
}

impl FirestoreIndexStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    fn document_to_record(id: String, doc: &crate::types::Document) -> IndexRecord {
        let fields = doc
            .fields
            .as_ref()
            .map(|fs| {
                fs.iter()
                    .map(|(k, v)| (k.clone(), firestore_value_to_json(v)))
                    .collect()
            })
            .unwrap_or_default();
        IndexRecord { id, fields }
    }
}

#[async_trait]
impl IndexStore for FirestoreIndexStore {
    async fn upsert(&self, table: &str, id: &str, fields: HashMap<String, Json>) -> FirestoreResult<()> {
        let firestore_fields = fields
            .iter()
            .map(|(k, v)| (k.clone(), json_to_firestore_value(v)))
            .collect::<HashMap<_, _>>();

        match self.client.create_document(table, id, firestore_fields.clone()).await {
            Ok(_) => Ok(()),
            Err(FirestoreError::AlreadyExists(_)) => {
                let mask: Vec<String> = firestore_fields.keys().cloned().collect();
                self.client.update_document(table, id, firestore_fields, Some(mask)).await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn get(&self, table: &str, id: &str) -> FirestoreResult<Option<IndexRecord>> {
        let doc = self.client.get_document(table, id).await?;
        Ok(doc.map(|d| Self::document_to_record(id.to_string(), &d)))
    }

    async fn delete(&self, table: &str, id: &str) -> FirestoreResult<()> {
        self.client.delete_document(table, id).await
    }

    async fn query(&self, table: &str, filter: &HashMap<String, Json>) -> FirestoreResult<Vec<IndexRecord>> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let response = self.client.list_documents(table, Some(500), page_token.as_deref()).await?;
            let documents = response.documents.unwrap_or_default();
            let exhausted = documents.is_empty();

            for doc in documents {
                let id = doc
                    .name
                    .as_deref()
                    .and_then(|n| n.rsplit('/').next())
                    .unwrap_or_default()
                    .to_string();
                let record = Self::document_to_record(id, &doc);
                if filter.iter().all(|(k, v)| record.fields.get(k) == Some(v)) {
                    out.push(record);
                }
            }

            page_token = response.next_page_token;
            if exhausted || page_token.is_none() {
                break;
            }
        }

        Ok(out)
    }

    async fn link(
        &self,
        src: &str,
        relation: &str,
        dst: &str,
        attrs: Option<HashMap<String, Json>>,
    ) -> FirestoreResult<()> {
        let mut fields = attrs.unwrap_or_default();
        fields.insert("src".to_string(), Json::String(src.to_string()));
        fields.insert("relation".to_string(), Json::String(relation.to_string()));
        fields.insert("dst".to_string(), Json::String(dst.to_string()));
        self.upsert(RELATIONSHIPS_TABLE, &edge_id(relation, src, dst), fields).await
    }

    async fn unlink(&self, src: &str, relation: &str, dst: &str) -> FirestoreResult<()> {
        self.delete(RELATIONSHIPS_TABLE, &edge_id(relation, src, dst)).await
    }

    async fn vector_search(
        &self,
        table: &str,
        field: &str,
        query_vector: &[f32],
        k: usize,
        filter: Option<&HashMap<String, Json>>,
    ) -> FirestoreResult<Vec<ScoredRecord>> {
        let empty = HashMap::new();
        let candidates = self.query(table, filter.unwrap_or(&empty)).await?;
        debug!(table, field, candidates = candidates.len(), "scoring vector_search candidates");

        let mut scored: Vec<ScoredRecord> = candidates
            .into_iter()
            .filter_map(|record| {
                let vector = record.fields.get(field)?;
                let vector = json_to_vector(vector)?;
                let score = cosine_similarity(query_vector, &vector);
                Some(ScoredRecord {
                    id: record.id,
                    score,
                    fields: record.fields,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn init_schema(&self) -> FirestoreResult<()> {
        Ok(())
    }
}

fn json_to_vector(value: &Json) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors_is_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn edge_id_is_stable() {
        assert_eq!(edge_id("video_channel", "v1", "c1"), "video_channel:v1:c1");
    }
}
