//! Vector index abstraction and the in-memory reference backend.
//!
//! Namespaces isolate vectors by embedding provider and dimensionality, so a
//! namespace never holds vectors of mixed dimensions. Record ids follow the
//! `doc_{document_id}_chunk_{chunk_index}` scheme, which makes re-processing
//! a document an idempotent overwrite.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::{AppError, Result};

/// Namespace for vectors from one provider at one dimensionality.
pub fn namespace_for(prefix: &str, provider: &str, dimensions: usize) -> String {
    format!("{}-{}-{}", prefix, provider, dimensions)
}

/// Stable id for a chunk's vector within its namespace.
pub fn record_id(document_id: i64, chunk_index: usize) -> String {
    format!("doc_{}_chunk_{}", document_id, chunk_index)
}

/// Metadata stored alongside each vector, returned verbatim on query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub document_id: i64,
    pub filename: String,
    pub file_type: String,
    pub chunk_index: usize,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

/// One vector plus identity and metadata, ready to upsert.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Optional narrowing of a query to one source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchFilter {
    All,
    Document(i64),
}

/// A scored query hit.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub namespaces: HashMap<String, usize>,
    pub total_vectors: usize,
}

/// Storage backend for embedding vectors.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Insert or overwrite records by id within a namespace.
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<usize>;

    /// Top matches by similarity, descending score. Ties on score break by
    /// ascending chunk_index so results are deterministic.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: MatchFilter,
    ) -> Result<Vec<QueryMatch>>;

    /// Remove every vector belonging to a document from a namespace.
    async fn delete_by_document(&self, namespace: &str, document_id: i64) -> Result<()>;

    async fn stats(&self) -> Result<IndexStats>;
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Process-local index, the default backend and the one tests run against.
/// Exact cosine scan per namespace; behavior matches the hosted backend.
pub struct InMemoryIndex {
    namespaces: RwLock<HashMap<String, Vec<VectorRecord>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn provider_name(&self) -> &'static str {
        "memory"
    }

    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let expected = records[0].values.len();
        if records.iter().any(|r| r.values.len() != expected) {
            return Err(AppError::Index(
                "Upsert batch mixes vector dimensions".into(),
            ));
        }

        let mut namespaces = self.namespaces.write();
        let entries = namespaces.entry(namespace.to_string()).or_default();
        if let Some(existing) = entries.first() {
            if existing.values.len() != expected {
                return Err(AppError::Index(format!(
                    "Namespace {} holds {}-dimensional vectors, got {}",
                    namespace,
                    existing.values.len(),
                    expected
                )));
            }
        }

        let count = records.len();
        for record in records {
            match entries.iter_mut().find(|r| r.id == record.id) {
                Some(slot) => *slot = record,
                None => entries.push(record),
            }
        }
        Ok(count)
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: MatchFilter,
    ) -> Result<Vec<QueryMatch>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let namespaces = self.namespaces.read();
        let Some(entries) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<QueryMatch> = entries
            .iter()
            .filter(|r| match filter {
                MatchFilter::All => true,
                MatchFilter::Document(id) => r.metadata.document_id == id,
            })
            .map(|r| QueryMatch {
                id: r.id.clone(),
                score: cosine_similarity(vector, &r.values),
                metadata: r.metadata.clone(),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.metadata.chunk_index.cmp(&b.metadata.chunk_index))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete_by_document(&self, namespace: &str, document_id: i64) -> Result<()> {
        let mut namespaces = self.namespaces.write();
        if let Some(entries) = namespaces.get_mut(namespace) {
            entries.retain(|r| r.metadata.document_id != document_id);
        }
        Ok(())
    }

    async fn stats(&self) -> Result<IndexStats> {
        let namespaces = self.namespaces.read();
        let counts: HashMap<String, usize> = namespaces
            .iter()
            .map(|(name, entries)| (name.clone(), entries.len()))
            .collect();
        let total = counts.values().sum();
        Ok(IndexStats {
            namespaces: counts,
            total_vectors: total,
        })
    }
}
