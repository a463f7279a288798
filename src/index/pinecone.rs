//! Pinecone-hosted vector index backend.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::types::{AppError, Result};

use super::vectorstore::{
    ChunkMetadata, IndexStats, MatchFilter, QueryMatch, VectorIndex, VectorRecord,
};

/// Thin client over the Pinecone data-plane HTTP API.
pub struct PineconeIndex {
    client: reqwest::Client,
    api_key: String,
    index_host: String,
}

#[derive(Deserialize)]
struct PineconeQueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Deserialize)]
struct PineconeMatch {
    id: String,
    score: f32,
    metadata: PineconeMetadata,
}

#[derive(Deserialize)]
struct PineconeMetadata {
    document_id: f64,
    filename: String,
    file_type: String,
    chunk_index: f64,
    text: String,
    #[serde(default)]
    owner_id: Option<String>,
}

#[derive(Deserialize)]
struct PineconeStatsResponse {
    #[serde(default)]
    namespaces: HashMap<String, PineconeNamespaceStats>,
    #[serde(rename = "totalVectorCount", default)]
    total_vector_count: usize,
}

#[derive(Deserialize)]
struct PineconeNamespaceStats {
    #[serde(rename = "vectorCount", default)]
    vector_count: usize,
}

impl PineconeIndex {
    pub fn new(api_key: String, index_host: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            index_host: index_host.trim_end_matches('/').to_string(),
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.index_host, path);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Index(format!("Pinecone request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Index(format!(
                "Pinecone {} returned {}",
                path,
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn provider_name(&self) -> &'static str {
        "pinecone"
    }

    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let count = records.len();
        // Pinecone metadata values are scalars, so numbers go in as numbers
        // and come back as f64.
        let vectors: Vec<serde_json::Value> = records
            .into_iter()
            .map(|r| {
                let mut metadata = json!({
                    "document_id": r.metadata.document_id,
                    "filename": r.metadata.filename,
                    "file_type": r.metadata.file_type,
                    "chunk_index": r.metadata.chunk_index,
                    "text": r.metadata.text,
                });
                if let Some(owner_id) = &r.metadata.owner_id {
                    metadata["owner_id"] = json!(owner_id);
                }
                json!({
                    "id": r.id,
                    "values": r.values,
                    "metadata": metadata,
                })
            })
            .collect();

        self.post(
            "/vectors/upsert",
            json!({ "vectors": vectors, "namespace": namespace }),
        )
        .await?;
        Ok(count)
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: MatchFilter,
    ) -> Result<Vec<QueryMatch>> {
        let mut body = json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "namespace": namespace,
        });
        if let MatchFilter::Document(id) = filter {
            body["filter"] = json!({ "document_id": { "$eq": id } });
        }

        let response = self.post("/query", body).await?;
        let parsed: PineconeQueryResponse = response
            .json()
            .await
            .map_err(|e| AppError::Index(format!("Pinecone query response malformed: {}", e)))?;

        let mut matches: Vec<QueryMatch> = parsed
            .matches
            .into_iter()
            .map(|m| QueryMatch {
                id: m.id,
                score: m.score,
                metadata: ChunkMetadata {
                    document_id: m.metadata.document_id as i64,
                    filename: m.metadata.filename,
                    file_type: m.metadata.file_type,
                    chunk_index: m.metadata.chunk_index as usize,
                    text: m.metadata.text,
                    owner_id: m.metadata.owner_id,
                },
            })
            .collect();

        // Re-sort locally so the tie-break is deterministic regardless of
        // upstream ordering.
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
        self.post(
            "/vectors/delete",
            json!({
                "filter": { "document_id": { "$eq": document_id } },
                "namespace": namespace,
            }),
        )
        .await?;
        Ok(())
    }

    async fn stats(&self) -> Result<IndexStats> {
        let response = self.post("/describe_index_stats", json!({})).await?;
        let parsed: PineconeStatsResponse = response
            .json()
            .await
            .map_err(|e| AppError::Index(format!("Pinecone stats response malformed: {}", e)))?;

        Ok(IndexStats {
            namespaces: parsed
                .namespaces
                .into_iter()
                .map(|(name, stats)| (name, stats.vector_count))
                .collect(),
            total_vectors: parsed.total_vector_count,
        })
    }
}
