//! Query-time retrieval: embed the query, search the active namespace, and
//! rank the hits.

use std::sync::Arc;

use crate::index::{namespace_for, MatchFilter, VectorIndex};
use crate::types::{AppError, Result, RetrievalMatch, RetrievalStats, SourceRef};

use super::embeddings::EmbeddingService;

/// Tunable retrieval behavior, with the defaults filled in from config.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    pub top_k: usize,
    pub min_score: f32,
    pub filter: MatchFilter,
}

pub struct Retriever {
    embeddings: Arc<EmbeddingService>,
    index: Arc<dyn VectorIndex>,
    namespace_prefix: String,
    max_query_chars: usize,
}

impl Retriever {
    pub fn new(
        embeddings: Arc<EmbeddingService>,
        index: Arc<dyn VectorIndex>,
        namespace_prefix: String,
        max_query_chars: usize,
    ) -> Self {
        Self {
            embeddings,
            index,
            namespace_prefix,
            max_query_chars,
        }
    }

    /// Retrieve ranked matches for a query.
    ///
    /// The namespace is picked by whichever embedding provider actually
    /// served the query, so comparisons are always against vectors of the
    /// same provider and dimensionality. A query matching nothing is a
    /// normal empty result, not an error.
    pub async fn retrieve(
        &self,
        query: &str,
        params: &RetrievalParams,
    ) -> Result<(Vec<RetrievalMatch>, RetrievalStats)> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("Query must not be empty".into()));
        }
        if query.chars().count() > self.max_query_chars {
            return Err(AppError::Validation(format!(
                "Query exceeds the maximum length of {} characters",
                self.max_query_chars
            )));
        }

        let embedded = self.embeddings.embed_one(query).await?;
        let namespace = namespace_for(&self.namespace_prefix, embedded.provider, embedded.dimensions);

        let hits = self
            .index
            .query(&namespace, &embedded.vector, params.top_k, params.filter)
            .await?;
        let retrieved = hits.len();

        let matches: Vec<RetrievalMatch> = hits
            .into_iter()
            .filter(|hit| hit.score >= params.min_score)
            .map(|hit| RetrievalMatch {
                chunk_text: hit.metadata.text,
                relevance_score: hit.score,
                source: SourceRef {
                    document_id: hit.metadata.document_id,
                    filename: hit.metadata.filename,
                    file_type: hit.metadata.file_type,
                    chunk_index: hit.metadata.chunk_index,
                },
            })
            .collect();

        let stats = RetrievalStats {
            chunks_retrieved: retrieved,
            chunks_after_filter: matches.len(),
            top_k: params.top_k,
            min_score: params.min_score,
        };

        tracing::debug!(
            namespace = %namespace,
            retrieved = stats.chunks_retrieved,
            after_filter = stats.chunks_after_filter,
            "retrieval complete"
        );

        Ok((matches, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{record_id, ChunkMetadata, InMemoryIndex, VectorRecord};
    use crate::rag::embeddings::EmbeddingProvider;
    use async_trait::async_trait;

    struct AxisEmbedder;

    // Maps "north" to the x axis and everything else to the y axis.
    #[async_trait]
    impl EmbeddingProvider for AxisEmbedder {
        fn name(&self) -> &'static str {
            "axis"
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn max_batch_size(&self) -> usize {
            16
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.contains("north") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    fn chunk_record(document_id: i64, chunk_index: usize, values: Vec<f32>, text: &str) -> VectorRecord {
        VectorRecord {
            id: record_id(document_id, chunk_index),
            values,
            metadata: ChunkMetadata {
                document_id,
                filename: "atlas.txt".into(),
                file_type: "txt".into(),
                chunk_index,
                text: text.into(),
                owner_id: None,
            },
        }
    }

    async fn retriever_with_fixtures() -> Retriever {
        let index = Arc::new(InMemoryIndex::new());
        index
            .upsert(
                "documents-axis-2",
                vec![
                    chunk_record(1, 0, vec![1.0, 0.0], "The compass points north."),
                    chunk_record(1, 1, vec![0.7, 0.7], "Mixed directions."),
                    chunk_record(2, 0, vec![0.0, 1.0], "Due south only."),
                ],
            )
            .await
            .unwrap();

        let embeddings =
            Arc::new(EmbeddingService::new(vec![Arc::new(AxisEmbedder)], 512).unwrap());
        Retriever::new(embeddings, index, "documents".into(), 1000)
    }

    fn params(top_k: usize, min_score: f32) -> RetrievalParams {
        RetrievalParams {
            top_k,
            min_score,
            filter: MatchFilter::All,
        }
    }

    #[tokio::test]
    async fn test_retrieve_ranks_and_filters() {
        let retriever = retriever_with_fixtures().await;
        let (matches, stats) = retriever
            .retrieve("which way is north", &params(5, 0.9))
            .await
            .unwrap();

        assert_eq!(stats.chunks_retrieved, 3);
        assert_eq!(stats.chunks_after_filter, 1);
        assert!(stats.chunks_after_filter <= stats.chunks_retrieved);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].source.chunk_index, 0);
        assert!(matches[0].relevance_score > 0.9);
    }

    #[tokio::test]
    async fn test_no_hits_above_threshold_is_empty_not_error() {
        let retriever = retriever_with_fixtures().await;
        let (matches, stats) = retriever
            .retrieve("north star", &params(2, 1.5))
            .await
            .unwrap();

        assert!(matches.is_empty());
        assert_eq!(stats.chunks_after_filter, 0);
        assert!(stats.chunks_retrieved <= stats.top_k);
    }

    #[tokio::test]
    async fn test_document_filter() {
        let retriever = retriever_with_fixtures().await;
        let p = RetrievalParams {
            top_k: 5,
            min_score: 0.0,
            filter: MatchFilter::Document(2),
        };
        let (matches, _) = retriever.retrieve("north", &p).await.unwrap();
        assert!(matches.iter().all(|m| m.source.document_id == 2));
    }

    #[tokio::test]
    async fn test_query_validation() {
        let retriever = retriever_with_fixtures().await;

        let err = retriever.retrieve("   ", &params(5, 0.3)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let long = "q".repeat(1001);
        let err = retriever.retrieve(&long, &params(5, 0.3)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
