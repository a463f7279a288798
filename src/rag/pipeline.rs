//! End-to-end document pipeline: chunk, embed, index, retrieve, answer.

use std::sync::Arc;

use crate::config::RagConfig;
use crate::index::{namespace_for, record_id, ChunkMetadata, MatchFilter, VectorIndex, VectorRecord};
use crate::types::{
    AnswerResult, AppError, ProcessDocumentRequest, ProcessDocumentResponse, QueryRequest,
    QueryResponse, QuerySummary, Result, RetrievalMatch,
};

use super::chunker::TextChunker;
use super::embeddings::EmbeddingService;
use super::retriever::{RetrievalParams, Retriever};
use super::synthesizer::AnswerSynthesizer;

pub struct DocumentPipeline {
    chunker: TextChunker,
    embeddings: Arc<EmbeddingService>,
    index: Arc<dyn VectorIndex>,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    namespace_prefix: String,
    rag: RagConfig,
}

impl DocumentPipeline {
    pub fn new(
        embeddings: Arc<EmbeddingService>,
        index: Arc<dyn VectorIndex>,
        synthesizer: AnswerSynthesizer,
        namespace_prefix: String,
        rag: RagConfig,
    ) -> Result<Self> {
        let chunker = TextChunker::new(rag.chunk_size, rag.chunk_overlap)?;
        let retriever = Retriever::new(
            embeddings.clone(),
            index.clone(),
            namespace_prefix.clone(),
            rag.max_query_chars,
        );
        Ok(Self {
            chunker,
            embeddings,
            index,
            retriever,
            synthesizer,
            namespace_prefix,
            rag,
        })
    }

    /// Chunk, embed and index one document.
    ///
    /// Re-processing the same document id replaces its vectors everywhere:
    /// stale vectors are cleared from every provider namespace first, so a
    /// provider switch between runs cannot leave orphans behind.
    pub async fn process_document(
        &self,
        request: &ProcessDocumentRequest,
    ) -> Result<ProcessDocumentResponse> {
        if request.text.trim().is_empty() {
            return Err(AppError::Validation(
                "Document text must not be empty".into(),
            ));
        }
        if request.filename.trim().is_empty() {
            return Err(AppError::Validation("Filename must not be empty".into()));
        }

        let mut spans = self.chunker.chunk_with_offsets(&request.text);
        let total = spans.len();
        let truncated = total > self.rag.max_chunks_per_document;
        if truncated {
            spans.truncate(self.rag.max_chunks_per_document);
            tracing::warn!(
                document_id = request.document_id,
                total_chunks = total,
                kept = spans.len(),
                "document exceeds chunk cap, extra chunks dropped"
            );
        }

        let texts: Vec<String> = spans.iter().map(|s| s.text.clone()).collect();
        let batch = self.embeddings.embed(&texts).await?;

        let records: Vec<VectorRecord> = spans
            .iter()
            .zip(batch.vectors)
            .enumerate()
            .map(|(chunk_index, (span, values))| VectorRecord {
                id: record_id(request.document_id, chunk_index),
                values,
                metadata: ChunkMetadata {
                    document_id: request.document_id,
                    filename: request.filename.clone(),
                    file_type: request.file_type.clone(),
                    chunk_index,
                    text: truncate_chars(&span.text, self.rag.metadata_text_limit),
                    owner_id: request.owner_id.clone(),
                },
            })
            .collect();
        let chunk_count = records.len();

        let namespace = namespace_for(&self.namespace_prefix, batch.provider, batch.dimensions);
        let indexed = match self.clear_document(request.document_id).await {
            Ok(()) => match self.index.upsert(&namespace, records).await {
                Ok(upserted) => {
                    tracing::info!(
                        document_id = request.document_id,
                        namespace = %namespace,
                        chunks = upserted,
                        "document indexed"
                    );
                    true
                }
                Err(e) => {
                    tracing::error!(
                        document_id = request.document_id,
                        error = %e,
                        "vector upsert failed"
                    );
                    false
                }
            },
            Err(e) => {
                tracing::error!(
                    document_id = request.document_id,
                    error = %e,
                    "clearing stale vectors failed"
                );
                false
            }
        };

        let warning = if !indexed {
            Some("Document was processed but could not be indexed; retry later".to_string())
        } else if truncated {
            Some(format!(
                "Document produced {} chunks; only the first {} were indexed",
                total, self.rag.max_chunks_per_document
            ))
        } else {
            None
        };

        Ok(ProcessDocumentResponse {
            document_id: request.document_id,
            chunk_count,
            truncated,
            indexed,
            warning,
        })
    }

    /// Semantic search without generation.
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let params = self.params_from(request.top_k, request.min_score, request.document_id)?;
        let (matches, stats) = self.retriever.retrieve(&request.query, &params).await?;

        Ok(QueryResponse {
            query: request.query.trim().to_string(),
            results_count: matches.len(),
            stats: summarize(&matches),
            retrieval_stats: stats,
            results: matches,
        })
    }

    /// Retrieve then synthesize a grounded answer.
    pub async fn answer(
        &self,
        query: &str,
        top_k: Option<usize>,
        min_score: Option<f32>,
        document_id: Option<i64>,
    ) -> Result<AnswerResult> {
        let params = self.params_from(top_k, min_score, document_id)?;
        let query = query.trim();
        let (matches, stats) = self.retriever.retrieve(query, &params).await?;
        Ok(self.synthesizer.synthesize(query, &matches, stats).await)
    }

    /// Remove a document's vectors from every provider namespace.
    pub async fn delete_document(&self, document_id: i64) -> Result<()> {
        self.clear_document(document_id).await?;
        tracing::info!(document_id, "document vectors deleted");
        Ok(())
    }

    async fn clear_document(&self, document_id: i64) -> Result<()> {
        for (provider, dimensions) in self.embeddings.provider_profiles() {
            let namespace = namespace_for(&self.namespace_prefix, provider, dimensions);
            self.index
                .delete_by_document(&namespace, document_id)
                .await?;
        }
        Ok(())
    }

    fn params_from(
        &self,
        top_k: Option<usize>,
        min_score: Option<f32>,
        document_id: Option<i64>,
    ) -> Result<RetrievalParams> {
        let top_k = top_k.unwrap_or(self.rag.default_top_k);
        if top_k == 0 || top_k > 50 {
            return Err(AppError::Validation(
                "top_k must be between 1 and 50".into(),
            ));
        }
        let min_score = min_score.unwrap_or(self.rag.default_min_score);
        if !(0.0..=1.0).contains(&min_score) {
            return Err(AppError::Validation(
                "min_score must be between 0.0 and 1.0".into(),
            ));
        }
        Ok(RetrievalParams {
            top_k,
            min_score,
            filter: match document_id {
                Some(id) => MatchFilter::Document(id),
                None => MatchFilter::All,
            },
        })
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

fn summarize(matches: &[RetrievalMatch]) -> QuerySummary {
    if matches.is_empty() {
        return QuerySummary {
            unique_documents: 0,
            avg_score: 0.0,
            best_score: 0.0,
        };
    }
    let mut documents: Vec<i64> = matches.iter().map(|m| m.source.document_id).collect();
    documents.sort_unstable();
    documents.dedup();
    let sum: f32 = matches.iter().map(|m| m.relevance_score).sum();
    let best = matches
        .iter()
        .map(|m| m.relevance_score)
        .fold(f32::MIN, f32::max);
    QuerySummary {
        unique_documents: documents.len(),
        avg_score: sum / matches.len() as f32,
        best_score: best,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_is_char_based() {
        assert_eq!(truncate_chars("héllo", 3), "hél");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[test]
    fn test_summarize() {
        let summary = summarize(&[]);
        assert_eq!(summary.unique_documents, 0);
        assert_eq!(summary.best_score, 0.0);

        let matches = vec![
            RetrievalMatch {
                chunk_text: "a".into(),
                relevance_score: 0.9,
                source: crate::types::SourceRef {
                    document_id: 1,
                    filename: "a.txt".into(),
                    file_type: "txt".into(),
                    chunk_index: 0,
                },
            },
            RetrievalMatch {
                chunk_text: "b".into(),
                relevance_score: 0.5,
                source: crate::types::SourceRef {
                    document_id: 1,
                    filename: "a.txt".into(),
                    file_type: "txt".into(),
                    chunk_index: 1,
                },
            },
        ];
        let summary = summarize(&matches);
        assert_eq!(summary.unique_documents, 1);
        assert!((summary.avg_score - 0.7).abs() < 1e-6);
        assert!((summary.best_score - 0.9).abs() < 1e-6);
    }
}
