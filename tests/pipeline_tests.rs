//! End-to-end pipeline tests against the in-memory index with mock
//! embedding and generation backends.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use docqa::config::RagConfig;
use docqa::index::{InMemoryIndex, VectorIndex};
use docqa::llm::GenerationClient;
use docqa::rag::{AnswerSynthesizer, DocumentPipeline, EmbeddingProvider, EmbeddingService};
use docqa::types::{AppError, ProcessDocumentRequest, QueryRequest, Result};

// ============= Mock Embedding Providers =============

/// Embeds text onto a 3-axis space by keyword, so similarity is predictable:
/// "ocean" texts match "ocean" queries with score 1.0 and miss everything else.
struct KeywordEmbedder {
    name: &'static str,
    dimensions: usize,
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn max_batch_size(&self) -> usize {
        64
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0; self.dimensions];
                let lowered = t.to_lowercase();
                if lowered.contains("ocean") {
                    v[0] = 1.0;
                } else if lowered.contains("desert") {
                    v[1] = 1.0;
                } else {
                    v[2] = 1.0;
                }
                v
            })
            .collect())
    }
}

/// Fails until the flag flips, to drive fallback scenarios.
struct FlakyEmbedder {
    inner: KeywordEmbedder,
    broken: AtomicBool,
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    fn name(&self) -> &'static str {
        self.inner.name
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions
    }

    fn max_batch_size(&self) -> usize {
        self.inner.max_batch_size()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(AppError::ProviderUnavailable("simulated outage".into()));
        }
        self.inner.embed_batch(texts).await
    }
}

// ============= Mock Generation Client =============

struct MockGenerator {
    should_fail: bool,
}

#[async_trait]
impl GenerationClient for MockGenerator {
    fn model_name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        if self.should_fail {
            return Err(AppError::Generation("mock model outage".into()));
        }
        assert!(prompt.contains("Question:"), "prompt must carry the question");
        Ok("The documents describe the ocean. [Document 1]".to_string())
    }
}

// ============= Fixtures =============

fn rag_config() -> RagConfig {
    RagConfig {
        chunk_size: 100,
        chunk_overlap: 20,
        max_chunks_per_document: 5,
        default_top_k: 5,
        default_min_score: 0.3,
        max_answer_chunks: 3,
        metadata_text_limit: 1000,
        max_query_chars: 1000,
    }
}

fn pipeline_with(
    providers: Vec<Arc<dyn EmbeddingProvider>>,
    index: Arc<dyn VectorIndex>,
    generator_fails: bool,
) -> DocumentPipeline {
    let embeddings = Arc::new(EmbeddingService::new(providers, 512).unwrap());
    let synthesizer = AnswerSynthesizer::new(
        Arc::new(MockGenerator {
            should_fail: generator_fails,
        }),
        3,
    );
    DocumentPipeline::new(embeddings, index, synthesizer, "documents".into(), rag_config())
        .unwrap()
}

fn default_pipeline(index: Arc<dyn VectorIndex>) -> DocumentPipeline {
    pipeline_with(
        vec![Arc::new(KeywordEmbedder {
            name: "primary",
            dimensions: 3,
        })],
        index,
        false,
    )
}

fn process_request(document_id: i64, text: &str) -> ProcessDocumentRequest {
    ProcessDocumentRequest {
        document_id,
        text: text.to_string(),
        filename: "waves.txt".to_string(),
        file_type: "txt".to_string(),
        owner_id: None,
    }
}

fn query_request(query: &str) -> QueryRequest {
    QueryRequest {
        query: query.to_string(),
        top_k: None,
        min_score: None,
        document_id: None,
    }
}

// ============= Tests =============

#[tokio::test]
async fn test_process_then_query_end_to_end() {
    let index = Arc::new(InMemoryIndex::new());
    let pipeline = default_pipeline(index.clone());

    let response = pipeline
        .process_document(&process_request(1, "The ocean covers most of the planet."))
        .await
        .unwrap();
    assert!(response.indexed);
    assert!(!response.truncated);
    assert_eq!(response.chunk_count, 1);
    assert!(response.warning.is_none());

    let results = pipeline
        .query(&query_request("tell me about the ocean"))
        .await
        .unwrap();
    assert_eq!(results.results_count, 1);
    assert!(results.results[0].relevance_score > 0.99);
    assert_eq!(results.results[0].source.document_id, 1);
    assert_eq!(results.stats.unique_documents, 1);
    assert!(
        results.retrieval_stats.chunks_after_filter <= results.retrieval_stats.chunks_retrieved
    );
}

#[tokio::test]
async fn test_answer_grounded_in_context() {
    let index = Arc::new(InMemoryIndex::new());
    let pipeline = default_pipeline(index);

    pipeline
        .process_document(&process_request(1, "The ocean covers most of the planet."))
        .await
        .unwrap();

    let result = pipeline
        .answer("what does the ocean cover", None, None, None)
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.chunks_used, 1);
    assert_eq!(result.sources.len(), 1);
    assert_eq!(result.sources[0].filename, "waves.txt");
    assert!(result.answer.unwrap().contains("[Document 1]"));
}

#[tokio::test]
async fn test_unrelated_question_gets_insufficient_info_answer() {
    let index = Arc::new(InMemoryIndex::new());
    let pipeline = default_pipeline(index);

    pipeline
        .process_document(&process_request(1, "The ocean covers most of the planet."))
        .await
        .unwrap();

    // Orthogonal embedding, nothing clears min_score 0.9.
    let result = pipeline
        .answer("explain the desert climate", None, Some(0.9), None)
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.chunks_used, 0);
    assert!(result.sources.is_empty());
    assert!(result
        .answer
        .unwrap()
        .contains("couldn't find any relevant information"));
}

#[tokio::test]
async fn test_generation_failure_reported_in_result() {
    let index = Arc::new(InMemoryIndex::new());
    let pipeline = pipeline_with(
        vec![Arc::new(KeywordEmbedder {
            name: "primary",
            dimensions: 3,
        })],
        index,
        true,
    );

    pipeline
        .process_document(&process_request(1, "The ocean covers most of the planet."))
        .await
        .unwrap();

    let result = pipeline
        .answer("what about the ocean", None, None, None)
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result.answer.is_none());
    assert!(result.error.unwrap().contains("mock model outage"));
    assert_eq!(result.chunks_used, 1);
}

#[tokio::test]
async fn test_reprocessing_is_idempotent() {
    let index = Arc::new(InMemoryIndex::new());
    let pipeline = default_pipeline(index.clone());

    let long_text = "The ocean has waves. ".repeat(20);
    pipeline
        .process_document(&process_request(1, &long_text))
        .await
        .unwrap();
    let first_total = index.stats().await.unwrap().total_vectors;

    // Shorter re-process must not leave stale chunks behind.
    pipeline
        .process_document(&process_request(1, "The ocean is deep."))
        .await
        .unwrap();
    let stats = index.stats().await.unwrap();
    assert!(first_total > 1);
    assert_eq!(stats.total_vectors, 1);
}

#[tokio::test]
async fn test_chunk_cap_sets_truncated_flag() {
    let index = Arc::new(InMemoryIndex::new());
    let pipeline = default_pipeline(index.clone());

    // chunk_size 100, overlap 20 over ~2000 chars exceeds the cap of 5.
    let huge = "ocean swell rolling far from shore without pause. ".repeat(40);
    let response = pipeline
        .process_document(&process_request(1, &huge))
        .await
        .unwrap();

    assert!(response.truncated);
    assert_eq!(response.chunk_count, 5);
    assert!(response.warning.unwrap().contains("first 5"));
    assert_eq!(index.stats().await.unwrap().total_vectors, 5);
}

#[tokio::test]
async fn test_delete_document_clears_all_vectors() {
    let index = Arc::new(InMemoryIndex::new());
    let pipeline = default_pipeline(index.clone());

    pipeline
        .process_document(&process_request(1, "The ocean covers most of the planet."))
        .await
        .unwrap();
    pipeline
        .process_document(&process_request(2, "The desert stays dry all year."))
        .await
        .unwrap();

    pipeline.delete_document(1).await.unwrap();

    assert_eq!(index.stats().await.unwrap().total_vectors, 1);
    let results = pipeline
        .query(&query_request("where is the ocean"))
        .await
        .unwrap();
    assert!(results.results.iter().all(|r| r.source.document_id == 2));
}

#[tokio::test]
async fn test_fallback_provider_switches_namespace() {
    let index = Arc::new(InMemoryIndex::new());
    let flaky = Arc::new(FlakyEmbedder {
        inner: KeywordEmbedder {
            name: "primary",
            dimensions: 3,
        },
        broken: AtomicBool::new(true),
    });
    let pipeline = pipeline_with(
        vec![
            flaky.clone(),
            Arc::new(KeywordEmbedder {
                name: "backup",
                dimensions: 6,
            }),
        ],
        index.clone(),
        false,
    );

    // Primary down: vectors land in the backup provider's namespace.
    pipeline
        .process_document(&process_request(1, "The ocean covers most of the planet."))
        .await
        .unwrap();
    let stats = index.stats().await.unwrap();
    assert_eq!(stats.namespaces.get("documents-backup-6"), Some(&1));

    // Queries embed with the same fallback, so they search the same
    // namespace and still find the document.
    let results = pipeline
        .query(&query_request("the ocean"))
        .await
        .unwrap();
    assert_eq!(results.results_count, 1);

    // Primary recovers and the document is re-processed: the backup
    // namespace must not keep a stale copy.
    flaky.broken.store(false, Ordering::SeqCst);
    pipeline
        .process_document(&process_request(1, "The ocean covers most of the planet."))
        .await
        .unwrap();
    let stats = index.stats().await.unwrap();
    assert_eq!(stats.namespaces.get("documents-primary-3"), Some(&1));
    assert_eq!(stats.namespaces.get("documents-backup-6").copied().unwrap_or(0), 0);
}

#[tokio::test]
async fn test_validation_errors() {
    let index = Arc::new(InMemoryIndex::new());
    let pipeline = default_pipeline(index);

    let err = pipeline
        .process_document(&process_request(1, "   "))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = pipeline.query(&query_request("")).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = pipeline
        .query(&QueryRequest {
            query: "ocean".into(),
            top_k: Some(0),
            min_score: None,
            document_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = pipeline
        .answer("ocean", None, Some(1.5), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_document_scoped_query() {
    let index = Arc::new(InMemoryIndex::new());
    let pipeline = default_pipeline(index);

    pipeline
        .process_document(&process_request(1, "The ocean covers most of the planet."))
        .await
        .unwrap();
    pipeline
        .process_document(&ProcessDocumentRequest {
            document_id: 2,
            text: "The ocean floor is mostly unmapped.".into(),
            filename: "floor.txt".into(),
            file_type: "txt".into(),
            owner_id: None,
        })
        .await
        .unwrap();

    let results = pipeline
        .query(&QueryRequest {
            query: "ocean".into(),
            top_k: None,
            min_score: None,
            document_id: Some(2),
        })
        .await
        .unwrap();
    assert_eq!(results.results_count, 1);
    assert_eq!(results.results[0].source.filename, "floor.txt");
}
