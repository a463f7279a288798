//! Grounded answer generation from retrieved context.

use std::sync::Arc;

use crate::llm::GenerationClient;
use crate::types::{AnswerResult, AnswerSource, RetrievalMatch, RetrievalStats};

/// Canned reply when retrieval produced no usable context. This path never
/// calls the model, so it cannot hallucinate an answer from nothing.
const NO_CONTEXT_ANSWER: &str = "I couldn't find any relevant information in the documents \
to answer your question. Please try rephrasing or upload related documents.";

pub struct AnswerSynthesizer {
    generator: Arc<dyn GenerationClient>,
    max_answer_chunks: usize,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn GenerationClient>, max_answer_chunks: usize) -> Self {
        Self {
            generator,
            max_answer_chunks,
        }
    }

    /// Build a grounded answer from the top retrieval matches.
    ///
    /// Model failure comes back as a failed [`AnswerResult`], not an error;
    /// the retrieval work that succeeded is still reported.
    pub async fn synthesize(
        &self,
        query: &str,
        matches: &[RetrievalMatch],
        stats: RetrievalStats,
    ) -> AnswerResult {
        if matches.is_empty() {
            return AnswerResult {
                success: true,
                answer: Some(NO_CONTEXT_ANSWER.to_string()),
                error: None,
                query: query.to_string(),
                chunks_used: 0,
                sources: Vec::new(),
                retrieval_stats: Some(stats),
            };
        }

        let used = &matches[..matches.len().min(self.max_answer_chunks)];
        let prompt = build_prompt(query, used);
        let sources: Vec<AnswerSource> = used
            .iter()
            .map(|m| AnswerSource {
                filename: m.source.filename.clone(),
                document_id: m.source.document_id,
                chunk_index: m.source.chunk_index,
                relevance_score: m.relevance_score,
            })
            .collect();

        match self.generator.generate(&prompt).await {
            Ok(answer) => AnswerResult {
                success: true,
                answer: Some(answer.trim().to_string()),
                error: None,
                query: query.to_string(),
                chunks_used: used.len(),
                sources,
                retrieval_stats: Some(stats),
            },
            Err(e) => {
                tracing::error!(error = %e, "answer generation failed");
                AnswerResult {
                    success: false,
                    answer: None,
                    error: Some(format!("Failed to generate an answer: {}", e)),
                    query: query.to_string(),
                    chunks_used: used.len(),
                    sources,
                    retrieval_stats: Some(stats),
                }
            }
        }
    }
}

/// Numbered context blocks with provenance, then the grounding instructions.
fn build_prompt(query: &str, matches: &[RetrievalMatch]) -> String {
    let mut context = String::new();
    for (i, m) in matches.iter().enumerate() {
        context.push_str(&format!(
            "[Document {}] {}\n{}\n(Relevance: {:.2})\n\n",
            i + 1,
            m.source.filename,
            m.chunk_text,
            m.relevance_score
        ));
    }

    format!(
        "You are a helpful assistant that answers questions based on the provided documents.\n\n\
Context from documents:\n\n{}\
Question: {}\n\n\
Instructions:\n\
- Answer using only the information in the context above.\n\
- If the context does not contain enough information, say so clearly.\n\
- Cite the document numbers you used, e.g. [Document 1].\n\
- Keep the answer concise.",
        context, query
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AppError, Result, SourceRef};
    use async_trait::async_trait;

    struct EchoGenerator;

    #[async_trait]
    impl GenerationClient for EchoGenerator {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(format!("prompt bytes: {}", prompt.len()))
        }
    }

    struct BrokenGenerator;

    #[async_trait]
    impl GenerationClient for BrokenGenerator {
        fn model_name(&self) -> &str {
            "broken"
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(AppError::Generation("model overloaded".into()))
        }
    }

    fn a_match(chunk_index: usize, score: f32) -> RetrievalMatch {
        RetrievalMatch {
            chunk_text: format!("Chunk {} body.", chunk_index),
            relevance_score: score,
            source: SourceRef {
                document_id: 7,
                filename: "report.pdf".into(),
                file_type: "pdf".into(),
                chunk_index,
            },
        }
    }

    fn stats(retrieved: usize, after: usize) -> RetrievalStats {
        RetrievalStats {
            chunks_retrieved: retrieved,
            chunks_after_filter: after,
            top_k: 5,
            min_score: 0.3,
        }
    }

    #[tokio::test]
    async fn test_empty_context_uses_canned_answer() {
        let synth = AnswerSynthesizer::new(Arc::new(EchoGenerator), 5);
        let result = synth.synthesize("what is this", &[], stats(0, 0)).await;

        assert!(result.success);
        assert_eq!(result.chunks_used, 0);
        assert!(result.sources.is_empty());
        assert!(result.answer.unwrap().contains("couldn't find any relevant information"));
    }

    #[tokio::test]
    async fn test_context_is_capped_at_max_chunks() {
        let synth = AnswerSynthesizer::new(Arc::new(EchoGenerator), 2);
        let matches: Vec<_> = (0..4).map(|i| a_match(i, 0.9 - i as f32 * 0.1)).collect();
        let result = synth.synthesize("question", &matches, stats(4, 4)).await;

        assert!(result.success);
        assert_eq!(result.chunks_used, 2);
        assert_eq!(result.sources.len(), 2);
        assert_eq!(result.sources[0].chunk_index, 0);
        assert_eq!(result.sources[1].chunk_index, 1);
    }

    #[tokio::test]
    async fn test_generation_failure_is_reported_not_raised() {
        let synth = AnswerSynthesizer::new(Arc::new(BrokenGenerator), 5);
        let matches = vec![a_match(0, 0.8)];
        let result = synth.synthesize("question", &matches, stats(1, 1)).await;

        assert!(!result.success);
        assert!(result.answer.is_none());
        assert!(result.error.unwrap().contains("model overloaded"));
        // Retrieval context survives the failure for diagnostics.
        assert_eq!(result.chunks_used, 1);
        assert_eq!(result.sources.len(), 1);
        assert!(result.retrieval_stats.is_some());
    }

    #[test]
    fn test_prompt_contains_provenance_and_instructions() {
        let prompt = build_prompt("where is the fleet", &[a_match(0, 0.87)]);
        assert!(prompt.contains("[Document 1] report.pdf"));
        assert!(prompt.contains("Chunk 0 body."));
        assert!(prompt.contains("(Relevance: 0.87)"));
        assert!(prompt.contains("Question: where is the fleet"));
        assert!(prompt.contains("only the information in the context"));
    }
}
