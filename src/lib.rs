//! Document question-answering service.
//!
//! Processes uploaded document text into embedded chunks, stores them in a
//! namespaced vector index, and answers questions grounded in the retrieved
//! context. Embedding runs behind an ordered provider fallback (Gemini first,
//! OpenAI second); answers are generated by Gemini.
//!
//! ## Modules
//!
//! - [`rag`] - chunking, embedding, retrieval and answer synthesis
//! - [`index`] - vector index backends (in-memory, Pinecone)
//! - [`llm`] - text generation clients
//! - [`api`] - REST handlers and routes
//! - [`config`] - TOML configuration with env-based secrets
//! - [`types`] - request/response types and error handling

pub mod api;
pub mod config;
pub mod index;
pub mod llm;
pub mod rag;
pub mod types;

use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, IndexBackend};
use crate::index::{InMemoryIndex, PineconeIndex, VectorIndex};
use crate::llm::GeminiClient;
use crate::rag::{
    AnswerSynthesizer, DocumentPipeline, EmbeddingProvider, EmbeddingService, GeminiEmbedder,
    OpenAiEmbedder,
};
use crate::types::Result;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<DocumentPipeline>,
}

/// Wire the pipeline from configuration.
///
/// Fallback order is fixed: Gemini, then OpenAI. A provider whose API key
/// env var is unset is skipped at startup rather than failing every request.
pub fn build_state(config: AppConfig) -> Result<AppState> {
    let mut providers: Vec<Arc<dyn EmbeddingProvider>> = Vec::new();

    match config::resolve_secret(&config.embedding.gemini.api_key_env) {
        Ok(key) => providers.push(Arc::new(GeminiEmbedder::new(
            key,
            config.embedding.gemini.api_base.clone(),
            config.embedding.gemini.model.clone(),
            config.embedding.gemini.dimensions,
        ))),
        Err(e) => tracing::warn!(error = %e, "Gemini embedding provider disabled"),
    }
    match config::resolve_secret(&config.embedding.openai.api_key_env) {
        Ok(key) => providers.push(Arc::new(OpenAiEmbedder::new(
            key,
            config.embedding.openai.api_base.clone(),
            config.embedding.openai.model.clone(),
            config.embedding.openai.dimensions,
        ))),
        Err(e) => tracing::warn!(error = %e, "OpenAI embedding provider disabled"),
    }

    let embeddings = Arc::new(EmbeddingService::new(
        providers,
        config.embedding.max_input_items,
    )?);

    let index: Arc<dyn VectorIndex> = match config.index.backend {
        IndexBackend::Memory => Arc::new(InMemoryIndex::new()),
        IndexBackend::Pinecone => {
            let key = config::resolve_secret(&config.index.pinecone.api_key_env)?;
            Arc::new(PineconeIndex::new(
                key,
                config.index.pinecone.index_host.clone(),
            ))
        }
    };

    let generation_key = config::resolve_secret(&config.generation.api_key_env)?;
    let generator = Arc::new(GeminiClient::new(
        generation_key,
        config.generation.api_base.clone(),
        config.generation.model.clone(),
    ));
    let synthesizer = AnswerSynthesizer::new(generator, config.rag.max_answer_chunks);

    let pipeline = Arc::new(DocumentPipeline::new(
        embeddings,
        index,
        synthesizer,
        config.index.namespace_prefix.clone(),
        config.rag.clone(),
    )?);

    Ok(AppState {
        config: Arc::new(config),
        pipeline,
    })
}

/// Full application router with tracing and CORS layers applied.
pub fn build_app(state: AppState) -> axum::Router {
    api::create_router()
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
