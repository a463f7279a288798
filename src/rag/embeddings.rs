//! Embedding generation with ordered provider fallback.
//!
//! Providers form an explicit, ordered list behind a uniform capability
//! interface. The whole input is embedded by exactly one provider: a batch is
//! never split across providers, because vectors of different providers have
//! different dimensionalities and live in different index namespaces.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future;
use serde::{Deserialize, Serialize};

use crate::types::{AppError, Result};

/// Uniform capability interface for embedding backends.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable provider identity; tags every vector the provider produces.
    fn name(&self) -> &'static str;

    /// Dimensionality of every vector this provider returns.
    fn dimensions(&self) -> usize;

    /// Maximum number of texts per upstream API call.
    fn max_batch_size(&self) -> usize;

    /// Embed one batch of texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Vectors for one embed request, tagged with the provider that made them.
#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    pub provider: &'static str,
    pub dimensions: usize,
    pub vectors: Vec<Vec<f32>>,
}

/// A single embedded query.
#[derive(Debug, Clone)]
pub struct Embedded {
    pub provider: &'static str,
    pub dimensions: usize,
    pub vector: Vec<f32>,
}

/// Orchestrates an ordered list of embedding providers.
///
/// The first provider that can embed the entire input wins; on failure the
/// whole input is retried against the next provider. Total failure surfaces
/// as [`AppError::ProviderUnavailable`], never as an empty result.
pub struct EmbeddingService {
    providers: Vec<Arc<dyn EmbeddingProvider>>,
    max_input_items: usize,
}

impl EmbeddingService {
    pub fn new(providers: Vec<Arc<dyn EmbeddingProvider>>, max_input_items: usize) -> Result<Self> {
        if providers.is_empty() {
            return Err(AppError::Configuration(
                "At least one embedding provider is required".into(),
            ));
        }
        Ok(Self {
            providers,
            max_input_items,
        })
    }

    /// Identity and dimensionality of every configured provider, in fallback
    /// order. Callers use this to enumerate the namespaces a document's
    /// vectors may live in.
    pub fn provider_profiles(&self) -> Vec<(&'static str, usize)> {
        self.providers
            .iter()
            .map(|p| (p.name(), p.dimensions()))
            .collect()
    }

    /// Embed a sequence of texts, preserving order.
    ///
    /// Inputs larger than the configured ceiling fail loudly so the caller
    /// can apply its truncation policy; nothing is dropped silently here.
    pub async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        if texts.len() > self.max_input_items {
            return Err(AppError::Validation(format!(
                "Embedding request of {} items exceeds the limit of {}",
                texts.len(),
                self.max_input_items
            )));
        }

        if texts.is_empty() {
            let first = &self.providers[0];
            return Ok(EmbeddingBatch {
                provider: first.name(),
                dimensions: first.dimensions(),
                vectors: Vec::new(),
            });
        }

        let mut last_error: Option<AppError> = None;
        for provider in &self.providers {
            match embed_with(provider.as_ref(), texts).await {
                Ok(vectors) => {
                    tracing::debug!(
                        provider = provider.name(),
                        items = texts.len(),
                        dimensions = provider.dimensions(),
                        "embedded batch"
                    );
                    return Ok(EmbeddingBatch {
                        provider: provider.name(),
                        dimensions: provider.dimensions(),
                        vectors,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %e,
                        "embedding provider failed, falling back"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(AppError::ProviderUnavailable(format!(
            "All embedding providers failed; last error: {}",
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Embed a single query text.
    pub async fn embed_one(&self, text: &str) -> Result<Embedded> {
        let batch = self.embed(std::slice::from_ref(&text.to_string())).await?;
        let vector = batch
            .vectors
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Internal("Provider returned no vector".into()))?;
        Ok(Embedded {
            provider: batch.provider,
            dimensions: batch.dimensions,
            vector,
        })
    }
}

/// Run one provider over the whole input, splitting into sub-batches under
/// its batch ceiling. Sub-batches run concurrently; `try_join_all` keeps
/// output order aligned with input order, which chunk_index alignment
/// depends on.
async fn embed_with(provider: &dyn EmbeddingProvider, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let batch_size = provider.max_batch_size().max(1);
    let calls = texts.chunks(batch_size).map(|batch| provider.embed_batch(batch));
    let results = future::try_join_all(calls).await?;

    let vectors: Vec<Vec<f32>> = results.into_iter().flatten().collect();
    if vectors.len() != texts.len() {
        return Err(AppError::ProviderUnavailable(format!(
            "Provider {} returned {} vectors for {} texts",
            provider.name(),
            vectors.len(),
            texts.len()
        )));
    }
    for vector in &vectors {
        if vector.len() != provider.dimensions() {
            return Err(AppError::ProviderUnavailable(format!(
                "Provider {} returned a {}-dimensional vector, expected {}",
                provider.name(),
                vector.len(),
                provider.dimensions()
            )));
        }
    }
    Ok(vectors)
}

// ============================================================================
// Gemini embedding provider
// ============================================================================

/// Gemini `batchEmbedContents` client (primary provider, 768 dimensions by
/// default).
pub struct GeminiEmbedder {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    dimensions: usize,
}

const GEMINI_EMBED_BATCH: usize = 100;

#[derive(Serialize)]
struct GeminiBatchRequest {
    requests: Vec<GeminiEmbedRequest>,
}

#[derive(Serialize)]
struct GeminiEmbedRequest {
    model: String,
    content: GeminiContent,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiBatchResponse {
    embeddings: Vec<GeminiEmbedding>,
}

#[derive(Deserialize)]
struct GeminiEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbedder {
    /// `dimensions` must match the configured model's output width; it
    /// selects the index namespace and is enforced on every batch.
    pub fn new(api_key: String, api_base: String, model: String, dimensions: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            api_base,
            model,
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn max_batch_size(&self) -> usize {
        GEMINI_EMBED_BATCH
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!(
            "{}/models/{}:batchEmbedContents?key={}",
            self.api_base, self.model, self.api_key
        );
        let body = GeminiBatchRequest {
            requests: texts
                .iter()
                .map(|text| GeminiEmbedRequest {
                    model: format!("models/{}", self.model),
                    content: GeminiContent {
                        parts: vec![GeminiPart { text: text.clone() }],
                    },
                })
                .collect(),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ProviderUnavailable(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ProviderUnavailable(format!(
                "Gemini embedding API returned {}",
                response.status()
            )));
        }

        let parsed: GeminiBatchResponse = response.json().await.map_err(|e| {
            AppError::ProviderUnavailable(format!("Gemini response malformed: {}", e))
        })?;

        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }
}

// ============================================================================
// OpenAI embedding provider
// ============================================================================

/// OpenAI `/embeddings` client (fallback provider, 1536 dimensions by
/// default).
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    dimensions: usize,
}

const OPENAI_EMBED_BATCH: usize = 2048;

#[derive(Serialize)]
struct OpenAiEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbeddingItem>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    /// `dimensions` must match the configured model's output width
    /// (text-embedding-3-small is 1536, -3-large is 3072).
    pub fn new(api_key: String, api_base: String, model: String, dimensions: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            api_base,
            model,
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn max_batch_size(&self) -> usize {
        OPENAI_EMBED_BATCH
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.api_base);
        let body = OpenAiEmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ProviderUnavailable(format!("OpenAI request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ProviderUnavailable(format!(
                "OpenAI embedding API returned {}",
                response.status()
            )));
        }

        let parsed: OpenAiEmbedResponse = response.json().await.map_err(|e| {
            AppError::ProviderUnavailable(format!("OpenAI response malformed: {}", e))
        })?;

        // The API does not guarantee response order; the index field does.
        let mut items = parsed.data;
        items.sort_by_key(|item| item.index);
        Ok(items.into_iter().map(|item| item.embedding).collect())
    }
}
