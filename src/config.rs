//! TOML-based configuration for the docqa server.
//!
//! Infrastructure settings (server address, provider endpoints, tuning knobs)
//! live in `docqa.toml`; secrets are never stored in the file, only the names
//! of the environment variables that hold them.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{AppError, Result};

/// Root configuration structure loaded from docqa.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub rag: RagConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&raw).map_err(|e| {
            AppError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
        })
    }
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

// ============= Embedding Configuration =============

/// Ordered embedding provider setup: Gemini is tried first, the OpenAI
/// endpoint is the fallback. The two deliberately have different vector
/// dimensionalities, so each gets its own index namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub gemini: GeminiEmbeddingConfig,

    #[serde(default)]
    pub openai: OpenAiEmbeddingConfig,

    /// Hard ceiling on items per embed request. Exceeding it is a loud
    /// validation failure, never a silent truncation.
    #[serde(default = "default_max_input_items")]
    pub max_input_items: usize,
}

fn default_max_input_items() -> usize {
    512
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            gemini: GeminiEmbeddingConfig::default(),
            openai: OpenAiEmbeddingConfig::default(),
            max_input_items: default_max_input_items(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiEmbeddingConfig {
    /// Environment variable name containing the API key.
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_gemini_embedding_model")]
    pub model: String,

    /// Vector dimensionality of the configured model. Must change together
    /// with `model`; it selects the index namespace and every stored vector
    /// in that namespace is validated against it.
    #[serde(default = "default_gemini_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_gemini_api_base")]
    pub api_base: String,
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_gemini_embedding_model() -> String {
    "text-embedding-004".to_string()
}

fn default_gemini_dimensions() -> usize {
    768
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

impl Default for GeminiEmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_key_env(),
            model: default_gemini_embedding_model(),
            dimensions: default_gemini_dimensions(),
            api_base: default_gemini_api_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiEmbeddingConfig {
    /// Environment variable name containing the API key.
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_openai_embedding_model")]
    pub model: String,

    /// Vector dimensionality of the configured model. Must change together
    /// with `model` (text-embedding-3-small is 1536, -3-large is 3072).
    #[serde(default = "default_openai_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_openai_api_base")]
    pub api_base: String,
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_openai_dimensions() -> usize {
    1536
}

fn default_openai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for OpenAiEmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_key_env(),
            model: default_openai_embedding_model(),
            dimensions: default_openai_dimensions(),
            api_base: default_openai_api_base(),
        }
    }
}

// ============= Generation Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Environment variable name containing the API key.
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default = "default_gemini_api_base")]
    pub api_base: String,
}

fn default_generation_model() -> String {
    "gemini-2.5-flash".to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_key_env(),
            model: default_generation_model(),
            api_base: default_gemini_api_base(),
        }
    }
}

// ============= Vector Index Configuration =============

/// Which vector index backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// In-process store, ephemeral. Default for development and tests.
    #[default]
    Memory,
    /// Remote Pinecone index over HTTP.
    Pinecone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub backend: IndexBackend,

    /// Prefix for provider/dimension-scoped namespaces.
    #[serde(default = "default_namespace_prefix")]
    pub namespace_prefix: String,

    #[serde(default)]
    pub pinecone: PineconeConfig,
}

fn default_namespace_prefix() -> String {
    "documents".to_string()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::default(),
            namespace_prefix: default_namespace_prefix(),
            pinecone: PineconeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PineconeConfig {
    /// Environment variable name containing the API key.
    #[serde(default = "default_pinecone_key_env")]
    pub api_key_env: String,

    /// Index host URL, e.g. `https://my-index-abc123.svc.us-east-1.pinecone.io`.
    #[serde(default)]
    pub index_host: String,
}

fn default_pinecone_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_pinecone_key_env(),
            index_host: String::new(),
        }
    }
}

// ============= RAG Pipeline Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Target chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters of context shared between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Quota protection: chunks beyond this cap are dropped, never embedded.
    #[serde(default = "default_max_chunks_per_document")]
    pub max_chunks_per_document: usize,

    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    #[serde(default = "default_min_score")]
    pub default_min_score: f32,

    /// Cap on chunks fed to the generation prompt, independent of top_k.
    #[serde(default = "default_max_answer_chunks")]
    pub max_answer_chunks: usize,

    /// Per-field size limit for chunk text stored in vector metadata.
    #[serde(default = "default_metadata_text_limit")]
    pub metadata_text_limit: usize,

    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_max_chunks_per_document() -> usize {
    200
}

fn default_top_k() -> usize {
    5
}

fn default_min_score() -> f32 {
    0.3
}

fn default_max_answer_chunks() -> usize {
    5
}

fn default_metadata_text_limit() -> usize {
    1000
}

fn default_max_query_chars() -> usize {
    1000
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_chunks_per_document: default_max_chunks_per_document(),
            default_top_k: default_top_k(),
            default_min_score: default_min_score(),
            max_answer_chunks: default_max_answer_chunks(),
            metadata_text_limit: default_metadata_text_limit(),
            max_query_chars: default_max_query_chars(),
        }
    }
}

/// Resolve a secret referenced by environment variable name.
pub fn resolve_secret(env_name: &str) -> Result<String> {
    std::env::var(env_name).map_err(|_| {
        AppError::Configuration(format!("Environment variable {} is not set", env_name))
    })
}
