use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============= RAG Data Model =============

/// Where a retrieved chunk came from.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SourceRef {
    pub document_id: i64,
    pub filename: String,
    pub file_type: String,
    pub chunk_index: usize,
}

/// A single retrieval hit, produced fresh per query and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RetrievalMatch {
    pub chunk_text: String,
    /// Cosine similarity in 0..1, higher is more similar.
    pub relevance_score: f32,
    pub source: SourceRef,
}

/// Counters describing one retrieval pass.
///
/// Invariant: `chunks_after_filter <= chunks_retrieved <= top_k`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct RetrievalStats {
    pub chunks_retrieved: usize,
    pub chunks_after_filter: usize,
    pub top_k: usize,
    pub min_score: f32,
}

/// Citation entry returned alongside a generated answer.
///
/// Built from the exact match list used for the prompt, so document numbers
/// cited in the answer line up with these entries.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerSource {
    pub filename: String,
    pub document_id: i64,
    pub chunk_index: usize,
    pub relevance_score: f32,
}

/// Outcome of one question-answering request.
///
/// Generation failures are a reportable outcome, not an error: they come back
/// as `success: false` with `error` set, and this shape is surfaced over the
/// HTTP boundary verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub query: String,
    pub chunks_used: usize,
    pub sources: Vec<AnswerSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_stats: Option<RetrievalStats>,
}

// ============= API Request/Response Types =============

/// Inbound payload from the document-ingestion boundary: text has already
/// been extracted and validated upstream.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessDocumentRequest {
    pub document_id: i64,
    pub text: String,
    pub filename: String,
    pub file_type: String,
    /// Caller-supplied scoping field, carried into vector metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessDocumentResponse {
    pub document_id: i64,
    pub chunk_count: usize,
    /// True when the per-document chunk cap dropped trailing chunks.
    pub truncated: bool,
    /// False when the vector upsert failed and the document was processed
    /// without retrieval support.
    pub indexed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
    /// Restrict retrieval to a single document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<i64>,
}

/// Aggregate numbers over the surviving matches of one search.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuerySummary {
    pub unique_documents: usize,
    pub avg_score: f32,
    pub best_score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryResponse {
    pub query: String,
    pub results_count: usize,
    pub results: Vec<RetrievalMatch>,
    pub stats: QuerySummary,
    pub retrieval_stats: RetrievalStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteDocumentResponse {
    pub success: bool,
    pub document_id: i64,
}

// ============= Error Types =============

/// Application error taxonomy.
///
/// `Generation` never crosses the HTTP boundary during answering: the
/// synthesizer converts it into an `AnswerResult { success: false, .. }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Rejected before any external call (empty/over-length input).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Embedding or generation provider failed after exhausting fallback.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Vector store upsert/query/delete failed.
    #[error("Index operation failed: {0}")]
    Index(String),

    /// Model call failed or returned unusable output.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Bad or missing configuration (unset API key env var, bad TOML).
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code surfaced in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::ProviderUnavailable(_) => "provider_unavailable",
            AppError::Index(_) => "index_operation_failed",
            AppError::Generation(_) => "generation_failed",
            AppError::Configuration(_) => "configuration_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        // Validation errors carry their specific message; everything else is
        // logged in full but reported generically with an internal code.
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ProviderUnavailable(msg) => {
                tracing::error!(error = %msg, code = self.code(), "request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Could not complete the request".to_string(),
                )
            }
            AppError::Index(msg) | AppError::Generation(msg) => {
                tracing::error!(error = %msg, code = self.code(), "request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Could not complete the request".to_string(),
                )
            }
            AppError::Configuration(msg) | AppError::Internal(msg) => {
                tracing::error!(error = %msg, code = self.code(), "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Could not complete the request".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
            "code": self.code(),
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
