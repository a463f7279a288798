//! Document pipeline API handlers.

use axum::extract::{Path, State};
use axum::Json;

use crate::types::{
    AnswerRequest, AnswerResult, DeleteDocumentResponse, ProcessDocumentRequest,
    ProcessDocumentResponse, QueryRequest, QueryResponse, Result,
};
use crate::AppState;

#[utoipa::path(
    post,
    path = "/api/documents/process",
    request_body = ProcessDocumentRequest,
    responses(
        (status = 200, description = "Document chunked, embedded and indexed", body = ProcessDocumentResponse),
        (status = 400, description = "Invalid request"),
        (status = 502, description = "Embedding or index backend unavailable")
    ),
    tag = "documents"
)]
pub async fn process_document(
    State(state): State<AppState>,
    Json(request): Json<ProcessDocumentRequest>,
) -> Result<Json<ProcessDocumentResponse>> {
    tracing::info!(
        document_id = request.document_id,
        filename = %request.filename,
        chars = request.text.chars().count(),
        "processing document"
    );
    let response = state.pipeline.process_document(&request).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/documents/query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Semantic search results", body = QueryResponse),
        (status = 400, description = "Invalid query"),
        (status = 502, description = "Embedding or index backend unavailable")
    ),
    tag = "documents"
)]
pub async fn query_documents(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let response = state.pipeline.query(&request).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/documents/answer",
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Grounded answer, or a failed AnswerResult when generation failed", body = AnswerResult),
        (status = 400, description = "Invalid query"),
        (status = 502, description = "Embedding or index backend unavailable")
    ),
    tag = "documents"
)]
pub async fn answer_question(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResult>> {
    let result = state
        .pipeline
        .answer(
            &request.query,
            request.top_k,
            request.min_score,
            request.document_id,
        )
        .await?;
    Ok(Json(result))
}

#[utoipa::path(
    delete,
    path = "/api/documents/{id}",
    params(("id" = i64, Path, description = "Document id")),
    responses(
        (status = 200, description = "Vectors removed from every namespace", body = DeleteDocumentResponse),
        (status = 502, description = "Index backend unavailable")
    ),
    tag = "documents"
)]
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteDocumentResponse>> {
    state.pipeline.delete_document(id).await?;
    Ok(Json(DeleteDocumentResponse {
        success: true,
        document_id: id,
    }))
}
