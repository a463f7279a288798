use axum::{
    routing::{delete, get, post},
    Json, Router,
};
use utoipa::OpenApi;

use crate::AppState;

use super::handlers::{documents, health};

#[derive(OpenApi)]
#[openapi(
    paths(
        documents::process_document,
        documents::query_documents,
        documents::answer_question,
        documents::delete_document,
        health::health,
    ),
    tags(
        (name = "documents", description = "Document ingestion, search and question answering"),
        (name = "health", description = "Service status")
    )
)]
pub struct ApiDoc;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/documents/process", post(documents::process_document))
        .route("/api/documents/query", post(documents::query_documents))
        .route("/api/documents/answer", post(documents::answer_question))
        .route("/api/documents/{id}", delete(documents::delete_document))
        .route("/api/health", get(health::health))
        .route(
            "/api/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
}
