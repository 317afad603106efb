//! HTTP endpoint modules.
//!
//! Shared error response types live here in mod.rs.

mod health;
mod repository;


use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::error;

use repoflow_storage::StorageError;
use repoflow_worker::WorkerError;

// ── Shared types ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub(crate) fn not_found(what: &str, uri: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("{what} not found: {uri}"))
}

pub(crate) fn storage_error(e: StorageError) -> ApiError {
    error!(error = %e, "storage request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Validation failures are the caller's fault; everything else is ours.
pub(crate) fn worker_error(e: WorkerError) -> ApiError {
    if e.is_validation() {
        return api_error(StatusCode::BAD_REQUEST, e.to_string());
    }
    error!(error = %e, "job request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

// ── Re-exports ───────────────────────────────────────────────────

pub use health::{health, job_metrics};
pub use repository::{
    add_repository, clone_status, delete_repository, get_repository, index_repository,
    list_repositories, repository_status,
};
