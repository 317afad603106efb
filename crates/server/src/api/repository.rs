//! Repository records, job submission and status reads.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use repoflow_core::{JobType, Repository, RepositoryStatus, WorkerProgress};
use repoflow_queue::{JobId, JobOptions, JobPayload};
use repoflow_storage::StorageError;

use crate::state::AppState;

use super::{api_error, not_found, storage_error, worker_error, ApiError};

#[derive(Debug, Deserialize)]
pub struct AddRepositoryRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub uri: String,
    pub job_id: JobId,
    pub job_type: JobType,
}

/// `POST /api/code/repo`: record the repository and start cloning it.
///
/// Answers 304 when the repository is already known.
pub async fn add_repository(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddRepositoryRequest>,
) -> Result<Response, ApiError> {
    let repo = Repository::from_url(&req.url)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let existing = state
        .repositories
        .get_repository(&repo.uri)
        .await
        .map_err(storage_error)?;
    if existing.is_some() {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }
    match state.repositories.add_repository(repo.clone()).await {
        Ok(()) => {}
        Err(StorageError::AlreadyExists(_)) => return Ok(StatusCode::NOT_MODIFIED.into_response()),
        Err(e) => return Err(storage_error(e)),
    }

    let payload = JobPayload::clone_url(&req.url, state.data_path());
    let job = match state
        .dispatcher
        .enqueue_job(JobType::Clone, payload, JobOptions::new())
        .await
    {
        Ok(job) => job,
        Err(e) => {
            // Drop the record so the url can be submitted again.
            if let Err(re) = state.repositories.delete_repository(&repo.uri).await {
                warn!(uri = %repo.uri, error = %re, "failed to roll back repository record");
            }
            return Err(worker_error(e));
        }
    };

    info!(uri = %repo.uri, job_id = %job.id, "repository added");
    Ok(Json(repo).into_response())
}

/// `DELETE /api/code/repo/{*uri}`: forget the repository and remove its checkout.
pub async fn delete_repository(
    State(state): State<Arc<AppState>>,
    Path(uri): Path<String>,
) -> Result<Json<JobAccepted>, ApiError> {
    let removed = state
        .repositories
        .delete_repository(&uri)
        .await
        .map_err(storage_error)?;
    if !removed {
        return Err(not_found("repository", &uri));
    }

    let job = state
        .dispatcher
        .enqueue_job(
            JobType::Delete,
            JobPayload::delete(&uri, state.data_path()),
            JobOptions::new(),
        )
        .await
        .map_err(worker_error)?;

    info!(uri = %uri, job_id = %job.id, "repository delete scheduled");
    Ok(Json(JobAccepted {
        uri,
        job_id: job.id,
        job_type: JobType::Delete,
    }))
}

pub async fn get_repository(
    State(state): State<Arc<AppState>>,
    Path(uri): Path<String>,
) -> Result<Json<Repository>, ApiError> {
    state
        .repositories
        .get_repository(&uri)
        .await
        .map_err(storage_error)?
        .map(Json)
        .ok_or_else(|| not_found("repository", &uri))
}

pub async fn list_repositories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Repository>>, ApiError> {
    let repos = state
        .repositories
        .list_repositories()
        .await
        .map_err(storage_error)?;
    Ok(Json(repos))
}

/// `GET /api/code/repoCloneStatus/{*uri}`: latest clone snapshot.
pub async fn clone_status(
    State(state): State<Arc<AppState>>,
    Path(uri): Path<String>,
) -> Result<Json<WorkerProgress>, ApiError> {
    state
        .dispatcher
        .get_status(&uri, JobType::Clone)
        .await
        .map_err(worker_error)?
        .map(Json)
        .ok_or_else(|| not_found("clone status", &uri))
}

/// `GET /api/code/repoStatus/{*uri}`: every stage snapshot for the uri.
pub async fn repository_status(
    State(state): State<Arc<AppState>>,
    Path(uri): Path<String>,
) -> Result<Json<RepositoryStatus>, ApiError> {
    state
        .dispatcher
        .get_repository_status(&uri)
        .await
        .map_err(worker_error)?
        .map(Json)
        .ok_or_else(|| not_found("status", &uri))
}

/// `POST /api/code/repoIndex/{*uri}`: re-index the current checkout.
pub async fn index_repository(
    State(state): State<Arc<AppState>>,
    Path(uri): Path<String>,
) -> Result<Json<JobAccepted>, ApiError> {
    let record = state
        .repositories
        .get_repository(&uri)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| not_found("repository", &uri))?;

    let cloned = state
        .dispatcher
        .get_status(&uri, JobType::Clone)
        .await
        .map_err(worker_error)?;
    let revision = cloned.and_then(|s| s.revision).or(record.revision);

    let job = state
        .dispatcher
        .enqueue_job(
            JobType::Index,
            JobPayload::index(&uri, revision, state.data_path()),
            JobOptions::new(),
        )
        .await
        .map_err(worker_error)?;

    info!(uri = %uri, job_id = %job.id, "index scheduled");
    Ok(Json(JobAccepted {
        uri,
        job_id: job.id,
        job_type: JobType::Index,
    }))
}
