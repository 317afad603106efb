//! Health and worker metrics endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use repoflow_worker::MetricsSnapshot;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub queue: String,
    pub progress_subscribers: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let queue = match state.dispatcher.queue().health().await {
        Ok(h) => h.to_string(),
        Err(e) => format!("unavailable: {e}"),
    };
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        queue,
        progress_subscribers: state.progress.subscriber_count(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetricsResponse {
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
    /// Jobs waiting per stage.
    pub pending: BTreeMap<String, usize>,
}

pub async fn job_metrics(State(state): State<Arc<AppState>>) -> Json<JobMetricsResponse> {
    let mut pending = BTreeMap::new();
    for job_type in state.dispatcher.job_types() {
        let depth = state.dispatcher.queue().depth(job_type).await.unwrap_or(0);
        pending.insert(job_type.to_string(), depth);
    }
    Json(JobMetricsResponse {
        metrics: state.dispatcher.metrics().snapshot(),
        pending,
    })
}
