use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::AppState;
use crate::error::{AnalysisError, JobError, LocateError, ServiceError};
use crate::jobs::{validate_job_id, JobStatus};

pub(super) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/analyze/start", post(start_analysis))
        .route("/analyze/function", post(analyze_function))
        .route("/analyze/status/:job_id", get(job_status))
        .route("/analyze", post(analyze_code))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeStartRequest {
    pub repo_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeStartResponse {
    pub job_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeFunctionRequest {
    pub job_id: String,
    /// Dotted path such as `package.module.function`.
    pub function_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FunctionAnalysisRequest {
    pub function_code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisSuggestion {
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Job(JobError::EmptyUrl) | ServiceError::Job(JobError::InvalidJobId(_)) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::Job(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Backend(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Analysis(err) => match err {
                AnalysisError::JobNotFound { .. } => StatusCode::NOT_FOUND,
                AnalysisError::JobNotReady { .. } | AnalysisError::JobFailed { .. } => {
                    StatusCode::CONFLICT
                }
                AnalysisError::Job(JobError::InvalidJobId(_)) => StatusCode::BAD_REQUEST,
                AnalysisError::Job(_) | AnalysisError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                AnalysisError::Lookup(LocateError::InvalidFunctionPath { .. }) => {
                    StatusCode::BAD_REQUEST
                }
                AnalysisError::Lookup(LocateError::Io { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
                AnalysisError::Lookup(_) => StatusCode::NOT_FOUND,
                AnalysisError::Backend(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = self.to_string();
        if status.is_server_error() {
            error!("Request failed: {}", detail);
        } else {
            warn!("Request rejected: {}", detail);
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

async fn start_analysis(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeStartRequest>,
) -> Result<Json<AnalyzeStartResponse>, ServiceError> {
    let job_id = state.orchestrator.jobs().submit(&request.repo_url)?;
    Ok(Json(AnalyzeStartResponse { job_id }))
}

async fn analyze_function(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeFunctionRequest>,
) -> Result<Json<AnalysisSuggestion>, ServiceError> {
    let suggestions = state
        .orchestrator
        .analyze(&request.job_id, &request.function_name)
        .await?;
    Ok(Json(AnalysisSuggestion { suggestions }))
}

async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ServiceError> {
    validate_job_id(&job_id)?;
    let record = state
        .orchestrator
        .jobs()
        .status(&job_id)
        .ok_or(AnalysisError::JobNotFound { job_id })?;

    Ok(Json(JobStatusResponse {
        job_id: record.id,
        status: record.status,
        submitted_at: record.submitted_at,
        finished_at: record.finished_at,
    }))
}

async fn analyze_code(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FunctionAnalysisRequest>,
) -> Result<Json<AnalysisSuggestion>, ServiceError> {
    if request.function_code.trim().is_empty() {
        return Err(ServiceError::InvalidRequest(
            "function_code must not be empty".to_string(),
        ));
    }

    info!("Received analyze request");
    let suggestions = state.orchestrator.analyze_code(&request.function_code).await?;
    Ok(Json(AnalysisSuggestion { suggestions }))
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
