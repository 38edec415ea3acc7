//! HTTP surface: repository submission, function review, job status and the
//! direct code review route.

mod handlers;

use std::sync::Arc;

use axum::Router;

use crate::backend;
use crate::config::ServiceConfig;
use crate::error::ConfigError;
use crate::jobs::CloneJobRunner;
use crate::orchestrator::AnalysisOrchestrator;

pub use handlers::{
    AnalysisSuggestion, AnalyzeFunctionRequest, AnalyzeStartRequest, AnalyzeStartResponse,
    FunctionAnalysisRequest, JobStatusResponse,
};

pub struct AppState {
    pub orchestrator: AnalysisOrchestrator,
}

impl AppState {
    pub fn new(orchestrator: AnalysisOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Wire the clone runner and the configured backend together.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let jobs = CloneJobRunner::from_config(config);
        let backend = backend::from_config(config)?;
        Ok(Self::new(AnalysisOrchestrator::new(jobs, backend)))
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    handlers::router(state)
}
