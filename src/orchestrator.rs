use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::backend::ModelBackend;
use crate::error::{AnalysisError, JobError};
use crate::jobs::{CloneJobRunner, JobStatus};
use crate::locator::{self, ExtractedFunction};

/// Ties a finished clone job to the function locator and the model backend.
///
/// Each step fails on its own terms: readiness, lookup, then backend.
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    jobs: CloneJobRunner,
    backend: Arc<dyn ModelBackend>,
}

impl AnalysisOrchestrator {
    pub fn new(jobs: CloneJobRunner, backend: Arc<dyn ModelBackend>) -> Self {
        Self { jobs, backend }
    }

    pub fn jobs(&self) -> &CloneJobRunner {
        &self.jobs
    }

    pub fn backend(&self) -> &dyn ModelBackend {
        self.backend.as_ref()
    }

    /// Resolve `job_id` to a populated checkout or explain why it is not one.
    pub async fn ready_repository(&self, job_id: &str) -> Result<PathBuf, AnalysisError> {
        let dir = self.jobs.job_dir(job_id)?;
        let record = self.jobs.status(job_id);

        match record.as_ref().map(|record| &record.status) {
            Some(JobStatus::Pending) | Some(JobStatus::Running) => {
                return Err(AnalysisError::JobNotReady {
                    job_id: job_id.to_string(),
                });
            }
            Some(JobStatus::Failed { reason }) => {
                return Err(AnalysisError::JobFailed {
                    job_id: job_id.to_string(),
                    reason: reason.clone(),
                });
            }
            // Records do not survive a restart, so the directory decides.
            Some(JobStatus::Complete) | None => {}
        }

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(if record.is_some() {
                    AnalysisError::JobNotReady {
                        job_id: job_id.to_string(),
                    }
                } else {
                    AnalysisError::JobNotFound {
                        job_id: job_id.to_string(),
                    }
                });
            }
            Err(source) => return Err(JobError::Storage { path: dir, source }.into()),
        };

        let has_entries = entries
            .next_entry()
            .await
            .map_err(|source| JobError::Storage {
                path: dir.clone(),
                source,
            })?
            .is_some();

        if has_entries {
            Ok(dir)
        } else {
            Err(AnalysisError::JobNotReady {
                job_id: job_id.to_string(),
            })
        }
    }

    /// Locate `function_path` inside the checkout for `job_id`.
    pub async fn extract(&self, job_id: &str, function_path: &str) -> Result<ExtractedFunction, AnalysisError> {
        let repo = self.ready_repository(job_id).await?;
        debug!(job_id = %job_id, "Looking up {} in {}", function_path, repo.display());

        let path = function_path.to_string();
        let extracted = tokio::task::spawn_blocking(move || locator::locate(&repo, &path))
            .await
            .map_err(|e| AnalysisError::Internal(format!("lookup task failed: {}", e)))??;
        Ok(extracted)
    }

    /// Review `function_path` from the repository cloned by `job_id`.
    pub async fn analyze(&self, job_id: &str, function_path: &str) -> Result<Vec<String>, AnalysisError> {
        let extracted = self.extract(job_id, function_path).await?;
        info!(
            job_id = %job_id,
            "Found {} at {}:{}, sending to {}",
            function_path,
            extracted.module_file.display(),
            extracted.start_line,
            self.backend.name()
        );

        let suggestions = self.backend.analyze_code(&extracted.source).await?;
        Ok(suggestions)
    }

    /// Review raw source without a repository.
    pub async fn analyze_code(&self, code: &str) -> Result<Vec<String>, AnalysisError> {
        Ok(self.backend.analyze_code(code).await?)
    }
}
