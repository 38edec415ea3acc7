//! Background repository clones keyed by job id.
//!
//! `submit` hands back an id straight away; the clone itself runs on a
//! spawned task once a worker permit is free. Each job owns
//! `<storage_root>/<job_id>/` and is the only writer of its record.
//! Finished records are kept up to a history limit, oldest evicted first;
//! the checkout directory outlives its record.

pub mod git;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::error::JobError;

pub use git::{GitCli, RepoCloner};

/// Finished job records retained when no limit is configured.
pub const DEFAULT_JOB_HISTORY_LIMIT: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Failed { reason: String },
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: String,
    pub repo_url: String,
    pub path: PathBuf,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Check that `job_id` names exactly one directory below the storage root.
pub fn validate_job_id(job_id: &str) -> Result<(), JobError> {
    let valid = !job_id.is_empty()
        && job_id != "."
        && job_id != ".."
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(JobError::InvalidJobId(job_id.to_string()))
    }
}

#[derive(Clone)]
pub struct CloneJobRunner {
    storage_root: PathBuf,
    cloner: Arc<dyn RepoCloner>,
    jobs: Arc<DashMap<String, JobRecord>>,
    workers: Arc<Semaphore>,
    history_limit: usize,
}

impl CloneJobRunner {
    pub fn new(storage_root: impl Into<PathBuf>, cloner: Arc<dyn RepoCloner>, workers: usize) -> Self {
        Self {
            storage_root: storage_root.into(),
            cloner,
            jobs: Arc::new(DashMap::new()),
            workers: Arc::new(Semaphore::new(workers.max(1))),
            history_limit: DEFAULT_JOB_HISTORY_LIMIT,
        }
    }

    /// Keep at most `limit` finished records (at least one).
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.repo_storage_path.clone(),
            Arc::new(GitCli::new(config.git_binary.clone())),
            config.clone_workers,
        )
        .with_history_limit(config.job_history_limit)
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn job_dir(&self, job_id: &str) -> Result<PathBuf, JobError> {
        validate_job_id(job_id)?;
        Ok(self.storage_root.join(job_id))
    }

    pub fn status(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs.get(job_id).map(|record| record.clone())
    }

    /// Register a clone of `repo_url` and return its id without waiting.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, repo_url: &str) -> Result<String, JobError> {
        let repo_url = repo_url.trim();
        if repo_url.is_empty() {
            return Err(JobError::EmptyUrl);
        }

        let job_id = Uuid::new_v4().to_string();
        let path = self.storage_root.join(&job_id);

        self.jobs.insert(
            job_id.clone(),
            JobRecord {
                id: job_id.clone(),
                repo_url: repo_url.to_string(),
                path: path.clone(),
                status: JobStatus::Pending,
                submitted_at: Utc::now(),
                finished_at: None,
            },
        );
        info!(job_id = %job_id, repo_url = %repo_url, "Queued repository clone");

        let runner = self.clone();
        let url = repo_url.to_string();
        let id = job_id.clone();
        tokio::spawn(async move {
            runner.execute(&id, &url, &path).await;
        });

        Ok(job_id)
    }

    async fn execute(&self, job_id: &str, repo_url: &str, path: &Path) {
        let _permit = match self.workers.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                warn!(job_id = %job_id, "Worker pool closed before clone started");
                self.finish(job_id, JobStatus::Failed {
                    reason: "worker pool closed".to_string(),
                });
                return;
            }
        };

        self.set_status(job_id, JobStatus::Running);
        info!(job_id = %job_id, "Cloning {} into {}", repo_url, path.display());

        match self.clone_into(repo_url, path).await {
            Ok(()) => {
                info!(job_id = %job_id, "Repository clone complete");
                self.finish(job_id, JobStatus::Complete);
            }
            Err(e) => {
                error!(job_id = %job_id, repo_url = %repo_url, "Failed to clone repository: {}", e);
                self.finish(job_id, JobStatus::Failed {
                    reason: e.to_string(),
                });
            }
        }
    }

    async fn clone_into(&self, repo_url: &str, path: &Path) -> Result<(), JobError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|source| JobError::Storage {
                path: path.to_path_buf(),
                source,
            })?;
        self.cloner.clone_repo(repo_url, path).await
    }

    fn set_status(&self, job_id: &str, status: JobStatus) {
        if let Some(mut record) = self.jobs.get_mut(job_id) {
            record.status = status;
        }
    }

    fn finish(&self, job_id: &str, status: JobStatus) {
        if let Some(mut record) = self.jobs.get_mut(job_id) {
            record.status = status;
            record.finished_at = Some(Utc::now());
        }
        self.evict_finished();
    }

    fn evict_finished(&self) {
        let mut finished: Vec<(DateTime<Utc>, String)> = self
            .jobs
            .iter()
            .filter_map(|entry| entry.finished_at.map(|at| (at, entry.key().clone())))
            .collect();
        if finished.len() <= self.history_limit {
            return;
        }

        finished.sort();
        let excess = finished.len() - self.history_limit;
        for (_, job_id) in finished.into_iter().take(excess) {
            self.jobs.remove(&job_id);
            debug!(job_id = %job_id, "Evicted finished job record");
        }
    }
}
