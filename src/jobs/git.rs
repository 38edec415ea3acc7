use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::JobError;

/// Materializes a remote repository into an existing, empty directory.
#[async_trait]
pub trait RepoCloner: Send + Sync {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), JobError>;
}

/// Clones with the `git` executable. Every branch is fetched; clones are
/// never shallow.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl RepoCloner for GitCli {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), JobError> {
        debug!("Running {} clone {} into {}", self.binary, url, dest.display());

        let output = Command::new(&self.binary)
            .arg("clone")
            .arg("--no-single-branch")
            .arg("--quiet")
            .arg("--")
            .arg(url)
            .arg(dest)
            // Fail on auth prompts instead of hanging the worker.
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| JobError::CloneFailed(format!("failed to run {}: {}", self.binary, e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = stderr.trim();
        Err(JobError::CloneFailed(if message.is_empty() {
            format!("git exited with {}", output.status)
        } else {
            message.to_string()
        }))
    }
}
