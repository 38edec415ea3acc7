use std::path::PathBuf;

use thiserror::Error;

/// Failures while resolving a dotted path to a function definition.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("invalid function path '{path}': {reason}")]
    InvalidFunctionPath { path: String, reason: &'static str },

    #[error("module not found: {}", .path.display())]
    ModuleNotFound { path: PathBuf },

    #[error("module {} resolves outside the repository", .path.display())]
    OutsideRepository { path: PathBuf },

    #[error("failed to parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("function '{name}' not found in {}", .path.display())]
    FunctionNotFound { name: String, path: PathBuf },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("repository URL must not be empty")]
    EmptyUrl,

    #[error("invalid job id '{0}'")]
    InvalidJobId(String),

    #[error("failed to prepare {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("clone failed: {0}")]
    CloneFailed(String),
}

/// Failures talking to a model backend. Always attributable to the
/// backend call, never to the repository lookup that preceded it.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to connect to {backend}: {source}")]
    Transport {
        backend: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{backend} returned {status}: {body}")]
    Status {
        backend: &'static str,
        status: u16,
        body: String,
    },

    #[error("malformed response from {backend}: {reason}")]
    MalformedResponse {
        backend: &'static str,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("unsupported LLM provider: {0}")]
    UnknownBackend(String),

    #[error("{backend} API key is not set ({key})")]
    MissingCredential {
        backend: &'static str,
        key: &'static str,
    },

    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no job with id '{job_id}'")]
    JobNotFound { job_id: String },

    #[error("repository for job '{job_id}' is not ready yet")]
    JobNotReady { job_id: String },

    #[error("job '{job_id}' failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("function lookup failed: {0}")]
    Lookup(#[from] LocateError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Top level error surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_error_keeps_cause() {
        let err = AnalysisError::from(LocateError::FunctionNotFound {
            name: "helper".to_string(),
            path: PathBuf::from("/repos/abc/pkg/mod.py"),
        });

        let message = err.to_string();
        assert!(message.contains("function lookup failed"));
        assert!(message.contains("helper"));
        assert!(matches!(err, AnalysisError::Lookup(LocateError::FunctionNotFound { .. })));
    }

    #[test]
    fn test_missing_credential_message() {
        let err = ConfigError::MissingCredential {
            backend: "OpenAI",
            key: "OPENAI_API_KEY",
        };
        assert_eq!(err.to_string(), "OpenAI API key is not set (OPENAI_API_KEY)");
    }
}
