pub mod backend;
pub mod config;
pub mod error;
pub mod jobs;
pub mod locator;
pub mod logging;
pub mod orchestrator;
pub mod server;

// Re-export commonly used types
pub use backend::{ChatCompletionBackend, LocalBackend, ModelBackend};
pub use config::{BackendKind, ServiceConfig};
pub use error::{AnalysisError, BackendError, ConfigError, JobError, LocateError, Result, ServiceError};
pub use jobs::{CloneJobRunner, GitCli, JobRecord, JobStatus, RepoCloner};
pub use locator::{locate, ExtractedFunction, FunctionPath};
pub use orchestrator::AnalysisOrchestrator;
pub use server::AppState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
