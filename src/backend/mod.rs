//! Model backends that turn a function's source into review suggestions.
//!
//! Every variant speaks a different wire format but answers the same
//! question; the variant is picked once from configuration.

pub mod chat;
pub mod local;
pub mod suggestions;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use crate::config::{BackendKind, ServiceConfig};
use crate::error::{BackendError, ConfigError};

pub use chat::ChatCompletionBackend;
pub use local::LocalBackend;

pub const SYSTEM_PROMPT: &str = "You are a code review expert. Analyze the given Python function and provide a list of suggestions for improvement.";

pub fn user_prompt(code: &str) -> String {
    format!("Please review this Python function:\n\n{}", code)
}

#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Ordered improvement suggestions for `code`.
    async fn analyze_code(&self, code: &str) -> Result<Vec<String>, BackendError>;
}

pub fn http_client(config: &ServiceConfig) -> Result<Client, ConfigError> {
    Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

/// Build the backend selected by `llm_provider`.
pub fn from_config(config: &ServiceConfig) -> Result<Arc<dyn ModelBackend>, ConfigError> {
    let client = http_client(config)?;
    let backend: Arc<dyn ModelBackend> = match config.llm_provider {
        BackendKind::OpenAi => Arc::new(ChatCompletionBackend::openai(config, client)?),
        BackendKind::DeepSeek => Arc::new(ChatCompletionBackend::deepseek(config, client)?),
        BackendKind::Local => Arc::new(LocalBackend::new(config, client)),
    };
    info!("Using LLM provider: {}", config.llm_provider);
    Ok(backend)
}
