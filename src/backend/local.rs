use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use super::{suggestions, ModelBackend, SYSTEM_PROMPT};
use crate::config::ServiceConfig;
use crate::error::BackendError;

const NAME: &str = "Local LLM";

/// Self-hosted text-generation endpoint (`POST {base}/generate`).
#[derive(Debug, Clone)]
pub struct LocalBackend {
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: GenerateParameters,
}

#[derive(Debug, Serialize)]
struct GenerateParameters {
    max_new_tokens: u32,
    temperature: f32,
    top_p: f32,
    return_full_text: bool,
}

impl Default for GenerateParameters {
    fn default() -> Self {
        Self {
            max_new_tokens: 500,
            temperature: 0.7,
            top_p: 0.95,
            return_full_text: false,
        }
    }
}

pub fn local_prompt(code: &str) -> String {
    format!(
        "<|system|>{}\n\n<|user|>Please review this Python function:\n\n{}\n\nProvide your suggestions as a numbered list.\n\n<|assistant|>",
        SYSTEM_PROMPT, code
    )
}

/// Pull suggestions out of whatever shape the generation server returned.
pub fn extract_suggestions(body: &Value) -> Result<Vec<String>, String> {
    if let Some(items) = body.get("suggestions").and_then(Value::as_array) {
        return Ok(suggestions::from_json_array(items));
    }

    // Some servers wrap the result in a one-element list.
    let generated = match body {
        Value::Array(items) => items.first().and_then(|item| item.get("generated_text")),
        other => other.get("generated_text"),
    };

    match generated {
        Some(Value::String(text)) => Ok(suggestions::parse_generated_text(text)),
        Some(_) => Err("generated_text is not a string".to_string()),
        None => Err("response has neither generated_text nor suggestions".to_string()),
    }
}

impl LocalBackend {
    pub fn new(config: &ServiceConfig, client: Client) -> Self {
        info!("Initializing Local LLM provider");
        Self {
            base_url: config.local_model_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn generate_url(&self) -> String {
        format!("{}/generate", self.base_url)
    }
}

#[async_trait]
impl ModelBackend for LocalBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn analyze_code(&self, code: &str) -> Result<Vec<String>, BackendError> {
        let prompt = local_prompt(code);
        let request = GenerateRequest {
            inputs: &prompt,
            parameters: GenerateParameters::default(),
        };

        info!("Sending request to Local LLM");
        let response = self
            .client
            .post(self.generate_url())
            .json(&request)
            .send()
            .await
            .map_err(|source| {
                error!("HTTP error communicating with Local LLM: {}", source);
                BackendError::Transport {
                    backend: NAME,
                    source,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Local LLM error {}: {}", status, body);
            return Err(BackendError::Status {
                backend: NAME,
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| BackendError::MalformedResponse {
                backend: NAME,
                reason: e.to_string(),
            })?;

        info!("Successfully received response from Local LLM");
        extract_suggestions(&body).map_err(|reason| BackendError::MalformedResponse {
            backend: NAME,
            reason,
        })
    }
}
