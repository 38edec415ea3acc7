use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{suggestions, user_prompt, ModelBackend, SYSTEM_PROMPT};
use crate::config::ServiceConfig;
use crate::error::{BackendError, ConfigError};

/// Hosted chat-completion API (OpenAI and DeepSeek share the wire format).
#[derive(Debug, Clone)]
pub struct ChatCompletionBackend {
    name: &'static str,
    api_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl ChatCompletionBackend {
    pub fn openai(config: &ServiceConfig, client: Client) -> Result<Self, ConfigError> {
        let api_key = config.openai_api_key.clone().ok_or_else(|| {
            error!("OpenAI API key is not set");
            ConfigError::MissingCredential {
                backend: "OpenAI",
                key: "OPENAI_API_KEY",
            }
        })?;
        info!("Initializing OpenAI provider");

        Ok(Self {
            name: "OpenAI",
            api_url: config.openai_api_url.clone(),
            api_key,
            model: config.openai_model.clone(),
            temperature: None,
            max_tokens: None,
            client,
        })
    }

    pub fn deepseek(config: &ServiceConfig, client: Client) -> Result<Self, ConfigError> {
        let api_key = config.deepseek_api_key.clone().ok_or_else(|| {
            error!("Deepseek API key is not set");
            ConfigError::MissingCredential {
                backend: "Deepseek",
                key: "DEEPSEEK_API_KEY",
            }
        })?;
        info!("Initializing Deepseek provider");

        Ok(Self {
            name: "Deepseek",
            api_url: config.deepseek_api_url.clone(),
            api_key,
            model: config.deepseek_model.clone(),
            temperature: Some(0.7),
            max_tokens: Some(500),
            client,
        })
    }
}

#[async_trait]
impl ModelBackend for ChatCompletionBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn analyze_code(&self, code: &str) -> Result<Vec<String>, BackendError> {
        let user = user_prompt(code);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        info!("Sending request to {} API", self.name);
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|source| {
                error!("Connection error to {} API: {}", self.name, source);
                BackendError::Transport {
                    backend: self.name,
                    source,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("{} API error {}: {}", self.name, status, body);
            return Err(BackendError::Status {
                backend: self.name,
                status: status.as_u16(),
                body,
            });
        }

        let malformed = |reason: String| BackendError::MalformedResponse {
            backend: self.name,
            reason,
        };

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| malformed(e.to_string()))?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| malformed("response has no message content".to_string()))?;

        info!("Successfully received response from {} API", self.name);
        Ok(suggestions::parse_lines(&content))
    }
}
