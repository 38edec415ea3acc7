use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of the optional config file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "codereview";

/// Which model backend answers `analyze_code` calls. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackendKind {
    OpenAi,
    DeepSeek,
    Local,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "deepseek" => Ok(Self::DeepSeek),
            "local" => Ok(Self::Local),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl TryFrom<String> for BackendKind {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BackendKind> for String {
    fn from(kind: BackendKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OpenAi => "openai",
            Self::DeepSeek => "deepseek",
            Self::Local => "local",
        };
        f.write_str(name)
    }
}

/// Service settings. Field names double as environment variable names
/// (`OPENAI_API_KEY`, `REPO_STORAGE_PATH`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub repo_storage_path: PathBuf,
    pub llm_provider: BackendKind,

    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_api_url: String,

    #[serde(skip_serializing)]
    pub deepseek_api_key: Option<String>,
    pub deepseek_model: String,
    pub deepseek_api_url: String,

    pub local_model_url: String,

    pub request_timeout_secs: u64,
    pub clone_workers: usize,
    pub job_history_limit: usize,
    pub git_binary: String,

    pub log_level: String,
    pub log_json: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            repo_storage_path: PathBuf::from("/repos"),
            llm_provider: BackendKind::OpenAi,
            openai_api_key: None,
            openai_model: "gpt-3.5-turbo".to_string(),
            openai_api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            deepseek_api_key: None,
            deepseek_model: "deepseek-chat".to_string(),
            deepseek_api_url: "https://api.deepseek.com/v1/chat/completions".to_string(),
            local_model_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 60,
            clone_workers: 4,
            job_history_limit: crate::jobs::DEFAULT_JOB_HISTORY_LIMIT,
            git_binary: "git".to_string(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl ServiceConfig {
    /// Load defaults, then the config file, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(path, Environment::default().try_parsing(true))
    }

    pub fn load_from(path: Option<&Path>, environment: Environment) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: ServiceConfig = Config::builder()
            .add_source(file)
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        Ok(config.normalized())
    }

    // Empty env values (`OPENAI_API_KEY=`) count as unset.
    fn normalized(mut self) -> Self {
        self.openai_api_key = self.openai_api_key.filter(|key| !key.trim().is_empty());
        self.deepseek_api_key = self.deepseek_api_key.filter(|key| !key.trim().is_empty());
        self.clone_workers = self.clone_workers.max(1);
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
