// Model backends against stubbed HTTP endpoints
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use codereview::backend::{self, http_client};
use codereview::{
    AnalysisError, AnalysisOrchestrator, BackendError, BackendKind, ChatCompletionBackend,
    CloneJobRunner, JobError, LocalBackend, ModelBackend, RepoCloner, ServiceConfig,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_reply(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": content}}
        ]
    })
}

fn openai_config(server: &MockServer) -> ServiceConfig {
    ServiceConfig {
        llm_provider: BackendKind::OpenAi,
        openai_api_key: Some("sk-test".to_string()),
        openai_api_url: format!("{}/v1/chat/completions", server.uri()),
        ..ServiceConfig::default()
    }
}

fn deepseek_config(server: &MockServer) -> ServiceConfig {
    ServiceConfig {
        llm_provider: BackendKind::DeepSeek,
        deepseek_api_key: Some("ds-test".to_string()),
        deepseek_api_url: format!("{}/v1/chat/completions", server.uri()),
        ..ServiceConfig::default()
    }
}

fn local_config(server: &MockServer) -> ServiceConfig {
    ServiceConfig {
        llm_provider: BackendKind::Local,
        local_model_url: server.uri(),
        ..ServiceConfig::default()
    }
}

#[tokio::test]
async fn test_openai_suggestions_are_cleaned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-3.5-turbo"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
            "- Add type hints\n\n- Add docstring\n",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let config = openai_config(&server);
    let backend = backend::from_config(&config).unwrap();
    let suggestions = backend.analyze_code("def add(a, b): return a + b").await.unwrap();

    assert_eq!(backend.name(), "OpenAI");
    assert_eq!(suggestions, vec!["Add type hints", "Add docstring"]);
}

#[tokio::test]
async fn test_deepseek_sends_sampling_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer ds-test"))
        .and(body_partial_json(json!({
            "model": "deepseek-chat",
            "max_tokens": 500
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
            "1. Validate inputs\n2. Handle overflow",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let config = deepseek_config(&server);
    let backend = ChatCompletionBackend::deepseek(&config, http_client(&config).unwrap()).unwrap();
    let suggestions = backend.analyze_code("def f(): pass").await.unwrap();

    assert_eq!(suggestions, vec!["Validate inputs", "Handle overflow"]);
}

#[tokio::test]
async fn test_non_success_status_is_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let config = deepseek_config(&server);
    let backend = backend::from_config(&config).unwrap();
    let err = backend.analyze_code("def f(): pass").await.unwrap_err();

    match err {
        BackendError::Status { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_chat_body_without_choices_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let backend = backend::from_config(&openai_config(&server)).unwrap();
    let err = backend.analyze_code("def f(): pass").await.unwrap_err();
    assert!(matches!(err, BackendError::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_local_backend_reads_generated_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(body_partial_json(json!({
            "parameters": {"max_new_tokens": 500, "return_full_text": false}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "generated_text": "1. Add type hints\n2. Add docstring"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = local_config(&server);
    let backend = LocalBackend::new(&config, http_client(&config).unwrap());
    let suggestions = backend.analyze_code("def f(): pass").await.unwrap();

    assert_eq!(suggestions, vec!["Add type hints", "Add docstring"]);
}

#[tokio::test]
async fn test_local_backend_accepts_json_suggestions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "generated_text": "{\"suggestions\": [\"Add type hints\", \"Add docstring\"]}"
        })))
        .mount(&server)
        .await;

    let backend = backend::from_config(&local_config(&server)).unwrap();
    let suggestions = backend.analyze_code("def f(): pass").await.unwrap();
    assert_eq!(suggestions, vec!["Add type hints", "Add docstring"]);
}

#[tokio::test]
async fn test_local_backend_non_json_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let backend = backend::from_config(&local_config(&server)).unwrap();
    let err = backend.analyze_code("def f(): pass").await.unwrap_err();
    assert!(matches!(err, BackendError::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let config = ServiceConfig {
        llm_provider: BackendKind::Local,
        local_model_url: "http://127.0.0.1:9".to_string(),
        ..ServiceConfig::default()
    };
    let backend = backend::from_config(&config).unwrap();
    let err = backend.analyze_code("def f(): pass").await.unwrap_err();
    assert!(matches!(err, BackendError::Transport { .. }));
}

struct NoopCloner;

#[async_trait]
impl RepoCloner for NoopCloner {
    async fn clone_repo(&self, _url: &str, _dest: &Path) -> Result<(), JobError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_backend_error_is_attributed_after_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"model": "gpt-3.5-turbo"})))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .expect(1)
        .mount(&server)
        .await;

    let storage = tempfile::tempdir().unwrap();
    let repo = storage.path().join("job-1");
    std::fs::create_dir_all(&repo).unwrap();
    std::fs::write(repo.join("calc.py"), "def total(items):\n    return sum(items)\n").unwrap();

    let jobs = CloneJobRunner::new(storage.path(), Arc::new(NoopCloner), 1);
    let backend: Arc<dyn ModelBackend> = backend::from_config(&openai_config(&server)).unwrap();
    let orchestrator = AnalysisOrchestrator::new(jobs, backend);

    let extracted = orchestrator.extract("job-1", "calc.total").await.unwrap();
    assert!(extracted.source.contains("def total(items):"));

    let err = orchestrator.analyze("job-1", "calc.total").await.unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::Backend(BackendError::Status { status: 429, .. })
    ));
}
