//! OpenAI client tests against a local mock server, plus prompt assembly.

use std::time::Duration;

use serde_json::{Value, json};
use talkback::briefing::generator::{
    ContentGenerator, GenerationError, GenerationRequest, OpenAiGenerator, OpenAiSettings,
    build_prompt, error_markdown,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(base_url: &str) -> OpenAiSettings {
    OpenAiSettings {
        api_key: "test-key".to_string(),
        base_url: base_url.to_string(),
        model: "gpt-4.1-nano".to_string(),
        max_tokens: 1500,
        timeout: Duration::from_secs(5),
    }
}

fn request() -> GenerationRequest {
    GenerationRequest {
        context: "Internal tech talk".to_string(),
        content: "Async Rust in practice".to_string(),
        feedback: vec!["What about cancellation?".to_string(), "More examples".to_string()],
    }
}

fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content }, "finish_reason": "stop" }
        ]
    })
}

// ============================================================================
// HTTP CLIENT
// ============================================================================

#[tokio::test]
async fn test_generate_sends_chat_completion_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({ "model": "gpt-4.1-nano", "max_tokens": 1500 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("# Async Rust")))
        .expect(1)
        .mount(&server)
        .await;

    let generator = OpenAiGenerator::new(settings(&server.uri())).expect("Failed to build client");
    let text = generator.generate(&request()).await.expect("Generation failed");
    assert_eq!(text, "# Async Rust");

    let received = server.received_requests().await.expect("request recording disabled");
    let body: Value = serde_json::from_slice(&received[0].body).expect("body is not JSON");
    let messages = body["messages"].as_array().expect("messages missing");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[1]["content"], build_prompt(&request()));
}

#[tokio::test]
async fn test_fenced_response_is_unwrapped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("```markdown\n# Async Rust\n\n- Pinning\n```\n")),
        )
        .mount(&server)
        .await;

    let generator = OpenAiGenerator::new(settings(&server.uri())).unwrap();
    let text = generator.generate(&request()).await.unwrap();
    assert_eq!(text, "# Async Rust\n\n- Pinning");
}

#[tokio::test]
async fn test_fence_only_response_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("```markdown\n```")))
        .mount(&server)
        .await;

    let generator = OpenAiGenerator::new(settings(&server.uri())).unwrap();
    let err = generator.generate(&request()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Malformed(_)));
}

#[tokio::test]
async fn test_trailing_slash_in_base_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let generator = OpenAiGenerator::new(settings(&format!("{}/", server.uri()))).unwrap();
    assert_eq!(generator.generate(&request()).await.unwrap(), "ok");
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limit exceeded"))
        .mount(&server)
        .await;

    let generator = OpenAiGenerator::new(settings(&server.uri())).unwrap();
    let err = generator.generate(&request()).await.unwrap_err();

    match &err {
        GenerationError::Status { status, body } => {
            assert_eq!(*status, 429);
            assert_eq!(body, "rate limit exceeded");
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert!(error_markdown(&err).contains("429"));
}

#[tokio::test]
async fn test_unparseable_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let generator = OpenAiGenerator::new(settings(&server.uri())).unwrap();
    let err = generator.generate(&request()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Malformed(_)));
}

#[tokio::test]
async fn test_empty_choices_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let generator = OpenAiGenerator::new(settings(&server.uri())).unwrap();
    let err = generator.generate(&request()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Malformed(_)));
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("too late"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let mut slow = settings(&server.uri());
    slow.timeout = Duration::from_millis(50);
    let generator = OpenAiGenerator::new(slow).unwrap();

    let err = generator.generate(&request()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Transport(_)));
}

// ============================================================================
// PROMPT
// ============================================================================

#[test]
fn test_prompt_without_feedback_has_no_feedback_section() {
    let prompt = build_prompt(&GenerationRequest {
        context: "ctx".to_string(),
        content: "body".to_string(),
        feedback: vec![],
    });

    assert!(prompt.contains("# Presentation context\nctx"));
    assert!(prompt.contains("# Presentation content\nbody"));
    assert!(!prompt.contains("# Audience feedback"));
}

#[test]
fn test_prompt_lists_feedback_in_order() {
    let prompt = build_prompt(&request());

    let first = prompt.find("- What about cancellation?\n").expect("first item missing");
    let second = prompt.find("- More examples\n").expect("second item missing");
    assert!(first < second);
    assert!(prompt.find("# Audience feedback and questions").unwrap() < first);
    assert!(prompt.find("# Presentation content").unwrap() < first);
}
