//! Contract tests for the chat completion client against a mock OpenAI-compatible server.

use chefspeak_core::{
    parse_steps, ChatCompletion, ChatError, ChatMessage, Language, OpenAiChat, RecipeClient, RecipeSource,
    StepFormat,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

fn client(server: &MockServer) -> OpenAiChat {
    OpenAiChat::new("test-key").with_base_url(format!("{}/v1", server.uri()))
}

#[tokio::test]
async fn sends_model_messages_temperature_and_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "Hello"}],
            "temperature": 0.5
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Hi")))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client(&server)
        .complete(&[ChatMessage::user("Hello")], 0.5)
        .await
        .expect("completion should succeed");
    assert_eq!(reply, "Hi");
}

#[tokio::test]
async fn error_status_is_reported_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let err = client(&server)
        .complete(&[ChatMessage::user("Hello")], 0.7)
        .await
        .unwrap_err();
    match err {
        ChatError::Status { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("invalid api key"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn reply_without_choices_is_empty_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = client(&server)
        .complete(&[ChatMessage::user("Hello")], 0.7)
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::EmptyReply));
}

#[tokio::test]
async fn malformed_json_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = client(&server)
        .complete(&[ChatMessage::user("Hello")], 0.7)
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Decode(_)));
}

#[tokio::test]
async fn recipe_reply_feeds_the_step_parser() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "Here you go:\nStep 1: Soak the rice.\nStep 2: Grind with urad dal.\nStep 3: Ferment overnight.",
        )))
        .mount(&server)
        .await;

    let recipes = RecipeClient::new(client(&server));
    let reply = recipes.fetch_recipe("idli", Language::English).await.unwrap();
    assert_eq!(
        parse_steps(&reply, StepFormat::Auto),
        vec![
            "Step 1: Soak the rice.",
            "Step 2: Grind with urad dal.",
            "Step 3: Ferment overnight."
        ]
    );
}
