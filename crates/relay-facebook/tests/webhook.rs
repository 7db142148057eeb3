//! Integration tests: drive the webhook router end to end, with the Graph API
//! and Gemini stood up on local mock servers.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use relay_core::{Config, FALLBACK_REPLY};
use relay_facebook::handler::{GREETING_PROMPT, NOT_CONFIGURED_NOTICE, START_ACK};
use relay_facebook::{MessageHandler, create_router};

const VERIFY_TOKEN: &str = "test-verify";
const PAGE_TOKEN: &str = "page-token";

struct TestEnv {
    graph: MockServer,
    router: Router,
}

async fn graph_server() -> MockServer {
    let graph = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/me/messages"))
        .and(query_param("access_token", PAGE_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "recipient_id": "U1",
            "message_id": "m_1"
        })))
        .mount(&graph)
        .await;
    graph
}

fn config(graph: &MockServer, gemini: Option<&MockServer>) -> Config {
    let mut config = Config::default();
    config.facebook.page_access_token = Some(PAGE_TOKEN.to_string());
    config.facebook.verify_token = VERIFY_TOKEN.to_string();
    config.facebook.graph_url = graph.uri();
    if let Some(gemini) = gemini {
        config.llm.api_key = Some("gemini-key".to_string());
        config.llm.base_url = gemini.uri();
    }
    config
}

async fn setup(gemini: Option<&MockServer>) -> TestEnv {
    let graph = graph_server().await;
    let handler = MessageHandler::from_config(&config(&graph, gemini)).unwrap();
    TestEnv {
        router: create_router(Arc::new(handler)),
        graph,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

async fn post_webhook(router: &Router, body: impl Into<Body>) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    send(router, request).await
}

async fn get(router: &Router, uri: &str) -> (StatusCode, String) {
    send(router, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

fn page_event(sender: Value, text: &str) -> String {
    json!({
        "object": "page",
        "entry": [{"messaging": [{"sender": sender, "message": {"text": text}}]}]
    })
    .to_string()
}

/// Texts sent through the Send API, in order
async fn sent_texts(graph: &MockServer) -> Vec<(String, String)> {
    graph
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| {
            let body: Value = serde_json::from_slice(&r.body).unwrap();
            (
                body["recipient"]["id"].as_str().unwrap().to_string(),
                body["message"]["text"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

#[tokio::test]
async fn health_check_responds() {
    let env = setup(None).await;
    let (status, body) = get(&env.router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Facebook Gemini Bot is running.");
}

#[tokio::test]
async fn verification_echoes_challenge() {
    let env = setup(None).await;
    let (status, body) = get(
        &env.router,
        "/webhook?hub.mode=subscribe&hub.verify_token=test-verify&hub.challenge=CHALLENGE_ACCEPTED",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "CHALLENGE_ACCEPTED");
}

#[tokio::test]
async fn verification_without_challenge_returns_empty_body() {
    let env = setup(None).await;
    let (status, body) = get(&env.router, "/webhook?hub.mode=subscribe&hub.verify_token=test-verify").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "");
}

#[tokio::test]
async fn verification_with_repeated_params_is_forbidden() {
    let env = setup(None).await;

    for uri in [
        "/webhook?hub.mode=subscribe&hub.mode=subscribe&hub.verify_token=test-verify&hub.challenge=c",
        "/webhook?hub.mode=subscribe&hub.verify_token=test-verify&hub.verify_token=test-verify&hub.challenge=c",
    ] {
        let (status, _) = get(&env.router, uri).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
    }
}

#[tokio::test]
async fn verification_mismatch_is_forbidden() {
    let env = setup(None).await;

    for uri in [
        "/webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=c",
        "/webhook?hub.mode=unsubscribe&hub.verify_token=test-verify&hub.challenge=c",
        "/webhook?hub.verify_token=test-verify&hub.challenge=c",
        "/webhook",
    ] {
        let (status, _) = get(&env.router, uri).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
    }
}

#[tokio::test]
async fn start_chat_without_gemini_sends_notice() {
    let env = setup(None).await;
    let (status, body) = post_webhook(&env.router, page_event(json!({"id": "U1"}), "start chat")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "EVENT_RECEIVED");
    assert_eq!(
        sent_texts(&env.graph).await,
        vec![
            ("U1".to_string(), START_ACK.to_string()),
            ("U1".to_string(), NOT_CONFIGURED_NOTICE.to_string()),
        ]
    );
}

#[tokio::test]
async fn start_chat_with_gemini_relays_greeting() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .and(wiremock::matchers::body_json(json!({
            "contents": [{"role": "user", "parts": [{"text": GREETING_PROMPT}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "Hi there! How can I help?"}]}}]
        })))
        .expect(1)
        .mount(&gemini)
        .await;

    let env = setup(Some(&gemini)).await;
    let (status, _) = post_webhook(&env.router, page_event(json!({"id": "U1"}), "  Start Chat ")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        sent_texts(&env.graph).await,
        vec![
            ("U1".to_string(), START_ACK.to_string()),
            ("U1".to_string(), "Hi there! How can I help?".to_string()),
        ]
    );
}

#[tokio::test]
async fn gemini_failure_relays_fallback() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&gemini)
        .await;

    let env = setup(Some(&gemini)).await;
    let (status, _) = post_webhook(&env.router, page_event(json!({"id": "U1"}), "start chat")).await;

    assert_eq!(status, StatusCode::OK);
    let texts = sent_texts(&env.graph).await;
    assert_eq!(texts.len(), 2);
    assert_eq!(texts[1].1, FALLBACK_REPLY);
}

#[tokio::test]
async fn other_text_is_echoed() {
    let env = setup(None).await;
    let (status, body) = post_webhook(&env.router, page_event(json!({"id": "U1"}), "Hello")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "EVENT_RECEIVED");
    assert_eq!(
        sent_texts(&env.graph).await,
        vec![("U1".to_string(), "I got: Hello".to_string())]
    );
}

#[tokio::test]
async fn missing_sender_makes_no_calls() {
    let env = setup(None).await;
    let body = json!({
        "object": "page",
        "entry": [{"messaging": [
            {"message": {"text": "Hello"}},
            {"sender": {}, "message": {"text": "Hello"}}
        ]}]
    });
    let (status, _) = post_webhook(&env.router, body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert!(sent_texts(&env.graph).await.is_empty());
}

#[tokio::test]
async fn non_page_object_is_not_found() {
    let env = setup(None).await;
    let body = json!({
        "object": "instagram",
        "entry": [{"messaging": [{"sender": {"id": "U1"}, "message": {"text": "Hello"}}]}]
    });
    let (status, _) = post_webhook(&env.router, body.to_string()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(sent_texts(&env.graph).await.is_empty());

    let (status, _) = post_webhook(&env.router, "{}").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_page_object_with_malformed_entry_is_not_found() {
    let env = setup(None).await;

    for body in [r#"{"object":"instagram","entry":{}}"#, r#"{"object":"user","entry":"nope"}"#] {
        let (status, _) = post_webhook(&env.router, body).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);
    }
    assert!(sent_texts(&env.graph).await.is_empty());
}

#[tokio::test]
async fn malformed_json_is_server_error() {
    let env = setup(None).await;

    let (status, _) = post_webhook(&env.router, "{\"object\": \"page\", ").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = post_webhook(&env.router, r#"{"object": "page", "entry": "nope"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    assert!(sent_texts(&env.graph).await.is_empty());
}

#[tokio::test]
async fn multiple_events_processed_in_order() {
    let env = setup(None).await;
    let body = json!({
        "object": "page",
        "entry": [
            {"messaging": [
                {"sender": {"id": "U1"}, "message": {"text": "first"}},
                {"sender": {"id": 99}, "message": {"text": "malformed"}},
                {"sender": {"id": "PAGE"}, "message": {"text": "echo", "is_echo": true}}
            ]},
            {"messaging": [{"sender": {"id": "U2"}, "message": {"text": "second"}}]}
        ]
    });
    let (status, _) = post_webhook(&env.router, body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        sent_texts(&env.graph).await,
        vec![
            ("U1".to_string(), "I got: first".to_string()),
            ("U2".to_string(), "I got: second".to_string()),
        ]
    );
}

#[tokio::test]
async fn send_api_failure_is_swallowed() {
    let graph = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/me/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&graph)
        .await;

    let handler = MessageHandler::from_config(&config(&graph, None)).unwrap();
    let router = create_router(Arc::new(handler));
    let (status, body) = post_webhook(&router, page_event(json!({"id": "U1"}), "Hello")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "EVENT_RECEIVED");
}
