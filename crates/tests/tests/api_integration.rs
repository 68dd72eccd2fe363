use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chatbot_api::{build_router, sign_payload, ApiState, ServerConfig, DEFAULT_VERIFY_TOKEN};
use chatbot_core::ClassifierConfig;
use chatbot_responder::{MemoryOutbox, Outbox, WhatsAppConfig, WhatsAppSender};
use chatbot_tests::{message_event, test_app, text_message, TEST_SENDER};
use serde_json::json;
use tower::ServiceExt;

fn post_webhook(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_reports_stages_and_backend() {
    let (app, _) = test_app(ServerConfig::default());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(parsed["status"], "ok");
    assert_eq!(parsed["capabilities"]["delivery_backend"], "memory");
    assert_eq!(parsed["capabilities"]["stages"][0], "command");
    assert_eq!(parsed["capabilities"]["stages"][6], "frequency");
}

#[tokio::test]
async fn verification_echoes_challenge_for_valid_token() {
    let (app, _) = test_app(ServerConfig::default());

    let uri = format!(
        "/webhook?hub.mode=subscribe&hub.verify_token={}&hub.challenge=1158201444",
        DEFAULT_VERIFY_TOKEN
    );
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "1158201444");
}

#[tokio::test]
async fn verification_rejects_wrong_token() {
    let (app, _) = test_app(ServerConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/webhook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bare_webhook_visit_gets_status_message() {
    let (app, _) = test_app(ServerConfig::default());

    let response = app
        .oneshot(Request::builder().uri("/webhook").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.starts_with("Webhook activo"));
}

#[tokio::test]
async fn inbound_text_is_answered_through_outbox() {
    let (app, outbox) = test_app(ServerConfig::default());

    let event = message_event(vec![text_message(TEST_SENDER, "Hola Meydell")]);
    let response = app.oneshot(post_webhook(event.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let sent = outbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, TEST_SENDER);
    assert_eq!(sent[0].text, ClassifierConfig::default().name_mention_reply);
}

#[tokio::test]
async fn every_message_in_a_batch_is_answered() {
    let (app, outbox) = test_app(ServerConfig::default());

    let event = message_event(vec![
        text_message(TEST_SENDER, "/menu"),
        text_message("50588887777", "pan pan queso queso pan"),
    ]);
    let response = app.oneshot(post_webhook(event.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let sent = outbox.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].text.contains("Menú del Bot"));
    assert_eq!(sent[1].to, "50588887777");
    assert!(sent[1].text.ends_with("pan (3×), queso (2×)"));
}

#[tokio::test]
async fn malformed_payload_is_still_acknowledged() {
    let (app, outbox) = test_app(ServerConfig::default());

    let response = app
        .oneshot(post_webhook("{not json".to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(outbox.is_empty());
}

#[tokio::test]
async fn status_only_events_send_nothing() {
    let (app, outbox) = test_app(ServerConfig::default());

    let event = json!({
        "object": "whatsapp_business_account",
        "entry": [{ "changes": [{ "value": { "statuses": [{ "status": "read" }] } }] }]
    });
    let response = app.oneshot(post_webhook(event.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(outbox.is_empty());
}

#[tokio::test]
async fn signed_webhooks_require_valid_signature() {
    let config = ServerConfig {
        app_secret: Some("app-secret".to_string()),
        ..ServerConfig::default()
    };
    let (app, outbox) = test_app(config);
    let body = message_event(vec![text_message(TEST_SENDER, "gracias")]).to_string();

    let unsigned = app.clone().oneshot(post_webhook(body.clone())).await.unwrap();
    assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);
    assert!(outbox.is_empty());

    let signature = sign_payload(body.as_bytes(), "app-secret").unwrap();
    let mut signed = post_webhook(body);
    signed
        .headers_mut()
        .insert("x-hub-signature-256", signature.parse().unwrap());
    let response = app.oneshot(signed).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox.sent()[0].text, ClassifierConfig::default().phrases[0].reply);
}

#[tokio::test]
async fn failed_delivery_is_still_acknowledged() {
    let mut whatsapp = WhatsAppConfig::new("test-token", "106540352242922");
    whatsapp.api_base = "http://127.0.0.1:1".to_string();
    let sender = WhatsAppSender::new(whatsapp).unwrap();
    let state = ApiState::new(&ServerConfig::default(), Outbox::WhatsApp(sender)).unwrap();
    let metrics = state.metrics.clone();
    let app = build_router(state);

    let event = message_event(vec![text_message(TEST_SENDER, "hola")]);
    let response = app.oneshot(post_webhook(event.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.delivery_failures_total, 1);
    assert_eq!(snapshot.replies_delivered_total, 0);
}

#[tokio::test]
async fn memory_fallback_keeps_only_latest_replies() {
    let outbox = MemoryOutbox::with_capacity(2);
    let state = ApiState::new(&ServerConfig::default(), Outbox::Memory(outbox.clone())).unwrap();
    let app = build_router(state);

    let event = message_event(vec![
        text_message(TEST_SENDER, "hola"),
        text_message(TEST_SENDER, "gracias"),
        text_message(TEST_SENDER, "/menu"),
    ]);
    let response = app.oneshot(post_webhook(event.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let sent = outbox.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].text, ClassifierConfig::default().phrases[0].reply);
    assert!(sent[1].text.contains("Menú del Bot"));
}
