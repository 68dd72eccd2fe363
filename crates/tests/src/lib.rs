//! Fixtures shared by the HTTP integration tests.

use axum::Router;
use chatbot_api::{build_router, ApiState, ServerConfig};
use chatbot_responder::{MemoryOutbox, Outbox};
use serde_json::{json, Value};

pub const TEST_SENDER: &str = "50584593041";

/// Router wired to an in-memory outbox so delivered replies can be inspected.
pub fn test_app(config: ServerConfig) -> (Router, MemoryOutbox) {
    let outbox = MemoryOutbox::new();
    let state = ApiState::new(&config, Outbox::Memory(outbox.clone()))
        .expect("test state should build");
    (build_router(state), outbox)
}

pub fn message_event(messages: Vec<Value>) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "102290129340398",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {
                        "display_phone_number": "15550783881",
                        "phone_number_id": "106540352242922"
                    },
                    "messages": messages
                }
            }]
        }]
    })
}

pub fn text_message(from: &str, body: &str) -> Value {
    json!({
        "from": from,
        "id": format!("wamid.{from}.{}", body.len()),
        "timestamp": "1750090702",
        "type": "text",
        "text": { "body": body }
    })
}
