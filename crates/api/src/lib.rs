mod signature;
pub mod webhook;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Json, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chatbot_core::{ClassifierConfig, IntentClassifier};
use chatbot_observability::AppMetrics;
use chatbot_responder::{
    ChatResponder, OutboundSink, Outbox, WhatsAppConfig, WhatsAppSender,
    DEFAULT_MEMORY_OUTBOX_CAPACITY,
};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::signature::{tokens_match, verify_meta_signature, SIGNATURE_HEADER};
use crate::webhook::{extract_inbound_messages, WhatsAppWebhook};

pub use crate::signature::sign_payload;

pub const DEFAULT_VERIFY_TOKEN: &str = "miprimertoken";
const MAX_WEBHOOK_BODY_BYTES: usize = 256 * 1024;
const IDLE_WEBHOOK_MESSAGE: &str = "Webhook activo. Esperando validación o eventos desde Meta.";

/// Startup configuration, read from the environment by [`ServerConfig::from_env`].
#[derive(Clone)]
pub struct ServerConfig {
    pub verify_token: String,
    pub app_secret: Option<String>,
    pub rules_path: Option<PathBuf>,
    pub bot_name: Option<String>,
    pub whatsapp: Option<WhatsAppConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            verify_token: DEFAULT_VERIFY_TOKEN.to_string(),
            app_secret: None,
            rules_path: None,
            bot_name: None,
            whatsapp: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            verify_token: non_empty_env("WHATSAPP_VERIFY_TOKEN")
                .unwrap_or_else(|| DEFAULT_VERIFY_TOKEN.to_string()),
            app_secret: non_empty_env("WHATSAPP_APP_SECRET"),
            rules_path: non_empty_env("CHATBOT_RULES_PATH").map(PathBuf::from),
            bot_name: non_empty_env("CHATBOT_BOT_NAME"),
            whatsapp: WhatsAppConfig::from_env(),
        }
    }

    pub fn classifier_config(&self) -> Result<ClassifierConfig> {
        ClassifierConfig::load(self.rules_path.as_deref(), self.bot_name.as_deref())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Clone)]
pub struct ApiState {
    pub responder: Arc<ChatResponder<Outbox>>,
    pub metrics: Arc<AppMetrics>,
    pub verify_token: String,
    pub app_secret: Option<String>,
}

impl ApiState {
    pub fn new(config: &ServerConfig, outbox: Outbox) -> Result<Self> {
        let metrics = AppMetrics::shared();
        let rules = config
            .classifier_config()
            .context("failed to load classifier rules")?;
        let classifier = Arc::new(IntentClassifier::new(rules)?);

        Ok(Self {
            responder: Arc::new(ChatResponder::new(
                classifier,
                Arc::new(outbox),
                metrics.clone(),
            )),
            metrics,
            verify_token: config.verify_token.clone(),
            app_secret: config.app_secret.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: chatbot_observability::MetricsSnapshot,
    capabilities: HealthCapabilities,
}

#[derive(Debug, Serialize)]
struct HealthCapabilities {
    delivery_backend: &'static str,
    signature_verification: bool,
    stages: Vec<&'static str>,
}

#[derive(Debug, Clone, Deserialize)]
struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

pub async fn build_app() -> Result<Router> {
    let config = ServerConfig::from_env();

    let outbox = match config.whatsapp.clone() {
        Some(whatsapp) => {
            info!(phone_number_id = %whatsapp.phone_number_id, "WhatsApp delivery enabled");
            Outbox::WhatsApp(WhatsAppSender::new(whatsapp)?)
        }
        None => {
            warn!(
                capacity = DEFAULT_MEMORY_OUTBOX_CAPACITY,
                "WHATSAPP_TOKEN or WHATSAPP_PHONE_NUMBER_ID missing; latest replies are kept in memory"
            );
            Outbox::memory()
        }
    };

    if config.app_secret.is_none() {
        warn!("WHATSAPP_APP_SECRET not set; webhook signatures are not verified");
    }

    let state = ApiState::new(&config, outbox)?;
    Ok(build_router(state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_WEBHOOK_BODY_BYTES))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        capabilities: HealthCapabilities {
            delivery_backend: state.responder.sink().backend(),
            signature_verification: state.app_secret.is_some(),
            stages: state
                .responder
                .classifier()
                .stages()
                .into_iter()
                .map(|stage| stage.as_code())
                .collect(),
        },
    };
    (StatusCode::OK, Json(payload))
}

async fn verify_webhook(
    State(state): State<ApiState>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let mode = query.mode.unwrap_or_default();
    let token = query.token.unwrap_or_default();
    let challenge = query.challenge.unwrap_or_default();

    // Plain browser visits carry no hub.* parameters.
    if mode.is_empty() && token.is_empty() && challenge.is_empty() {
        return (StatusCode::OK, IDLE_WEBHOOK_MESSAGE).into_response();
    }

    if mode == "subscribe" && tokens_match(token.as_bytes(), state.verify_token.as_bytes()) {
        info!("webhook subscription verified");
        return (StatusCode::OK, challenge).into_response();
    }

    warn!(mode = %mode, "webhook verification rejected");
    StatusCode::UNAUTHORIZED.into_response()
}

/// Meta retries deliveries that are not acknowledged with 200, so every
/// failure past the signature check is logged and swallowed.
async fn receive_webhook(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.metrics.inc_webhook();

    if let Some(secret) = state.app_secret.as_ref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !verify_meta_signature(signature, &body, secret) {
            warn!("webhook signature mismatch");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    debug!(body = %String::from_utf8_lossy(&body), "webhook payload received");

    let payload: WhatsAppWebhook = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            state.metrics.inc_payload_error();
            warn!(error = %err, "malformed webhook payload");
            return StatusCode::OK.into_response();
        }
    };

    let messages = extract_inbound_messages(&payload);
    if messages.is_empty() {
        debug!(object = payload.object.as_deref().unwrap_or_default(), "webhook event without messages");
    }

    for message in &messages {
        if let Err(err) = state.responder.handle_inbound(message).await {
            warn!(from = %message.from, error = %err, "failed to answer inbound message");
        }
    }

    StatusCode::OK.into_response()
}
