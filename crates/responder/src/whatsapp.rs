use std::env;
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::outbox::{validate_outbound, OutboundSink, SendError};

pub const DEFAULT_API_BASE: &str = "https://graph.facebook.com";
pub const DEFAULT_API_VERSION: &str = "v22.0";

#[derive(Clone)]
pub struct WhatsAppConfig {
    pub token: String,
    pub phone_number_id: String,
    pub api_base: String,
    pub api_version: String,
}

impl fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("token", &"<redacted>")
            .field("phone_number_id", &self.phone_number_id)
            .field("api_base", &self.api_base)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl WhatsAppConfig {
    pub fn new(token: &str, phone_number_id: &str) -> Self {
        Self {
            token: token.to_string(),
            phone_number_id: phone_number_id.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    /// Returns `None` unless both `WHATSAPP_TOKEN` and
    /// `WHATSAPP_PHONE_NUMBER_ID` are set.
    pub fn from_env() -> Option<Self> {
        let token = non_empty_env("WHATSAPP_TOKEN")?;
        let phone_number_id = non_empty_env("WHATSAPP_PHONE_NUMBER_ID")?;

        Some(Self {
            token,
            phone_number_id,
            api_base: non_empty_env("WHATSAPP_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_version: non_empty_env("WHATSAPP_API_VERSION")
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        })
    }

    pub fn messages_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.api_base.trim_end_matches('/'),
            self.api_version,
            self.phone_number_id
        )
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn text_message_payload(to: &str, body: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": "text",
        "text": {
            "body": body
        }
    })
}

/// Client for the WhatsApp Cloud API `messages` endpoint.
#[derive(Clone)]
pub struct WhatsAppSender {
    http_client: Client,
    config: WhatsAppConfig,
}

impl WhatsAppSender {
    pub fn new(config: WhatsAppConfig) -> Result<Self> {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(6))
            .timeout(Duration::from_secs(20))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &WhatsAppConfig {
        &self.config
    }
}

impl OutboundSink for WhatsAppSender {
    fn backend(&self) -> &'static str {
        "whatsapp"
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<(), SendError> {
        validate_outbound(to, text)?;

        debug!(to = %to, "sending WhatsApp message");
        let response = self
            .http_client
            .post(self.config.messages_url())
            .bearer_auth(self.config.token.as_str())
            .json(&text_message_payload(to, text))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SendError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(to = %to, status = status.as_u16(), response = %body, "WhatsApp API accepted message");
        Ok(())
    }
}
