//! WhatsApp Cloud API webhook envelope.
//!
//! Only the fields needed to answer text messages are modeled; every field
//! is optional so status callbacks and non-text messages still parse.

use chatbot_core::InboundMessage;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppWebhook {
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entry {
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Change {
    pub field: Option<String>,
    pub value: Option<ChangeValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeValue {
    pub messaging_product: Option<String>,
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
    pub display_phone_number: Option<String>,
    pub phone_number_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Contact {
    pub profile: Option<ContactProfile>,
    pub wa_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactProfile {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    pub from: Option<String>,
    pub id: Option<String>,
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub text: Option<MessageText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageText {
    pub body: Option<String>,
}

/// Every message that carries a sender, in delivery order. Messages without
/// a text body keep `text: None`.
pub fn extract_inbound_messages(payload: &WhatsAppWebhook) -> Vec<InboundMessage> {
    payload
        .entry
        .iter()
        .flat_map(|entry| entry.changes.iter())
        .filter_map(|change| change.value.as_ref())
        .flat_map(|value| value.messages.iter())
        .filter_map(|message| {
            let from = message
                .from
                .as_deref()
                .map(str::trim)
                .filter(|from| !from.is_empty())?;

            Some(InboundMessage {
                from: from.to_string(),
                message_id: message.id.clone(),
                text: message.text.as_ref().and_then(|text| text.body.clone()),
            })
        })
        .collect()
}
