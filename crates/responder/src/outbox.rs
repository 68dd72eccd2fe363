use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use chatbot_core::OutboundMessage;
use parking_lot::RwLock;
use thiserror::Error;

use crate::whatsapp::WhatsAppSender;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("recipient must not be empty")]
    EmptyRecipient,
    #[error("message text must not be empty")]
    EmptyMessage,
    #[error("WhatsApp request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("WhatsApp API rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Best-effort delivery of a reply to one recipient.
pub trait OutboundSink: Send + Sync {
    fn backend(&self) -> &'static str;
    fn send_text(
        &self,
        to: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), SendError>> + Send;
}

pub(crate) fn validate_outbound(to: &str, text: &str) -> Result<(), SendError> {
    if to.trim().is_empty() {
        return Err(SendError::EmptyRecipient);
    }
    if text.trim().is_empty() {
        return Err(SendError::EmptyMessage);
    }
    Ok(())
}

/// Replies retained by a [`MemoryOutbox`] built with [`MemoryOutbox::new`].
pub const DEFAULT_MEMORY_OUTBOX_CAPACITY: usize = 1_000;

/// Keeps the most recent delivered messages in memory, dropping the oldest
/// once `capacity` is reached. Used when no WhatsApp credentials are
/// configured, and by tests.
#[derive(Clone)]
pub struct MemoryOutbox {
    sent: Arc<RwLock<VecDeque<OutboundMessage>>>,
    capacity: usize,
}

impl Default for MemoryOutbox {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_OUTBOX_CAPACITY)
    }
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// A zero capacity is raised to one so the latest reply is always kept.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            sent: Arc::new(RwLock::new(VecDeque::with_capacity(capacity.min(64)))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sent.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.read().is_empty()
    }
}

impl OutboundSink for MemoryOutbox {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<(), SendError> {
        validate_outbound(to, text)?;
        let mut sent = self.sent.write();
        if sent.len() == self.capacity {
            sent.pop_front();
        }
        sent.push_back(OutboundMessage {
            to: to.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

#[derive(Clone)]
pub enum Outbox {
    WhatsApp(WhatsAppSender),
    Memory(MemoryOutbox),
}

impl Outbox {
    pub fn memory() -> Self {
        Self::Memory(MemoryOutbox::new())
    }
}

impl OutboundSink for Outbox {
    fn backend(&self) -> &'static str {
        match self {
            Outbox::WhatsApp(sender) => sender.backend(),
            Outbox::Memory(outbox) => outbox.backend(),
        }
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<(), SendError> {
        match self {
            Outbox::WhatsApp(sender) => sender.send_text(to, text).await,
            Outbox::Memory(outbox) => outbox.send_text(to, text).await,
        }
    }
}
