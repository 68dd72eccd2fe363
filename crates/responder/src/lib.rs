mod outbox;
pub mod whatsapp;

use std::sync::Arc;
use std::time::Instant;

use chatbot_core::{Classification, InboundMessage, IntentClassifier};
use chatbot_observability::AppMetrics;
use serde::Serialize;
use tracing::{info, instrument, warn};

pub use outbox::{
    MemoryOutbox, OutboundSink, Outbox, SendError, DEFAULT_MEMORY_OUTBOX_CAPACITY,
};
pub use whatsapp::{WhatsAppConfig, WhatsAppSender};

#[derive(Debug, Clone, Serialize)]
pub struct ReplyOutcome {
    pub to: String,
    pub classification: Classification,
}

/// Answers inbound messages: classify the text, then hand the reply to the
/// outbound sink.
#[derive(Clone)]
pub struct ChatResponder<S>
where
    S: OutboundSink,
{
    classifier: Arc<IntentClassifier>,
    sink: Arc<S>,
    metrics: Arc<AppMetrics>,
}

impl<S> ChatResponder<S>
where
    S: OutboundSink,
{
    pub fn new(classifier: Arc<IntentClassifier>, sink: Arc<S>, metrics: Arc<AppMetrics>) -> Self {
        Self {
            classifier,
            sink,
            metrics,
        }
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn reply_to(&self, text: Option<&str>) -> Classification {
        let classification = self.classifier.classify_detailed(text);
        self.metrics.record_classification(classification.source);
        classification
    }

    #[instrument(skip(self, message), fields(from = %message.from))]
    pub async fn handle_inbound(&self, message: &InboundMessage) -> Result<ReplyOutcome, SendError> {
        let started = Instant::now();
        let classification = self.reply_to(message.text.as_deref());

        let delivery = self
            .sink
            .send_text(&message.from, &classification.reply)
            .await;
        self.metrics.observe_latency(started.elapsed());

        if let Err(err) = delivery {
            self.metrics.inc_delivery_failure();
            warn!(
                backend = self.sink.backend(),
                source = classification.source.as_code(),
                error = %err,
                "reply delivery failed"
            );
            return Err(err);
        }

        self.metrics.inc_delivered();
        info!(
            backend = self.sink.backend(),
            message_id = message.message_id.as_deref().unwrap_or_default(),
            source = classification.source.as_code(),
            rule = classification.rule.as_deref().unwrap_or_default(),
            latency_ms = started.elapsed().as_millis() as u64,
            "reply sent"
        );

        Ok(ReplyOutcome {
            to: message.from.clone(),
            classification,
        })
    }
}
