use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chatbot_core::ReplySource;
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    webhooks_received_total: AtomicU64,
    messages_classified_total: AtomicU64,
    rule_replies_total: AtomicU64,
    fallback_total: AtomicU64,
    unintelligible_total: AtomicU64,
    replies_delivered_total: AtomicU64,
    delivery_failures_total: AtomicU64,
    payload_errors_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub webhooks_received_total: u64,
    pub messages_classified_total: u64,
    pub rule_replies_total: u64,
    pub fallback_total: u64,
    pub unintelligible_total: u64,
    pub replies_delivered_total: u64,
    pub delivery_failures_total: u64,
    pub payload_errors_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_webhook(&self) {
        self.webhooks_received_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_classification(&self, source: ReplySource) {
        self.messages_classified_total
            .fetch_add(1, Ordering::Relaxed);
        let bucket = match source {
            ReplySource::Frequency => &self.fallback_total,
            ReplySource::EmptyInput => &self.unintelligible_total,
            _ => &self.rule_replies_total,
        };
        bucket.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_delivered(&self) {
        self.replies_delivered_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_delivery_failure(&self) {
        self.delivery_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_payload_error(&self) {
        self.payload_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let classified = self.messages_classified_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            webhooks_received_total: self.webhooks_received_total.load(Ordering::Relaxed),
            messages_classified_total: classified,
            rule_replies_total: self.rule_replies_total.load(Ordering::Relaxed),
            fallback_total: self.fallback_total.load(Ordering::Relaxed),
            unintelligible_total: self.unintelligible_total.load(Ordering::Relaxed),
            replies_delivered_total: self.replies_delivered_total.load(Ordering::Relaxed),
            delivery_failures_total: self.delivery_failures_total.load(Ordering::Relaxed),
            payload_errors_total: self.payload_errors_total.load(Ordering::Relaxed),
            avg_latency_millis: if classified == 0 {
                0.0
            } else {
                latency as f64 / classified as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,chatbot_api=info,chatbot_responder=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}
