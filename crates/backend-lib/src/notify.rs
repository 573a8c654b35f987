// ============================
// keystone-backend/src/notify.rs
// ============================
//! Outbound notification contract.
//!
//! Delivery is best-effort: callers enqueue and move on, and a failed enqueue
//! never fails the operation that triggered it.
use async_trait::async_trait;
use serde_json::Value;

/// A templated message waiting to be rendered and delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplatedMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub template: String,
    pub data: Value,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Queue a message. Implementations must not block on delivery.
    async fn enqueue(&self, message: TemplatedMessage) -> Result<(), String>;
}

/// Notifier that only records the message in the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn enqueue(&self, message: TemplatedMessage) -> Result<(), String> {
        tracing::info!(
            template = %message.template,
            recipients = message.to.len(),
            "notification queued"
        );
        Ok(())
    }
}

/// Enqueue and swallow failures after logging them.
pub async fn dispatch(notifier: &dyn Notifier, message: TemplatedMessage) {
    let template = message.template.clone();
    if let Err(err) = notifier.enqueue(message).await {
        tracing::warn!(%template, error = %err, "notification dropped");
    }
}
