//! Webhook delivery dispatch
//!
//! Turns a [`DeliveryIntent`] into a single HTTP call against the configured
//! webhook for its channel. Delivery is best-effort: one attempt with a
//! bounded timeout, no retry, no queueing. A failed delivery is reported and
//! the message is lost.
//!
//! The actual HTTP call sits behind the [`WebhookSink`] trait so tests can
//! substitute a recording mock for the reqwest-backed implementation.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::WebhookMap;
use crate::error::{BridgeError, Result};
use crate::router::DeliveryIntent;

/// Abstraction over the external webhook endpoint
#[async_trait]
pub trait WebhookSink: Send + Sync {
    /// Deliver one message body to one endpoint
    ///
    /// Returns `Ok(())` on an acknowledged success, or
    /// [`BridgeError::DeliveryFailed`] with diagnostic detail otherwise.
    async fn deliver(&self, endpoint: &str, content: &str) -> Result<()>;
}

/// reqwest-backed webhook sink posting Discord-style JSON bodies
pub struct HttpWebhookSink {
    client: reqwest::Client,
}

impl HttpWebhookSink {
    /// Create a sink with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookSink for HttpWebhookSink {
    async fn deliver(&self, endpoint: &str, content: &str) -> Result<()> {
        let response = self
            .client
            .post(endpoint)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(BridgeError::DeliveryFailed {
                status: Some(status.as_u16()),
                detail,
            })
        }
    }
}

/// Format the outbound message body
///
/// Fixed human-readable template combining sender attribution and text.
pub fn format_content(sender_name: &str, body: &str) -> String {
    format!("📡 **From {sender_name}:**\n{body}")
}

/// Dispatches delivery intents to their per-channel webhook
pub struct Dispatcher<S> {
    sink: S,
    destinations: WebhookMap,
}

impl<S: WebhookSink> Dispatcher<S> {
    /// Create a dispatcher over the given sink and destination map
    pub fn new(sink: S, destinations: WebhookMap) -> Self {
        Self { sink, destinations }
    }

    /// Deliver one intent; exactly one attempt
    ///
    /// The router only emits intents for mapped channels, but the
    /// destination is re-validated here.
    pub async fn dispatch(&self, intent: DeliveryIntent) -> Result<()> {
        let endpoint = self
            .destinations
            .endpoint(intent.channel)
            .ok_or(BridgeError::NoDestination {
                channel: intent.channel,
            })?;

        let content = format_content(&intent.sender_name, &intent.body);
        debug!(channel = intent.channel, sender = %intent.sender_name, "Dispatching to webhook");

        self.sink.deliver(endpoint, &content).await?;
        info!(channel = intent.channel, sender = %intent.sender_name, "Delivered to webhook");
        Ok(())
    }
}
