//! Meshtastic MQTT → Webhook Bridge Engine
//!
//! This crate provides the routing and identity-resolution engine that
//! forwards chat messages from a Meshtastic mesh (heard via an MQTT gateway
//! publishing JSON envelopes) to per-channel chat-platform webhooks, while
//! maintaining a durable mapping from node ids to display names.
//!
//! # Architecture
//!
//! The engine is four components in a straight pipeline:
//!
//! 1. **Classifier** ([`classify`]) - raw payload bytes → typed [`MeshEvent`]
//! 2. **Node store** ([`NodeStore`]) - durable node id → display name mapping
//! 3. **Router** ([`Router`]) - decides per event: update identity, forward,
//!    or drop
//! 4. **Dispatcher** ([`Dispatcher`]) - one bounded-timeout webhook call per
//!    [`DeliveryIntent`], no retry
//!
//! [`MeshBridge`] wraps the pipeline in a service loop fed from an mpsc
//! channel, processing events one at a time in arrival order.
//!
//! # Message Flow
//!
//! 1. MQTT gateway publishes a JSON envelope for a packet heard on the mesh
//! 2. The transport task hands `(topic, payload)` to the bridge
//! 3. `classify` produces a node info, text, or other event
//! 4. Node info with a name upserts the store; text on a mapped channel
//!    resolves the sender's name and becomes a delivery intent
//! 5. The dispatcher posts the formatted body to the channel's webhook
//!
//! Everything else the mesh emits (position, telemetry, traceroute) is
//! classified as [`MeshEvent::Other`] and dropped.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use meshhook_bridge::{
//!     HttpWebhookSink, InboundMessage, MeshBridge, NodeStore, WebhookMap,
//!     DEFAULT_DELIVERY_TIMEOUT,
//! };
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = NodeStore::open("nodes.db").await?;
//!     let mut destinations = WebhookMap::new();
//!     destinations.insert(0, "https://discord.com/api/webhooks/...");
//!
//!     let sink = HttpWebhookSink::new(DEFAULT_DELIVERY_TIMEOUT)?;
//!     let (inbound_tx, inbound_rx) = mpsc::channel(256);
//!     let (bridge, handle) = MeshBridge::new(store, destinations, sink, inbound_rx);
//!
//!     tokio::spawn(bridge.run());
//!
//!     // Feed payloads from the MQTT subscription
//!     inbound_tx
//!         .send(InboundMessage {
//!             topic: "msh/EU_868/2/json/LongFast/!deadbeef".to_string(),
//!             payload: br#"{"type":"text","from":42,"channel":0,"payload":{"text":"hi"}}"#.to_vec(),
//!         })
//!         .await?;
//!
//!     handle.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod router;
pub mod store;

pub mod test_utils;

// Re-exports for convenience
pub use bridge::{BridgeCommand, BridgeHandle, BridgeStats, InboundMessage, MeshBridge};
pub use config::{
    BridgeConfig, BridgeConfigBuilder, DeliveryConfig, MqttConfig, StorageConfig, WebhookMap,
    DEFAULT_DELIVERY_TIMEOUT, DEFAULT_MQTT_PORT, DEFAULT_QUEUE_SIZE, DEFAULT_TOPIC_FILTER,
};
pub use dispatch::{format_content, Dispatcher, HttpWebhookSink, WebhookSink};
pub use error::{BridgeError, Result};
pub use event::{classify, MeshEvent};
pub use router::{DeliveryIntent, DropReason, RouteDecision, Router};
pub use store::{NodeStore, UpsertOutcome};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
