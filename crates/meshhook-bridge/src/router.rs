//! Routing decisions for classified events
//!
//! The router is the one place where the bridge decides what an event means:
//! identity announcements update the node store, chat messages on a mapped
//! channel become delivery intents, everything else is dropped with an
//! explicit reason. It holds no state of its own beyond the injected store
//! and destination map.

use tracing::debug;

use crate::config::WebhookMap;
use crate::error::Result;
use crate::event::MeshEvent;
use crate::store::{NodeStore, UpsertOutcome};

/// A request to deliver one message to one webhook destination
///
/// Consumed exactly once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryIntent {
    /// Destination logical channel
    pub channel: u32,
    /// Resolved sender display name
    pub sender_name: String,
    /// Message text to forward
    pub body: String,
}

/// Why an event was dropped instead of acted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Identity announcement without a usable display name
    MissingName,
    /// Chat message without a channel, or on a channel with no destination
    UnmappedChannel,
    /// Chat message with empty text
    EmptyText,
    /// Envelope type the bridge does not act on
    Unclassified,
}

/// Outcome of routing one classified event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Identity store was consulted; nothing to forward
    Identity(UpsertOutcome),
    /// Forward exactly one message
    Forward(DeliveryIntent),
    /// Dropped, with the guard that rejected it
    Dropped(DropReason),
}

/// Routes classified events against the identity store and destination map
#[derive(Debug, Clone)]
pub struct Router {
    store: NodeStore,
    destinations: WebhookMap,
}

impl Router {
    /// Create a router over the given store and destination map
    pub fn new(store: NodeStore, destinations: WebhookMap) -> Self {
        Self {
            store,
            destinations,
        }
    }

    /// Decide what to do with one classified event
    ///
    /// Sender names are resolved lazily, only for messages that are actually
    /// being forwarded; most mesh traffic is filtered out before that point.
    pub async fn route(&self, event: MeshEvent) -> Result<RouteDecision> {
        match event {
            MeshEvent::NodeInfo { node_id, long_name } => match long_name.as_deref() {
                Some(name) if !name.is_empty() => {
                    let outcome = self.store.upsert(node_id, name).await?;
                    Ok(RouteDecision::Identity(outcome))
                }
                _ => {
                    debug!(node_id, "Dropping nodeinfo without a display name");
                    Ok(RouteDecision::Dropped(DropReason::MissingName))
                }
            },
            MeshEvent::Text {
                node_id,
                channel,
                text,
            } => {
                // Configured-ness is key presence in the destination map,
                // never truthiness: channel 0 is a valid destination.
                let Some(channel) = channel else {
                    debug!(node_id, "Dropping text message without a channel");
                    return Ok(RouteDecision::Dropped(DropReason::UnmappedChannel));
                };
                if !self.destinations.contains(channel) {
                    debug!(node_id, channel, "Dropping text message on unmapped channel");
                    return Ok(RouteDecision::Dropped(DropReason::UnmappedChannel));
                }
                if text.is_empty() {
                    debug!(node_id, channel, "Dropping text message with empty text");
                    return Ok(RouteDecision::Dropped(DropReason::EmptyText));
                }

                let sender_name = self.store.display_name(node_id).await;
                Ok(RouteDecision::Forward(DeliveryIntent {
                    channel,
                    sender_name,
                    body: text,
                }))
            }
            MeshEvent::Other => Ok(RouteDecision::Dropped(DropReason::Unclassified)),
        }
    }
}
