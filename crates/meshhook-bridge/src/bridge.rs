//! Bridge service - the event processing loop
//!
//! This module ties the classifier, router and dispatcher together into a
//! single service that consumes inbound MQTT messages and drives webhook
//! deliveries. It handles:
//!
//! - Inbound `(topic, payload)` pairs from the transport task
//! - Control commands (stats, shutdown) via a [`BridgeHandle`]
//!
//! Events are processed strictly one at a time, in arrival order. Every
//! per-event failure (unparseable payload, store error, rejected delivery)
//! is logged and the loop moves on to the next event; nothing a single
//! event does can take the service down.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::config::WebhookMap;
use crate::dispatch::{Dispatcher, WebhookSink};
use crate::error::{BridgeError, Result};
use crate::event::classify;
use crate::router::{RouteDecision, Router};
use crate::store::{NodeStore, UpsertOutcome};

/// How often the idle loop traces its counters
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(30);

/// One inbound message from the transport layer
///
/// The topic is carried for diagnostics only; routing is driven entirely by
/// the payload.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// MQTT topic the payload arrived on
    pub topic: String,
    /// Raw payload bytes
    pub payload: Vec<u8>,
}

/// Commands that can be sent to the bridge
#[derive(Debug)]
pub enum BridgeCommand {
    /// Get bridge statistics
    GetStats(oneshot::Sender<BridgeStats>),
    /// Shutdown the bridge
    Shutdown,
}

/// Bridge statistics
#[derive(Debug, Clone, Default)]
pub struct BridgeStats {
    /// Inbound messages received from the transport
    pub events_received: u64,
    /// Identity records created
    pub identities_created: u64,
    /// Identity records updated
    pub identities_updated: u64,
    /// Messages delivered to a webhook
    pub messages_forwarded: u64,
    /// Events dropped by a router guard
    pub messages_dropped: u64,
    /// Payloads that failed classification
    pub parse_errors: u64,
    /// Deliveries rejected by the webhook or lost to transport errors
    pub delivery_failures: u64,
}

/// Handle for controlling a running [`MeshBridge`]
#[derive(Clone)]
pub struct BridgeHandle {
    command_tx: mpsc::Sender<BridgeCommand>,
}

impl BridgeHandle {
    /// Get bridge statistics
    pub async fn stats(&self) -> Result<BridgeStats> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(BridgeCommand::GetStats(tx))
            .await
            .map_err(|_| BridgeError::ChannelClosed)?;
        rx.await.map_err(|_| BridgeError::ChannelClosed)
    }

    /// Shutdown the bridge
    pub async fn shutdown(&self) -> Result<()> {
        self.command_tx
            .send(BridgeCommand::Shutdown)
            .await
            .map_err(|_| BridgeError::ChannelClosed)
    }
}

/// Bridge service connecting the mesh telemetry feed to per-channel webhooks
pub struct MeshBridge<S> {
    router: Router,
    dispatcher: Dispatcher<S>,
    inbound_rx: mpsc::Receiver<InboundMessage>,
    command_rx: mpsc::Receiver<BridgeCommand>,
    stats: BridgeStats,
}

impl<S: WebhookSink + Send + 'static> MeshBridge<S> {
    /// Create a new bridge over the given store, destinations and sink
    ///
    /// Returns the bridge plus a clone-able control handle. The caller feeds
    /// inbound messages through `inbound_rx`'s sender side.
    pub fn new(
        store: NodeStore,
        destinations: WebhookMap,
        sink: S,
        inbound_rx: mpsc::Receiver<InboundMessage>,
    ) -> (Self, BridgeHandle) {
        let router = Router::new(store, destinations.clone());
        let dispatcher = Dispatcher::new(sink, destinations);

        let (command_tx, command_rx) = mpsc::channel(16);
        let handle = BridgeHandle { command_tx };

        let bridge = Self {
            router,
            dispatcher,
            inbound_rx,
            command_rx,
            stats: BridgeStats::default(),
        };

        (bridge, handle)
    }

    /// Run the bridge service until shutdown or the inbound channel closes
    pub async fn run(mut self) -> Result<()> {
        info!("Starting mesh-to-webhook bridge");

        let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);

        loop {
            // Biased toward inbound: events are processed in arrival order
            // and control commands only run between events.
            tokio::select! {
                biased;

                inbound = self.inbound_rx.recv() => {
                    match inbound {
                        Some(msg) => self.handle_inbound(msg).await,
                        None => {
                            info!("Inbound channel closed, stopping bridge");
                            break;
                        }
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        BridgeCommand::GetStats(tx) => {
                            let _ = tx.send(self.stats.clone());
                        }
                        BridgeCommand::Shutdown => {
                            info!("Bridge shutdown requested");
                            break;
                        }
                    }
                }

                // Periodic housekeeping
                _ = housekeeping.tick() => {
                    trace!(
                        received = self.stats.events_received,
                        forwarded = self.stats.messages_forwarded,
                        dropped = self.stats.messages_dropped,
                        parse_errors = self.stats.parse_errors,
                        delivery_failures = self.stats.delivery_failures,
                        "Bridge stats"
                    );
                }
            }
        }

        info!(
            received = self.stats.events_received,
            forwarded = self.stats.messages_forwarded,
            "Bridge stopped"
        );
        Ok(())
    }

    /// Process one inbound message end to end
    ///
    /// Never returns an error: each failure mode is counted, logged, and
    /// confined to this event.
    async fn handle_inbound(&mut self, msg: InboundMessage) {
        self.stats.events_received += 1;
        trace!(topic = %msg.topic, bytes = msg.payload.len(), "Inbound message");

        let event = match classify(&msg.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(topic = %msg.topic, error = %e, "Skipping unparseable payload");
                self.stats.parse_errors += 1;
                return;
            }
        };

        let decision = match self.router.route(event).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(topic = %msg.topic, code = e.error_code(), error = %e, "Routing failed");
                self.stats.messages_dropped += 1;
                return;
            }
        };

        match decision {
            RouteDecision::Identity(UpsertOutcome::Created) => {
                self.stats.identities_created += 1;
            }
            RouteDecision::Identity(UpsertOutcome::Updated) => {
                self.stats.identities_updated += 1;
            }
            RouteDecision::Identity(UpsertOutcome::Unchanged) => {}
            RouteDecision::Dropped(reason) => {
                debug!(topic = %msg.topic, ?reason, "Event dropped");
                self.stats.messages_dropped += 1;
            }
            RouteDecision::Forward(intent) => match self.dispatcher.dispatch(intent).await {
                Ok(()) => self.stats.messages_forwarded += 1,
                Err(e) => {
                    warn!(code = e.error_code(), error = %e, "Delivery failed, message lost");
                    self.stats.delivery_failures += 1;
                }
            },
        }
    }
}
