//! Meshhook Node - Meshtastic MQTT → webhook forwarder daemon
//!
//! This binary runs the full bridge:
//! - MQTT subscription to a Meshtastic gateway's JSON uplink topic
//! - Routing/identity engine from `meshhook-bridge`
//! - Per-channel webhook delivery

use anyhow::Context;
use clap::Parser;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use meshhook_bridge::{
    BridgeConfig, HttpWebhookSink, InboundMessage, MeshBridge, MqttConfig, NodeStore, WebhookMap,
};

#[derive(Parser)]
#[command(name = "meshhook-node")]
#[command(about = "Forward Meshtastic MQTT chat traffic to per-channel webhooks")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, short, default_value = "meshhook.toml")]
    config: PathBuf,

    /// Override the identity database path from the config
    #[arg(long)]
    db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration
    let raw = std::fs::read_to_string(&args.config)
        .with_context(|| format!("reading config file {}", args.config.display()))?;
    let mut config: BridgeConfig = toml::from_str(&raw)
        .with_context(|| format!("parsing config file {}", args.config.display()))?;
    if let Some(db) = args.db {
        config.storage.db_path = db;
    }
    config.validate().context("invalid configuration")?;

    let destinations = WebhookMap::from_config(&config.webhooks)?;
    info!(
        channels = destinations.len(),
        "Loaded configuration from {}",
        args.config.display()
    );

    // Initialize the identity store and report its size
    let store = NodeStore::open(&config.storage.db_path).await?;
    let node_count = store.count().await?;
    info!(
        node_count,
        "Identity store ready: {}",
        config.storage.db_path.display()
    );

    // Assemble the bridge
    let sink = HttpWebhookSink::new(config.delivery.timeout)?;
    let (inbound_tx, inbound_rx) = mpsc::channel(config.delivery.queue_size);
    let (bridge, handle) = MeshBridge::new(store, destinations, sink, inbound_rx);
    let bridge_task = tokio::spawn(bridge.run());

    // MQTT subscription task
    let mqtt_config = config.mqtt.clone();
    let mqtt_task = tokio::spawn(run_mqtt(mqtt_config, inbound_tx));

    // Run until ctrl-c or the MQTT task gives up
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        result = mqtt_task => {
            match result {
                Ok(Err(e)) => error!("MQTT transport failed: {e:#}"),
                Ok(Ok(())) => warn!("MQTT transport stopped"),
                Err(e) => error!("MQTT task panicked: {e}"),
            }
        }
    }

    handle.shutdown().await.ok();
    bridge_task.await??;
    info!("Meshhook node stopped");
    Ok(())
}

/// Run the MQTT subscription loop, feeding publishes into the bridge
///
/// Subscribes on every ConnAck so the subscription survives broker
/// reconnects. Transport errors back off and retry; only a closed inbound
/// channel (bridge gone) ends the loop.
async fn run_mqtt(
    config: MqttConfig,
    inbound_tx: mpsc::Sender<InboundMessage>,
) -> anyhow::Result<()> {
    let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
    options.set_keep_alive(std::time::Duration::from_secs(60));
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        options.set_credentials(username.clone(), password.clone());
    }

    let (client, mut event_loop) = AsyncClient::new(options, 64);
    info!(
        host = %config.host,
        port = config.port,
        topic = %config.topic,
        "Connecting to MQTT broker"
    );

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Connected to MQTT broker");
                client
                    .subscribe(config.topic.clone(), QoS::AtMostOnce)
                    .await
                    .context("subscribing to uplink topic")?;
                info!(topic = %config.topic, "Subscribed");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let msg = InboundMessage {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                };
                if inbound_tx.send(msg).await.is_err() {
                    warn!("Bridge inbound channel closed, stopping MQTT loop");
                    return Ok(());
                }
            }
            Ok(event) => {
                debug!(?event, "MQTT event");
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "MQTT connection error, retrying in {}s",
                    config.reconnect_delay.as_secs()
                );
                tokio::time::sleep(config.reconnect_delay).await;
            }
        }
    }
}
