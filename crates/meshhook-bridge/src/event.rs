//! Event classification for inbound mesh payloads
//!
//! Meshtastic gateways publish JSON envelopes on the MQTT uplink topic for
//! every packet heard on the mesh: node info beacons, text messages, but
//! also position reports, telemetry, traceroutes and more. The classifier
//! turns a raw payload into exactly one [`MeshEvent`], keeping only the two
//! envelope types the bridge acts on and folding everything else into
//! [`MeshEvent::Other`].
//!
//! Classification is a pure function of the payload bytes; it never touches
//! the identity store and never panics on arbitrary input.

use serde::Deserialize;

use crate::error::{BridgeError, Result};

/// A classified inbound event
///
/// The variant set is closed on purpose: unrecognized envelope types map to
/// [`MeshEvent::Other`] rather than widening the enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshEvent {
    /// A node announcing its self-reported display name
    NodeInfo {
        /// Announcing node
        node_id: u32,
        /// Announced display name, if the beacon carried one
        long_name: Option<String>,
    },
    /// A user-authored text message on a logical channel
    Text {
        /// Sending node
        node_id: u32,
        /// Logical channel number, if the envelope carried one
        channel: Option<u32>,
        /// Message text (empty when absent)
        text: String,
    },
    /// Any other envelope type (position, telemetry, ...); dropped downstream
    Other,
}

/// Raw JSON envelope as published by the Meshtastic gateway
///
/// Numeric fields are taken as `i64` and range-checked during
/// classification: a malformed envelope with a negative or oversized
/// `from`/`channel` should drop downstream like any other unusable
/// envelope, not fail the parse.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    from: Option<i64>,
    channel: Option<i64>,
    #[serde(default)]
    payload: EnvelopePayload,
}

#[derive(Debug, Default, Deserialize)]
struct EnvelopePayload {
    longname: Option<String>,
    text: Option<String>,
}

/// Classify a raw inbound payload into a [`MeshEvent`]
///
/// Returns [`BridgeError::Parse`] when the payload is not UTF-8 or not the
/// expected JSON structure. Envelopes with an unknown `type`, or missing
/// (or out-of-range) `from` on a known type, classify as
/// [`MeshEvent::Other`]; an out-of-range `channel` is carried as absent.
pub fn classify(raw: &[u8]) -> Result<MeshEvent> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| BridgeError::Parse(format!("payload is not valid UTF-8: {e}")))?;

    let envelope: Envelope = serde_json::from_str(text)
        .map_err(|e| BridgeError::Parse(format!("payload is not valid JSON: {e}")))?;

    // Out-of-range ids are treated the same as absent ones.
    let from = envelope.from.and_then(|v| u32::try_from(v).ok());
    let channel = envelope.channel.and_then(|v| u32::try_from(v).ok());

    // Every "absent field means drop" decision is an explicit branch here;
    // the match guards are the only place envelope shape is interpreted.
    match (envelope.kind.as_deref(), from) {
        (Some("nodeinfo"), Some(node_id)) => Ok(MeshEvent::NodeInfo {
            node_id,
            long_name: envelope.payload.longname,
        }),
        (Some("text"), Some(node_id)) => Ok(MeshEvent::Text {
            node_id,
            channel,
            text: envelope.payload.text.unwrap_or_default(),
        }),
        _ => Ok(MeshEvent::Other),
    }
}
