//! Error types for bridge operations
//!
//! This module provides error handling for all bridge operations including
//! payload classification, identity persistence, and webhook delivery.

use thiserror::Error;

/// Main error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    // ===== Classification Errors =====
    /// Payload could not be decoded or parsed
    #[error("Parse error: {0}")]
    Parse(String),

    // ===== Delivery Errors =====
    /// No webhook configured for the requested channel
    #[error("No webhook configured for channel {channel}")]
    NoDestination {
        /// The unmapped channel number
        channel: u32,
    },

    /// Webhook rejected the request or was unreachable
    #[error("Webhook delivery failed (status {status:?}): {detail}")]
    DeliveryFailed {
        /// HTTP status code, if a response was received
        status: Option<u16>,
        /// Diagnostic detail
        detail: String,
    },

    // ===== Identity Store Errors =====
    /// Empty display name rejected
    #[error("Rejected empty display name for node {node_id}")]
    EmptyName {
        /// The announcing node
        node_id: u32,
    },

    /// Durable storage failure
    #[error("Node store error: {0}")]
    Store(String),

    // ===== Configuration Errors =====
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ===== General Errors =====
    /// Channel closed
    #[error("Channel closed")]
    ChannelClosed,
}

impl BridgeError {
    /// Get an error code for logging/metrics
    pub fn error_code(&self) -> &'static str {
        match self {
            BridgeError::Parse(_) => "PARSE_ERROR",
            BridgeError::NoDestination { .. } => "NO_DESTINATION",
            BridgeError::DeliveryFailed { .. } => "DELIVERY_FAILED",
            BridgeError::EmptyName { .. } => "EMPTY_NAME",
            BridgeError::Store(_) => "STORE_ERROR",
            BridgeError::InvalidConfig(_) => "INVALID_CONFIG",
            BridgeError::ChannelClosed => "CHANNEL_CLOSED",
        }
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

// Conversion from sqlx errors
impl From<sqlx::Error> for BridgeError {
    fn from(err: sqlx::Error) -> Self {
        BridgeError::Store(err.to_string())
    }
}

// Conversion from reqwest transport errors (no response received)
impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        BridgeError::DeliveryFailed {
            status: err.status().map(|s| s.as_u16()),
            detail: err.to_string(),
        }
    }
}
