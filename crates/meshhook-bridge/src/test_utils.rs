//! Testing utilities
//!
//! Provides a recording [`MockSink`] so the dispatcher and bridge loop can
//! be exercised without a network, plus a helper for an in-memory store.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::dispatch::WebhookSink;
use crate::error::{BridgeError, Result};
use crate::store::NodeStore;

/// Webhook sink that records deliveries instead of performing them
///
/// Clones share the same recording, so a clone can be handed to a
/// dispatcher while the test keeps one for assertions.
#[derive(Clone, Default)]
pub struct MockSink {
    deliveries: Arc<Mutex<Vec<(String, String)>>>,
    fail_status: Arc<Mutex<Option<u16>>>,
}

impl MockSink {
    /// Create a sink that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail with the given HTTP status
    pub fn fail_with_status(&self, status: u16) {
        *self.fail_status.lock().unwrap() = Some(status);
    }

    /// Make subsequent deliveries succeed again
    pub fn succeed(&self) {
        *self.fail_status.lock().unwrap() = None;
    }

    /// All `(endpoint, content)` pairs delivered so far
    pub fn deliveries(&self) -> Vec<(String, String)> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookSink for MockSink {
    async fn deliver(&self, endpoint: &str, content: &str) -> Result<()> {
        if let Some(status) = *self.fail_status.lock().unwrap() {
            return Err(BridgeError::DeliveryFailed {
                status: Some(status),
                detail: "mock failure".to_string(),
            });
        }
        self.deliveries
            .lock()
            .unwrap()
            .push((endpoint.to_string(), content.to_string()));
        Ok(())
    }
}

/// Open a fresh in-memory node store
pub async fn memory_store() -> NodeStore {
    NodeStore::open_url("sqlite::memory:")
        .await
        .expect("in-memory store")
}
