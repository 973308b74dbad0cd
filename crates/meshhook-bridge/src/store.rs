//! Durable node identity store
//!
//! Maps numeric mesh node identifiers to their latest self-reported display
//! names. The table survives process restarts so that chat messages can be
//! attributed even when the sender's node info beacon predates the current
//! run.
//!
//! The pool is capped at a single connection: store operations are globally
//! serialized, which is all the write coordination a single-stream bridge
//! needs, and every insert/update is committed before the call returns.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::error::{BridgeError, Result};

/// Outcome of an identity upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First announcement for this node
    Created,
    /// Stored name differed and was overwritten
    Updated,
    /// Stored name already matched; nothing written
    Unchanged,
}

/// SQLite-backed store of node display names
#[derive(Debug, Clone)]
pub struct NodeStore {
    pool: SqlitePool,
}

impl NodeStore {
    /// Open (or create) the store at the given database file path
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let url = format!("sqlite:{}", path.as_ref().display());
        Self::open_url(&url).await
    }

    /// Open the store from a SQLite URL (e.g. `sqlite::memory:`)
    pub async fn open_url(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| BridgeError::Store(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS nodes (
                node_id INTEGER PRIMARY KEY,
                long_name TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        debug!(url, "Node store opened");
        Ok(Self { pool })
    }

    /// Insert or update a node's display name
    ///
    /// The name must be non-empty; the router guards this before calling,
    /// and the store re-validates. Identical re-announcements are a no-op.
    pub async fn upsert(&self, node_id: u32, long_name: &str) -> Result<UpsertOutcome> {
        if long_name.is_empty() {
            return Err(BridgeError::EmptyName { node_id });
        }

        let existing: Option<String> =
            sqlx::query_scalar("SELECT long_name FROM nodes WHERE node_id = ?")
                .bind(node_id)
                .fetch_optional(&self.pool)
                .await?;

        match existing.as_deref() {
            None => {
                sqlx::query("INSERT INTO nodes (node_id, long_name) VALUES (?, ?)")
                    .bind(node_id)
                    .bind(long_name)
                    .execute(&self.pool)
                    .await?;
                info!(node_id, long_name, "Added new node");
                Ok(UpsertOutcome::Created)
            }
            Some(stored) if stored != long_name => {
                sqlx::query("UPDATE nodes SET long_name = ? WHERE node_id = ?")
                    .bind(long_name)
                    .bind(node_id)
                    .execute(&self.pool)
                    .await?;
                info!(node_id, long_name, "Updated node name");
                Ok(UpsertOutcome::Updated)
            }
            Some(_) => Ok(UpsertOutcome::Unchanged),
        }
    }

    /// Resolve a node's display name
    ///
    /// Falls back to the decimal node id when the node is unknown, and also
    /// when the store itself fails: attribution is low-stakes, so lookups
    /// prefer availability over surfacing storage errors.
    pub async fn display_name(&self, node_id: u32) -> String {
        let result: std::result::Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT long_name FROM nodes WHERE node_id = ?")
                .bind(node_id)
                .fetch_optional(&self.pool)
                .await;

        match result {
            Ok(Some(name)) => name,
            Ok(None) => node_id.to_string(),
            Err(e) => {
                warn!(node_id, error = %e, "Name lookup failed, using numeric fallback");
                node_id.to_string()
            }
        }
    }

    /// Number of stored identity records (startup diagnostic)
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
