//! Purchase types produced by reconciliation.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Source tag stamped on every purchase created from a queue flush.
pub const SYNC_SOURCE: &str = "offline-sync";

/// Sentinel used when a value is not known.
pub const UNKNOWN: &str = "unknown";

/// Lifecycle state of a purchase record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    /// Created by an offline queue flush
    #[default]
    Synced,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Synced => "synced",
        }
    }
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PurchaseStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "synced" => Ok(PurchaseStatus::Synced),
            other => Err(format!("unknown purchase status: {}", other)),
        }
    }
}

/// Where the flush request came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn new(client_ip: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            client_ip,
            user_agent,
        }
    }
}

/// Request provenance stored alongside a purchase. Audit only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseMetadata {
    pub client_ip: String,
    pub user_agent: String,
    pub source: String,
    /// Queue correlation id, or `unknown`
    pub queue_id: String,
}

impl PurchaseMetadata {
    pub fn new(ctx: &RequestContext, queue_id: Option<&str>) -> Self {
        Self {
            client_ip: ctx.client_ip.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            user_agent: ctx.user_agent.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            source: SYNC_SOURCE.to_string(),
            queue_id: queue_id.unwrap_or(UNKNOWN).to_string(),
        }
    }
}

/// A validated purchase, ready to be handed to a durable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseInput {
    pub user_id: String,
    /// Cart lines, never empty
    pub items: Vec<Value>,
    /// Non-negative, finite
    pub total: f64,
    /// Effective event time
    pub timestamp: Timestamp,
    pub status: PurchaseStatus,
    pub metadata: PurchaseMetadata,
    /// Idempotency key; `None` when the client sent no id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<String>,
    /// Unrecognized queue fields, passed through
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

/// A durably stored purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    /// Store-assigned identifier
    pub id: String,
    pub user_id: String,
    pub items: Vec<Value>,
    pub total: f64,
    pub timestamp: Timestamp,
    pub status: PurchaseStatus,
    /// Server time of successful persistence
    pub synced_at: Timestamp,
    pub metadata: PurchaseMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl PurchaseRecord {
    /// Build the stored form of `input`.
    pub fn from_input(id: impl Into<String>, input: PurchaseInput, synced_at: Timestamp) -> Self {
        Self {
            id: id.into(),
            user_id: input.user_id,
            items: input.items,
            total: input.total,
            timestamp: input.timestamp,
            status: input.status,
            synced_at,
            metadata: input.metadata,
            queue_id: input.queue_id,
            attributes: input.attributes,
        }
    }

    /// Summary returned to the client so it can prune its queue.
    pub fn summary(&self, replayed: bool) -> PurchaseSummary {
        PurchaseSummary {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            total: self.total,
            item_count: self.items.len(),
            synced_at: self.synced_at,
            queue_id: self.queue_id.clone(),
            replayed,
        }
    }
}

/// Per-purchase entry of a batch report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseSummary {
    pub id: String,
    pub user_id: String,
    pub total: f64,
    pub item_count: usize,
    pub synced_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<String>,
    /// Already stored by an earlier delivery of the same queue entry
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub replayed: bool,
}
