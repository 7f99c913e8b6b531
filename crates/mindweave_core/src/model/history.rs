//! Append-only change ledger records.
//!
//! # Responsibility
//! - Define the audit entry shape and the snapshot cadence constants.
//!
//! # Invariants
//! - `seq` is globally monotonic (AUTOINCREMENT); per-document order follows
//!   insertion order.
//! - Entries are never edited; retention removal is the only delete path.

use crate::model::document::{DocumentId, GraphPatch};
use crate::model::graph::GraphSnapshot;
use crate::model::ActorId;
use serde::{Deserialize, Serialize};

/// Entries older than this are eligible for background removal (90 days).
pub const HISTORY_RETENTION_MS: i64 = 90 * 24 * 60 * 60 * 1000;

/// A full snapshot is stored on the first entry of a document and then every
/// Nth entry, to bound replay cost.
pub const DEFAULT_SNAPSHOT_EVERY: u32 = 20;

/// Action tag recorded with each ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Create,
    Update,
    Delete,
    Archive,
    Restore,
    Fork,
}

impl HistoryAction {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Archive => "archive",
            Self::Restore => "restore",
            Self::Fork => "fork",
        }
    }

    pub fn parse_db_str(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "archive" => Some(Self::Archive),
            "restore" => Some(Self::Restore),
            "fork" => Some(Self::Fork),
            _ => None,
        }
    }
}

/// One committed ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Monotonic sequence id assigned at insertion.
    pub seq: i64,
    pub document_id: DocumentId,
    pub actor_id: ActorId,
    pub action: HistoryAction,
    /// The applied patch; `None` for entries that only mark a transition.
    pub delta: Option<GraphPatch>,
    /// Periodic full capture for bounded replay.
    pub snapshot: Option<GraphSnapshot>,
    /// Epoch ms, assigned at insertion.
    pub created_at: i64,
}
