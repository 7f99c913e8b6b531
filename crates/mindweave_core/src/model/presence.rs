//! Ephemeral per-connection presence state.
//!
//! # Invariants
//! - Connection ids are unique across all documents.
//! - Sessions idle beyond the TTL are eligible for sweep removal; the active
//!   listing window is stricter than the TTL.

use crate::model::document::DocumentId;
use crate::model::graph::Viewport;
use crate::model::ActorId;
use serde::{Deserialize, Serialize};

/// Sessions idle beyond this are removed by the sweep (1 hour).
pub const PRESENCE_IDLE_TTL_MS: i64 = 60 * 60 * 1000;
/// Default activity window for the active listing (5 minutes).
pub const PRESENCE_ACTIVE_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Display info supplied by the external transport at join time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Cursor location broadcast to other viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceCursor {
    pub x: f64,
    pub y: f64,
    /// Node the cursor hovers, when the client reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

/// One live connection to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceSession {
    /// Transport-assigned id, unique across all sessions.
    pub connection_id: String,
    pub document_id: DocumentId,
    pub actor_id: ActorId,
    pub user_info: Option<PresenceUserInfo>,
    pub cursor: Option<PresenceCursor>,
    pub viewport: Option<Viewport>,
    pub is_editing: bool,
    /// Epoch ms timestamps supplied by the caller.
    pub connected_at: i64,
    pub last_activity_at: i64,
}

/// Partial state carried by a heartbeat. Absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresenceHeartbeat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<PresenceCursor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_editing: Option<bool>,
}
