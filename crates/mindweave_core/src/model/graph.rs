//! Graph value objects and structural validation.
//!
//! # Responsibility
//! - Define the node/edge/viewport/settings shapes stored inside documents.
//! - Enforce the structural rules every committed graph must satisfy.
//!
//! # Invariants
//! - Node ids and edge ids are unique within one graph.
//! - Every edge endpoint references an existing node id.
//! - The parent relation is acyclic and references existing nodes.
//!
//! # See also
//! - `crate::model::document` for the owning aggregate.

use crate::model::{ActorId, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Lower bound for viewport zoom.
pub const MIN_ZOOM: f64 = 0.1;
/// Upper bound for viewport zoom.
pub const MAX_ZOOM: f64 = 4.0;

/// Structural rule violation, naming the offending node or edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphViolation {
    /// A node id is blank.
    BlankNodeId,
    /// Two nodes share one id.
    DuplicateNodeId(String),
    /// An edge id is blank.
    BlankEdgeId,
    /// Two edges share one id.
    DuplicateEdgeId(String),
    /// An edge source references a node id absent from the graph.
    EdgeSourceMissing { edge_id: String, node_id: String },
    /// An edge target references a node id absent from the graph.
    EdgeTargetMissing { edge_id: String, node_id: String },
    /// A node parent references a node id absent from the graph.
    ParentMissing { node_id: String, parent_id: String },
    /// A node is its own ancestor through repeated parent lookups.
    ParentCycle { node_id: String },
}

impl Display for GraphViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankNodeId => write!(f, "node id must not be blank"),
            Self::DuplicateNodeId(id) => write!(f, "duplicate node id: {id}"),
            Self::BlankEdgeId => write!(f, "edge id must not be blank"),
            Self::DuplicateEdgeId(id) => write!(f, "duplicate edge id: {id}"),
            Self::EdgeSourceMissing { edge_id, node_id } => {
                write!(f, "edge {edge_id} source references missing node {node_id}")
            }
            Self::EdgeTargetMissing { edge_id, node_id } => {
                write!(f, "edge {edge_id} target references missing node {node_id}")
            }
            Self::ParentMissing { node_id, parent_id } => {
                write!(f, "node {node_id} parent references missing node {parent_id}")
            }
            Self::ParentCycle { node_id } => {
                write!(f, "node {node_id} is its own ancestor")
            }
        }
    }
}

impl Error for GraphViolation {}

/// Canvas position for one node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    /// Optional stacking coordinate for layered layouts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }
}

/// One node of a graph document.
///
/// `data` and `style` are opaque payloads owned by the rendering client; the
/// core stores and returns them without interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Client-assigned id, unique within the owning document.
    pub id: String,
    /// Free-form node type tag.
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Opaque content payload.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Opaque style payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<serde_json::Value>,
    /// Parent node id for nested layouts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Explicit child ordering, when the client maintains one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<String>>,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<ActorId>,
    /// Epoch ms, filled by the client when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Node {
    /// Creates a node with defaults filled, ready for payload assignment.
    pub fn new(id: impl Into<String>, position: Position) -> Self {
        Self {
            id: id.into(),
            kind: default_kind(),
            position,
            width: None,
            height: None,
            data: serde_json::Value::Null,
            style: None,
            parent_id: None,
            children: None,
            collapsed: false,
            created_by: None,
            created_at: None,
            updated_at: None,
        }
    }
}

/// One edge of a graph document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Client-assigned id, unique within the owning document.
    pub id: String,
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    /// Free-form edge type tag.
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub animated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Opaque style payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<serde_json::Value>,
    /// Opaque data payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Edge {
    /// Creates an edge with defaults filled.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            kind: default_kind(),
            animated: false,
            label: None,
            style: None,
            data: None,
        }
    }
}

/// Camera state for one document canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_zoom")]
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: default_zoom(),
        }
    }
}

impl Viewport {
    /// Checks the zoom bound; position coordinates are unbounded.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.zoom.is_finite() || self.zoom < MIN_ZOOM || self.zoom > MAX_ZOOM {
            return Err(ValidationError::ZoomOutOfRange(self.zoom));
        }
        Ok(())
    }
}

/// Connection behavior for edge creation on the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    #[default]
    Strict,
    Loose,
}

/// Per-document editor settings.
///
/// Defaults are filled at construction and on deserialization of partial
/// payloads; read paths never patch missing fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSettings {
    #[serde(default = "default_true")]
    pub fit_view: bool,
    #[serde(default)]
    pub snap_to_grid: bool,
    #[serde(default = "default_snap_grid")]
    pub snap_grid: [i64; 2],
    #[serde(default = "default_true")]
    pub nodes_draggable: bool,
    #[serde(default = "default_true")]
    pub nodes_connectable: bool,
    #[serde(default = "default_true")]
    pub elements_selectable: bool,
    #[serde(default = "default_true")]
    pub pan_on_drag: bool,
    #[serde(default = "default_true")]
    pub zoom_on_scroll: bool,
    #[serde(default)]
    pub connection_mode: ConnectionMode,
    /// Opaque default edge configuration applied by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_edge_options: Option<serde_json::Value>,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            fit_view: true,
            snap_to_grid: false,
            snap_grid: default_snap_grid(),
            nodes_draggable: true,
            nodes_connectable: true,
            elements_selectable: true,
            pan_on_drag: true,
            zoom_on_scroll: true,
            connection_mode: ConnectionMode::Strict,
            default_edge_options: None,
        }
    }
}

/// Immutable full capture of graph state at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default)]
    pub settings: DocumentSettings,
}

impl GraphSnapshot {
    /// Creates an empty snapshot with default viewport and settings.
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            viewport: Viewport::default(),
            settings: DocumentSettings::default(),
        }
    }
}

impl Default for GraphSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Validates the structural rules over a prospective graph state.
///
/// # Contract
/// - Called against the *resulting* state before any commit.
/// - Returns the first violation found, naming the offending id.
pub fn validate_graph(nodes: &[Node], edges: &[Edge]) -> Result<(), GraphViolation> {
    let mut node_ids: HashSet<&str> = HashSet::with_capacity(nodes.len());
    for node in nodes {
        if node.id.trim().is_empty() {
            return Err(GraphViolation::BlankNodeId);
        }
        if !node_ids.insert(node.id.as_str()) {
            return Err(GraphViolation::DuplicateNodeId(node.id.clone()));
        }
    }

    let mut edge_ids: HashSet<&str> = HashSet::with_capacity(edges.len());
    for edge in edges {
        if edge.id.trim().is_empty() {
            return Err(GraphViolation::BlankEdgeId);
        }
        if !edge_ids.insert(edge.id.as_str()) {
            return Err(GraphViolation::DuplicateEdgeId(edge.id.clone()));
        }
        if !node_ids.contains(edge.source.as_str()) {
            return Err(GraphViolation::EdgeSourceMissing {
                edge_id: edge.id.clone(),
                node_id: edge.source.clone(),
            });
        }
        if !node_ids.contains(edge.target.as_str()) {
            return Err(GraphViolation::EdgeTargetMissing {
                edge_id: edge.id.clone(),
                node_id: edge.target.clone(),
            });
        }
    }

    let parent_of: HashMap<&str, &str> = nodes
        .iter()
        .filter_map(|node| {
            node.parent_id
                .as_deref()
                .map(|parent| (node.id.as_str(), parent))
        })
        .collect();

    for (node_id, parent_id) in &parent_of {
        if !node_ids.contains(parent_id) {
            return Err(GraphViolation::ParentMissing {
                node_id: (*node_id).to_string(),
                parent_id: (*parent_id).to_string(),
            });
        }
    }

    for start in parent_of.keys() {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut cursor = Some(*start);
        while let Some(current) = cursor {
            if !visited.insert(current) {
                return Err(GraphViolation::ParentCycle {
                    node_id: (*start).to_string(),
                });
            }
            cursor = parent_of.get(current).copied();
        }
    }

    Ok(())
}

fn default_kind() -> String {
    "default".to_string()
}

fn default_zoom() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_snap_grid() -> [i64; 2] {
    [15, 15]
}
