//! Core data types for the DataMap diagram.
//!
//! This module defines the node kinds, node identities, nodes, connections and
//! annotation links held by the [`GraphStore`](crate::store::GraphStore), plus the
//! [`Snapshot`] wire structure exchanged with the remote store.

use crate::error::SnapshotError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The kind of a diagram node.
///
/// Every known kind carries its icon, default port layout and default text as
/// compile-time data. Data written by older editors with a kind this build does
/// not know is kept as [`NodeKind::Unknown`] so it survives a load/save cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    /// A software application in the landscape
    Application,
    /// A backend service
    Service,
    /// A branching decision point
    Decision,
    /// A pipeline moving or transforming data
    DataPipeline,
    /// A curated data product
    DataProduct,
    /// An API or interface boundary
    Api,
    /// A database or other data store
    Database,
    /// A system outside the organisation
    ExternalSystem,
    /// A human actor or role
    UserRole,
    /// A security control point
    SecurityControl,
    /// A report, dashboard or other visualization
    Visualization,
    /// A free-floating comment that can annotate other nodes
    Comment,
    /// A kind found in stored data that this build does not recognise
    Unknown(String),
}

impl NodeKind {
    /// All kinds offered in the add-node palette, in display order.
    pub const PALETTE: [NodeKind; 12] = [
        NodeKind::Application,
        NodeKind::Service,
        NodeKind::Decision,
        NodeKind::DataPipeline,
        NodeKind::DataProduct,
        NodeKind::Api,
        NodeKind::Database,
        NodeKind::ExternalSystem,
        NodeKind::UserRole,
        NodeKind::SecurityControl,
        NodeKind::Visualization,
        NodeKind::Comment,
    ];

    /// Stable wire key, also used as the prefix of node identities.
    pub fn key(&self) -> &str {
        match self {
            NodeKind::Application => "application",
            NodeKind::Service => "service",
            NodeKind::Decision => "decision",
            NodeKind::DataPipeline => "data_pipeline",
            NodeKind::DataProduct => "data_product",
            NodeKind::Api => "api",
            NodeKind::Database => "database",
            NodeKind::ExternalSystem => "external_system",
            NodeKind::UserRole => "user_role",
            NodeKind::SecurityControl => "security_control",
            NodeKind::Visualization => "visualization",
            NodeKind::Comment => "comment",
            NodeKind::Unknown(key) => key,
        }
    }

    /// Resolves a wire key (or one of the long legacy aliases) to a kind.
    pub fn from_key(key: &str) -> Self {
        match key {
            "application" => NodeKind::Application,
            "service" => NodeKind::Service,
            "decision" => NodeKind::Decision,
            "data_pipeline" => NodeKind::DataPipeline,
            "data_product" => NodeKind::DataProduct,
            "api" | "api_interface" => NodeKind::Api,
            "database" | "database_data_store" => NodeKind::Database,
            "external_system" => NodeKind::ExternalSystem,
            "user_role" => NodeKind::UserRole,
            "security_control" | "security_control_point" => NodeKind::SecurityControl,
            "visualization" => NodeKind::Visualization,
            "comment" => NodeKind::Comment,
            other => NodeKind::Unknown(other.to_string()),
        }
    }

    /// Human readable name shown in menus.
    pub fn label(&self) -> &str {
        match self {
            NodeKind::Application => "Application",
            NodeKind::Service => "Service",
            NodeKind::Decision => "Decision",
            NodeKind::DataPipeline => "Data Pipeline",
            NodeKind::DataProduct => "Data Product",
            NodeKind::Api => "API / Interface",
            NodeKind::Database => "Database / Data Store",
            NodeKind::ExternalSystem => "External System",
            NodeKind::UserRole => "User / Role",
            NodeKind::SecurityControl => "Security Control Point",
            NodeKind::Visualization => "Visualization",
            NodeKind::Comment => "Comment",
            NodeKind::Unknown(key) => key,
        }
    }

    /// Glyph drawn in the node header.
    pub fn icon(&self) -> &'static str {
        match self {
            NodeKind::Application => "🖥",
            NodeKind::Service => "⚙",
            NodeKind::Decision => "◆",
            NodeKind::DataPipeline => "➡",
            NodeKind::DataProduct => "📦",
            NodeKind::Api => "🔌",
            NodeKind::Database => "🗄",
            NodeKind::ExternalSystem => "🌐",
            NodeKind::UserRole => "👤",
            NodeKind::SecurityControl => "🛡",
            NodeKind::Visualization => "📊",
            NodeKind::Comment => "💬",
            NodeKind::Unknown(_) => "❓",
        }
    }

    /// Default `(inputs, outputs)` port counts for a freshly created node.
    pub fn default_ports(&self) -> (u16, u16) {
        match self {
            NodeKind::Decision => (1, 2),
            NodeKind::UserRole => (0, 1),
            NodeKind::Visualization => (1, 0),
            NodeKind::Comment => (0, 0),
            _ => (1, 1),
        }
    }

    /// Default title for a freshly created node.
    pub fn default_title(&self) -> String {
        match self {
            NodeKind::Unknown(key) => key.clone(),
            other => other.label().to_string(),
        }
    }

    /// Default description text for a freshly created node.
    pub fn default_description(&self) -> &'static str {
        match self {
            NodeKind::Application => "Application in the portfolio",
            NodeKind::Service => "Service providing business capability",
            NodeKind::Decision => "Decision point in the flow",
            NodeKind::DataPipeline => "Moves and transforms data",
            NodeKind::DataProduct => "Curated, reusable data set",
            NodeKind::Api => "API or integration interface",
            NodeKind::Database => "Persistent data store",
            NodeKind::ExternalSystem => "System outside the organisation",
            NodeKind::UserRole => "User or role interacting with the system",
            NodeKind::SecurityControl => "Security control or checkpoint",
            NodeKind::Visualization => "Report or dashboard",
            NodeKind::Comment => "Add a note...",
            NodeKind::Unknown(_) => "",
        }
    }

    /// Whether this is a comment node (the only kind that may own annotation links).
    pub fn is_comment(&self) -> bool {
        matches!(self, NodeKind::Comment)
    }
}

impl From<String> for NodeKind {
    fn from(key: String) -> Self {
        NodeKind::from_key(&key)
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.key().to_string()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Stable identity of a node: its kind key plus a per-kind sequence number.
///
/// Rendered as `"{kind}_{seq}"`, e.g. `database_3`. Annotation links reference
/// nodes by this value, so it never changes once allocated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId {
    kind_key: String,
    seq: u32,
}

impl NodeId {
    /// Builds an identity from a kind key and sequence number.
    pub fn new(kind_key: impl Into<String>, seq: u32) -> Self {
        Self {
            kind_key: kind_key.into(),
            seq,
        }
    }

    /// The kind key half of the identity.
    pub fn kind_key(&self) -> &str {
        &self.kind_key
    }

    /// The sequence number half of the identity.
    pub fn seq(&self) -> u32 {
        self.seq
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind_key, self.seq)
    }
}

/// Error returned when a string is not a valid `"{kind}_{seq}"` identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid node id `{0}`")]
pub struct ParseNodeIdError(pub String);

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind_key, seq) = s
            .rsplit_once('_')
            .ok_or_else(|| ParseNodeIdError(s.to_string()))?;
        if kind_key.is_empty() {
            return Err(ParseNodeIdError(s.to_string()));
        }
        let seq = seq
            .parse::<u32>()
            .map_err(|_| ParseNodeIdError(s.to_string()))?;
        Ok(Self::new(kind_key, seq))
    }
}

impl TryFrom<String> for NodeId {
    type Error = ParseNodeIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.to_string()
    }
}

/// A position in canvas (world) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate
    pub x: f32,
    /// Vertical coordinate
    pub y: f32,
}

impl Position {
    /// Creates a position from its coordinates.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Which editable text field of a node is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    /// Single-line title
    Title,
    /// Multi-line description
    Description,
}

/// A positioned, typed element of the diagram.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Stable identity
    pub id: NodeId,
    /// Kind of the node
    pub kind: NodeKind,
    /// Single-line title
    pub title: String,
    /// Free-form description
    pub description: String,
    /// Top-left corner in world coordinates
    pub position: Position,
    /// Number of input ports
    pub inputs: u16,
    /// Number of output ports
    pub outputs: u16,
    /// Creation time, set once; `None` for legacy data saved without one
    pub created_at: Option<DateTime<Utc>>,
}

impl Node {
    /// Creates a node with the kind's default ports and text.
    pub fn new(id: NodeId, kind: NodeKind, position: Position) -> Self {
        let (inputs, outputs) = kind.default_ports();
        Self {
            id,
            title: kind.default_title(),
            description: kind.default_description().to_string(),
            kind,
            position,
            inputs,
            outputs,
            created_at: Some(Utc::now()),
        }
    }

    /// Returns a mutable reference to the addressed text field.
    pub fn text_mut(&mut self, field: TextField) -> &mut String {
        match field {
            TextField::Title => &mut self.title,
            TextField::Description => &mut self.description,
        }
    }

    /// Returns the addressed text field.
    pub fn text(&self, field: TextField) -> &str {
        match field {
            TextField::Title => &self.title,
            TextField::Description => &self.description,
        }
    }
}

/// A directed edge from an output port of one node to an input port of another.
///
/// Port indices are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    /// Node the edge leaves from
    pub source: NodeId,
    /// Output port on the source
    pub source_port: u16,
    /// Node the edge arrives at
    pub target: NodeId,
    /// Input port on the target
    pub target_port: u16,
}

impl Connection {
    /// Whether either end of the connection is the given node.
    pub fn touches(&self, id: &NodeId) -> bool {
        self.source == *id || self.target == *id
    }
}

/// One entry in a comment node's annotation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationLink {
    /// The annotated node
    pub target_id: NodeId,
    /// Deterministic id derived from the comment/target pair
    pub link_id: String,
}

impl AnnotationLink {
    /// Creates the link from `comment` to `target`, deriving its id.
    pub fn new(comment: &NodeId, target: NodeId) -> Self {
        Self {
            link_id: Self::derive_id(comment, &target),
            target_id: target,
        }
    }

    /// The link id for a comment/target pair.
    pub fn derive_id(comment: &NodeId, target: &NodeId) -> String {
        format!("annotation_{comment}_{target}")
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Text payload of a serialized node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNodeData {
    /// Node title
    #[serde(default)]
    pub title: String,
    /// Node description
    #[serde(default)]
    pub description: String,
    /// Creation timestamp; absent in legacy data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

/// A serialized node as stored remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    /// Node kind key
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Top-left corner in world coordinates
    pub position: Position,
    /// Text payload
    pub data: SnapshotNodeData,
    /// Input port count; absent in legacy data, in which case the kind default applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<u16>,
    /// Output port count; absent in legacy data, in which case the kind default applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<u16>,
}

/// A serialized connection as stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConnection {
    /// Source node id
    pub output_id: String,
    /// Source port, as `output_{n}`
    pub output_class: String,
    /// Target node id
    pub input_id: String,
    /// Target port, as `input_{n}`
    pub input_class: String,
}

impl SnapshotConnection {
    /// Formats a 1-based output port index as a port class.
    pub fn output_class(port: u16) -> String {
        format!("output_{port}")
    }

    /// Formats a 1-based input port index as a port class.
    pub fn input_class(port: u16) -> String {
        format!("input_{port}")
    }

    /// Parses a port class such as `output_2` with the expected prefix.
    pub fn parse_port(class: &str, prefix: &str) -> Option<u16> {
        class
            .strip_prefix(prefix)?
            .strip_prefix('_')?
            .parse::<u16>()
            .ok()
            .filter(|port| *port > 0)
    }
}

/// A serialized annotation link as stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLink {
    /// Annotated node id
    pub target_id: String,
    /// Derived link id
    pub link_id: String,
}

/// The complete exportable state of one diagram.
///
/// Ids are kept as plain strings here so a single malformed entry in stored
/// data can be skipped on import instead of failing the whole document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Nodes keyed by id
    #[serde(default)]
    pub nodes: BTreeMap<String, SnapshotNode>,
    /// Standard port-to-port connections
    #[serde(default)]
    pub connections: Vec<SnapshotConnection>,
    /// Comment-to-node annotation links keyed by comment id
    #[serde(default)]
    pub annotation_links: BTreeMap<String, Vec<SnapshotLink>>,
}

impl Snapshot {
    /// Serialize the snapshot to a pretty JSON string.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize a snapshot from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether the snapshot holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
