//! In-memory graph state for one diagram.
//!
//! [`GraphStore`] is the single owner of the nodes, connections and annotation
//! links of the diagram being edited. It performs no I/O: every mutation is
//! recorded as a [`GraphChange`] that the persistence layer drains and turns
//! into a (debounced) save.
//!
//! Passing a stale [`NodeId`] is never an error. Operations report it through
//! their return value (`None`, `false`, or a `NotFound` outcome) and log it, so
//! the editor stays usable when a redraw pass has already removed a node.

use crate::types::*;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};

/// A mutation that happened in the store.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphChange {
    /// A node was created
    NodeAdded(NodeId),
    /// A node and everything touching it was removed
    NodeRemoved(NodeId),
    /// A node was moved
    NodeMoved(NodeId),
    /// A node's title or description changed
    TextChanged(NodeId, TextField),
    /// A standard connection was created
    Connected(Connection),
    /// Standard connections between a pair were removed
    Disconnected(NodeId, NodeId),
    /// An annotation link was created
    AnnotationAdded(NodeId, NodeId),
    /// An annotation link was removed
    AnnotationRemoved(NodeId, NodeId),
    /// Dangling annotation links were pruned
    AnnotationsPruned(usize),
    /// The whole diagram was cleared
    Cleared,
}

/// Result of a standard connect gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The connection was created
    Connected(Connection),
    /// One of the nodes does not exist
    NotFound,
    /// Source and target are the same node
    SelfConnection,
    /// The pair is already connected
    AlreadyConnected,
    /// The source has no free output port or the target no free input port
    NoFreePort,
}

/// Result of an annotation link gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationOutcome {
    /// The link was created
    Added,
    /// The link was removed (toggle only)
    Removed,
    /// The pair was already linked; nothing changed
    AlreadyLinked,
    /// The target is itself a comment; comments only annotate functional nodes
    TargetIsComment,
    /// The source is not a comment node
    SourceNotComment,
    /// Source and target are the same node
    SelfLink,
    /// One of the nodes does not exist
    NotFound,
}

impl AnnotationOutcome {
    /// Whether the outcome changed the store.
    pub fn is_change(self) -> bool {
        matches!(self, AnnotationOutcome::Added | AnnotationOutcome::Removed)
    }
}

/// What an import kept and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Nodes restored
    pub nodes: usize,
    /// Connections restored
    pub connections: usize,
    /// Annotation links restored
    pub annotation_links: usize,
    /// Node entries skipped because their id could not be parsed
    pub skipped_nodes: usize,
    /// Connections dropped because an endpoint or port was invalid
    pub dropped_connections: usize,
    /// Annotation links dropped because an endpoint was absent or invalid
    pub pruned_links: usize,
}

/// Canonical in-memory state of one diagram.
#[derive(Debug, Default)]
pub struct GraphStore {
    nodes: BTreeMap<NodeId, Node>,
    connections: Vec<Connection>,
    annotations: BTreeMap<NodeId, Vec<AnnotationLink>>,
    /// Highest sequence number handed out per id prefix
    counters: HashMap<String, u32>,
    dirty: bool,
    changes: Vec<GraphChange>,
}

impl GraphStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, change: GraphChange) {
        self.dirty = true;
        self.changes.push(change);
    }

    /// Takes the changes recorded since the last call.
    pub fn drain_changes(&mut self) -> Vec<GraphChange> {
        std::mem::take(&mut self.changes)
    }

    /// Whether there are mutations not yet acknowledged by [`Self::mark_clean`].
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clears the dirty flag, typically after a successful save.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Looks up a node.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Whether a node with this id exists.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the diagram has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All standard connections in creation order.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// All annotation links keyed by comment node.
    pub fn annotation_links(&self) -> &BTreeMap<NodeId, Vec<AnnotationLink>> {
        &self.annotations
    }

    /// The links owned by one comment node.
    pub fn annotation_targets(&self, comment: &NodeId) -> &[AnnotationLink] {
        self.annotations
            .get(comment)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether `comment` currently links to `target`.
    pub fn has_annotation_link(&self, comment: &NodeId, target: &NodeId) -> bool {
        self.annotation_targets(comment)
            .iter()
            .any(|link| link.target_id == *target)
    }

    /// Whether an annotation link from `comment` to `target` would be accepted.
    pub fn can_annotate(&self, comment: &NodeId, target: &NodeId) -> bool {
        self.check_annotation(comment, target).is_none()
    }

    // ---------------------------------------------------------------------
    // Nodes
    // ---------------------------------------------------------------------

    /// Creates a node of `kind` at `position` and returns its identity.
    pub fn add_node(&mut self, kind: NodeKind, position: Position) -> NodeId {
        let key = kind.key().to_string();
        let counter = self.counters.entry(key.clone()).or_insert(0);
        let seq = match counter.checked_add(1) {
            Some(next) => {
                *counter = next;
                next
            }
            None => {
                // Counter exhausted by imported data; take the lowest free number.
                let free = (1..=u32::MAX).find(|n| !self.nodes.contains_key(&NodeId::new(key.as_str(), *n)));
                warn!("sequence numbers for `{key}` are exhausted, reusing a free one");
                free.unwrap_or(u32::MAX)
            }
        };
        let id = NodeId::new(kind.key(), seq);
        let node = Node::new(id.clone(), kind, position);
        self.nodes.insert(id.clone(), node);
        self.record(GraphChange::NodeAdded(id.clone()));
        debug!("added node {id}");
        id
    }

    /// Removes a node, its connections and every annotation link that mentions it.
    ///
    /// Returns `None` if the node does not exist.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<Node> {
        let Some(node) = self.nodes.remove(id) else {
            debug!("remove_node: stale reference {id}");
            return None;
        };
        self.connections.retain(|conn| !conn.touches(id));
        self.annotations.remove(id);
        for links in self.annotations.values_mut() {
            links.retain(|link| link.target_id != *id);
        }
        self.annotations.retain(|_, links| !links.is_empty());
        self.record(GraphChange::NodeRemoved(id.clone()));
        Some(node)
    }

    /// Moves a node. Returns `false` for an unknown id.
    pub fn move_node(&mut self, id: &NodeId, position: Position) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                if node.position == position {
                    return true;
                }
                node.position = position;
                self.record(GraphChange::NodeMoved(id.clone()));
                true
            }
            None => {
                debug!("move_node: stale reference {id}");
                false
            }
        }
    }

    /// Replaces a node's title or description with the trimmed `value`.
    ///
    /// Returns `false` for an unknown id.
    pub fn update_node_text(&mut self, id: &NodeId, field: TextField, value: &str) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            debug!("update_node_text: stale reference {id}");
            return false;
        };
        let value = value.trim();
        let slot = node.text_mut(field);
        if slot == value {
            return true;
        }
        *slot = value.to_string();
        self.record(GraphChange::TextChanged(id.clone(), field));
        true
    }

    // ---------------------------------------------------------------------
    // Standard connections
    // ---------------------------------------------------------------------

    fn first_free_output(&self, node: &Node) -> Option<u16> {
        (1..=node.outputs).find(|port| {
            !self
                .connections
                .iter()
                .any(|c| c.source == node.id && c.source_port == *port)
        })
    }

    fn first_free_input(&self, node: &Node) -> Option<u16> {
        (1..=node.inputs).find(|port| {
            !self
                .connections
                .iter()
                .any(|c| c.target == node.id && c.target_port == *port)
        })
    }

    /// Connects the first free output port of `source` to the first free input port of `target`.
    pub fn connect(&mut self, source: &NodeId, target: &NodeId) -> ConnectOutcome {
        if source == target {
            return ConnectOutcome::SelfConnection;
        }
        let (Some(from), Some(to)) = (self.nodes.get(source), self.nodes.get(target)) else {
            debug!("connect: stale reference {source} -> {target}");
            return ConnectOutcome::NotFound;
        };
        if self
            .connections
            .iter()
            .any(|c| c.source == *source && c.target == *target)
        {
            return ConnectOutcome::AlreadyConnected;
        }
        let (Some(source_port), Some(target_port)) =
            (self.first_free_output(from), self.first_free_input(to))
        else {
            debug!("connect: no free port for {source} -> {target}");
            return ConnectOutcome::NoFreePort;
        };
        let connection = Connection {
            source: source.clone(),
            source_port,
            target: target.clone(),
            target_port,
        };
        self.connections.push(connection.clone());
        self.record(GraphChange::Connected(connection.clone()));
        ConnectOutcome::Connected(connection)
    }

    /// Removes every connection from `source` to `target`. Returns whether any existed.
    pub fn disconnect(&mut self, source: &NodeId, target: &NodeId) -> bool {
        let before = self.connections.len();
        self.connections
            .retain(|c| !(c.source == *source && c.target == *target));
        if self.connections.len() == before {
            return false;
        }
        self.record(GraphChange::Disconnected(source.clone(), target.clone()));
        true
    }

    // ---------------------------------------------------------------------
    // Annotation links
    // ---------------------------------------------------------------------

    fn check_annotation(&self, comment: &NodeId, target: &NodeId) -> Option<AnnotationOutcome> {
        if comment == target {
            return Some(AnnotationOutcome::SelfLink);
        }
        let (Some(source), Some(dest)) = (self.nodes.get(comment), self.nodes.get(target)) else {
            return Some(AnnotationOutcome::NotFound);
        };
        if !source.kind.is_comment() {
            return Some(AnnotationOutcome::SourceNotComment);
        }
        if dest.kind.is_comment() {
            return Some(AnnotationOutcome::TargetIsComment);
        }
        if self.has_annotation_link(comment, target) {
            return Some(AnnotationOutcome::AlreadyLinked);
        }
        None
    }

    /// Links a comment node to a target node.
    ///
    /// Duplicate links and comment-to-comment links are rejected without
    /// changing anything.
    pub fn add_annotation_link(&mut self, comment: &NodeId, target: &NodeId) -> AnnotationOutcome {
        if let Some(rejected) = self.check_annotation(comment, target) {
            debug!("annotation {comment} -> {target} not added: {rejected:?}");
            return rejected;
        }
        self.annotations
            .entry(comment.clone())
            .or_default()
            .push(AnnotationLink::new(comment, target.clone()));
        self.record(GraphChange::AnnotationAdded(comment.clone(), target.clone()));
        AnnotationOutcome::Added
    }

    /// Removes the link from `comment` to `target`. Returns whether it existed.
    pub fn remove_annotation_link(&mut self, comment: &NodeId, target: &NodeId) -> bool {
        let Some(links) = self.annotations.get_mut(comment) else {
            return false;
        };
        let before = links.len();
        links.retain(|link| link.target_id != *target);
        let removed = links.len() != before;
        if links.is_empty() {
            self.annotations.remove(comment);
        }
        if removed {
            self.record(GraphChange::AnnotationRemoved(comment.clone(), target.clone()));
        }
        removed
    }

    /// Adds the link if absent, removes it if present.
    pub fn toggle_annotation_link(&mut self, comment: &NodeId, target: &NodeId) -> AnnotationOutcome {
        if self.remove_annotation_link(comment, target) {
            AnnotationOutcome::Removed
        } else {
            self.add_annotation_link(comment, target)
        }
    }

    /// Drops annotation links whose comment or target is not `live`.
    ///
    /// Returns how many links were removed.
    pub fn prune_dangling_links(&mut self, live: impl Fn(&NodeId) -> bool) -> usize {
        let mut pruned = 0;
        self.annotations.retain(|comment, links| {
            if !live(comment) {
                pruned += links.len();
                return false;
            }
            let before = links.len();
            links.retain(|link| live(&link.target_id));
            pruned += before - links.len();
            !links.is_empty()
        });
        if pruned > 0 {
            debug!("pruned {pruned} dangling annotation link(s)");
            self.record(GraphChange::AnnotationsPruned(pruned));
        }
        pruned
    }

    /// Replaces the diagram with an empty one.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.connections.clear();
        self.annotations.clear();
        self.record(GraphChange::Cleared);
    }

    // ---------------------------------------------------------------------
    // Snapshots
    // ---------------------------------------------------------------------

    /// Builds the serializable form of the current diagram.
    pub fn export_snapshot(&self) -> Snapshot {
        let nodes = self
            .nodes
            .values()
            .map(|node| {
                (
                    node.id.to_string(),
                    SnapshotNode {
                        kind: node.kind.clone(),
                        position: node.position,
                        data: SnapshotNodeData {
                            title: node.title.clone(),
                            description: node.description.clone(),
                            created: node.created_at,
                        },
                        inputs: Some(node.inputs),
                        outputs: Some(node.outputs),
                    },
                )
            })
            .collect();

        let connections = self
            .connections
            .iter()
            .map(|c| SnapshotConnection {
                output_id: c.source.to_string(),
                output_class: SnapshotConnection::output_class(c.source_port),
                input_id: c.target.to_string(),
                input_class: SnapshotConnection::input_class(c.target_port),
            })
            .collect();

        let annotation_links = self
            .annotations
            .iter()
            .map(|(comment, links)| {
                (
                    comment.to_string(),
                    links
                        .iter()
                        .map(|link| SnapshotLink {
                            target_id: link.target_id.to_string(),
                            link_id: link.link_id.clone(),
                        })
                        .collect(),
                )
            })
            .collect();

        Snapshot {
            nodes,
            connections,
            annotation_links,
        }
    }

    /// Replaces the whole diagram with `snapshot`.
    ///
    /// Sequence counters are re-seeded from the highest number seen per id
    /// prefix, so newly added nodes never collide with restored ones. Entries
    /// that reference absent nodes are dropped. The store is clean afterwards.
    pub fn import_snapshot(&mut self, snapshot: Snapshot) -> ImportReport {
        let mut report = ImportReport::default();
        let mut nodes = BTreeMap::new();
        let mut counters: HashMap<String, u32> = HashMap::new();

        for (raw_id, entry) in snapshot.nodes {
            let Ok(id) = raw_id.parse::<NodeId>() else {
                debug!("import: skipping node with malformed id `{raw_id}`");
                report.skipped_nodes += 1;
                continue;
            };
            let (default_inputs, default_outputs) = entry.kind.default_ports();
            let seq = counters.entry(id.kind_key().to_string()).or_insert(0);
            *seq = (*seq).max(id.seq());
            nodes.insert(
                id.clone(),
                Node {
                    id,
                    kind: entry.kind,
                    title: entry.data.title,
                    description: entry.data.description,
                    position: entry.position,
                    inputs: entry.inputs.unwrap_or(default_inputs),
                    outputs: entry.outputs.unwrap_or(default_outputs),
                    created_at: entry.data.created,
                },
            );
        }

        let mut connections = Vec::with_capacity(snapshot.connections.len());
        for raw in snapshot.connections {
            let parsed = (|| {
                let source = raw.output_id.parse::<NodeId>().ok()?;
                let target = raw.input_id.parse::<NodeId>().ok()?;
                let source_port = SnapshotConnection::parse_port(&raw.output_class, "output")?;
                let target_port = SnapshotConnection::parse_port(&raw.input_class, "input")?;
                let valid = nodes.get(&source).is_some_and(|n: &Node| source_port <= n.outputs)
                    && nodes.get(&target).is_some_and(|n: &Node| target_port <= n.inputs);
                valid.then_some(Connection {
                    source,
                    source_port,
                    target,
                    target_port,
                })
            })();
            match parsed {
                Some(connection) => connections.push(connection),
                None => {
                    debug!("import: dropping invalid connection {raw:?}");
                    report.dropped_connections += 1;
                }
            }
        }

        let mut annotations: BTreeMap<NodeId, Vec<AnnotationLink>> = BTreeMap::new();
        for (raw_comment, raw_links) in snapshot.annotation_links {
            let comment = raw_comment
                .parse::<NodeId>()
                .ok()
                .filter(|id| nodes.get(id).is_some_and(|n| n.kind.is_comment()));
            let Some(comment) = comment else {
                report.pruned_links += raw_links.len();
                continue;
            };
            let mut kept: Vec<AnnotationLink> = Vec::new();
            for raw in raw_links {
                let target = raw
                    .target_id
                    .parse::<NodeId>()
                    .ok()
                    .filter(|id| *id != comment)
                    .filter(|id| nodes.get(id).is_some_and(|n| !n.kind.is_comment()))
                    .filter(|id| !kept.iter().any(|link| link.target_id == *id));
                match target {
                    Some(target) => kept.push(AnnotationLink::new(&comment, target)),
                    None => report.pruned_links += 1,
                }
            }
            if !kept.is_empty() {
                annotations.insert(comment, kept);
            }
        }

        report.nodes = nodes.len();
        report.connections = connections.len();
        report.annotation_links = annotations.values().map(Vec::len).sum();

        self.nodes = nodes;
        self.connections = connections;
        self.annotations = annotations;
        self.counters = counters;
        self.changes.clear();
        self.dirty = false;
        report
    }
}
