//! Node geometry and hit-region classification.
//!
//! A node is split into regions that own pointer presses:
//!
//! ```text
//!  ┌──────────────────────────┐
//!  │ ▤ drag handle            │
//! ●│   title                  │●   ● = ports (inputs left, outputs right)
//!  │   description ...        │
//!  └──────────────────────────┘
//! ```
//!
//! Ports win over everything, text regions win over the handle, and only the
//! handle starts a drag. Everything is computed in world coordinates.

use crate::constants::*;
use crate::types::{Node, NodeId, TextField};
use eframe::egui::{pos2, vec2, Pos2, Rect};

/// Region of a node under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitRegion {
    /// Header strip; the only region that starts a drag
    DragHandle,
    /// Single-line title text
    Title,
    /// Multi-line description text
    Description,
    /// Input port, 1-based
    InputPort(u16),
    /// Output port, 1-based; starts a connection
    OutputPort(u16),
    /// Padding inside the node that belongs to no other region
    Body,
}

impl HitRegion {
    /// The text field this region edits, if any.
    pub fn text_field(self) -> Option<TextField> {
        match self {
            HitRegion::Title => Some(TextField::Title),
            HitRegion::Description => Some(TextField::Description),
            _ => None,
        }
    }
}

/// World-space layout of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeLayout {
    /// Node identity
    pub id: NodeId,
    /// Outer rectangle
    pub rect: Rect,
    /// Drag handle strip
    pub handle: Rect,
    /// Title text area
    pub title: Rect,
    /// Description text area
    pub description: Rect,
    /// Input port centres, in port order
    pub inputs: Vec<Pos2>,
    /// Output port centres, in port order
    pub outputs: Vec<Pos2>,
}

fn port_centres(x: f32, top: f32, bottom: f32, count: u16) -> Vec<Pos2> {
    let span = bottom - top;
    (1..=count)
        .map(|i| pos2(x, top + span * i as f32 / (count as f32 + 1.0)))
        .collect()
}

impl NodeLayout {
    /// Computes the layout of `node`.
    pub fn new(node: &Node) -> Self {
        let rect = Rect::from_min_size(
            pos2(node.position.x, node.position.y),
            vec2(NODE_WIDTH, NODE_HEIGHT),
        );
        let handle = Rect::from_min_max(rect.min, pos2(rect.max.x, rect.min.y + NODE_HANDLE_HEIGHT));
        let title = Rect::from_min_max(
            pos2(rect.min.x + NODE_TEXT_PADDING, handle.max.y),
            pos2(rect.max.x - NODE_TEXT_PADDING, handle.max.y + NODE_TITLE_HEIGHT),
        );
        let description = Rect::from_min_max(
            pos2(rect.min.x + NODE_TEXT_PADDING, title.max.y + 2.0),
            pos2(rect.max.x - NODE_TEXT_PADDING, rect.max.y - NODE_TEXT_PADDING),
        );
        Self {
            id: node.id.clone(),
            inputs: port_centres(rect.min.x, handle.max.y, rect.max.y, node.inputs),
            outputs: port_centres(rect.max.x, handle.max.y, rect.max.y, node.outputs),
            rect,
            handle,
            title,
            description,
        }
    }

    /// Visual centre of the node.
    pub fn center(&self) -> Pos2 {
        self.rect.center()
    }

    /// Centre of input port `port` (1-based).
    pub fn input(&self, port: u16) -> Option<Pos2> {
        self.inputs.get(usize::from(port).checked_sub(1)?).copied()
    }

    /// Centre of output port `port` (1-based).
    pub fn output(&self, port: u16) -> Option<Pos2> {
        self.outputs.get(usize::from(port).checked_sub(1)?).copied()
    }

    /// The rectangle of a text region.
    pub fn text_rect(&self, field: TextField) -> Rect {
        match field {
            TextField::Title => self.title,
            TextField::Description => self.description,
        }
    }

    /// Classifies `point`, or `None` when it misses the node entirely.
    pub fn classify(&self, point: Pos2) -> Option<HitRegion> {
        let reach = PORT_RADIUS + PORT_HIT_SLOP;
        let near = |centre: &Pos2| centre.distance(point) <= reach;
        if let Some(i) = self.outputs.iter().position(near) {
            return Some(HitRegion::OutputPort(i as u16 + 1));
        }
        if let Some(i) = self.inputs.iter().position(near) {
            return Some(HitRegion::InputPort(i as u16 + 1));
        }
        if !self.rect.contains(point) {
            return None;
        }
        if self.title.contains(point) {
            Some(HitRegion::Title)
        } else if self.description.contains(point) {
            Some(HitRegion::Description)
        } else if self.handle.contains(point) {
            Some(HitRegion::DragHandle)
        } else {
            Some(HitRegion::Body)
        }
    }
}

/// Finds the top-most node under `point`; later layouts are drawn on top.
pub fn hit_test<'a>(
    layouts: impl DoubleEndedIterator<Item = &'a NodeLayout>,
    point: Pos2,
) -> Option<(NodeId, HitRegion)> {
    layouts
        .rev()
        .find_map(|layout| layout.classify(point).map(|region| (layout.id.clone(), region)))
}
