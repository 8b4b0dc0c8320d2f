//! Pointer gesture state machine for the canvas.
//!
//! ```text
//! Idle ──press──▶ PointerDown ──resolve──▶ Dragging        (drag handle)
//!                                   ├────▶ ConnectingPort  (output port)
//!                                   ├────▶ EditingText     (title / description)
//!                                   └────▶ Idle            (anything else)
//! Dragging | ConnectingPort ──release──▶ Idle
//! EditingText ──blur──▶ Idle
//! ```
//!
//! Only one gesture is active at a time. Transitions are pure so they can be
//! tested without a UI; the canvas applies the returned [`GestureCommit`]s to
//! the graph store.

use super::hit::HitRegion;
use crate::types::{NodeId, TextField};
use eframe::egui::{Pos2, Vec2};

/// The active pointer gesture.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Gesture {
    /// Nothing in progress
    #[default]
    Idle,
    /// The primary button went down on a node region
    PointerDown {
        /// Pressed node
        node: NodeId,
        /// Region under the press
        region: HitRegion,
        /// Press position in world space
        origin: Pos2,
    },
    /// Moving a node by its handle
    Dragging {
        /// Dragged node
        node: NodeId,
        /// Node position minus pointer position at the press
        grab_offset: Vec2,
    },
    /// Dragging a wire out of an output port
    ConnectingPort {
        /// Source node
        from: NodeId,
        /// Source port, 1-based
        port: u16,
        /// Current pointer position in world space
        pointer: Pos2,
    },
    /// Editing a text field inline
    EditingText {
        /// Edited node
        node: NodeId,
        /// Edited field
        field: TextField,
    },
}

/// Store-level effect of finishing a gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureCommit {
    /// Connect `from` to `to` using first free ports
    Connect {
        /// Source node
        from: NodeId,
        /// Target node
        to: NodeId,
    },
    /// A drag finished
    Moved(NodeId),
}

impl Gesture {
    /// Whether no gesture is active.
    pub fn is_idle(&self) -> bool {
        matches!(self, Gesture::Idle)
    }

    /// The node currently being dragged.
    pub fn dragged_node(&self) -> Option<&NodeId> {
        match self {
            Gesture::Dragging { node, .. } => Some(node),
            _ => None,
        }
    }

    /// The text field currently being edited.
    pub fn editing(&self) -> Option<(&NodeId, TextField)> {
        match self {
            Gesture::EditingText { node, field } => Some((node, *field)),
            _ => None,
        }
    }

    /// Primary press at `origin` over `region` of `node`.
    ///
    /// A press while editing or dragging is ignored unless it lands on a
    /// different region; editing ends through [`Self::blur`] instead.
    pub fn press(self, node: NodeId, region: HitRegion, origin: Pos2) -> Self {
        match self {
            Gesture::Idle => Gesture::PointerDown { node, region, origin },
            Gesture::EditingText { node: editing, field }
                if editing == node && region.text_field() == Some(field) =>
            {
                Gesture::EditingText { node: editing, field }
            }
            Gesture::EditingText { .. } => Gesture::PointerDown { node, region, origin },
            other => other,
        }
    }

    /// Resolves a [`Gesture::PointerDown`] given the pressed node's position.
    pub fn resolve(self, node_position: Pos2) -> Self {
        let Gesture::PointerDown { node, region, origin } = self else {
            return self;
        };
        match region {
            HitRegion::DragHandle => Gesture::Dragging {
                node,
                grab_offset: node_position - origin,
            },
            HitRegion::OutputPort(port) => Gesture::ConnectingPort {
                from: node,
                port,
                pointer: origin,
            },
            HitRegion::Title => Gesture::EditingText {
                node,
                field: TextField::Title,
            },
            HitRegion::Description => Gesture::EditingText {
                node,
                field: TextField::Description,
            },
            HitRegion::InputPort(_) | HitRegion::Body => Gesture::Idle,
        }
    }

    /// Pointer moved to `pointer`. Returns the new node position when dragging.
    pub fn motion(&mut self, pointer: Pos2) -> Option<(NodeId, Pos2)> {
        match self {
            Gesture::Dragging { node, grab_offset } => Some((node.clone(), pointer + *grab_offset)),
            Gesture::ConnectingPort { pointer: p, .. } => {
                *p = pointer;
                None
            }
            _ => None,
        }
    }

    /// Primary release; `target` is the node under the pointer, if any.
    pub fn release(self, target: Option<NodeId>) -> (Self, Option<GestureCommit>) {
        match self {
            Gesture::Dragging { node, .. } => (Gesture::Idle, Some(GestureCommit::Moved(node))),
            Gesture::ConnectingPort { from, .. } => {
                let commit = target
                    .filter(|to| *to != from)
                    .map(|to| GestureCommit::Connect { from, to });
                (Gesture::Idle, commit)
            }
            editing @ Gesture::EditingText { .. } => (editing, None),
            Gesture::Idle | Gesture::PointerDown { .. } => (Gesture::Idle, None),
        }
    }

    /// The inline editor lost focus.
    pub fn blur(self) -> Self {
        match self {
            Gesture::EditingText { .. } => Gesture::Idle,
            other => other,
        }
    }

    /// Aborts any gesture, e.g. when the node it refers to disappeared.
    pub fn cancel_for(self, removed: &NodeId) -> Self {
        let refers = match &self {
            Gesture::PointerDown { node, .. }
            | Gesture::Dragging { node, .. }
            | Gesture::EditingText { node, .. } => node == removed,
            Gesture::ConnectingPort { from, .. } => from == removed,
            Gesture::Idle => false,
        };
        if refers {
            Gesture::Idle
        } else {
            self
        }
    }
}
