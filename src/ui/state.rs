//! Application state structures.
//!
//! This module holds everything the editor tracks between frames: the graph
//! store and its persistence bridge, canvas navigation, the active pointer
//! gesture, context-menu and confirmation state, and the annotation overlay.

use super::gesture::Gesture;
use super::hit::NodeLayout;
use super::overlay::AnnotationOverlay;
use crate::persistence::{PersistenceBridge, RemoteStore};
use crate::store::GraphStore;
use crate::types::*;
use eframe::egui;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// State related to canvas navigation and display.
///
/// Tracks the current pan offset, zoom level, and display options for the canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasState {
    /// Current canvas pan offset (in screen space)
    #[serde(skip)]
    pub offset: egui::Vec2,
    /// Current zoom level (1.0 = normal, 2.0 = 2x zoom, 0.5 = 50% zoom)
    pub zoom_factor: f32,
    /// Whether the grid should be displayed on the canvas
    pub show_grid: bool,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            offset: egui::Vec2::ZERO,
            zoom_factor: 1.0,
            show_grid: true,
        }
    }
}

/// UI preferences kept in eframe storage between runs.
///
/// The diagram itself is never stored here; it lives in the remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiPrefs {
    /// Canvas display options
    pub canvas: CanvasState,
    /// Dark or light theme
    pub dark_mode: bool,
}

impl Default for UiPrefs {
    fn default() -> Self {
        Self {
            canvas: CanvasState::default(),
            dark_mode: true,
        }
    }
}

/// State related to pointer interaction with nodes and the canvas.
#[derive(Debug, Default)]
pub struct InteractionState {
    /// The one active gesture
    pub gesture: Gesture,
    /// Node targeted by the Delete key
    pub selected: Option<NodeId>,
    /// Whether the user is panning the canvas
    pub is_panning: bool,
    /// Last pointer position while panning
    pub last_pan_pos: Option<egui::Pos2>,
    /// Text being edited inline, committed on Enter or blur
    pub edit_buffer: String,
    /// Whether focus was already requested for the current edit session
    pub focus_requested: bool,
}

/// Right-click menu state.
#[derive(Debug, Clone, Default)]
pub struct ContextMenuState {
    /// Whether the menu is visible
    pub show: bool,
    /// Set on the frame the menu opens so the opening click does not close it
    pub just_opened: bool,
    /// Screen position of the right click
    pub screen_pos: egui::Pos2,
    /// World position of the right click
    pub world_pos: egui::Pos2,
    /// Node under the pointer when the menu opened; `None` for the canvas menu
    pub node: Option<NodeId>,
    /// Whether the "Link to…" submenu is expanded
    pub link_submenu_open: bool,
}

/// Destructive action awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingConfirm {
    /// Delete one node with its connections and annotation links
    DeleteNode(NodeId),
    /// Remove everything and save the empty diagram
    ClearDiagram,
}

/// The diagram editor.
pub struct EditorApp {
    /// Canonical graph state
    pub store: GraphStore,
    /// Load/save driver
    pub bridge: PersistenceBridge,
    /// Persisted UI preferences
    pub prefs: UiPrefs,
    /// Pointer interaction
    pub interaction: InteractionState,
    /// Context menu
    pub context_menu: ContextMenuState,
    /// Confirmation dialog, when one is open
    pub confirm: Option<PendingConfirm>,
    /// Annotation path overlay
    pub overlay: AnnotationOverlay,
    /// Layout of every rendered node, in draw order
    pub layouts: BTreeMap<NodeId, NodeLayout>,
    /// Whether `layouts` must be rebuilt before use
    pub layouts_stale: bool,
    /// Canvas rectangle of the last frame, for toolbar placement
    pub last_canvas_rect: Option<egui::Rect>,
    /// Short feedback for the last rejected gesture
    pub notice: Option<String>,
}

impl EditorApp {
    /// Creates an editor for `entity_id`, persisting through `remote`.
    ///
    /// Nothing is fetched until [`EditorApp::start`] is called.
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        entity_id: impl Into<String>,
        quiet: Duration,
        runtime: Handle,
    ) -> Self {
        Self {
            store: GraphStore::new(),
            bridge: PersistenceBridge::new(remote, entity_id, quiet, runtime),
            prefs: UiPrefs::default(),
            interaction: InteractionState::default(),
            context_menu: ContextMenuState::default(),
            confirm: None,
            overlay: AnnotationOverlay::default(),
            layouts: BTreeMap::new(),
            layouts_stale: true,
            last_canvas_rect: None,
            notice: None,
        }
    }

    /// Wires repaint wake-ups to `ctx` and starts loading the diagram.
    pub fn start(&mut self, ctx: &egui::Context) {
        let ctx = ctx.clone();
        self.bridge.set_waker(Arc::new(move || ctx.request_repaint()));
        self.bridge.request_load();
    }

    /// Rebuilds node layouts if anything moved or changed.
    pub fn refresh_layouts(&mut self) {
        if !self.layouts_stale {
            return;
        }
        self.layouts = self
            .store
            .nodes()
            .map(|node| (node.id.clone(), NodeLayout::new(node)))
            .collect();
        self.layouts_stale = false;
    }
}
