//! Canvas interaction and navigation functionality.
//!
//! This module handles canvas panning and zooming, the coordinate transforms
//! between screen and world space, and feeds primary-button input through the
//! [`Gesture`] state machine.

use super::gesture::{Gesture, GestureCommit};
use super::hit::hit_test;
use super::state::EditorApp;
use crate::constants::*;
use crate::store::ConnectOutcome;
use crate::types::*;
use eframe::egui;
use log::debug;
use rand::Rng;

/// Picks a random top-left position for a new node inside `rect` (screen space).
///
/// The node is kept `RANDOM_PLACEMENT_MARGIN` away from the edges when the
/// rectangle is large enough; otherwise it sits at the margin.
pub fn random_screen_position(rect: egui::Rect, node_size: egui::Vec2, rng: &mut impl Rng) -> egui::Pos2 {
    fn sample(rng: &mut impl Rng, lo: f32, hi: f32) -> f32 {
        if hi > lo {
            rng.random_range(lo..hi)
        } else {
            lo
        }
    }
    let min = rect.min + egui::vec2(RANDOM_PLACEMENT_MARGIN, RANDOM_PLACEMENT_MARGIN);
    let max = rect.max - node_size - egui::vec2(RANDOM_PLACEMENT_MARGIN, RANDOM_PLACEMENT_MARGIN);
    egui::pos2(sample(rng, min.x, max.x), sample(rng, min.y, max.y))
}

/// Snaps a position to the nearest grid point.
pub fn snap_to_grid(pos: egui::Pos2) -> egui::Pos2 {
    egui::pos2(
        (pos.x / GRID_SIZE).round() * GRID_SIZE,
        (pos.y / GRID_SIZE).round() * GRID_SIZE,
    )
}

impl EditorApp {
    /// Converts screen coordinates to world coordinates accounting for zoom and pan.
    pub fn screen_to_world(&self, screen_pos: egui::Pos2) -> egui::Pos2 {
        (screen_pos - self.prefs.canvas.offset) / self.prefs.canvas.zoom_factor
    }

    /// Converts world coordinates to screen coordinates accounting for zoom and pan.
    pub fn world_to_screen(&self, world_pos: egui::Pos2) -> egui::Pos2 {
        world_pos * self.prefs.canvas.zoom_factor + self.prefs.canvas.offset
    }

    /// Converts a world rectangle to screen space.
    pub fn world_rect_to_screen(&self, rect: egui::Rect) -> egui::Rect {
        egui::Rect::from_min_max(self.world_to_screen(rect.min), self.world_to_screen(rect.max))
    }

    /// Handles middle-click or Cmd/Ctrl+left-click canvas panning.
    ///
    /// # Arguments
    ///
    /// * `ui` - The egui UI context
    /// * `response` - The response from the canvas widget
    pub fn handle_canvas_panning(&mut self, ui: &egui::Ui, response: &egui::Response) {
        let should_pan = ui.input(|i| {
            i.pointer.middle_down() || (i.pointer.primary_down() && i.modifiers.command)
        });

        if should_pan && self.interaction.gesture.is_idle() {
            if let Some(current_pos) = response.interact_pointer_pos() {
                if !self.interaction.is_panning {
                    self.interaction.is_panning = true;
                    self.interaction.last_pan_pos = Some(current_pos);
                } else if let Some(last_pos) = self.interaction.last_pan_pos {
                    self.prefs.canvas.offset += current_pos - last_pos;
                    self.interaction.last_pan_pos = Some(current_pos);
                }
            }
        } else {
            self.interaction.is_panning = false;
            self.interaction.last_pan_pos = None;
        }
    }

    /// Handles scroll wheel zooming.
    ///
    /// Zooms while keeping the world position under the cursor fixed. Only zooms
    /// when the cursor is over the canvas.
    ///
    /// # Arguments
    ///
    /// * `ui` - The egui UI context
    /// * `response` - The response from the canvas widget
    pub fn handle_canvas_zoom(&mut self, ui: &egui::Ui, response: &egui::Response) {
        let scroll_delta = ui.input(|i| i.smooth_scroll_delta.y);
        if scroll_delta == 0.0 {
            return;
        }
        let Some(mouse_pos) = ui
            .input(|i| i.pointer.hover_pos())
            .or_else(|| response.interact_pointer_pos())
        else {
            return;
        };
        if !response.rect.contains(mouse_pos) {
            return;
        }
        let zoom_delta = if scroll_delta > 0.0 { 0.025 } else { -0.025 };
        self.zoom_around(mouse_pos, self.prefs.canvas.zoom_factor + zoom_delta);
    }

    /// Sets the zoom to `zoom` (clamped), keeping `anchor` fixed on screen.
    pub fn zoom_around(&mut self, anchor: egui::Pos2, zoom: f32) {
        let world_before = self.screen_to_world(anchor);
        let old_zoom = self.prefs.canvas.zoom_factor;
        self.prefs.canvas.zoom_factor = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        if (self.prefs.canvas.zoom_factor - old_zoom).abs() > f32::EPSILON {
            let after = self.world_to_screen(world_before);
            self.prefs.canvas.offset += anchor - after;
        }
    }

    /// Whether the canvas layer owns a press at `screen_pos`.
    ///
    /// Presses on windows or menus drawn above the canvas belong to them.
    fn canvas_owns(&self, ui: &egui::Ui, screen_pos: egui::Pos2) -> bool {
        if self.context_menu.show || self.confirm.is_some() {
            return false;
        }
        ui.ctx()
            .layer_id_at(screen_pos)
            .map_or(true, |layer| layer == ui.layer_id())
    }

    /// Feeds primary-button input for this frame into the gesture machine.
    pub fn handle_canvas_pointer(&mut self, ui: &egui::Ui, response: &egui::Response) {
        if self.interaction.is_panning {
            return;
        }
        let (pressed, down, released, pos, shift, command) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_down(),
                i.pointer.primary_released(),
                i.pointer.interact_pos(),
                i.modifiers.shift,
                i.modifiers.command,
            )
        });
        let Some(screen_pos) = pos else {
            return;
        };
        let world = self.screen_to_world(screen_pos);

        if pressed && !command && response.rect.contains(screen_pos) && self.canvas_owns(ui, screen_pos) {
            self.begin_gesture(world);
        }
        if down {
            self.continue_gesture(world, shift);
        }
        if released {
            self.end_gesture(world);
        }
    }

    /// Records the right-clicked node and opens the context menu.
    pub fn handle_canvas_secondary(&mut self, response: &egui::Response) {
        if !response.secondary_clicked() {
            return;
        }
        if self.interaction.gesture.editing().is_some() {
            self.finish_text_edit();
        }
        if !self.interaction.gesture.is_idle() {
            return;
        }
        let Some(screen_pos) = response.interact_pointer_pos() else {
            return;
        };
        let world = self.screen_to_world(screen_pos);
        self.open_context_menu(screen_pos, world);
    }

    /// Opens the context menu for whatever lies at `world`.
    pub fn open_context_menu(&mut self, screen_pos: egui::Pos2, world: egui::Pos2) {
        self.refresh_layouts();
        let node = hit_test(self.layouts.values(), world).map(|(id, _)| id);
        if let Some(id) = &node {
            self.interaction.selected = Some(id.clone());
        }
        self.context_menu.node = node;
        self.context_menu.world_pos = world;
        self.context_menu.screen_pos = screen_pos;
        self.context_menu.link_submenu_open = false;
        self.context_menu.show = true;
        self.context_menu.just_opened = true;
    }

    /// Primary press at `world`.
    pub fn begin_gesture(&mut self, world: egui::Pos2) {
        self.refresh_layouts();
        let Some((node, region)) = hit_test(self.layouts.values(), world) else {
            self.finish_text_edit();
            self.interaction.selected = None;
            return;
        };

        let keeps_editing = self
            .interaction
            .gesture
            .editing()
            .is_some_and(|(editing, field)| *editing == node && region.text_field() == Some(field));
        if !keeps_editing {
            self.finish_text_edit();
        }
        self.interaction.selected = Some(node.clone());

        let Some(position) = self
            .store
            .node(&node)
            .map(|n| egui::pos2(n.position.x, n.position.y))
        else {
            return;
        };
        let gesture = std::mem::take(&mut self.interaction.gesture)
            .press(node, region, world)
            .resolve(position);

        if !keeps_editing {
            if let Some((id, field)) = gesture.editing() {
                self.interaction.edit_buffer = self
                    .store
                    .node(id)
                    .map(|n| n.text(field).to_string())
                    .unwrap_or_default();
                self.interaction.focus_requested = false;
            }
        }
        self.interaction.gesture = gesture;
    }

    /// Pointer held at `world`; moves the dragged node, snapping with Shift.
    pub fn continue_gesture(&mut self, world: egui::Pos2, snap: bool) {
        let Some((node, pos)) = self.interaction.gesture.motion(world) else {
            return;
        };
        let pos = if snap { snap_to_grid(pos) } else { pos };
        if self.store.move_node(&node, Position::new(pos.x, pos.y)) {
            self.layouts_stale = true;
        }
    }

    /// Primary release at `world`.
    pub fn end_gesture(&mut self, world: egui::Pos2) {
        self.refresh_layouts();
        let target = hit_test(self.layouts.values(), world).map(|(id, _)| id);
        let (gesture, commit) = std::mem::take(&mut self.interaction.gesture).release(target);
        self.interaction.gesture = gesture;
        match commit {
            Some(GestureCommit::Connect { from, to }) => self.connect_nodes(&from, &to),
            Some(GestureCommit::Moved(id)) => debug!("moved {id}"),
            None => {}
        }
    }

    /// Creates a standard connection and reports why it was refused, if it was.
    pub fn connect_nodes(&mut self, from: &NodeId, to: &NodeId) {
        self.notice = match self.store.connect(from, to) {
            ConnectOutcome::Connected(c) => {
                debug!("connected {}:{} -> {}:{}", c.source, c.source_port, c.target, c.target_port);
                None
            }
            ConnectOutcome::AlreadyConnected => Some(format!("{from} is already connected to {to}")),
            ConnectOutcome::NoFreePort => Some(format!("No free port between {from} and {to}")),
            ConnectOutcome::SelfConnection => None,
            ConnectOutcome::NotFound => Some("That node no longer exists".to_string()),
        };
    }

    /// Commits the inline editor's buffer and leaves text editing.
    pub fn finish_text_edit(&mut self) {
        if let Some((node, field)) = self.interaction.gesture.editing() {
            let node = node.clone();
            let value = std::mem::take(&mut self.interaction.edit_buffer);
            self.store.update_node_text(&node, field, &value);
        }
        self.interaction.gesture = std::mem::take(&mut self.interaction.gesture).blur();
        self.interaction.focus_requested = false;
    }

    /// Adds a node of `kind` at a random position within the visible canvas.
    pub fn add_node_at_random(&mut self, kind: NodeKind) -> NodeId {
        let rect = self
            .last_canvas_rect
            .unwrap_or_else(|| egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(1200.0, 800.0)));
        let size = egui::vec2(NODE_WIDTH, NODE_HEIGHT) * self.prefs.canvas.zoom_factor;
        let screen = random_screen_position(rect, size, &mut rand::rng());
        let world = self.screen_to_world(screen);
        self.add_node_at(kind, world)
    }

    /// Adds a node of `kind` with its top-left corner at `world`.
    pub fn add_node_at(&mut self, kind: NodeKind, world: egui::Pos2) -> NodeId {
        let id = self.store.add_node(kind, Position::new(world.x, world.y));
        self.interaction.selected = Some(id.clone());
        self.layouts_stale = true;
        id
    }

    /// Deletes `id` and abandons any gesture that refers to it.
    pub fn delete_node(&mut self, id: &NodeId) {
        if self.store.remove_node(id).is_none() {
            return;
        }
        self.interaction.gesture = std::mem::take(&mut self.interaction.gesture).cancel_for(id);
        if self.interaction.selected.as_ref() == Some(id) {
            self.interaction.selected = None;
        }
        if self.context_menu.node.as_ref() == Some(id) {
            self.context_menu.show = false;
        }
        self.layouts_stale = true;
    }

    /// Gesture currently active.
    pub(crate) fn gesture(&self) -> &Gesture {
        &self.interaction.gesture
    }
}
