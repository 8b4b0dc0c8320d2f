//! Toolbar, context menus and confirmation dialogs.

use super::state::{EditorApp, PendingConfirm};
use crate::persistence::SaveStatus;
use crate::types::*;
use eframe::egui;
use log::info;

impl EditorApp {
    /// Draws the top toolbar: node palette, save/clear, view options and status.
    pub fn draw_toolbar(&mut self, ui: &mut egui::Ui) {
        let ready = !self.bridge.is_loading() && !self.bridge.load_failed();
        ui.horizontal_wrapped(|ui| {
            ui.label("Add:");
            for kind in NodeKind::PALETTE {
                let button = ui
                    .add_enabled(ready, egui::Button::new(format!("{} {}", kind.icon(), kind.label())))
                    .on_hover_text(kind.default_description());
                if button.clicked() {
                    let id = self.add_node_at_random(kind);
                    info!("added {id} from the palette");
                }
            }
        });
        ui.horizontal(|ui| {
            if self.bridge.load_failed() && ui.button("⟳ Retry load").clicked() {
                self.retry_load();
            }
            if ui.add_enabled(ready, egui::Button::new("💾 Save")).clicked() {
                self.save_diagram();
            }
            if ui
                .add_enabled(ready && !self.store.is_empty(), egui::Button::new("🗑 Clear"))
                .clicked()
            {
                self.confirm = Some(PendingConfirm::ClearDiagram);
            }
            ui.separator();

            if ui.button("−").on_hover_text("Zoom out").clicked() {
                self.zoom_step(-0.1);
            }
            ui.label(format!("{:.0}%", self.prefs.canvas.zoom_factor * 100.0));
            if ui.button("+").on_hover_text("Zoom in").clicked() {
                self.zoom_step(0.1);
            }
            if ui.button("Reset view").clicked() {
                self.prefs.canvas.zoom_factor = 1.0;
                self.prefs.canvas.offset = egui::Vec2::ZERO;
            }
            ui.checkbox(&mut self.prefs.canvas.show_grid, "Grid");
            ui.checkbox(&mut self.prefs.dark_mode, "Dark");
            ui.separator();

            ui.label(format!("Entity {}", self.bridge.entity_id()));
            ui.weak(format!(
                "{} nodes, {} connections",
                self.store.len(),
                self.store.connections().len()
            ));
            let status = self.bridge.status();
            let color = match status {
                SaveStatus::Error(_) => egui::Color32::from_rgb(229, 57, 53),
                SaveStatus::Saved => egui::Color32::from_rgb(67, 160, 71),
                SaveStatus::Pending | SaveStatus::Saving | SaveStatus::Loading => {
                    egui::Color32::from_rgb(251, 140, 0)
                }
                SaveStatus::Idle => ui.visuals().weak_text_color(),
            };
            ui.colored_label(color, status.label());
            if let Some(notice) = &self.notice {
                ui.weak(notice);
            }
        });
    }

    fn zoom_step(&mut self, delta: f32) {
        let anchor = self
            .last_canvas_rect
            .map(|r| r.center())
            .unwrap_or(egui::Pos2::ZERO);
        self.zoom_around(anchor, self.prefs.canvas.zoom_factor + delta);
    }

    /// Fetches the stored diagram again after a failed load.
    pub fn retry_load(&mut self) {
        self.notice = None;
        self.bridge.request_load();
    }

    /// Saves immediately with the current diagram.
    ///
    /// An open inline edit is committed first. Changes made up to this point
    /// are covered by this save and do not restart the autosave timer.
    pub fn save_diagram(&mut self) {
        self.finish_text_edit();
        self.absorb_store_changes();
        if self.bridge.load_failed() {
            self.notice = Some("Nothing saved: the diagram was never loaded".to_string());
            return;
        }
        let snapshot = self.store.export_snapshot();
        if !self.bridge.save_now(snapshot) {
            self.notice = Some("Save queued behind the one in progress".to_string());
        }
    }

    /// Empties the diagram and saves the empty state.
    pub fn clear_diagram(&mut self) {
        self.finish_text_edit();
        self.store.clear();
        self.interaction.selected = None;
        self.context_menu.show = false;
        self.save_diagram();
    }

    /// Renders the right-click context menu.
    ///
    /// On a node it offers disconnection, annotation links for comments and
    /// deletion; on empty canvas it creates nodes at the clicked position.
    pub fn draw_context_menu(&mut self, ui: &mut egui::Ui) {
        let area_response = egui::Area::new(egui::Id::new("context_menu"))
            .fixed_pos(self.context_menu.screen_pos)
            .order(egui::Order::Foreground)
            .show(ui.ctx(), |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.vertical(|ui| match self.context_menu.node.clone() {
                        Some(id) => self.node_menu(ui, &id),
                        None => self.canvas_menu(ui),
                    });
                })
            });

        if !self.context_menu.just_opened && ui.input(|i| i.pointer.any_click()) {
            if let Some(click_pos) = ui.input(|i| i.pointer.interact_pos()) {
                if !area_response.response.rect.contains(click_pos) {
                    self.context_menu.show = false;
                }
            }
        }
        self.context_menu.just_opened = false;
    }

    fn canvas_menu(&mut self, ui: &mut egui::Ui) {
        ui.label("Create node:");
        ui.separator();
        for kind in NodeKind::PALETTE {
            if ui.button(format!("{} {}", kind.icon(), kind.label())).clicked() {
                self.add_node_at(kind, self.context_menu.world_pos);
                self.context_menu.show = false;
            }
        }
        ui.separator();
        if ui.button("Cancel").clicked() {
            self.context_menu.show = false;
        }
    }

    fn node_menu(&mut self, ui: &mut egui::Ui, id: &NodeId) {
        let Some(node) = self.store.node(id) else {
            self.context_menu.show = false;
            return;
        };
        let is_comment = node.kind.is_comment();
        ui.strong(format!("{} {}", node.kind.icon(), node.title));
        ui.separator();

        // Each outgoing target once, in connection order.
        let mut targets: Vec<NodeId> = Vec::new();
        for c in self.store.connections().iter().filter(|c| c.source == *id) {
            if !targets.contains(&c.target) {
                targets.push(c.target.clone());
            }
        }
        for target in targets {
            let label = self
                .store
                .node(&target)
                .map(|n| n.title.clone())
                .unwrap_or_else(|| target.to_string());
            if ui.button(format!("Disconnect from {label}")).clicked() {
                self.store.disconnect(id, &target);
                self.context_menu.show = false;
            }
        }

        if is_comment {
            let arrow = if self.context_menu.link_submenu_open { "▾" } else { "▸" };
            if ui.button(format!("Link to… {arrow}")).clicked() {
                self.context_menu.link_submenu_open = !self.context_menu.link_submenu_open;
            }
            if self.context_menu.link_submenu_open {
                self.link_submenu(ui, id);
            }
        }

        ui.separator();
        if ui.button("Delete node").clicked() {
            self.confirm = Some(PendingConfirm::DeleteNode(id.clone()));
            self.context_menu.show = false;
        }
        if ui.button("Cancel").clicked() {
            self.context_menu.show = false;
        }
    }

    /// Toggle list of annotation targets for `comment`; other comments are disabled.
    fn link_submenu(&mut self, ui: &mut egui::Ui, comment: &NodeId) {
        let candidates: Vec<(NodeId, String, bool)> = self
            .store
            .nodes()
            .filter(|n| n.id != *comment)
            .map(|n| (n.id.clone(), format!("{} {}", n.kind.icon(), n.title), n.kind.is_comment()))
            .collect();
        ui.indent("link_targets", |ui| {
            if candidates.is_empty() {
                ui.weak("No other nodes");
            }
            for (target, label, target_is_comment) in candidates {
                let mut linked = self.store.has_annotation_link(comment, &target);
                let response = ui
                    .add_enabled(!target_is_comment, egui::Checkbox::new(&mut linked, label))
                    .on_disabled_hover_text("Comments cannot annotate other comments");
                if response.changed() {
                    let outcome = self.store.toggle_annotation_link(comment, &target);
                    info!("annotation {comment} -> {target}: {outcome:?}");
                }
            }
        });
    }

    /// Shows the open confirmation dialog, if any.
    pub fn draw_confirm_dialog(&mut self, ctx: &egui::Context) {
        let Some(pending) = self.confirm.clone() else {
            return;
        };
        let (title, message, confirm_label) = match &pending {
            PendingConfirm::DeleteNode(id) => {
                let name = self
                    .store
                    .node(id)
                    .map(|n| n.title.clone())
                    .unwrap_or_else(|| id.to_string());
                (
                    "Delete node?",
                    format!("Delete \"{name}\" together with its connections and annotation links?"),
                    "Delete",
                )
            }
            PendingConfirm::ClearDiagram => (
                "Clear diagram?",
                "Remove every node and save the empty diagram?".to_string(),
                "Clear",
            ),
        };
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label(message);
                ui.horizontal(|ui| {
                    if ui.button(confirm_label).clicked() {
                        self.confirm = None;
                        match &pending {
                            PendingConfirm::DeleteNode(id) => self.delete_node(id),
                            PendingConfirm::ClearDiagram => self.clear_diagram(),
                        }
                    }
                    if ui.button("Cancel").clicked() {
                        self.confirm = None;
                    }
                });
            });
    }
}
