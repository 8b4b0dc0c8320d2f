//! User interface of the diagram editor.
//!
//! # Module Organization
//!
//! - `state` - Application state structures and the main [`EditorApp`]
//! - `hit` - Node geometry and hit-region classification
//! - `gesture` - Pointer gesture state machine
//! - `canvas` - Canvas navigation, coordinate transforms and pointer handling
//! - `rendering` - Drawing nodes, connections, annotation curves and inline editors
//! - `overlay` - Scheduled annotation redraw pass
//! - `menus` - Toolbar, context menus and confirmation dialogs

mod canvas;
mod gesture;
mod hit;
mod menus;
mod overlay;
mod rendering;
mod state;

pub use state::{EditorApp, UiPrefs};

use self::state::PendingConfirm;

use crate::constants::EXIT_FLUSH_TIMEOUT;
use crate::persistence::BridgeEvent;
use eframe::egui;
use log::{info, warn};
use std::time::Instant;

impl eframe::App for EditorApp {
    /// Persist UI preferences between restarts.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, eframe::APP_KEY, &self.prefs);
    }

    /// Main update function called by egui for each frame.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let visuals = if self.prefs.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        };
        ctx.set_visuals(visuals);

        self.sync_persistence(Instant::now());
        self.handle_delete_key(ctx);

        if ctx.input(|i| i.viewport().close_requested()) {
            self.flush_on_exit();
        }

        egui::TopBottomPanel::top("top_toolbar").show(ctx, |ui| {
            self.draw_toolbar(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_canvas(ui);
        });

        self.draw_confirm_dialog(ctx);

        let now = Instant::now();
        self.note_store_changes(now);
        if self.overlay.is_scheduled() {
            ctx.request_repaint();
        } else if let Some(wait) = self.bridge.next_wakeup(now) {
            ctx.request_repaint_after(wait);
        }
    }
}

impl EditorApp {
    /// Drains finished loads/saves and starts a due autosave.
    pub fn sync_persistence(&mut self, now: Instant) {
        let store = &self.store;
        let events = self.bridge.poll(now, || store.export_snapshot());
        for event in events {
            match event {
                BridgeEvent::Loaded(Some(snapshot)) => {
                    let report = self.store.import_snapshot(snapshot);
                    info!(
                        "restored {} node(s), {} connection(s), {} annotation link(s)",
                        report.nodes, report.connections, report.annotation_links
                    );
                    if report.skipped_nodes + report.dropped_connections + report.pruned_links > 0 {
                        warn!("dropped invalid entries while loading: {report:?}");
                    }
                    self.store.drain_changes();
                    self.interaction = Default::default();
                    self.layouts_stale = true;
                    self.overlay.schedule();
                }
                BridgeEvent::Loaded(None) => {}
                BridgeEvent::LoadFailed(msg) => {
                    self.interaction = Default::default();
                    self.context_menu.show = false;
                    self.notice = Some(format!("Could not load the diagram: {msg}"));
                }
                BridgeEvent::Saved { .. } => {
                    if !self.bridge.has_pending_changes() {
                        self.store.mark_clean();
                    }
                }
                BridgeEvent::SaveFailed(msg) => {
                    self.notice = Some(format!("Save failed: {msg}"));
                }
            }
        }
    }

    /// Feeds mutations from this frame into the debounce timer and redraw pass.
    pub fn note_store_changes(&mut self, now: Instant) {
        if self.absorb_store_changes() {
            self.bridge.note_change(now);
        }
    }

    /// Drains the store's change queue into the layout cache and overlay.
    ///
    /// Returns whether anything changed. The debounce timer is left alone.
    pub fn absorb_store_changes(&mut self) -> bool {
        if self.store.drain_changes().is_empty() {
            return false;
        }
        self.layouts_stale = true;
        self.overlay.schedule();
        true
    }

    /// Saves pending edits before the window closes.
    pub fn flush_on_exit(&mut self) {
        self.finish_text_edit();
        self.note_store_changes(Instant::now());
        if let Some(event) = self.bridge.flush(self.store.export_snapshot(), EXIT_FLUSH_TIMEOUT) {
            info!("final save on exit: {event:?}");
        }
    }

    fn handle_delete_key(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() || self.confirm.is_some() {
            return;
        }
        let pressed = ctx.input(|i| i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace));
        if pressed {
            if let Some(id) = self.interaction.selected.clone() {
                self.confirm = Some(PendingConfirm::DeleteNode(id));
            }
        }
    }

    /// Renders the canvas and handles its interactions.
    ///
    /// # Arguments
    ///
    /// * `ui` - The egui UI context
    pub fn draw_canvas(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        self.last_canvas_rect = Some(response.rect);

        let blocked = if self.bridge.is_loading() {
            Some("Loading diagram…")
        } else if self.bridge.load_failed() {
            Some("The diagram could not be loaded. Use Retry load to try again.")
        } else {
            None
        };
        if let Some(message) = blocked {
            painter.text(
                response.rect.center(),
                egui::Align2::CENTER_CENTER,
                message,
                egui::FontId::proportional(18.0),
                ui.visuals().weak_text_color(),
            );
            return;
        }

        self.handle_canvas_panning(ui, &response);
        self.handle_canvas_zoom(ui, &response);
        self.handle_canvas_pointer(ui, &response);
        self.handle_canvas_secondary(&response);

        self.render_diagram(ui, &painter, response.rect);

        if self.context_menu.show {
            self.draw_context_menu(ui);
        }
    }
}

#[cfg(test)]
mod tests;
