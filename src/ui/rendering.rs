//! Rendering functionality for the diagram canvas.
//!
//! Draws the grid, standard connections, annotation curves, nodes with their
//! ports, the wire preview of an in-progress connection, and the inline text
//! editor of the node being edited.

use super::gesture::Gesture;
use super::hit::NodeLayout;
use super::state::EditorApp;
use crate::constants::*;
use crate::types::*;
use eframe::egui;
use eframe::epaint::{CubicBezierShape, QuadraticBezierShape, StrokeKind};

/// Fill colour for a node kind.
fn kind_color(kind: &NodeKind, dark: bool) -> egui::Color32 {
    let (r, g, b) = match kind {
        NodeKind::Application => (66, 133, 244),
        NodeKind::Service => (52, 168, 83),
        NodeKind::Decision => (251, 188, 5),
        NodeKind::DataPipeline => (0, 172, 193),
        NodeKind::DataProduct => (171, 71, 188),
        NodeKind::Api => (255, 112, 67),
        NodeKind::Database => (92, 107, 192),
        NodeKind::ExternalSystem => (120, 144, 156),
        NodeKind::UserRole => (236, 64, 122),
        NodeKind::SecurityControl => (229, 57, 53),
        NodeKind::Visualization => (38, 166, 154),
        NodeKind::Comment => (255, 241, 118),
        NodeKind::Unknown(_) => (158, 158, 158),
    };
    if dark {
        egui::Color32::from_rgb(r / 2, g / 2, b / 2)
    } else {
        egui::Color32::from_rgb(r / 2 + 128, g / 2 + 128, b / 2 + 128)
    }
}

/// Cubic control points for a wire leaving `from` rightwards into `to`.
fn wire_points(from: egui::Pos2, to: egui::Pos2, zoom: f32) -> [egui::Pos2; 4] {
    let dx = ((to.x - from.x).abs() * 0.5).max(40.0 * zoom);
    [from, from + egui::vec2(dx, 0.0), to - egui::vec2(dx, 0.0), to]
}

impl EditorApp {
    /// Draws the background grid.
    pub fn draw_grid(&self, painter: &egui::Painter, rect: egui::Rect) {
        let spacing = GRID_SIZE * self.prefs.canvas.zoom_factor;
        if spacing < 4.0 {
            return;
        }
        let color = if self.prefs.dark_mode {
            egui::Color32::from_gray(45)
        } else {
            egui::Color32::from_gray(220)
        };
        let stroke = egui::Stroke::new(1.0, color);
        let offset = self.prefs.canvas.offset;
        let mut x = rect.min.x + (offset.x - rect.min.x).rem_euclid(spacing);
        while x < rect.max.x {
            painter.line_segment([egui::pos2(x, rect.min.y), egui::pos2(x, rect.max.y)], stroke);
            x += spacing;
        }
        let mut y = rect.min.y + (offset.y - rect.min.y).rem_euclid(spacing);
        while y < rect.max.y {
            painter.line_segment([egui::pos2(rect.min.x, y), egui::pos2(rect.max.x, y)], stroke);
            y += spacing;
        }
    }

    /// Renders every diagram element onto the canvas.
    ///
    /// Runs the scheduled annotation pass first so the curves match the
    /// nodes drawn in this frame.
    pub fn render_diagram(&mut self, ui: &mut egui::Ui, painter: &egui::Painter, canvas_rect: egui::Rect) {
        self.refresh_layouts();
        self.overlay.run(&mut self.store, &self.layouts);

        if self.prefs.canvas.show_grid {
            self.draw_grid(painter, canvas_rect);
        }
        self.draw_connections(painter);
        self.draw_annotations(painter);
        // The dragged node is drawn last so it stays on top.
        let dragged = self.interaction.gesture.dragged_node();
        let order = self
            .layouts
            .values()
            .filter(|l| Some(&l.id) != dragged)
            .chain(dragged.and_then(|id| self.layouts.get(id)));
        for layout in order {
            if let Some(node) = self.store.node(&layout.id) {
                self.draw_node(painter, node, layout);
            }
        }
        self.draw_wire_preview(painter);
        self.draw_inline_editor(ui);
    }

    fn draw_connections(&self, painter: &egui::Painter) {
        let zoom = self.prefs.canvas.zoom_factor;
        let color = if self.prefs.dark_mode {
            egui::Color32::from_gray(200)
        } else {
            egui::Color32::from_gray(70)
        };
        let stroke = egui::Stroke::new(2.0, color);
        for connection in self.store.connections() {
            let from = self.layouts.get(&connection.source).and_then(|l| l.output(connection.source_port));
            let to = self.layouts.get(&connection.target).and_then(|l| l.input(connection.target_port));
            let (Some(from), Some(to)) = (from, to) else {
                continue;
            };
            let points = wire_points(self.world_to_screen(from), self.world_to_screen(to), zoom);
            painter.add(CubicBezierShape::from_points_stroke(
                points,
                false,
                egui::Color32::TRANSPARENT,
                stroke,
            ));
        }
    }

    fn draw_annotations(&self, painter: &egui::Painter) {
        let stroke = egui::Stroke::new(ANNOTATION_STROKE_WIDTH, egui::Color32::from_rgb(255, 193, 7));
        for path in self.overlay.paths() {
            let [a, c, b] = path.points;
            painter.add(QuadraticBezierShape::from_points_stroke(
                [self.world_to_screen(a), self.world_to_screen(c), self.world_to_screen(b)],
                false,
                egui::Color32::TRANSPARENT,
                stroke,
            ));
        }
    }

    fn draw_node(&self, painter: &egui::Painter, node: &Node, layout: &NodeLayout) {
        let zoom = self.prefs.canvas.zoom_factor;
        let dark = self.prefs.dark_mode;
        let rect = self.world_rect_to_screen(layout.rect);
        let radius = NODE_CORNER_RADIUS;
        let fill = kind_color(&node.kind, dark);
        let text_color = if dark {
            egui::Color32::from_gray(235)
        } else {
            egui::Color32::from_gray(25)
        };

        painter.rect_filled(rect, radius, fill);
        let handle = self.world_rect_to_screen(layout.handle);
        let r = radius as u8;
        painter.rect_filled(
            handle,
            egui::CornerRadius { nw: r, ne: r, sw: 0, se: 0 },
            fill.gamma_multiply(0.7),
        );
        let selected = self.interaction.selected.as_ref() == Some(&node.id);
        let stroke = if selected {
            egui::Stroke::new(2.5, egui::Color32::from_rgb(66, 165, 245))
        } else {
            egui::Stroke::new(1.0, egui::Color32::from_gray(110))
        };
        painter.rect_stroke(rect, radius, stroke, StrokeKind::Inside);

        let clipped = painter.with_clip_rect(rect.intersect(painter.clip_rect()));
        clipped.text(
            handle.left_center() + egui::vec2(NODE_TEXT_PADDING * zoom, 0.0),
            egui::Align2::LEFT_CENTER,
            format!("{} {}", node.kind.icon(), node.kind.label()),
            egui::FontId::proportional(11.0 * zoom),
            text_color.gamma_multiply(0.8),
        );

        let editing = self.interaction.gesture.editing().filter(|(id, _)| **id == node.id).map(|(_, f)| f);
        if editing != Some(TextField::Title) {
            let title = self.world_rect_to_screen(layout.title);
            clipped.text(
                title.left_center(),
                egui::Align2::LEFT_CENTER,
                &node.title,
                egui::FontId::proportional(14.0 * zoom),
                text_color,
            );
        }
        if editing != Some(TextField::Description) {
            let description = self.world_rect_to_screen(layout.description);
            let galley = clipped.layout(
                node.description.clone(),
                egui::FontId::proportional(12.0 * zoom),
                text_color.gamma_multiply(0.85),
                description.width(),
            );
            clipped.galley(description.min, galley, text_color);
        }

        let port_fill = if dark {
            egui::Color32::from_gray(30)
        } else {
            egui::Color32::WHITE
        };
        let port_stroke = egui::Stroke::new(1.5, text_color);
        for port in layout.inputs.iter().chain(layout.outputs.iter()) {
            let centre = self.world_to_screen(*port);
            painter.circle_filled(centre, PORT_RADIUS * zoom, port_fill);
            painter.circle_stroke(centre, PORT_RADIUS * zoom, port_stroke);
        }
    }

    fn draw_wire_preview(&self, painter: &egui::Painter) {
        let Gesture::ConnectingPort { from, port, pointer } = &self.interaction.gesture else {
            return;
        };
        let Some(start) = self.layouts.get(from).and_then(|l| l.output(*port)) else {
            return;
        };
        let zoom = self.prefs.canvas.zoom_factor;
        let end = self.world_to_screen(*pointer);
        let color = egui::Color32::from_rgb(66, 165, 245);
        painter.add(CubicBezierShape::from_points_stroke(
            wire_points(self.world_to_screen(start), end, zoom),
            false,
            egui::Color32::TRANSPARENT,
            egui::Stroke::new(2.0, color),
        ));
        painter.circle_filled(end, 4.0, color);
    }

    /// Shows the text editor over the field being edited.
    ///
    /// Titles are single-line and commit on Enter; descriptions grow with
    /// their content. Both commit when focus is lost.
    fn draw_inline_editor(&mut self, ui: &mut egui::Ui) {
        let Some((node, field)) = self
            .interaction
            .gesture
            .editing()
            .map(|(id, field)| (id.clone(), field))
        else {
            return;
        };
        let Some(layout) = self.layouts.get(&node) else {
            self.interaction.gesture = Gesture::Idle;
            return;
        };
        let zoom = self.prefs.canvas.zoom_factor;
        let mut rect = self.world_rect_to_screen(layout.text_rect(field));
        let id = egui::Id::new(("inline_editor", node.to_string(), field == TextField::Title));

        let response = match field {
            TextField::Title => ui.put(
                rect,
                egui::TextEdit::singleline(&mut self.interaction.edit_buffer)
                    .id(id)
                    .font(egui::FontId::proportional(14.0 * zoom))
                    .margin(egui::Margin::ZERO),
            ),
            TextField::Description => {
                let rows = self.interaction.edit_buffer.lines().count().max(1) + 1;
                let row_height = 16.0 * zoom;
                rect.set_height(rect.height().max(rows as f32 * row_height));
                ui.put(
                    rect,
                    egui::TextEdit::multiline(&mut self.interaction.edit_buffer)
                        .id(id)
                        .desired_rows(rows)
                        .font(egui::FontId::proportional(12.0 * zoom))
                        .margin(egui::Margin::ZERO),
                )
            }
        };

        if !self.interaction.focus_requested {
            response.request_focus();
            self.interaction.focus_requested = true;
        } else if response.lost_focus() {
            self.finish_text_edit();
        }
    }
}
