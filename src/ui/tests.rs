use super::gesture::Gesture;
use super::hit::NodeLayout;
use super::state::{CanvasState, PendingConfirm};
use super::*;
use crate::constants::MANUAL_SAVE_NOTE;
use crate::persistence::{MemoryStore, SaveStatus};
use crate::store::GraphStore;
use crate::types::*;
use eframe::egui;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

const QUIET: Duration = Duration::from_millis(1000);

/// Editor wired to an in-memory store, driven through headless egui frames.
struct Harness {
    _runtime: Runtime,
    memory: MemoryStore,
    app: EditorApp,
    ctx: egui::Context,
}

fn harness() -> Harness {
    let runtime = Runtime::new().unwrap();
    let memory = MemoryStore::new();
    let mut app = EditorApp::new(
        Arc::new(memory.clone()),
        "entity-1",
        QUIET,
        runtime.handle().clone(),
    );
    // screen == world
    app.prefs.canvas.offset = egui::Vec2::ZERO;
    app.prefs.canvas.zoom_factor = 1.0;
    Harness {
        _runtime: runtime,
        memory,
        app,
        ctx: egui::Context::default(),
    }
}

fn press(pos: egui::Pos2) -> Vec<egui::Event> {
    vec![
        egui::Event::PointerMoved(pos),
        egui::Event::PointerButton {
            pos,
            button: egui::PointerButton::Primary,
            pressed: true,
            modifiers: egui::Modifiers::NONE,
        },
    ]
}

fn release(pos: egui::Pos2) -> Vec<egui::Event> {
    vec![
        egui::Event::PointerMoved(pos),
        egui::Event::PointerButton {
            pos,
            button: egui::PointerButton::Primary,
            pressed: false,
            modifiers: egui::Modifiers::NONE,
        },
    ]
}

fn key(key: egui::Key) -> Vec<egui::Event> {
    vec![egui::Event::Key {
        key,
        physical_key: Some(key),
        pressed: true,
        repeat: false,
        modifiers: egui::Modifiers::NONE,
    }]
}

impl Harness {
    /// Runs one frame of the canvas with `events` and `modifiers` held.
    fn frame_with(&mut self, events: Vec<egui::Event>, modifiers: egui::Modifiers) {
        let mut raw = egui::RawInput::default();
        raw.screen_rect = Some(egui::Rect::from_min_size(
            egui::Pos2::ZERO,
            egui::vec2(1200.0, 800.0),
        ));
        raw.events = events;
        raw.modifiers = modifiers;
        let app = &mut self.app;
        let _ = self.ctx.run(raw, |ctx| {
            ctx.set_visuals(egui::Visuals::dark());
            egui::CentralPanel::default().show(ctx, |ui| app.draw_canvas(ui));
            app.draw_confirm_dialog(ctx);
        });
        self.app.note_store_changes(Instant::now());
    }

    fn frame(&mut self, events: Vec<egui::Event>) {
        self.frame_with(events, egui::Modifiers::NONE);
    }

    /// Hover, press, move to each point in turn, then release at the last one.
    fn drag(&mut self, from: egui::Pos2, path: &[egui::Pos2], modifiers: egui::Modifiers) {
        self.frame(vec![egui::Event::PointerMoved(from)]);
        self.frame(press(from));
        for p in path {
            self.frame_with(vec![egui::Event::PointerMoved(*p)], modifiers);
        }
        let end = path.last().copied().unwrap_or(from);
        self.frame(release(end));
    }

    /// Polls the bridge until nothing is in flight.
    fn settle(&mut self) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            self.app.sync_persistence(Instant::now());
            if !self.app.bridge.is_loading() && !self.app.bridge.is_saving() {
                break;
            }
            assert!(Instant::now() < deadline, "bridge did not settle");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn position(&self, id: &NodeId) -> Position {
        self.app.store.node(id).expect("node exists").position
    }
}

#[test]
fn dragging_the_handle_moves_the_node() {
    let mut h = harness();
    let id = h.app.add_node_at(NodeKind::Service, egui::pos2(200.0, 150.0));

    h.drag(egui::pos2(250.0, 160.0), &[egui::pos2(300.0, 200.0), egui::pos2(350.0, 260.0)], egui::Modifiers::NONE);

    assert_eq!(h.position(&id), Position::new(300.0, 250.0));
    assert_eq!(h.app.interaction.selected, Some(id));
    assert!(h.app.gesture().is_idle());
}

#[test]
fn shift_drag_snaps_to_the_grid() {
    let mut h = harness();
    let id = h.app.add_node_at(NodeKind::Service, egui::pos2(200.0, 150.0));

    h.drag(egui::pos2(250.0, 160.0), &[egui::pos2(263.0, 177.0)], egui::Modifiers::SHIFT);

    // Unsnapped target would be (213, 167).
    assert_eq!(h.position(&id), Position::new(220.0, 160.0));
}

#[test]
fn dragging_on_the_body_does_not_move_the_node() {
    let mut h = harness();
    let id = h.app.add_node_at(NodeKind::Service, egui::pos2(200.0, 150.0));
    // Left padding strip beside the description.
    let body = egui::pos2(203.0, 230.0);

    h.drag(body, &[egui::pos2(400.0, 400.0)], egui::Modifiers::NONE);

    assert_eq!(h.position(&id), Position::new(200.0, 150.0));
}

#[test]
fn pressing_the_title_edits_instead_of_dragging() {
    let mut h = harness();
    let id = h.app.add_node_at(NodeKind::Api, egui::pos2(200.0, 150.0));
    let layout = NodeLayout::new(h.app.store.node(&id).unwrap());
    let title = layout.title.center();

    h.drag(title, &[title + egui::vec2(150.0, 90.0)], egui::Modifiers::NONE);

    assert_eq!(h.position(&id), Position::new(200.0, 150.0));
    assert_eq!(h.app.gesture().editing(), Some((&id, TextField::Title)));
    assert!(h.app.gesture().dragged_node().is_none());
    assert_eq!(h.app.interaction.edit_buffer, "API / Interface");

    // Clicking empty canvas blurs the editor and commits the trimmed text.
    h.app.interaction.edit_buffer = "  Orders API ".to_string();
    let empty = egui::pos2(900.0, 700.0);
    h.frame(press(empty));
    h.frame(release(empty));

    assert!(h.app.gesture().is_idle());
    assert_eq!(h.app.store.node(&id).unwrap().title, "Orders API");
}

#[test]
fn enter_commits_the_title() {
    let mut h = harness();
    let id = h.app.add_node_at(NodeKind::Api, egui::pos2(200.0, 150.0));
    let title = NodeLayout::new(h.app.store.node(&id).unwrap()).title.center();

    h.frame(vec![egui::Event::PointerMoved(title)]);
    h.frame(press(title));
    h.frame(release(title));
    h.frame(vec![]);
    h.app.interaction.edit_buffer = "Billing".to_string();
    h.frame(key(egui::Key::Enter));
    h.frame(vec![]);

    assert!(h.app.gesture().is_idle());
    assert_eq!(h.app.store.node(&id).unwrap().title, "Billing");
}

#[test]
fn description_commits_on_blur() {
    let mut h = harness();
    let id = h.app.add_node_at(NodeKind::Database, egui::pos2(200.0, 150.0));
    let desc = NodeLayout::new(h.app.store.node(&id).unwrap()).description.center();

    h.frame(vec![egui::Event::PointerMoved(desc)]);
    h.frame(press(desc));
    h.frame(release(desc));
    assert_eq!(h.app.gesture().editing(), Some((&id, TextField::Description)));

    h.app.interaction.edit_buffer = "Customer records\nretained 7 years".to_string();
    h.app.finish_text_edit();

    assert_eq!(
        h.app.store.node(&id).unwrap().description,
        "Customer records\nretained 7 years"
    );
}

#[test]
fn output_port_drag_connects_to_the_node_under_release() {
    let mut h = harness();
    let a = h.app.add_node_at(NodeKind::Service, egui::pos2(100.0, 100.0));
    let b = h.app.add_node_at(NodeKind::Database, egui::pos2(500.0, 100.0));
    let port = NodeLayout::new(h.app.store.node(&a).unwrap()).output(1).unwrap();
    let target = NodeLayout::new(h.app.store.node(&b).unwrap()).description.center();

    h.frame(vec![egui::Event::PointerMoved(port)]);
    h.frame(press(port));
    h.frame(vec![egui::Event::PointerMoved(egui::pos2(400.0, 160.0))]);
    assert!(matches!(h.app.gesture(), Gesture::ConnectingPort { .. }));
    h.frame(release(target));

    let connections = h.app.store.connections();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].source, a);
    assert_eq!(connections[0].target, b);
    assert_eq!((connections[0].source_port, connections[0].target_port), (1, 1));
    // The source did not move.
    assert_eq!(h.position(&a), Position::new(100.0, 100.0));
}

#[test]
fn releasing_a_wire_on_empty_canvas_connects_nothing() {
    let mut h = harness();
    let a = h.app.add_node_at(NodeKind::Service, egui::pos2(100.0, 100.0));
    let port = NodeLayout::new(h.app.store.node(&a).unwrap()).output(1).unwrap();

    h.drag(port, &[egui::pos2(800.0, 600.0)], egui::Modifiers::NONE);

    assert!(h.app.store.connections().is_empty());
    assert!(h.app.gesture().is_idle());
}

#[test]
fn refused_connection_leaves_a_notice() {
    let mut h = harness();
    let user = h.app.add_node_at(NodeKind::UserRole, egui::pos2(100.0, 100.0));
    let role = h.app.add_node_at(NodeKind::UserRole, egui::pos2(500.0, 100.0));
    // A user role has no input port.
    h.app.connect_nodes(&user, &role);
    assert!(h.app.store.connections().is_empty());
    assert!(h.app.notice.is_some());
}

#[test]
fn right_click_on_a_node_opens_its_menu() {
    let mut h = harness();
    let id = h.app.add_node_at(NodeKind::Comment, egui::pos2(400.0, 300.0));
    let at = egui::pos2(450.0, 350.0);

    h.frame(vec![egui::Event::PointerMoved(at)]);
    h.frame(vec![
        egui::Event::PointerButton {
            pos: at,
            button: egui::PointerButton::Secondary,
            pressed: true,
            modifiers: egui::Modifiers::NONE,
        },
        egui::Event::PointerButton {
            pos: at,
            button: egui::PointerButton::Secondary,
            pressed: false,
            modifiers: egui::Modifiers::NONE,
        },
    ]);

    assert!(h.app.context_menu.show);
    assert_eq!(h.app.context_menu.node, Some(id.clone()));
    assert_eq!(h.app.interaction.selected, Some(id));
}

#[test]
fn click_outside_closes_the_menu_without_starting_a_gesture() {
    let mut h = harness();
    let id = h.app.add_node_at(NodeKind::Service, egui::pos2(100.0, 100.0));
    h.app.open_context_menu(egui::pos2(600.0, 400.0), egui::pos2(600.0, 400.0));
    h.frame(vec![]);

    // Click the node's handle while the menu is open.
    let handle = egui::pos2(150.0, 110.0);
    h.frame(vec![egui::Event::PointerMoved(handle)]);
    let mut click = press(handle);
    click.extend(release(handle));
    h.frame(click);

    assert!(!h.app.context_menu.show);
    assert!(h.app.gesture().is_idle());
    assert_eq!(h.position(&id), Position::new(100.0, 100.0));
}

#[test]
fn canvas_menu_creates_nodes_at_the_clicked_point() {
    let mut h = harness();
    h.app.open_context_menu(egui::pos2(320.0, 240.0), egui::pos2(320.0, 240.0));
    assert_eq!(h.app.context_menu.node, None);

    let id = h.app.add_node_at(NodeKind::DataPipeline, h.app.context_menu.world_pos);
    assert_eq!(id.to_string(), "data_pipeline_1");
    assert_eq!(h.position(&id), Position::new(320.0, 240.0));
}

#[test]
fn palette_places_nodes_inside_the_visible_canvas() {
    let mut h = harness();
    h.frame(vec![]);
    let rect = h.app.last_canvas_rect.expect("canvas drawn");

    for _ in 0..20 {
        let id = h.app.add_node_at_random(NodeKind::Application);
        let p = h.position(&id);
        assert!(rect.contains(egui::pos2(p.x, p.y)), "{p:?} outside {rect:?}");
    }
    assert_eq!(h.app.store.len(), 20);
}

#[test]
fn delete_key_asks_before_removing() {
    let mut h = harness();
    let a = h.app.add_node_at(NodeKind::Service, egui::pos2(100.0, 100.0));
    let b = h.app.add_node_at(NodeKind::Database, egui::pos2(500.0, 100.0));
    h.app.connect_nodes(&a, &b);
    h.app.interaction.selected = Some(b.clone());

    let ctx = egui::Context::default();
    let mut raw = egui::RawInput::default();
    raw.events = key(egui::Key::Delete);
    let _ = ctx.run(raw, |ctx| h.app.handle_delete_key(ctx));

    assert_eq!(h.app.confirm, Some(PendingConfirm::DeleteNode(b.clone())));
    assert!(h.app.store.contains(&b));

    h.app.confirm = None;
    h.app.delete_node(&b);
    assert!(!h.app.store.contains(&b));
    assert!(h.app.store.connections().is_empty());
    assert_eq!(h.app.interaction.selected, None);
}

#[test]
fn deleting_the_edited_node_ends_editing() {
    let mut h = harness();
    let id = h.app.add_node_at(NodeKind::Api, egui::pos2(200.0, 150.0));
    h.app.interaction.gesture = Gesture::EditingText {
        node: id.clone(),
        field: TextField::Title,
    };
    h.app.delete_node(&id);
    assert!(h.app.gesture().is_idle());
    h.frame(vec![]);
}

#[test]
fn annotation_curves_follow_moves_and_disappear_with_their_target() {
    let mut h = harness();
    let note = h.app.add_node_at(NodeKind::Comment, egui::pos2(100.0, 300.0));
    let db = h.app.add_node_at(NodeKind::Database, egui::pos2(500.0, 100.0));
    assert!(h.app.store.toggle_annotation_link(&note, &db).is_change());
    h.frame(vec![]);
    h.frame(vec![]);

    let paths = h.app.overlay.paths().to_vec();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].link_id, "annotation_comment_1_database_1");

    // One pass per frame with changes, however many moves happened in it.
    let before = h.app.overlay.passes();
    for x in [510.0, 520.0, 530.0] {
        h.app.store.move_node(&db, Position::new(x, 100.0));
    }
    h.app.layouts_stale = true;
    h.app.note_store_changes(Instant::now());
    h.frame(vec![]);
    assert_eq!(h.app.overlay.passes(), before + 1);
    let moved = h.app.overlay.paths()[0].points[2];
    assert_eq!(moved, NodeLayout::new(h.app.store.node(&db).unwrap()).center());

    h.app.delete_node(&db);
    h.frame(vec![]);
    h.frame(vec![]);
    assert!(h.app.overlay.paths().is_empty());
    assert!(h.app.store.annotation_targets(&note).is_empty());
}

#[test]
fn comments_cannot_annotate_comments() {
    let mut h = harness();
    let a = h.app.add_node_at(NodeKind::Comment, egui::pos2(100.0, 100.0));
    let b = h.app.add_node_at(NodeKind::Comment, egui::pos2(400.0, 100.0));
    assert!(!h.app.store.can_annotate(&a, &b));
    assert!(!h.app.store.toggle_annotation_link(&a, &b).is_change());
    h.frame(vec![]);
    assert!(h.app.overlay.paths().is_empty());
}

#[test]
fn zoom_is_clamped_and_keeps_the_anchor_fixed() {
    let mut h = harness();
    let anchor = egui::pos2(400.0, 300.0);
    let world = h.app.screen_to_world(anchor);
    h.app.zoom_around(anchor, 2.0);
    assert!((h.app.screen_to_world(anchor) - world).length() < 1e-3);

    h.app.zoom_around(anchor, 50.0);
    assert_eq!(h.app.prefs.canvas.zoom_factor, crate::constants::MAX_ZOOM);
    h.app.zoom_around(anchor, 0.0);
    assert_eq!(h.app.prefs.canvas.zoom_factor, crate::constants::MIN_ZOOM);
}

#[test]
fn loading_restores_the_stored_diagram() {
    let mut h = harness();
    let mut seed = GraphStore::new();
    let note = seed.add_node(NodeKind::Comment, Position::new(0.0, 0.0));
    let db = seed.add_node(NodeKind::Database, Position::new(300.0, 0.0));
    seed.add_annotation_link(&note, &db);
    h.memory.insert("entity-1", seed.export_snapshot());

    h.app.bridge.request_load();
    h.frame(vec![]);
    h.settle();
    h.frame(vec![]);

    assert_eq!(h.app.store.len(), 2);
    assert_eq!(h.app.overlay.paths().len(), 1);
    assert_eq!(h.app.layouts.len(), 2);
    // Loading is not an edit.
    assert!(!h.app.bridge.has_pending_changes());
    assert_eq!(h.memory.save_count(), 0);

    let next = h.app.add_node_at(NodeKind::Database, egui::pos2(0.0, 300.0));
    assert_eq!(next.to_string(), "database_2");
}

#[test]
fn edits_autosave_after_the_quiet_period() {
    let mut h = harness();
    h.app.add_node_at(NodeKind::Api, egui::pos2(100.0, 100.0));
    let t0 = Instant::now();
    h.app.note_store_changes(t0);
    assert_eq!(h.app.bridge.status(), &SaveStatus::Pending);

    h.app.sync_persistence(t0 + Duration::from_millis(500));
    assert!(!h.app.bridge.is_saving());
    h.app.sync_persistence(t0 + QUIET);
    assert!(h.app.bridge.is_saving());
    h.settle();

    assert_eq!(h.memory.save_count(), 1);
    let saved = h.memory.get("entity-1").expect("saved");
    assert_eq!(saved.nodes["api_1"].position, Position::new(100.0, 100.0));
    assert!(!h.app.store.is_dirty());
}

#[test]
fn manual_save_and_clear_each_write_once() {
    let mut h = harness();
    h.app.add_node_at(NodeKind::Api, egui::pos2(100.0, 100.0));
    h.app.save_diagram();
    h.frame(vec![]);
    h.settle();
    assert_eq!(h.memory.save_count(), 1);
    assert_eq!(h.memory.get("entity-1").unwrap().nodes.len(), 1);

    h.app.clear_diagram();
    h.frame(vec![]);
    h.settle();
    // The cleared state must not be written a second time by the autosave timer.
    h.app.sync_persistence(Instant::now() + QUIET * 2);
    h.settle();

    assert_eq!(h.memory.save_count(), 2);
    assert_eq!(h.memory.notes(), vec![MANUAL_SAVE_NOTE.to_string(); 2]);
    assert!(h.memory.get("entity-1").unwrap().is_empty());
    assert!(h.app.store.is_empty());
    assert!(!h.app.bridge.has_pending_changes());
}

#[test]
fn manual_save_commits_the_open_edit() {
    let mut h = harness();
    let id = h.app.add_node_at(NodeKind::Service, egui::pos2(100.0, 100.0));
    h.app.interaction.gesture = Gesture::EditingText {
        node: id.clone(),
        field: TextField::Title,
    };
    h.app.interaction.edit_buffer = "Checkout".to_string();

    h.app.save_diagram();
    h.settle();

    assert!(h.app.gesture().is_idle());
    let saved = h.memory.get("entity-1").unwrap();
    assert_eq!(saved.nodes[&id.to_string()].data.title, "Checkout");
    assert_eq!(h.memory.save_count(), 1);
}

#[test]
fn failed_load_keeps_the_editor_inert_until_a_retry_succeeds() {
    let mut h = harness();
    let mut seed = GraphStore::new();
    for i in 0..5 {
        seed.add_node(NodeKind::Service, Position::new(i as f32 * 200.0, 0.0));
    }
    h.memory.insert("entity-1", seed.export_snapshot());
    h.memory.fail_next_loads(1);

    h.app.bridge.request_load();
    h.settle();
    assert!(h.app.bridge.load_failed());
    assert!(h.app.notice.as_deref().unwrap_or_default().starts_with("Could not load"));

    // The canvas ignores input and nothing reaches the store.
    let empty = egui::pos2(300.0, 300.0);
    h.frame(vec![egui::Event::PointerMoved(empty)]);
    h.frame(press(empty));
    h.frame(release(empty));
    h.app.save_diagram();
    h.frame(vec![]);
    h.app.sync_persistence(Instant::now() + QUIET * 3);
    h.settle();
    assert!(h.app.store.is_empty());
    assert_eq!(h.memory.save_count(), 0);
    assert_eq!(h.memory.get("entity-1").unwrap().nodes.len(), 5);

    h.app.retry_load();
    h.settle();
    h.frame(vec![]);
    assert!(!h.app.bridge.load_failed());
    assert_eq!(h.app.store.len(), 5);
    assert_eq!(h.memory.save_count(), 0);
}

#[test]
fn closing_flushes_a_pending_edit() {
    let mut h = harness();
    let id = h.app.add_node_at(NodeKind::Service, egui::pos2(100.0, 100.0));
    h.app.interaction.gesture = Gesture::EditingText {
        node: id.clone(),
        field: TextField::Title,
    };
    h.app.interaction.edit_buffer = "Checkout".to_string();

    h.app.flush_on_exit();

    assert_eq!(h.memory.save_count(), 1);
    let saved = h.memory.get("entity-1").unwrap();
    assert_eq!(saved.nodes[&id.to_string()].data.title, "Checkout");
}

#[test]
fn failed_save_reports_and_waits_for_the_next_edit() {
    let mut h = harness();
    h.memory.fail_next_saves(1);
    h.app.add_node_at(NodeKind::Api, egui::pos2(100.0, 100.0));
    h.app.save_diagram();
    h.settle();

    assert!(matches!(h.app.bridge.status(), SaveStatus::Error(_)));
    assert!(h.app.notice.as_deref().unwrap_or_default().starts_with("Save failed"));
    h.app.sync_persistence(Instant::now() + QUIET * 5);
    assert!(!h.app.bridge.is_saving());
    assert_eq!(h.memory.save_count(), 1);
}

#[test]
fn ui_prefs_survive_storage() {
    let prefs = UiPrefs {
        canvas: CanvasState {
            offset: egui::vec2(10.0, 10.0),
            zoom_factor: 1.5,
            show_grid: false,
        },
        dark_mode: false,
    };
    let json = serde_json::to_string(&prefs).unwrap();
    let back: UiPrefs = serde_json::from_str(&json).unwrap();
    assert_eq!(back.canvas.zoom_factor, 1.5);
    assert!(!back.canvas.show_grid);
    assert!(!back.dark_mode);
    // Pan offset is per session.
    assert_eq!(back.canvas.offset, egui::Vec2::ZERO);
}
