//! # DataMap Editor
//!
//! A visual editor for data-flow diagrams ("DataMaps") attached to an owning
//! entity. Nodes of a fixed palette of kinds (applications, services, APIs,
//! databases, pipelines, comments, ...) are placed on a pannable canvas and wired
//! together through their ports. Comment nodes can additionally be linked to
//! the nodes they describe with annotation links, drawn as curves on an overlay.
//!
//! The diagram is loaded from a remote store when the editor starts and saved
//! back automatically after a quiet period, or immediately with the Save button.
//!
//! ## Layout
//! - [`types`] - node kinds, identifiers and the serialized snapshot
//! - [`store`] - the in-memory graph state
//! - [`persistence`] - remote store client, debouncing and the load/save bridge
//! - [`config`] - file, environment and command-line configuration

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod constants;
pub mod error;
pub mod persistence;
pub mod store;
pub mod types;
mod ui;

pub use config::{ConfigOverrides, EditorConfig};
pub use error::{ConfigError, SnapshotError, StoreError};
pub use persistence::{HttpStore, MemoryStore, PersistenceBridge, RemoteStore, SaveStatus};
pub use store::GraphStore;
pub use types::*;
pub use ui::{EditorApp, UiPrefs};

use log::info;
use std::sync::Arc;

/// Runs the editor window for the entity named in `config`.
///
/// Creates the tokio runtime used for network requests, picks the remote or
/// in-memory store, and blocks in the eframe event loop until the window closes.
///
/// # Example
///
/// ```no_run
/// use datamap_editor::{run_app, EditorConfig};
///
/// fn main() -> anyhow::Result<()> {
///     let config = EditorConfig {
///         entity_id: "42".into(),
///         offline: true,
///         ..Default::default()
///     };
///     run_app(config)
/// }
/// ```
pub fn run_app(config: EditorConfig) -> anyhow::Result<()> {
    config.validate()?;
    let runtime = tokio::runtime::Runtime::new()?;

    let remote: Arc<dyn RemoteStore> = if config.offline {
        info!("offline mode: diagrams are kept in memory");
        Arc::new(MemoryStore::new())
    } else {
        info!("using remote store at {}", config.base_url);
        Arc::new(HttpStore::new(config.base_url.clone(), config.request_timeout())?)
    };

    let handle = runtime.handle().clone();
    let entity_id = config.entity_id.clone();
    let quiet = config.quiet_period();
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title(format!("DataMap Editor - {entity_id}"))
            .with_inner_size([1280.0, 800.0]),
        ..Default::default()
    };

    eframe::run_native(
        "DataMap Editor",
        options,
        Box::new(move |cc| {
            let mut app = EditorApp::new(remote, entity_id, quiet, handle);
            if let Some(prefs) = cc.storage.and_then(|s| eframe::get_value(s, eframe::APP_KEY)) {
                app.prefs = prefs;
            }
            app.start(&cc.egui_ctx);
            Ok(Box::new(app))
        }),
    )
    .map_err(|err| anyhow::anyhow!("editor window failed: {err}"))?;

    drop(runtime);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_app_rejects_a_missing_entity() {
        let err = run_app(EditorConfig::default()).unwrap_err();
        assert!(err.to_string().contains("entity id"));
    }

    #[test]
    fn reexports_cover_the_editing_api() {
        let mut store = GraphStore::new();
        let id = store.add_node(NodeKind::Comment, Position::new(0.0, 0.0));
        assert_eq!(id.to_string(), "comment_1");
        assert!(store.export_snapshot().annotation_links.is_empty());
    }
}
