//! Synchronisation of the diagram with the remote store.
//!
//! # Module Organization
//!
//! - `debounce` - Quiet-period timer coalescing bursts of edits
//! - `http` - [`HttpStore`], the JSON-over-HTTP client for the remote store
//! - `memory` - [`MemoryStore`], an in-process store for offline use and tests
//! - `bridge` - [`PersistenceBridge`], which drives loads and saves from the UI thread

mod bridge;
mod debounce;
mod http;
mod memory;

pub use bridge::{BridgeEvent, PersistenceBridge, SaveStatus};
pub use debounce::Debouncer;
pub use http::HttpStore;
pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::types::Snapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Body of a save request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    /// Entity owning the diagram
    pub entity_id: String,
    /// Full diagram; the last save always wins
    pub diagram_data: Snapshot,
    /// Short human readable note ("Auto-saved" / "Manual save")
    pub notes: String,
}

/// Acknowledgement of a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaveAck {
    /// Optional message from the server
    pub message: Option<String>,
}

/// Durable storage for diagrams, one snapshot per entity.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches the stored diagram. `Ok(None)` means the entity has no diagram yet.
    async fn load(&self, entity_id: &str) -> Result<Option<Snapshot>, StoreError>;

    /// Replaces the stored diagram with the one in `request`.
    async fn save(&self, request: &SaveRequest) -> Result<SaveAck, StoreError>;
}
