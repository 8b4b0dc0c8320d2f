//! In-process diagram store.
//!
//! Used by the `--offline` mode and by tests that need to observe exactly how
//! many saves reached the store.

use super::{RemoteStore, SaveAck, SaveRequest};
use crate::error::StoreError;
use crate::types::Snapshot;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Inner {
    diagrams: Mutex<HashMap<String, Snapshot>>,
    notes: Mutex<Vec<String>>,
    saves: AtomicUsize,
    fail_next_saves: AtomicUsize,
    fail_next_loads: AtomicUsize,
    latency: Mutex<Option<Duration>>,
}

/// Cloneable handle to a shared in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a diagram for `entity_id`.
    pub fn insert(&self, entity_id: impl Into<String>, snapshot: Snapshot) {
        if let Ok(mut diagrams) = self.inner.diagrams.lock() {
            diagrams.insert(entity_id.into(), snapshot);
        }
    }

    /// The stored diagram for `entity_id`, if any.
    pub fn get(&self, entity_id: &str) -> Option<Snapshot> {
        self.inner
            .diagrams
            .lock()
            .ok()
            .and_then(|diagrams| diagrams.get(entity_id).cloned())
    }

    /// Number of save calls that reached the store, failed or not.
    pub fn save_count(&self) -> usize {
        self.inner.saves.load(Ordering::SeqCst)
    }

    /// Notes attached to successful saves, oldest first.
    pub fn notes(&self) -> Vec<String> {
        self.inner
            .notes
            .lock()
            .map(|notes| notes.clone())
            .unwrap_or_default()
    }

    /// Makes the next `count` saves fail.
    pub fn fail_next_saves(&self, count: usize) {
        self.inner.fail_next_saves.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` loads fail.
    pub fn fail_next_loads(&self, count: usize) {
        self.inner.fail_next_loads.store(count, Ordering::SeqCst);
    }

    /// Delays every save by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut slot) = self.inner.latency.lock() {
            *slot = latency;
        }
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn load(&self, entity_id: &str) -> Result<Option<Snapshot>, StoreError> {
        if Self::take_failure(&self.inner.fail_next_loads) {
            return Err(StoreError::Unavailable("injected load failure".to_string()));
        }
        Ok(self.get(entity_id))
    }

    async fn save(&self, request: &SaveRequest) -> Result<SaveAck, StoreError> {
        self.inner.saves.fetch_add(1, Ordering::SeqCst);
        let latency = self.inner.latency.lock().ok().and_then(|slot| *slot);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if Self::take_failure(&self.inner.fail_next_saves) {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        self.insert(request.entity_id.clone(), request.diagram_data.clone());
        if let Ok(mut notes) = self.inner.notes.lock() {
            notes.push(request.notes.clone());
        }
        Ok(SaveAck::default())
    }
}
