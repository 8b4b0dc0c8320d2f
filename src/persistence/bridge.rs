//! Drives loads and saves for one entity from the UI thread.
//!
//! Network calls run as tasks on a tokio runtime; their results come back over
//! a channel that [`PersistenceBridge::poll`] drains once per frame. At most one
//! save is in flight at any time. Edits arriving meanwhile only restart the
//! debounce timer, and the snapshot for the next save is captured when that save
//! actually starts, so an older diagram can never overwrite a newer one.
//!
//! After a failed load nothing is saved until a later load succeeds: the local
//! graph is empty at that point and saving it would replace the stored diagram.

use super::{Debouncer, RemoteStore, SaveRequest};
use crate::constants::{AUTOSAVE_NOTE, MANUAL_SAVE_NOTE};
use crate::error::StoreError;
use crate::types::Snapshot;
use log::{debug, info, warn};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

/// User-visible persistence state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveStatus {
    /// Nothing happened yet
    #[default]
    Idle,
    /// The diagram is being fetched
    Loading,
    /// Edits are waiting for the debounce timer
    Pending,
    /// A save request is in flight
    Saving,
    /// The last save succeeded
    Saved,
    /// The last load or save failed
    Error(String),
}

impl SaveStatus {
    /// Short label for the status indicator.
    pub fn label(&self) -> String {
        match self {
            SaveStatus::Idle => "Ready".to_string(),
            SaveStatus::Loading => "Loading…".to_string(),
            SaveStatus::Pending => "Unsaved changes".to_string(),
            SaveStatus::Saving => "Saving…".to_string(),
            SaveStatus::Saved => "All changes saved".to_string(),
            SaveStatus::Error(msg) => format!("Error: {msg}"),
        }
    }
}

/// Outcome of a finished remote operation, reported by [`PersistenceBridge::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// The load finished; `None` means the entity has no diagram yet
    Loaded(Option<Snapshot>),
    /// The load failed; saving is disabled until a retry succeeds
    LoadFailed(String),
    /// A save finished
    Saved {
        /// Whether the debounce timer triggered it
        autosave: bool,
    },
    /// A save failed; it is not retried until the next edit
    SaveFailed(String),
}

enum OpResult {
    Load(Result<Option<Snapshot>, StoreError>),
    Save {
        autosave: bool,
        result: Result<super::SaveAck, StoreError>,
    },
}

/// Callback used to wake the UI when a background operation finishes.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Persistence bridge between the graph store and a [`RemoteStore`].
pub struct PersistenceBridge {
    store: Arc<dyn RemoteStore>,
    entity_id: String,
    runtime: Handle,
    debouncer: Debouncer,
    save_in_flight: bool,
    load_in_flight: bool,
    load_failed: bool,
    manual_pending: bool,
    status: SaveStatus,
    sender: Sender<OpResult>,
    receiver: Receiver<OpResult>,
    waker: Option<Waker>,
}

impl PersistenceBridge {
    /// Creates a bridge for `entity_id`.
    pub fn new(
        store: Arc<dyn RemoteStore>,
        entity_id: impl Into<String>,
        quiet: Duration,
        runtime: Handle,
    ) -> Self {
        let (sender, receiver) = channel();
        Self {
            store,
            entity_id: entity_id.into(),
            runtime,
            debouncer: Debouncer::new(quiet),
            save_in_flight: false,
            load_in_flight: false,
            load_failed: false,
            manual_pending: false,
            status: SaveStatus::Idle,
            sender,
            receiver,
            waker: None,
        }
    }

    /// Installs a callback invoked from the runtime whenever a result is ready.
    pub fn set_waker(&mut self, waker: Waker) {
        self.waker = Some(waker);
    }

    /// The entity whose diagram this bridge synchronises.
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Current status for the indicator.
    pub fn status(&self) -> &SaveStatus {
        &self.status
    }

    /// Whether a save request is outstanding.
    pub fn is_saving(&self) -> bool {
        self.save_in_flight
    }

    /// Whether a load request is outstanding.
    pub fn is_loading(&self) -> bool {
        self.load_in_flight
    }

    /// Whether the last load failed, which keeps saving disabled.
    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    /// Whether edits are waiting to be saved.
    pub fn has_pending_changes(&self) -> bool {
        self.debouncer.is_armed() || self.manual_pending
    }

    /// Time until the debounce timer fires, for scheduling a repaint.
    pub fn next_wakeup(&self, now: Instant) -> Option<Duration> {
        self.debouncer.remaining(now)
    }

    /// Starts fetching the stored diagram.
    pub fn request_load(&mut self) {
        if self.load_in_flight {
            debug!("load already in flight for {}", self.entity_id);
            return;
        }
        self.load_in_flight = true;
        self.status = SaveStatus::Loading;
        let store = Arc::clone(&self.store);
        let entity_id = self.entity_id.clone();
        let sender = self.sender.clone();
        let waker = self.waker.clone();
        self.runtime.spawn(async move {
            let result = store.load(&entity_id).await;
            let _ = sender.send(OpResult::Load(result));
            if let Some(wake) = waker {
                wake();
            }
        });
    }

    /// Records an edit: (re)starts the quiet period.
    pub fn note_change(&mut self, now: Instant) {
        if self.load_failed {
            debug!("ignoring edit for {}: diagram was never loaded", self.entity_id);
            return;
        }
        self.debouncer.touch(now);
        if !self.save_in_flight && !self.load_in_flight {
            self.status = SaveStatus::Pending;
        }
    }

    /// Saves immediately, bypassing and resetting the debounce timer.
    ///
    /// If a save is already in flight the manual save starts as soon as it
    /// completes, with the snapshot current at that time. Returns whether the
    /// request was sent now; nothing is sent or queued after a failed load.
    pub fn save_now(&mut self, snapshot: Snapshot) -> bool {
        self.debouncer.cancel();
        if self.load_failed {
            warn!("not saving {}: the stored diagram could not be loaded", self.entity_id);
            return false;
        }
        if self.save_in_flight {
            debug!("manual save deferred until the in-flight save completes");
            self.manual_pending = true;
            return false;
        }
        self.manual_pending = false;
        self.start_save(snapshot, false);
        true
    }

    /// Drains finished operations and starts a due save.
    ///
    /// `snapshot` is only called when a save actually starts.
    pub fn poll(&mut self, now: Instant, snapshot: impl FnOnce() -> Snapshot) -> Vec<BridgeEvent> {
        let mut events = Vec::new();
        while let Ok(result) = self.receiver.try_recv() {
            events.push(self.finish(result));
        }

        if !self.save_in_flight && !self.load_in_flight && !self.load_failed {
            if self.manual_pending {
                self.manual_pending = false;
                self.debouncer.cancel();
                self.start_save(snapshot(), false);
            } else if self.debouncer.is_due(now) {
                self.debouncer.cancel();
                self.start_save(snapshot(), true);
            }
        }
        events
    }

    /// Blocks until the outstanding operation finishes or `timeout` passes.
    ///
    /// Returns `None` when nothing was outstanding or the wait timed out.
    pub fn await_in_flight(&mut self, timeout: Duration) -> Option<BridgeEvent> {
        if !self.save_in_flight && !self.load_in_flight {
            return None;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(self.finish(result)),
            Err(RecvTimeoutError::Timeout) => {
                warn!("timed out waiting for {} request", self.entity_id);
                None
            }
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Saves pending edits and waits for the result, bounded by `timeout`.
    ///
    /// Used when the editor closes so the last edits are not lost.
    pub fn flush(&mut self, snapshot: Snapshot, timeout: Duration) -> Option<BridgeEvent> {
        if !self.has_pending_changes() || self.load_failed || self.load_in_flight {
            return None;
        }
        let deadline = Instant::now() + timeout;
        if self.save_in_flight {
            self.await_in_flight(timeout);
            if self.save_in_flight {
                warn!("giving up on the final save for {}", self.entity_id);
                return None;
            }
        }
        self.debouncer.cancel();
        self.manual_pending = false;
        self.start_save(snapshot, true);
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.await_in_flight(remaining)
    }

    fn start_save(&mut self, snapshot: Snapshot, autosave: bool) {
        self.save_in_flight = true;
        self.status = SaveStatus::Saving;
        let request = SaveRequest {
            entity_id: self.entity_id.clone(),
            diagram_data: snapshot,
            notes: if autosave { AUTOSAVE_NOTE } else { MANUAL_SAVE_NOTE }.to_string(),
        };
        let store = Arc::clone(&self.store);
        let sender = self.sender.clone();
        let waker = self.waker.clone();
        self.runtime.spawn(async move {
            let result = store.save(&request).await;
            let _ = sender.send(OpResult::Save { autosave, result });
            if let Some(wake) = waker {
                wake();
            }
        });
    }

    fn finish(&mut self, result: OpResult) -> BridgeEvent {
        match result {
            OpResult::Load(result) => {
                self.load_in_flight = false;
                match result {
                    Ok(snapshot) => {
                        self.load_failed = false;
                        match &snapshot {
                            Some(s) => info!("loaded diagram for {} ({} nodes)", self.entity_id, s.nodes.len()),
                            None => info!("no diagram stored for {} yet", self.entity_id),
                        }
                        self.status = if self.debouncer.is_armed() {
                            SaveStatus::Pending
                        } else {
                            SaveStatus::Idle
                        };
                        BridgeEvent::Loaded(snapshot)
                    }
                    Err(err) => {
                        warn!("loading diagram for {} failed: {err}", self.entity_id);
                        self.load_failed = true;
                        self.debouncer.cancel();
                        self.manual_pending = false;
                        self.status = SaveStatus::Error(err.to_string());
                        BridgeEvent::LoadFailed(err.to_string())
                    }
                }
            }
            OpResult::Save { autosave, result } => {
                self.save_in_flight = false;
                match result {
                    Ok(ack) => {
                        info!(
                            "saved diagram for {}{}",
                            self.entity_id,
                            ack.message.map(|m| format!(": {m}")).unwrap_or_default()
                        );
                        self.status = if self.has_pending_changes() {
                            SaveStatus::Pending
                        } else {
                            SaveStatus::Saved
                        };
                        BridgeEvent::Saved { autosave }
                    }
                    Err(err) => {
                        warn!("saving diagram for {} failed: {err}", self.entity_id);
                        self.status = SaveStatus::Error(err.to_string());
                        BridgeEvent::SaveFailed(err.to_string())
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::store::GraphStore;
    use crate::types::{NodeId, NodeKind, Position};
    use tokio::runtime::Runtime;

    const QUIET: Duration = Duration::from_millis(1000);
    const WAIT: Duration = Duration::from_secs(5);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn setup() -> (Runtime, MemoryStore, PersistenceBridge) {
        let runtime = Runtime::new().unwrap();
        let memory = MemoryStore::new();
        let bridge = PersistenceBridge::new(
            Arc::new(memory.clone()),
            "entity-1",
            QUIET,
            runtime.handle().clone(),
        );
        (runtime, memory, bridge)
    }

    #[test]
    fn burst_of_edits_produces_one_save() {
        let (_rt, memory, mut bridge) = setup();
        let t0 = Instant::now();
        for i in 0..5 {
            let t = t0 + ms(i * 200);
            bridge.note_change(t);
            assert!(bridge.poll(t, Snapshot::default).is_empty());
            assert!(!bridge.is_saving());
        }
        assert_eq!(bridge.status(), &SaveStatus::Pending);

        // Quiet period measured from the last edit, not the first.
        bridge.poll(t0 + ms(1500), Snapshot::default);
        assert!(!bridge.is_saving());

        bridge.poll(t0 + ms(1800), Snapshot::default);
        assert!(bridge.is_saving());
        assert_eq!(
            bridge.await_in_flight(WAIT),
            Some(BridgeEvent::Saved { autosave: true })
        );
        bridge.poll(t0 + ms(5000), Snapshot::default);
        assert_eq!(memory.save_count(), 1);
        assert_eq!(memory.notes(), vec![AUTOSAVE_NOTE.to_string()]);
        assert_eq!(bridge.status(), &SaveStatus::Saved);
    }

    #[test]
    fn spaced_edits_each_produce_a_save() {
        let (_rt, memory, mut bridge) = setup();
        let t0 = Instant::now();
        for i in 0..3 {
            let t = t0 + ms(i * 1500);
            bridge.note_change(t);
            bridge.poll(t + QUIET, Snapshot::default);
            assert!(bridge.await_in_flight(WAIT).is_some());
        }
        assert_eq!(memory.save_count(), 3);
    }

    #[test]
    fn manual_save_bypasses_and_resets_debounce() {
        let (_rt, memory, mut bridge) = setup();
        let t0 = Instant::now();
        bridge.note_change(t0);
        assert!(bridge.save_now(Snapshot::default()));
        assert_eq!(
            bridge.await_in_flight(WAIT),
            Some(BridgeEvent::Saved { autosave: false })
        );
        bridge.poll(t0 + ms(3000), Snapshot::default);
        assert!(!bridge.is_saving());
        assert_eq!(memory.save_count(), 1);
        assert_eq!(memory.notes(), vec![MANUAL_SAVE_NOTE.to_string()]);
    }

    #[test]
    fn in_flight_save_suppresses_a_second_one() {
        let (_rt, memory, mut bridge) = setup();
        memory.set_latency(Some(ms(200)));
        let mut graph = GraphStore::new();
        let t0 = Instant::now();

        graph.add_node(NodeKind::Api, Position::new(0.0, 0.0));
        bridge.note_change(t0);
        bridge.poll(t0 + QUIET, || graph.export_snapshot());
        assert!(bridge.is_saving());

        graph.add_node(NodeKind::Database, Position::new(10.0, 10.0));
        bridge.note_change(t0 + ms(1100));
        bridge.poll(t0 + ms(2500), || graph.export_snapshot());
        assert!(bridge.is_saving());

        assert!(bridge.await_in_flight(WAIT).is_some());
        assert_eq!(memory.save_count(), 1);
        assert_eq!(bridge.status(), &SaveStatus::Pending);

        bridge.poll(t0 + ms(2600), || graph.export_snapshot());
        assert!(bridge.await_in_flight(WAIT).is_some());
        assert_eq!(memory.save_count(), 2);
        assert_eq!(memory.get("entity-1"), Some(graph.export_snapshot()));
    }

    #[test]
    fn manual_save_during_flight_is_deferred() {
        let (_rt, memory, mut bridge) = setup();
        memory.set_latency(Some(ms(100)));
        assert!(bridge.save_now(Snapshot::default()));
        assert!(!bridge.save_now(Snapshot::default()));
        assert!(bridge.await_in_flight(WAIT).is_some());
        bridge.poll(Instant::now(), Snapshot::default);
        assert!(bridge.is_saving());
        assert!(bridge.await_in_flight(WAIT).is_some());
        assert_eq!(memory.save_count(), 2);
    }

    #[test]
    fn failed_save_is_not_retried_until_next_edit() {
        let (_rt, memory, mut bridge) = setup();
        memory.fail_next_saves(1);
        let t0 = Instant::now();
        bridge.note_change(t0);
        bridge.poll(t0 + QUIET, Snapshot::default);
        let event = bridge.await_in_flight(WAIT);
        assert!(matches!(event, Some(BridgeEvent::SaveFailed(_))));
        assert!(matches!(bridge.status(), SaveStatus::Error(_)));

        bridge.poll(t0 + ms(10_000), Snapshot::default);
        assert!(!bridge.is_saving());
        assert_eq!(memory.save_count(), 1);

        let t1 = t0 + ms(11_000);
        bridge.note_change(t1);
        bridge.poll(t1 + QUIET, Snapshot::default);
        assert_eq!(bridge.await_in_flight(WAIT), Some(BridgeEvent::Saved { autosave: true }));
        assert_eq!(memory.save_count(), 2);
    }

    #[test]
    fn load_without_diagram_is_not_an_error() {
        let (_rt, _memory, mut bridge) = setup();
        bridge.request_load();
        assert_eq!(bridge.status(), &SaveStatus::Loading);
        assert_eq!(bridge.await_in_flight(WAIT), Some(BridgeEvent::Loaded(None)));
        assert_eq!(bridge.status(), &SaveStatus::Idle);
    }

    #[test]
    fn failed_load_blocks_saves_until_a_retry_succeeds() {
        let (_rt, memory, mut bridge) = setup();
        let mut stored = GraphStore::new();
        for i in 0..5 {
            stored.add_node(NodeKind::Service, Position::new(i as f32 * 10.0, 0.0));
        }
        memory.insert("entity-1", stored.export_snapshot());
        memory.fail_next_loads(1);

        bridge.request_load();
        assert!(matches!(bridge.await_in_flight(WAIT), Some(BridgeEvent::LoadFailed(_))));
        assert!(bridge.load_failed());

        // An edit on the empty canvas must not reach the store.
        let mut graph = GraphStore::new();
        graph.add_node(NodeKind::Api, Position::new(0.0, 0.0));
        let t0 = Instant::now();
        bridge.note_change(t0);
        assert!(!bridge.has_pending_changes());
        bridge.poll(t0 + QUIET * 2, || graph.export_snapshot());
        assert!(!bridge.save_now(graph.export_snapshot()));
        assert_eq!(bridge.flush(graph.export_snapshot(), WAIT), None);
        assert!(!bridge.is_saving());
        assert_eq!(memory.save_count(), 0);
        assert_eq!(memory.get("entity-1").unwrap().nodes.len(), 5);

        bridge.request_load();
        let Some(BridgeEvent::Loaded(Some(snapshot))) = bridge.await_in_flight(WAIT) else {
            panic!("retry should load the stored diagram");
        };
        assert_eq!(snapshot.nodes.len(), 5);
        assert!(!bridge.load_failed());
        bridge.note_change(t0);
        assert!(bridge.has_pending_changes());
    }

    #[test]
    fn flush_gives_up_when_the_in_flight_save_does_not_finish() {
        let (_rt, memory, mut bridge) = setup();
        memory.set_latency(Some(ms(500)));
        assert!(bridge.save_now(Snapshot::default()));
        bridge.note_change(Instant::now());

        assert_eq!(bridge.flush(Snapshot::default(), ms(20)), None);
        assert!(bridge.is_saving());
        assert_eq!(memory.save_count(), 1);

        assert!(bridge.await_in_flight(WAIT).is_some());
        assert_eq!(memory.save_count(), 1);
    }

    #[test]
    fn flush_saves_pending_edits() {
        let (_rt, memory, mut bridge) = setup();
        assert_eq!(bridge.flush(Snapshot::default(), WAIT), None);
        bridge.note_change(Instant::now());
        assert_eq!(
            bridge.flush(Snapshot::default(), WAIT),
            Some(BridgeEvent::Saved { autosave: true })
        );
        assert_eq!(memory.save_count(), 1);
    }

    #[test]
    fn empty_entity_add_autosave_reload_scenario() {
        let (rt, memory, mut bridge) = setup();
        let mut graph = GraphStore::new();

        bridge.request_load();
        match bridge.await_in_flight(WAIT) {
            Some(BridgeEvent::Loaded(None)) => {}
            other => panic!("unexpected load result: {other:?}"),
        }
        assert!(graph.is_empty());

        let t0 = Instant::now();
        let id = graph.add_node(NodeKind::Api, Position::new(100.0, 100.0));
        assert_eq!(id.to_string(), "api_1");
        for _ in graph.drain_changes() {
            bridge.note_change(t0);
        }
        bridge.poll(t0 + QUIET, || graph.export_snapshot());
        assert_eq!(bridge.await_in_flight(WAIT), Some(BridgeEvent::Saved { autosave: true }));
        assert_eq!(memory.save_count(), 1);

        let mut reopened = PersistenceBridge::new(
            Arc::new(memory.clone()),
            "entity-1",
            QUIET,
            rt.handle().clone(),
        );
        reopened.request_load();
        let Some(BridgeEvent::Loaded(Some(snapshot))) = reopened.await_in_flight(WAIT) else {
            panic!("expected stored diagram");
        };
        let mut restored = GraphStore::new();
        restored.import_snapshot(snapshot);
        assert_eq!(restored.len(), 1);
        let node = restored.node(&NodeId::new("api", 1)).expect("api_1 restored");
        assert_eq!(node.position, Position::new(100.0, 100.0));
    }
}
