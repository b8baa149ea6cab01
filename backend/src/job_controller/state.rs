//! Tracks the status of dispatch runs for pollers.
//!
//! The dispatch loop never writes this map directly. It pushes `RunUpdate`
//! messages into an MPSC channel and a single updater task, spawned in
//! `main.rs`, applies them in arrival order. The HTTP status endpoint only
//! reads the map.
//!
//! Finished runs are kept for polling up to a retention cap; beyond it the
//! oldest finished run is forgotten. Runs still pending or sending are never
//! evicted.

use common::jobs::RunStatus;
use log::{debug, warn};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};
use tokio::sync::{mpsc, RwLock};

/// Capacity of the update channel. The dispatch loop waits when it is full.
pub const UPDATE_CHANNEL_CAPACITY: usize = 100;

/// Number of finished runs kept for status polling.
pub const RETAINED_FINISHED_RUNS: usize = 100;

/// Shared registry of run statuses, injected into the Actix app state.
#[derive(Clone)]
pub struct RunsState {
    /// Latest status per run id.
    pub runs: Arc<RwLock<HashMap<String, RunStatus>>>,
    /// Sender handed to the dispatcher.
    pub tx: mpsc::Sender<RunUpdate>,
    retain_finished: usize,
}

/// A status change of one run.
#[derive(Debug, Clone)]
pub struct RunUpdate {
    pub run_id: String,
    pub status: RunStatus,
}

impl RunsState {
    pub fn new(tx: mpsc::Sender<RunUpdate>) -> Self {
        Self::with_retention(tx, RETAINED_FINISHED_RUNS)
    }

    /// Like [`RunsState::new`], keeping at most `retain_finished` finished
    /// runs.
    pub fn with_retention(tx: mpsc::Sender<RunUpdate>, retain_finished: usize) -> Self {
        Self {
            runs: Arc::new(RwLock::new(HashMap::new())),
            tx,
            retain_finished,
        }
    }

    /// Registers a freshly started run as `Pending` unless the updater already
    /// recorded progress for it.
    pub async fn register(&self, run_id: &str) {
        self.runs
            .write()
            .await
            .entry(run_id.to_string())
            .or_insert(RunStatus::Pending);
    }

    pub async fn status(&self, run_id: &str) -> Option<RunStatus> {
        self.runs.read().await.get(run_id).cloned()
    }

    /// Queues a `Failed` status for `run_id` unless it already finished.
    ///
    /// Used when a run ends abnormally without having reported it.
    pub async fn fail_if_pending(&self, run_id: &str, reason: String) {
        if self.status(run_id).await.is_some_and(|s| s.is_terminal()) {
            return;
        }
        let update = RunUpdate {
            run_id: run_id.to_string(),
            status: RunStatus::Failed(reason),
        };
        if self.tx.send(update).await.is_err() {
            warn!("Run updater is gone; could not fail run {}", run_id);
        }
    }
}

/// Applies every update received on `rx` until all senders are dropped.
pub async fn start_run_updater(state: RunsState, mut rx: mpsc::Receiver<RunUpdate>) {
    let mut finished: VecDeque<String> = VecDeque::new();

    while let Some(update) = rx.recv().await {
        let mut runs = state.runs.write().await;
        let terminal = update.status.is_terminal();
        let was_terminal = runs.get(&update.run_id).is_some_and(|s| s.is_terminal());

        if terminal && !was_terminal {
            finished.push_back(update.run_id.clone());
        }
        runs.insert(update.run_id, update.status);

        while finished.len() > state.retain_finished {
            if let Some(oldest) = finished.pop_front() {
                debug!("Forgetting finished run {}", oldest);
                runs.remove(&oldest);
            }
        }
    }
}
