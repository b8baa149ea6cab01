//! # Dispatch Orchestrator
//!
//! Drives one send pass over the current dataset: one deep link per valid
//! row, paced by a fixed delay, with live progress.
//!
//! ## Workflow
//!
//! 1.  **Start**: `Dispatcher::start_run` receives a snapshot of dataset,
//!     template and phone column plus the run options. Starting while a run is
//!     active fails with `DispatchError::RunInProgress`; nothing is queued.
//!
//! 2.  **Preconditions**: a dataset with rows, a non-blank template and a
//!     selected column are required. A missing input fails with a
//!     `PreconditionError` and the dispatcher is back to `Idle` before any row
//!     is touched.
//!
//! 3.  **Validation**: every row is validated. If any row is invalid and the
//!     caller did not accept a partial send, the dispatcher parks in `Blocked`
//!     and returns the verdicts. Nothing is sent.
//!
//! 4.  **Sending**: a task is spawned that walks the valid rows in dataset
//!     order. For each row it renders the message, builds the deep link and
//!     hands it to the `LinkOpener` on the blocking pool, so a slow browser
//!     launch never stalls the runtime or holds a lock. The outcome is then
//!     recorded on the run and a `RunUpdate` with the new progress is emitted.
//!     A failing hand-off is recorded against its row and the loop continues.
//!     Between two rows the task sleeps for the configured delay, waking early
//!     on cancellation.
//!
//! 5.  **Completion**: the run is frozen, reported as `Completed` and the
//!     dispatcher returns to `Idle`. `cancel` stops the loop before its next
//!     row and returns to `Idle` at once; rows already handed off stay counted,
//!     including one whose link was still opening.
//!
//! 6.  **Abort**: if the opener panics or the send task dies, the run is
//!     reported as `Failed`, its `last_error` is set and the dispatcher returns
//!     to `Idle`.

pub mod link;

use common::jobs::{DispatchRun, RunPhase, RunProgress, RunStatus};
use common::model::dataset::Dataset;
use common::model::verdict::{ValidationSummary, ValidationVerdict};
use common::responses::CurrentRun;
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{DispatchError, PreconditionError};
use crate::job_controller::state::RunUpdate;
use crate::state::Snapshot;
use crate::template;
use crate::validation;
use link::LinkOpener;

/// Everything a run needs, captured when it starts.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub dataset: Option<Arc<Dataset>>,
    pub template: String,
    pub column: Option<String>,
    /// Country prefix; non-digits are stripped before use.
    pub prefix: String,
    pub delay: Duration,
    /// Send to the valid rows even if some rows are invalid.
    pub accept_partial: bool,
}

impl RunRequest {
    pub fn from_snapshot(
        snapshot: Snapshot,
        prefix: impl Into<String>,
        delay: Duration,
        accept_partial: bool,
    ) -> Self {
        Self {
            dataset: snapshot.dataset,
            template: snapshot.template,
            column: snapshot.column,
            prefix: prefix.into(),
            delay,
            accept_partial,
        }
    }
}

pub enum StartOutcome {
    Started(RunHandle),
    /// Some rows failed validation; the full verdict list is returned.
    Blocked(Vec<ValidationVerdict>),
}

/// Handle on a spawned run. Dropping it leaves the run going.
pub struct RunHandle {
    run_id: String,
    total: usize,
    task: JoinHandle<Result<DispatchRun, DispatchError>>,
}

impl RunHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Waits for the run to end and returns its final state.
    pub async fn finished(self) -> Result<DispatchRun, DispatchError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(DispatchError::Aborted {
                run_id: self.run_id,
                reason: e.to_string(),
            }),
        }
    }
}

struct Target {
    row_index: usize,
    number: String,
}

struct Plan {
    run_id: String,
    dataset: Arc<Dataset>,
    template: String,
    prefix: String,
    delay: Duration,
    targets: Vec<Target>,
    run: Arc<Mutex<DispatchRun>>,
    cancel: CancellationToken,
}

struct ActiveRun {
    run_id: String,
    run: Arc<Mutex<DispatchRun>>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Controller {
    phase: RunPhase,
    active: Option<ActiveRun>,
    last_run: Option<DispatchRun>,
    last_verdicts: Vec<ValidationVerdict>,
}

impl Controller {
    fn transition(&mut self, next: RunPhase) {
        debug!("Dispatch phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }
}

struct DispatcherInner {
    opener: Arc<dyn LinkOpener>,
    base_url: String,
    updates: mpsc::Sender<RunUpdate>,
    controller: Mutex<Controller>,
}

/// Owner of the single dispatch run of the process.
///
/// Cheap to clone; clones drive the same state machine.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    pub fn new(
        opener: Arc<dyn LinkOpener>,
        base_url: impl Into<String>,
        updates: mpsc::Sender<RunUpdate>,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                opener,
                base_url: base_url.into(),
                updates,
                controller: Mutex::new(Controller::default()),
            }),
        }
    }

    /// The active run while sending, otherwise the last finished run.
    pub fn current(&self) -> CurrentRun {
        let ctl = self.controller();
        let run = match &ctl.active {
            Some(active) => Some(lock_run(&active.run).clone()),
            None => ctl.last_run.clone(),
        };
        CurrentRun {
            phase: ctl.phase,
            run,
            last_verdicts: ctl.last_verdicts.clone(),
        }
    }

    /// Validates and, unless blocked, spawns the send loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_run(&self, request: RunRequest) -> Result<StartOutcome, DispatchError> {
        let mut ctl = self.controller();
        if ctl.active.is_some() {
            warn!("Dispatch rejected: a run is already in progress");
            return Err(DispatchError::RunInProgress);
        }
        ctl.transition(RunPhase::Validating);

        let (dataset, column) = match check_preconditions(&request) {
            Ok(inputs) => inputs,
            Err(e) => {
                warn!("Dispatch rejected: {}", e);
                ctl.transition(RunPhase::Idle);
                return Err(e.into());
            }
        };

        let verdicts = validation::validate(&dataset, Some(&column));
        let summary = ValidationSummary::from_verdicts(&verdicts);
        if !summary.all_valid() && !request.accept_partial {
            info!(
                "Dispatch blocked: {} of {} rows have an invalid phone number",
                summary.invalid, summary.total
            );
            ctl.last_verdicts = verdicts.clone();
            ctl.transition(RunPhase::Blocked);
            return Ok(StartOutcome::Blocked(verdicts));
        }

        let mut targets = Vec::with_capacity(summary.valid);
        let mut skipped = Vec::with_capacity(summary.invalid);
        for verdict in &verdicts {
            match &verdict.normalized_number {
                Some(number) if verdict.valid => targets.push(Target {
                    row_index: verdict.row_index,
                    number: number.clone(),
                }),
                _ => skipped.push(verdict.row_index),
            }
        }
        ctl.last_verdicts = verdicts;

        if targets.is_empty() {
            warn!("Dispatch rejected: {}", PreconditionError::NoValidRows);
            ctl.transition(RunPhase::Idle);
            return Err(PreconditionError::NoValidRows.into());
        }
        ctl.transition(RunPhase::Ready);

        let run_id = Uuid::new_v4().to_string();
        let total = targets.len();
        let run = Arc::new(Mutex::new(DispatchRun::new(run_id.clone(), total, skipped)));
        let cancel = CancellationToken::new();
        ctl.active = Some(ActiveRun {
            run_id: run_id.clone(),
            run: Arc::clone(&run),
            cancel: cancel.clone(),
        });
        ctl.transition(RunPhase::Sending);
        drop(ctl);

        info!(
            "Run {} started: {} messages, {} rows skipped, {:?} between messages",
            run_id, total, summary.invalid, request.delay
        );

        let plan = Plan {
            run_id: run_id.clone(),
            dataset,
            template: request.template,
            prefix: link::sanitize_prefix(&request.prefix),
            delay: request.delay,
            targets,
            run,
            cancel,
        };

        let dispatcher = self.clone();
        let supervised_id = run_id.clone();
        let task = tokio::spawn(async move {
            let worker = tokio::spawn(dispatcher.clone().execute(plan));
            match worker.await {
                Ok(result) => result,
                Err(e) => {
                    let reason = format!("send task failed: {}", e);
                    dispatcher.abort(&supervised_id, &reason).await;
                    Err(DispatchError::Aborted {
                        run_id: supervised_id,
                        reason,
                    })
                }
            }
        });

        Ok(StartOutcome::Started(RunHandle { run_id, total, task }))
    }

    /// Stops the active run before its next row and returns its frozen state.
    pub fn cancel(&self) -> Result<DispatchRun, DispatchError> {
        let mut ctl = self.controller();
        let active = ctl.active.take().ok_or(DispatchError::NoActiveRun)?;
        active.cancel.cancel();

        let run = {
            let mut run = lock_run(&active.run);
            run.running = false;
            run.clone()
        };
        info!(
            "Run {} cancelled after {}/{} messages",
            active.run_id, run.sent_count, run.total
        );
        ctl.last_run = Some(run.clone());
        ctl.transition(RunPhase::Idle);
        Ok(run)
    }

    async fn execute(self, plan: Plan) -> Result<DispatchRun, DispatchError> {
        let total = plan.targets.len();

        for (position, target) in plan.targets.iter().enumerate() {
            if plan.cancel.is_cancelled() {
                break;
            }

            let address = format!("{}{}", plan.prefix, target.number);
            let progress = match self.hand_off(&plan, target, &address).await {
                Ok(Some(progress)) => progress,
                Ok(None) => break,
                Err(e) => {
                    let reason = format!("link opener failed: {}", e);
                    self.abort(&plan.run_id, &reason).await;
                    return Err(DispatchError::Aborted {
                        run_id: plan.run_id.clone(),
                        reason,
                    });
                }
            };
            self.publish(&plan.run_id, RunStatus::Sending(progress)).await;

            if position + 1 < total {
                if plan.delay.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    tokio::select! {
                        _ = plan.cancel.cancelled() => {}
                        _ = tokio::time::sleep(plan.delay) => {}
                    }
                }
            }
        }

        Ok(self.finish(&plan).await)
    }

    /// Renders and opens the link for one row, recording the outcome.
    ///
    /// The opener runs on the blocking pool with no lock held. The run id is
    /// checked against the active run before the hand-off and again before
    /// recording. A row whose link was opening when `cancel` came in is still
    /// recorded, on the run and on the frozen copy `cancel` stored. Returns
    /// `Ok(None)` once the run is no longer the active one, and the join error
    /// if the opener panicked.
    async fn hand_off(
        &self,
        plan: &Plan,
        target: &Target,
        address: &str,
    ) -> Result<Option<RunProgress>, JoinError> {
        if !self.is_active(&plan.run_id) {
            return Ok(None);
        }

        let Some(row) = plan.dataset.row(target.row_index) else {
            let mut run = lock_run(&plan.run);
            return Ok(Some(run.record_failure(
                target.row_index,
                address,
                "row not found in dataset",
            )));
        };
        let message = template::render(&plan.template, row);
        let url = link::deep_link(&self.inner.base_url, address, &message);

        let opener = Arc::clone(&self.inner.opener);
        let outcome = tokio::task::spawn_blocking(move || opener.open(&url)).await?;

        let mut ctl = self.controller();
        let mut run = lock_run(&plan.run);
        let progress = match outcome {
            Ok(()) => {
                info!(
                    "Run {}: row {} handed off to {}",
                    plan.run_id,
                    target.row_index + 1,
                    address
                );
                run.record_opened(target.row_index)
            }
            Err(e) => {
                warn!(
                    "Run {}: row {} ({}) failed: {}",
                    plan.run_id,
                    target.row_index + 1,
                    address,
                    e
                );
                run.record_failure(target.row_index, address, e.to_string())
            }
        };

        if ctl.active.as_ref().is_some_and(|a| a.run_id == plan.run_id) {
            return Ok(Some(progress));
        }
        if let Some(frozen) = ctl.last_run.as_mut().filter(|r| r.run_id == plan.run_id) {
            *frozen = run.clone();
        }
        Ok(None)
    }

    fn is_active(&self, run_id: &str) -> bool {
        self.controller()
            .active
            .as_ref()
            .is_some_and(|a| a.run_id == run_id)
    }

    async fn finish(&self, plan: &Plan) -> DispatchRun {
        let (run, status) = {
            let mut ctl = self.controller();
            let owned = ctl
                .active
                .take_if(|a| a.run_id == plan.run_id)
                .is_some();

            let run = {
                let mut run = lock_run(&plan.run);
                run.running = false;
                run.clone()
            };

            if owned {
                ctl.transition(RunPhase::Completed);
                info!(
                    "Run {} completed: {}/{} messages, {} failed",
                    plan.run_id,
                    run.sent_count,
                    run.total,
                    run.failures.len()
                );
                ctl.last_run = Some(run.clone());
                ctl.transition(RunPhase::Idle);
                let status = RunStatus::Completed(run.clone());
                (run, status)
            } else {
                let status = RunStatus::Cancelled(run.clone());
                (run, status)
            }
        };

        self.publish(&plan.run_id, status).await;
        run
    }

    /// Releases the dispatcher after the send task died unexpectedly.
    async fn abort(&self, run_id: &str, reason: &str) {
        error!("Run {} aborted: {}", run_id, reason);
        {
            let mut ctl = self.controller();
            if let Some(active) = ctl.active.take_if(|a| a.run_id == run_id) {
                let mut run = lock_run(&active.run);
                run.running = false;
                run.last_error = Some(reason.to_string());
                ctl.last_run = Some(run.clone());
                drop(run);
                ctl.transition(RunPhase::Idle);
            }
        }
        self.publish(run_id, RunStatus::Failed(reason.to_string()))
            .await;
    }

    async fn publish(&self, run_id: &str, status: RunStatus) {
        let update = RunUpdate {
            run_id: run_id.to_string(),
            status,
        };
        if self.inner.updates.send(update).await.is_err() {
            debug!("Run {}: no listener for status updates", run_id);
        }
    }

    fn controller(&self) -> MutexGuard<'_, Controller> {
        self.inner
            .controller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock_run(run: &Mutex<DispatchRun>) -> MutexGuard<'_, DispatchRun> {
    run.lock().unwrap_or_else(PoisonError::into_inner)
}

fn check_preconditions(request: &RunRequest) -> Result<(Arc<Dataset>, String), PreconditionError> {
    let dataset = request
        .dataset
        .as_ref()
        .filter(|d| !d.is_empty())
        .ok_or(PreconditionError::MissingDataset)?;
    if request.template.trim().is_empty() {
        return Err(PreconditionError::EmptyTemplate);
    }
    let column = request
        .column
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or(PreconditionError::NoColumnSelected)?;
    Ok((Arc::clone(dataset), column.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkOpenError;
    use common::model::dataset::{CellValue, Row};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    #[derive(Default)]
    struct RecordingOpener {
        urls: Mutex<Vec<String>>,
        opened_at: Mutex<Vec<Instant>>,
        fail_on_calls: Vec<usize>,
    }

    impl RecordingOpener {
        fn failing_on(calls: &[usize]) -> Self {
            Self {
                fail_on_calls: calls.to_vec(),
                ..Default::default()
            }
        }

        fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    impl LinkOpener for RecordingOpener {
        fn open(&self, url: &str) -> Result<(), LinkOpenError> {
            let mut urls = self.urls.lock().unwrap();
            let call = urls.len();
            urls.push(url.to_string());
            self.opened_at.lock().unwrap().push(Instant::now());
            if self.fail_on_calls.contains(&call) {
                Err(LinkOpenError::Rejected("popup blocked".into()))
            } else {
                Ok(())
            }
        }
    }

    fn contacts(phones: &[&str]) -> Arc<Dataset> {
        let names = ["Ana", "Luis", "Eva", "Raúl"];
        let rows = phones
            .iter()
            .enumerate()
            .map(|(i, phone)| {
                Row::from([
                    ("name".to_string(), CellValue::from(names[i % names.len()])),
                    ("phone".to_string(), CellValue::from(*phone)),
                ])
            })
            .collect();
        Arc::new(Dataset::new(vec!["name".into(), "phone".into()], rows).unwrap())
    }

    fn request(dataset: Option<Arc<Dataset>>) -> RunRequest {
        RunRequest {
            dataset,
            template: "Hola {{name}}".into(),
            column: Some("phone".into()),
            prefix: "+52".into(),
            delay: Duration::ZERO,
            accept_partial: false,
        }
    }

    fn new_dispatcher(
        opener: Arc<dyn LinkOpener>,
    ) -> (Dispatcher, mpsc::Receiver<RunUpdate>) {
        let (tx, rx) = mpsc::channel(100);
        (Dispatcher::new(opener, "https://wa.me", tx), rx)
    }

    fn started(outcome: StartOutcome) -> RunHandle {
        match outcome {
            StartOutcome::Started(handle) => handle,
            StartOutcome::Blocked(_) => panic!("run was blocked"),
        }
    }

    fn drain(rx: &mut mpsc::Receiver<RunUpdate>) -> Vec<RunStatus> {
        let mut statuses = Vec::new();
        while let Ok(update) = rx.try_recv() {
            statuses.push(update.status);
        }
        statuses
    }

    #[tokio::test]
    async fn three_valid_rows_complete_in_order() {
        let opener = Arc::new(RecordingOpener::default());
        let (dispatcher, mut rx) = new_dispatcher(Arc::<RecordingOpener>::clone(&opener));
        let ds = contacts(&["5512345678", "5512345679", "5512345670"]);

        let handle = started(dispatcher.start_run(request(Some(ds))).unwrap());
        assert_eq!(handle.total(), 3);
        let run = handle.finished().await.unwrap();

        assert_eq!(run.sent_count, 3);
        assert_eq!(run.progress_fraction, 1.0);
        assert!(!run.running);
        assert!(run.failures.is_empty());
        assert_eq!(run.opened_rows, vec![0, 1, 2]);

        let statuses = drain(&mut rx);
        let progress: Vec<(usize, usize)> = statuses
            .iter()
            .filter_map(|s| match s {
                RunStatus::Sending(p) => Some((p.sent_count, p.total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
        assert!(matches!(statuses.last(), Some(RunStatus::Completed(r)) if r.sent_count == 3));

        let urls = opener.urls();
        assert_eq!(urls.len(), 3);
        assert_eq!(urls[0], "https://wa.me/525512345678?text=Hola%20Ana");
        assert_eq!(urls[1], "https://wa.me/525512345679?text=Hola%20Luis");
        assert_ne!(urls[1], urls[2]);

        assert_eq!(dispatcher.current().phase, RunPhase::Idle);
        assert_eq!(dispatcher.current().run.unwrap().sent_count, 3);
    }

    #[tokio::test]
    async fn a_failing_row_does_not_stop_the_run() {
        let opener = Arc::new(RecordingOpener::failing_on(&[1]));
        let (dispatcher, mut rx) = new_dispatcher(Arc::<RecordingOpener>::clone(&opener));
        let ds = contacts(&["5512345678", "5512345679", "5512345670"]);

        let run = started(dispatcher.start_run(request(Some(ds))).unwrap())
            .finished()
            .await
            .unwrap();

        assert_eq!(run.sent_count, 3);
        assert!(run.failure_for(0).is_none());
        assert!(run.failure_for(2).is_none());
        let failure = run.failure_for(1).unwrap();
        assert_eq!(failure.address, "525512345679");
        assert_eq!(failure.message, "popup blocked");
        assert_eq!(run.last_error.as_deref(), Some("row 2: popup blocked"));
        assert_eq!(run.opened_rows, vec![0, 2]);
        assert!(matches!(drain(&mut rx).last(), Some(RunStatus::Completed(_))));
    }

    #[tokio::test]
    async fn missing_inputs_fail_before_any_dispatch() {
        let opener = Arc::new(RecordingOpener::default());
        let (dispatcher, _rx) = new_dispatcher(Arc::<RecordingOpener>::clone(&opener));

        let no_data = dispatcher.start_run(request(None));
        assert!(matches!(
            no_data,
            Err(DispatchError::Precondition(PreconditionError::MissingDataset))
        ));

        let no_rows = dispatcher.start_run(request(Some(contacts(&[]))));
        assert!(matches!(
            no_rows,
            Err(DispatchError::Precondition(PreconditionError::MissingDataset))
        ));

        let mut blank_template = request(Some(contacts(&["5512345678"])));
        blank_template.template = "   ".into();
        assert!(matches!(
            dispatcher.start_run(blank_template),
            Err(DispatchError::Precondition(PreconditionError::EmptyTemplate))
        ));

        let mut no_column = request(Some(contacts(&["5512345678"])));
        no_column.column = None;
        assert!(matches!(
            dispatcher.start_run(no_column),
            Err(DispatchError::Precondition(PreconditionError::NoColumnSelected))
        ));

        assert!(opener.urls().is_empty());
        assert_eq!(dispatcher.current().phase, RunPhase::Idle);
    }

    #[tokio::test]
    async fn invalid_rows_block_the_run_unless_accepted() {
        let opener = Arc::new(RecordingOpener::default());
        let (dispatcher, _rx) = new_dispatcher(Arc::<RecordingOpener>::clone(&opener));
        let ds = contacts(&["5512345678", "123", "5512345670"]);

        let verdicts = match dispatcher.start_run(request(Some(Arc::clone(&ds)))).unwrap() {
            StartOutcome::Blocked(verdicts) => verdicts,
            StartOutcome::Started(_) => panic!("run should be blocked"),
        };
        assert_eq!(verdicts.len(), 3);
        assert!(!verdicts[1].valid);
        assert_eq!(dispatcher.current().phase, RunPhase::Blocked);
        assert_eq!(dispatcher.current().last_verdicts, verdicts);
        assert!(opener.urls().is_empty());

        let mut partial = request(Some(ds));
        partial.accept_partial = true;
        let run = started(dispatcher.start_run(partial).unwrap())
            .finished()
            .await
            .unwrap();
        assert_eq!(run.total, 2);
        assert_eq!(run.sent_count, 2);
        assert_eq!(run.skipped_rows, vec![1]);
        assert_eq!(opener.urls().len(), 2);
    }

    #[tokio::test]
    async fn accepting_partial_with_no_valid_rows_is_rejected() {
        let opener = Arc::new(RecordingOpener::default());
        let (dispatcher, _rx) = new_dispatcher(opener);
        let mut req = request(Some(contacts(&["12", ""])));
        req.accept_partial = true;

        assert!(matches!(
            dispatcher.start_run(req),
            Err(DispatchError::Precondition(PreconditionError::NoValidRows))
        ));
        assert_eq!(dispatcher.current().phase, RunPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected_and_cancel_keeps_sent_count() {
        let opener = Arc::new(RecordingOpener::default());
        let (dispatcher, mut rx) = new_dispatcher(Arc::<RecordingOpener>::clone(&opener));
        let ds = contacts(&["5512345678", "5512345679", "5512345670"]);
        let mut slow = request(Some(Arc::clone(&ds)));
        slow.delay = Duration::from_secs(10);

        let handle = started(dispatcher.start_run(slow.clone()).unwrap());
        assert!(matches!(
            dispatcher.start_run(slow),
            Err(DispatchError::RunInProgress)
        ));

        let first = rx.recv().await.unwrap();
        assert!(matches!(first.status, RunStatus::Sending(ref p) if p.sent_count == 1));

        let frozen = dispatcher.cancel().unwrap();
        assert_eq!(frozen.sent_count, 1);
        assert_eq!(dispatcher.current().phase, RunPhase::Idle);
        assert!(matches!(dispatcher.cancel(), Err(DispatchError::NoActiveRun)));

        let run = handle.finished().await.unwrap();
        assert_eq!(run.sent_count, 1);
        assert_eq!(opener.urls().len(), 1);
        assert!(matches!(rx.recv().await.unwrap().status, RunStatus::Cancelled(_)));

        // a fresh run may start right away
        let again = started(dispatcher.start_run(request(Some(ds))).unwrap());
        assert_eq!(again.finished().await.unwrap().sent_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn messages_are_paced_by_the_delay() {
        let opener = Arc::new(RecordingOpener::default());
        let (dispatcher, _rx) = new_dispatcher(Arc::<RecordingOpener>::clone(&opener));
        let mut req = request(Some(contacts(&["5512345678", "5512345679", "5512345670"])));
        req.delay = Duration::from_secs(2);

        let started_at = Instant::now();
        let run = started(dispatcher.start_run(req).unwrap())
            .finished()
            .await
            .unwrap();
        assert_eq!(run.sent_count, 3);

        let times = opener.opened_at.lock().unwrap().clone();
        assert!(times[1] - times[0] >= Duration::from_secs(2));
        assert!(times[2] - times[1] >= Duration::from_secs(2));
        // no pause after the last message
        assert!(Instant::now() - started_at < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn message_text_is_rendered_per_row_and_encoded() {
        let opener = Arc::new(RecordingOpener::default());
        let (dispatcher, _rx) = new_dispatcher(Arc::<RecordingOpener>::clone(&opener));
        let mut req = request(Some(contacts(&["(55) 1234-5678"])));
        req.template = "¡Hola {{name}}! Tu número: {{phone}} {{missing}}".into();
        req.prefix = "1".into();

        started(dispatcher.start_run(req).unwrap())
            .finished()
            .await
            .unwrap();

        assert_eq!(
            opener.urls(),
            vec![
                "https://wa.me/15512345678?text=%C2%A1Hola%20Ana!%20Tu%20n%C3%BAmero%3A%20(55)%201234-5678%20%7B%7Bmissing%7D%7D"
                    .to_string()
            ]
        );
    }

    #[test]
    fn request_from_snapshot_copies_the_shared_fields() {
        let snapshot = Snapshot {
            dataset: Some(contacts(&["5512345678"])),
            template: "Hola".into(),
            column: Some("phone".into()),
        };
        let req = RunRequest::from_snapshot(snapshot, "52", Duration::from_secs(1), true);
        assert_eq!(req.template, "Hola");
        assert_eq!(req.column.as_deref(), Some("phone"));
        assert!(req.accept_partial);
        assert_eq!(req.dataset.unwrap().len(), 1);
    }

    /// Blocks the calling thread in `open`, like a browser launch that waits
    /// on the spawned process.
    struct SlowOpener {
        pause: Duration,
        calls: AtomicUsize,
    }

    impl SlowOpener {
        fn new(pause: Duration) -> Self {
            Self {
                pause,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl LinkOpener for SlowOpener {
        fn open(&self, _url: &str) -> Result<(), LinkOpenError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.pause);
            Ok(())
        }
    }

    /// Panics on its first call only.
    #[derive(Default)]
    struct PanickingOpener {
        calls: AtomicUsize,
    }

    impl LinkOpener for PanickingOpener {
        fn open(&self, _url: &str) -> Result<(), LinkOpenError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("browser helper crashed");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn slow_opener_does_not_stall_the_runtime() {
        let opener = Arc::new(SlowOpener::new(Duration::from_millis(300)));
        let (dispatcher, _rx) = new_dispatcher(opener.clone());

        let ticker = tokio::spawn(async {
            let mut worst = Duration::ZERO;
            for _ in 0..30 {
                let tick = std::time::Instant::now();
                tokio::time::sleep(Duration::from_millis(10)).await;
                worst = worst.max(tick.elapsed());
            }
            worst
        });

        let handle = started(
            dispatcher
                .start_run(request(Some(contacts(&["5512345678"]))))
                .unwrap(),
        );
        // the controller stays readable while the link is opening
        assert_eq!(dispatcher.current().phase, RunPhase::Sending);

        let run = handle.finished().await.unwrap();
        assert_eq!(run.sent_count, 1);

        let worst = ticker.await.unwrap();
        assert!(
            worst < Duration::from_millis(150),
            "runtime stalled for {worst:?}"
        );
    }

    #[tokio::test]
    async fn cancel_while_a_link_is_opening_keeps_that_row() {
        let opener = Arc::new(SlowOpener::new(Duration::from_millis(200)));
        let (dispatcher, mut rx) = new_dispatcher(opener.clone());
        let ds = contacts(&["5512345678", "5512345679"]);

        let handle = started(dispatcher.start_run(request(Some(ds))).unwrap());
        while opener.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let frozen = dispatcher.cancel().unwrap();
        assert_eq!(frozen.sent_count, 0);
        assert_eq!(dispatcher.current().phase, RunPhase::Idle);

        let run = handle.finished().await.unwrap();
        assert_eq!(run.sent_count, 1);
        assert_eq!(run.opened_rows, vec![0]);
        assert_eq!(opener.calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.current().run.unwrap().sent_count, 1);

        let statuses = drain(&mut rx);
        assert!(matches!(statuses.last(), Some(RunStatus::Cancelled(r)) if r.sent_count == 1));
        assert!(!statuses.iter().any(|s| matches!(s, RunStatus::Sending(_))));
    }

    #[tokio::test]
    async fn panicking_opener_aborts_the_run_and_releases_the_dispatcher() {
        let opener = Arc::new(PanickingOpener::default());
        let (dispatcher, mut rx) = new_dispatcher(opener.clone());
        let ds = contacts(&["5512345678", "5512345679"]);

        let handle = started(dispatcher.start_run(request(Some(Arc::clone(&ds)))).unwrap());
        let run_id = handle.run_id().to_string();
        let err = handle.finished().await.unwrap_err();
        assert!(matches!(err, DispatchError::Aborted { run_id: ref id, .. } if *id == run_id));

        let current = dispatcher.current();
        assert_eq!(current.phase, RunPhase::Idle);
        let last = current.run.unwrap();
        assert!(!last.running);
        assert!(last.last_error.unwrap().contains("link opener failed"));

        let statuses = drain(&mut rx);
        assert!(matches!(statuses.last(), Some(RunStatus::Failed(_))));

        let again = started(dispatcher.start_run(request(Some(ds))).unwrap());
        assert_eq!(again.finished().await.unwrap().sent_count, 2);
    }
}
