//! Epic swarm scheduler.
//!
//! The Scheduler takes an epic and its children from the backlog, starts
//! workers for ready children up to the concurrency limit, and re-evaluates
//! the dependency graph every time a child completes so newly unblocked work
//! flows into the freed slots.
//!
//! All graph mutations go through one `Mutex<Option<EpicState>>`. Whole
//! dispatch cycles are additionally serialized by `dispatch_lock`, so a
//! completion that arrives while a batch is in flight queues its cascade
//! behind that batch instead of racing it. Outstanding spawn requests hold a
//! slot in the concurrency gate until their response is applied.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::collab::{
    BacklogStore, ClaimMarker, ClaimPublisher, RemoteChild, RemoteStatus, SettingsSnapshot,
    SnapshotStore, SpawnOutcome, SpawnRequest, Spawner,
};
use crate::core::{
    ChildStatus, ChildTask, EpicGraph, EpicId, ExecutionSettings, TaskId,
};
use crate::orchestration::events::{
    CompletionOutcome, CompletionReport, DispatchReport, DispatchedTask, FailedDispatch,
    LaunchReport, MergeSummary, ReconcileOutcome, StopReason, SwarmEvent,
};
use crate::orchestration::state::{Epic, EpicState, EpicStatusView, SpawnRecord};
use crate::{swlog, swlog_debug, swlog_error, swlog_warn, Error, Result};

/// Delays applied between spawn requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTiming {
    /// Request `i` of an initial batch starts `i * stagger` after the first.
    pub stagger: Duration,
    /// Pause between consecutive spawns of a completion cascade.
    pub cascade_delay: Duration,
}

impl Default for DispatchTiming {
    fn default() -> Self {
        Self {
            stagger: Duration::from_millis(500),
            cascade_delay: Duration::from_millis(300),
        }
    }
}

impl DispatchTiming {
    /// No delays at all.
    pub fn immediate() -> Self {
        Self {
            stagger: Duration::ZERO,
            cascade_delay: Duration::ZERO,
        }
    }
}

/// The scheduler's external collaborators.
#[derive(Clone)]
pub struct Collaborators {
    pub spawner: Arc<dyn Spawner>,
    pub backlog: Arc<dyn BacklogStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub claims: Arc<dyn ClaimPublisher>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LaunchKind {
    Fresh,
    Restored,
}

enum SpawnResult {
    Dispatched(DispatchedTask),
    Failed(FailedDispatch),
    Dropped(TaskId),
}

pub struct Scheduler {
    collab: Collaborators,
    timing: DispatchTiming,
    state: Mutex<Option<EpicState>>,
    dispatch_lock: Mutex<()>,
    generation: AtomicU64,
    event_tx: mpsc::UnboundedSender<SwarmEvent>,
}

impl Scheduler {
    /// Create an idle scheduler. Events are sent on `event_tx`; a dropped
    /// receiver is fine.
    pub fn new(
        collab: Collaborators,
        timing: DispatchTiming,
        event_tx: mpsc::UnboundedSender<SwarmEvent>,
    ) -> Self {
        Self {
            collab,
            timing,
            state: Mutex::new(None),
            dispatch_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            event_tx,
        }
    }

    fn emit(&self, event: SwarmEvent) {
        let _ = self.event_tx.send(event);
    }

    // ========== Queries ==========

    pub async fn active_epic(&self) -> Option<EpicId> {
        let slot = self.state.lock().await;
        slot.as_ref()
            .filter(|s| s.is_active())
            .map(|s| s.epic().id.clone())
    }

    pub async fn status(&self) -> Option<EpicStatusView> {
        self.state.lock().await.as_ref().map(EpicState::view)
    }

    /// The concurrency gate: may another worker start right now?
    pub async fn can_spawn_more(&self) -> bool {
        let slot = self.state.lock().await;
        slot.as_ref()
            .is_some_and(|s| s.is_active() && s.can_spawn_more())
    }

    pub async fn is_epic_complete(&self) -> bool {
        let slot = self.state.lock().await;
        slot.as_ref().is_some_and(EpicState::is_complete)
    }

    /// Broken invariants of the current state; empty when sound or idle.
    pub async fn invariant_violations(&self) -> Vec<String> {
        let slot = self.state.lock().await;
        slot.as_ref()
            .map(EpicState::invariant_violations)
            .unwrap_or_default()
    }

    // ========== Launch ==========

    /// Launch an epic: fetch its children, resolve the graph, persist the
    /// settings snapshot, publish the claim marker and, if `auto_spawn` is
    /// set, dispatch the initial batch.
    ///
    /// # Errors
    /// - `Validation` for an empty epic id or `max_concurrent == 0`
    /// - `EpicAlreadyActive` while another epic is running
    /// - any backlog fetch error; nothing is committed in that case
    /// - `EpicClosed` if the backlog already reports the epic closed
    pub async fn launch(
        &self,
        epic_id: EpicId,
        settings: ExecutionSettings,
    ) -> Result<LaunchReport> {
        self.launch_inner(epic_id, settings, LaunchKind::Fresh).await
    }

    async fn launch_inner(
        &self,
        epic_id: EpicId,
        settings: ExecutionSettings,
        kind: LaunchKind,
    ) -> Result<LaunchReport> {
        settings.validate()?;
        if epic_id.as_str().trim().is_empty() {
            return Err(Error::Validation("epic id cannot be empty".to_string()));
        }

        let _dispatch = self.dispatch_lock.lock().await;
        if let Some(active) = self.active_epic().await {
            return Err(Error::EpicAlreadyActive(active.to_string()));
        }

        swlog!(
            "Launching epic {} ({:?}, mode={}, max_concurrent={}, auto_spawn={})",
            epic_id,
            kind,
            settings.mode,
            settings.max_concurrent,
            settings.auto_spawn
        );
        let fetched = self
            .collab
            .backlog
            .fetch_children(&epic_id)
            .await
            .inspect_err(|e| swlog_error!("Launch of {} aborted: {}", epic_id, e))?;
        if fetched.epic_status.is_closed() {
            return Err(Error::EpicClosed(epic_id.to_string()));
        }

        let children: Vec<ChildTask> = fetched
            .children
            .iter()
            .map(RemoteChild::to_child_task)
            .collect();
        let cycles = EpicGraph::build(&children).cycles();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let epic = Epic {
            id: epic_id.clone(),
            title: fetched.epic_title.clone(),
            settings: settings.clone(),
            started_at: Utc::now(),
            active: true,
        };

        let mut state = EpicState::new(epic, children, generation);
        let announce_complete = state.take_completion_announcement();
        let view = state.view();
        let marker = ClaimMarker {
            epic_id: epic_id.clone(),
            epic_title: fetched.epic_title.clone(),
            child_task_ids: state.child_ids(),
            review_threshold: settings.review_threshold,
            claimed_at: Utc::now(),
        };
        *self.state.lock().await = Some(state);

        if kind == LaunchKind::Fresh {
            let snapshot = SettingsSnapshot {
                epic_id: epic_id.clone(),
                settings: settings.clone(),
            };
            if let Err(e) = self.collab.snapshots.put(&snapshot).await {
                swlog_warn!("Failed to persist snapshot for {}: {}", epic_id, e);
            }
        }
        if let Err(e) = self.collab.claims.publish(&marker).await {
            swlog_warn!("Failed to publish claim marker for {}: {}", epic_id, e);
        }

        for group in &cycles {
            swlog_warn!(
                "Dependency cycle in epic {}: {:?} will stay blocked",
                epic_id,
                group
            );
            self.emit(SwarmEvent::CycleDetected {
                task_ids: group.clone(),
            });
        }
        self.emit(SwarmEvent::EpicLaunched {
            epic_id: epic_id.clone(),
            progress: view.progress,
            restored: kind == LaunchKind::Restored,
        });
        if announce_complete {
            self.emit(SwarmEvent::EpicComplete {
                epic_id: epic_id.clone(),
            });
        }

        let dispatch = if settings.auto_spawn {
            self.dispatch_initial().await
        } else {
            DispatchReport::default()
        };

        swlog!(
            "Epic {} launched: {} children, {} dispatched, {} failed",
            epic_id,
            view.progress.total,
            dispatch.dispatched.len(),
            dispatch.failed.len()
        );
        Ok(LaunchReport {
            epic_id,
            epic_title: fetched.epic_title,
            progress: view.progress,
            ready: view.ids_with_status(ChildStatus::Ready),
            blocked: view.ids_with_status(ChildStatus::Blocked),
            cycles,
            dispatch,
        })
    }

    // ========== Dispatch ==========

    /// Start the most urgent ready children, up to the free slots, as one
    /// staggered batch. Spawns run concurrently; request `i` waits
    /// `i * stagger` first. Caller holds `dispatch_lock`.
    async fn dispatch_initial(&self) -> DispatchReport {
        let (generation, epic_id, batch) = {
            let mut slot = self.state.lock().await;
            let Some(state) = slot.as_mut() else {
                return DispatchReport::default();
            };
            let picked: Vec<TaskId> = state
                .ready_by_priority()
                .into_iter()
                .take(state.available_slots())
                .map(|c| c.id.clone())
                .collect();
            let batch: Vec<ChildTask> = picked.iter().filter_map(|id| state.reserve(id)).collect();
            (state.generation(), state.epic().id.clone(), batch)
        };
        if batch.is_empty() {
            return DispatchReport::default();
        }

        swlog_debug!(
            "Initial dispatch for {}: {:?}",
            epic_id,
            batch.iter().map(|t| t.id.as_str()).collect::<Vec<_>>()
        );
        let stagger = self.timing.stagger;
        let attempts = batch.into_iter().enumerate().map(|(i, task)| {
            let epic_id = epic_id.clone();
            async move {
                if i > 0 {
                    tokio::time::sleep(stagger * i as u32).await;
                }
                self.dispatch_one(generation, epic_id, task).await
            }
        });
        let report = aggregate(join_all(attempts).await);
        swlog!(
            "Initial dispatch for {}: {} of {} started",
            epic_id,
            report.dispatched.len(),
            report.attempted()
        );
        report
    }

    /// Dispatch ready children one at a time, most urgent first, until the
    /// gate closes or nothing is left. Each child is tried at most once per
    /// cycle. Caller holds `dispatch_lock`.
    async fn dispatch_cascade(&self) -> DispatchReport {
        let mut results = Vec::new();
        let mut tried: HashSet<TaskId> = HashSet::new();

        loop {
            let next = {
                let mut slot = self.state.lock().await;
                let Some(state) = slot.as_mut() else {
                    break;
                };
                if !state.is_active() || !state.can_spawn_more() {
                    break;
                }
                let candidate = state
                    .ready_by_priority()
                    .into_iter()
                    .find(|c| !tried.contains(&c.id))
                    .map(|c| c.id.clone());
                let Some(id) = candidate else {
                    break;
                };
                tried.insert(id.clone());
                state
                    .reserve(&id)
                    .map(|task| (state.generation(), state.epic().id.clone(), task))
            };
            let Some((generation, epic_id, task)) = next else {
                break;
            };

            if !results.is_empty() && !self.timing.cascade_delay.is_zero() {
                tokio::time::sleep(self.timing.cascade_delay).await;
            }
            results.push(self.dispatch_one(generation, epic_id, task).await);
        }

        let report = aggregate(results);
        if !report.is_empty() {
            swlog!(
                "Cascade: {} of {} started",
                report.dispatched.len(),
                report.attempted()
            );
        }
        report
    }

    /// Issue one spawn request and apply its response. The response is
    /// discarded if the epic it was issued for is gone.
    async fn dispatch_one(&self, generation: u64, epic_id: EpicId, task: ChildTask) -> SpawnResult {
        let task_id = task.id.clone();
        self.emit(SwarmEvent::DispatchStarted {
            task_id: task_id.clone(),
        });

        let outcome = self
            .collab
            .spawner
            .spawn(SpawnRequest { epic_id, task })
            .await;

        let result = {
            let mut slot = self.state.lock().await;
            match slot.as_mut() {
                Some(state) if state.generation() == generation && state.is_active() => {
                    match outcome {
                        SpawnOutcome::Spawned {
                            worker_id,
                            session_id,
                        } => {
                            match state.record_spawned(
                                &task_id,
                                worker_id.clone(),
                                session_id.clone(),
                            ) {
                                SpawnRecord::Attributed => SpawnResult::Dispatched(DispatchedTask {
                                    task_id: task_id.clone(),
                                    worker_id,
                                    session_id,
                                }),
                                SpawnRecord::Stale => SpawnResult::Dropped(task_id.clone()),
                                SpawnRecord::DuplicateWorker => SpawnResult::Failed(FailedDispatch {
                                    task_id: task_id.clone(),
                                    error: format!("worker {} already holds a task", worker_id),
                                }),
                            }
                        }
                        SpawnOutcome::Failed { error } => {
                            state.record_spawn_failure(&task_id, &error);
                            SpawnResult::Failed(FailedDispatch {
                                task_id: task_id.clone(),
                                error,
                            })
                        }
                    }
                }
                _ => SpawnResult::Dropped(task_id.clone()),
            }
        };

        match &result {
            SpawnResult::Dispatched(d) => {
                swlog!("Dispatched {} to worker {}", d.task_id, d.worker_id);
                self.emit(SwarmEvent::DispatchSucceeded {
                    task_id: d.task_id.clone(),
                    worker_id: d.worker_id.clone(),
                    session_id: d.session_id.clone(),
                });
            }
            SpawnResult::Failed(f) => {
                swlog_warn!("Spawn for {} failed: {}", f.task_id, f.error);
                self.emit(SwarmEvent::DispatchFailed {
                    task_id: f.task_id.clone(),
                    error: f.error.clone(),
                });
            }
            SpawnResult::Dropped(id) => {
                swlog_debug!("Discarding spawn response for {}: no longer wanted", id);
            }
        }
        result
    }

    // ========== Completion ==========

    /// Handle a "task finished" signal.
    ///
    /// Releases the task's worker, marks it completed, recomputes progress,
    /// re-resolves the graph and, with `auto_spawn`, cascades newly ready
    /// work into the free slots. Duplicate signals are reported as
    /// [`CompletionOutcome::AlreadyCompleted`] and change nothing.
    ///
    /// # Errors
    /// `TaskNotFound` if the id is not a child of the active epic.
    pub async fn complete(&self, task_id: &TaskId) -> Result<CompletionOutcome> {
        let (epic_id, auto_spawn, progress, newly_ready, announce) = {
            let mut slot = self.state.lock().await;
            let Some(state) = slot.as_mut().filter(|s| s.is_active()) else {
                swlog_debug!("Completion for {} ignored: no active epic", task_id);
                return Ok(CompletionOutcome::Ignored);
            };
            if !state.mark_completed(task_id)? {
                swlog_debug!("Duplicate completion for {}", task_id);
                return Ok(CompletionOutcome::AlreadyCompleted);
            }
            let newly_ready = state.resolve();
            (
                state.epic().id.clone(),
                state.settings().auto_spawn,
                state.progress(),
                newly_ready,
                state.take_completion_announcement(),
            )
        };

        swlog!("Task {} completed ({})", task_id, progress);
        self.emit(SwarmEvent::TaskCompleted {
            task_id: task_id.clone(),
            progress,
        });
        if !newly_ready.is_empty() {
            self.emit(SwarmEvent::TasksUnblocked {
                task_ids: newly_ready.clone(),
            });
        }
        if announce {
            swlog!("Epic {} complete", epic_id);
            self.emit(SwarmEvent::EpicComplete { epic_id });
        }

        let dispatch = if auto_spawn {
            let _dispatch = self.dispatch_lock.lock().await;
            self.dispatch_cascade().await
        } else {
            DispatchReport::default()
        };

        Ok(CompletionOutcome::Applied(CompletionReport {
            task_id: task_id.clone(),
            progress,
            newly_ready,
            dispatch,
            epic_complete: announce,
        }))
    }

    /// Turn automatic dispatch on or off for the active epic. Turning it on
    /// immediately runs a cascade over the ready children.
    pub async fn set_auto_spawn(&self, enabled: bool) -> Result<DispatchReport> {
        let _dispatch = self.dispatch_lock.lock().await;
        let snapshot = {
            let mut slot = self.state.lock().await;
            let state = slot
                .as_mut()
                .filter(|s| s.is_active())
                .ok_or(Error::NoActiveEpic)?;
            state.epic_mut().settings.auto_spawn = enabled;
            SettingsSnapshot {
                epic_id: state.epic().id.clone(),
                settings: state.settings().clone(),
            }
        };
        if let Err(e) = self.collab.snapshots.put(&snapshot).await {
            swlog_warn!("Failed to persist snapshot for {}: {}", snapshot.epic_id, e);
        }

        if enabled {
            Ok(self.dispatch_cascade().await)
        } else {
            Ok(DispatchReport::default())
        }
    }

    // ========== Teardown ==========

    /// Tear down the active epic and clear the snapshot and claim marker.
    ///
    /// Spawn requests already in flight are not cancelled; their responses
    /// are discarded. Persistence failures are logged, never returned.
    /// Returns the id of the epic that was active, if any.
    pub async fn stop(&self) -> Option<EpicId> {
        self.teardown(StopReason::Requested, None).await
    }

    /// Remove the state (only if it still belongs to `generation`, when
    /// given) and clear persistence.
    async fn teardown(&self, reason: StopReason, generation: Option<u64>) -> Option<EpicId> {
        let removed = {
            let mut slot = self.state.lock().await;
            let matches = match (slot.as_ref(), generation) {
                (Some(state), Some(expected)) => state.generation() == expected,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if matches {
                slot.take()
            } else if generation.is_some() {
                // A different epic took over meanwhile; leave it alone.
                return None;
            } else {
                None
            }
        };

        if let Err(e) = self.collab.snapshots.delete().await {
            swlog_warn!("Failed to clear snapshot: {}", e);
        }
        if let Err(e) = self.collab.claims.retract().await {
            swlog_warn!("Failed to retract claim marker: {}", e);
        }

        let mut state = removed?;
        state.epic_mut().active = false;
        let epic_id = state.epic().id.clone();
        swlog!("Epic {} stopped ({:?})", epic_id, reason);
        self.emit(SwarmEvent::EpicStopped {
            epic_id: epic_id.clone(),
            reason,
        });
        Some(epic_id)
    }

    // ========== Restore & reconcile ==========

    /// Resume the epic recorded in the settings snapshot.
    ///
    /// Children are re-fetched from the backlog and the claim marker is
    /// re-published, but `auto_spawn` is forced off: workers started before
    /// the restart may still be running. An unreadable snapshot, or one whose
    /// epic the backlog rejects, is discarded.
    ///
    /// Returns `Ok(None)` when there is nothing to restore.
    pub async fn restore(&self) -> Result<Option<LaunchReport>> {
        let snapshot = match self.collab.snapshots.get().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Ok(None),
            Err(Error::Json(e)) => {
                swlog_warn!("Discarding unreadable snapshot: {}", e);
                self.discard_snapshot().await;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mut settings = snapshot.settings;
        settings.auto_spawn = false;
        match self
            .launch_inner(snapshot.epic_id.clone(), settings, LaunchKind::Restored)
            .await
        {
            Ok(report) => Ok(Some(report)),
            Err(e) if e.rejects_epic() => {
                swlog_warn!(
                    "Discarding snapshot for {}: {}",
                    snapshot.epic_id,
                    e
                );
                self.discard_snapshot().await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn discard_snapshot(&self) {
        if let Err(e) = self.collab.snapshots.delete().await {
            swlog_warn!("Failed to delete snapshot: {}", e);
        }
    }

    /// Merge authoritative child statuses from the backlog into local state.
    ///
    /// - closed remotely, not completed locally: handled as a completion
    /// - unknown locally: added
    /// - in progress remotely, ready/blocked locally: marked claimed elsewhere
    /// - locally in-progress children are never downgraded
    ///
    /// A fetch failure leaves local state untouched. If the epic itself is
    /// closed, the scheduler tears down exactly as [`Scheduler::stop`].
    pub async fn reconcile(&self) -> Result<ReconcileOutcome> {
        let Some((epic_id, generation)) = ({
            let slot = self.state.lock().await;
            slot.as_ref()
                .filter(|s| s.is_active())
                .map(|s| (s.epic().id.clone(), s.generation()))
        }) else {
            return Ok(ReconcileOutcome::NoActiveEpic);
        };

        let fetched = match self.collab.backlog.fetch_children(&epic_id).await {
            Ok(fetched) => fetched,
            Err(e) => {
                swlog_warn!("Reconcile of {} skipped: {}", epic_id, e);
                return Ok(ReconcileOutcome::Skipped {
                    error: e.to_string(),
                });
            }
        };

        if fetched.epic_status.is_closed() {
            swlog!("Epic {} closed externally", epic_id);
            self.teardown(StopReason::ClosedExternally, Some(generation))
                .await;
            return Ok(ReconcileOutcome::EpicClosed);
        }

        let mut summary = MergeSummary::default();
        let (auto_spawn, progress, cycles, announce) = {
            let mut slot = self.state.lock().await;
            let Some(state) = slot
                .as_mut()
                .filter(|s| s.is_active() && s.generation() == generation)
            else {
                return Ok(ReconcileOutcome::NoActiveEpic);
            };

            for remote in &fetched.children {
                let Some(local) = state.child(&remote.id).map(|c| c.status) else {
                    if state.add_child(remote.to_child_task()) {
                        summary.added.push(remote.id.clone());
                    }
                    continue;
                };
                if remote.status.is_closed() {
                    if local != ChildStatus::Completed && state.mark_completed(&remote.id)? {
                        summary.completed.push(remote.id.clone());
                    }
                } else if remote.status == RemoteStatus::InProgress
                    && state.mark_claimed_elsewhere(&remote.id, remote.assignee.clone())
                {
                    summary.claimed_elsewhere.push(remote.id.clone());
                }
            }

            summary.newly_ready = state.resolve();
            let cycles = if summary.added.is_empty() {
                Vec::new()
            } else {
                EpicGraph::build(state.children()).cycles()
            };
            (
                state.settings().auto_spawn,
                state.progress(),
                cycles,
                state.take_completion_announcement(),
            )
        };

        for task_id in &summary.completed {
            self.emit(SwarmEvent::TaskCompleted {
                task_id: task_id.clone(),
                progress,
            });
        }
        if !summary.newly_ready.is_empty() {
            self.emit(SwarmEvent::TasksUnblocked {
                task_ids: summary.newly_ready.clone(),
            });
        }
        for group in cycles {
            swlog_warn!("Dependency cycle in epic {}: {:?}", epic_id, group);
            self.emit(SwarmEvent::CycleDetected { task_ids: group });
        }
        if announce {
            swlog!("Epic {} complete", epic_id);
            self.emit(SwarmEvent::EpicComplete {
                epic_id: epic_id.clone(),
            });
        }
        swlog_debug!(
            "Reconciled {}: {} completed, {} added, {} claimed elsewhere",
            epic_id,
            summary.completed.len(),
            summary.added.len(),
            summary.claimed_elsewhere.len()
        );

        if auto_spawn && (!summary.completed.is_empty() || !summary.newly_ready.is_empty()) {
            let _dispatch = self.dispatch_lock.lock().await;
            summary.dispatch = self.dispatch_cascade().await;
        }
        Ok(ReconcileOutcome::Merged(summary))
    }

    /// Reconcile every `interval` until cancelled or the epic goes away.
    pub async fn supervise(&self, interval: Duration, cancel: CancellationToken) -> Result<()> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; launch has just fetched anyway.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    swlog_debug!("Supervision cancelled");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    match self.reconcile().await? {
                        ReconcileOutcome::EpicClosed | ReconcileOutcome::NoActiveEpic => return Ok(()),
                        ReconcileOutcome::Merged(_) | ReconcileOutcome::Skipped { .. } => {}
                    }
                }
            }
        }
    }
}

fn aggregate(results: Vec<SpawnResult>) -> DispatchReport {
    let mut report = DispatchReport::default();
    for result in results {
        match result {
            SpawnResult::Dispatched(d) => report.dispatched.push(d),
            SpawnResult::Failed(f) => report.failed.push(f),
            SpawnResult::Dropped(id) => report.dropped.push(id),
        }
    }
    report
}
