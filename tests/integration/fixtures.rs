#![allow(dead_code)]

//! Test fixtures for integration tests.
//!
//! Provides in-memory collaborators and a harness that wires them into a
//! `Scheduler`:
//! - `MockSpawner` records every spawn request, optionally failing or
//!   delaying selected tasks
//! - `MockBacklog` holds a mutable epic that tests edit between reconciles
//! - `MemorySnapshotStore` / `MemoryClaimPublisher` keep persistence in memory

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use swarm::collab::{
    BacklogStore, ClaimMarker, ClaimPublisher, EpicChildren, RemoteChild, RemoteStatus,
    SettingsSnapshot, SnapshotStore, SpawnOutcome, SpawnRequest, Spawner,
};
use swarm::core::{
    EpicId, ExecutionMode, ExecutionSettings, Priority, ReviewThreshold, SessionId, TaskId,
    WorkerId,
};
use swarm::orchestration::{Collaborators, DispatchTiming, Scheduler, SwarmEvent};
use swarm::{Error, Result};

pub const EPIC: &str = "bd-1";

pub fn id(s: &str) -> TaskId {
    TaskId::from(s)
}

pub fn ids(list: &[&str]) -> Vec<TaskId> {
    list.iter().map(|s| TaskId::from(*s)).collect()
}

/// An open child with the given priority and in-epic dependencies.
pub fn child(task_id: &str, priority: u8, deps: &[&str]) -> RemoteChild {
    RemoteChild {
        id: id(task_id),
        title: format!("Task {}", task_id),
        priority: Priority(priority),
        status: RemoteStatus::Open,
        depends_on: ids(deps),
        assignee: None,
    }
}

pub fn settings(mode: ExecutionMode, max_concurrent: usize, auto_spawn: bool) -> ExecutionSettings {
    ExecutionSettings {
        mode,
        review_threshold: ReviewThreshold::High,
        max_concurrent,
        auto_spawn,
    }
}

pub fn parallel(max_concurrent: usize) -> ExecutionSettings {
    settings(ExecutionMode::Parallel, max_concurrent, true)
}

pub fn sequential() -> ExecutionSettings {
    settings(ExecutionMode::Sequential, 1, true)
}

/// Paused-clock timings land on millisecond ticks; allow for rounding.
pub fn assert_near(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual <= expected + Duration::from_millis(5),
        "expected ~{:?}, got {:?}",
        expected,
        actual
    );
}

// ========== Spawner ==========

#[derive(Debug, Clone)]
pub struct SpawnCall {
    pub task_id: TaskId,
    pub epic_id: EpicId,
    pub at: Instant,
}

#[derive(Default)]
pub struct MockSpawner {
    calls: Mutex<Vec<SpawnCall>>,
    failing: Mutex<HashSet<TaskId>>,
    delays: Mutex<HashMap<TaskId, Duration>>,
}

impl MockSpawner {
    pub fn fail(&self, task_id: &str) {
        self.failing.lock().unwrap().insert(id(task_id));
    }

    pub fn delay(&self, task_id: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(id(task_id), delay);
    }

    pub fn calls(&self) -> Vec<SpawnCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn spawned(&self) -> Vec<TaskId> {
        self.calls().into_iter().map(|c| c.task_id).collect()
    }

    /// Worker id the mock hands out for `task_id`.
    pub fn worker_for(task_id: &str) -> WorkerId {
        WorkerId::new(format!("swarm_{}", task_id))
    }
}

#[async_trait]
impl Spawner for MockSpawner {
    async fn spawn(&self, request: SpawnRequest) -> SpawnOutcome {
        let task_id = request.task.id.clone();
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(SpawnCall {
                task_id: task_id.clone(),
                epic_id: request.epic_id.clone(),
                at: Instant::now(),
            });
            calls.len()
        };

        let delay = self.delays.lock().unwrap().get(&task_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(&task_id) {
            return SpawnOutcome::Failed {
                error: "tmux exited with status 1".to_string(),
            };
        }
        SpawnOutcome::Spawned {
            worker_id: Self::worker_for(task_id.as_str()),
            session_id: SessionId::new(format!("session-{}", count)),
        }
    }
}

// ========== Backlog ==========

pub struct MockBacklog {
    epics: Mutex<HashMap<EpicId, EpicChildren>>,
    unavailable: Mutex<bool>,
    fetches: Mutex<usize>,
}

impl MockBacklog {
    pub fn new() -> Self {
        Self {
            epics: Mutex::new(HashMap::new()),
            unavailable: Mutex::new(false),
            fetches: Mutex::new(0),
        }
    }

    pub fn with_epic(epic_id: &str, children: Vec<RemoteChild>) -> Self {
        let backlog = Self::new();
        backlog.insert_epic(epic_id, children);
        backlog
    }

    pub fn insert_epic(&self, epic_id: &str, children: Vec<RemoteChild>) {
        self.epics.lock().unwrap().insert(
            EpicId::from(epic_id),
            EpicChildren {
                epic_title: format!("Epic {}", epic_id),
                epic_status: RemoteStatus::Open,
                children,
            },
        );
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().unwrap()
    }

    pub fn set_epic_status(&self, epic_id: &str, status: RemoteStatus) {
        if let Some(epic) = self.epics.lock().unwrap().get_mut(&EpicId::from(epic_id)) {
            epic.epic_status = status;
        }
    }

    pub fn set_child_status(&self, epic_id: &str, task_id: &str, status: RemoteStatus) {
        self.edit_child(epic_id, task_id, |c| c.status = status);
    }

    pub fn claim_child(&self, epic_id: &str, task_id: &str, assignee: &str) {
        self.edit_child(epic_id, task_id, |c| {
            c.status = RemoteStatus::InProgress;
            c.assignee = Some(WorkerId::from(assignee));
        });
    }

    pub fn add_child(&self, epic_id: &str, remote: RemoteChild) {
        if let Some(epic) = self.epics.lock().unwrap().get_mut(&EpicId::from(epic_id)) {
            epic.children.push(remote);
        }
    }

    fn edit_child(&self, epic_id: &str, task_id: &str, edit: impl FnOnce(&mut RemoteChild)) {
        let mut epics = self.epics.lock().unwrap();
        let epic = epics
            .get_mut(&EpicId::from(epic_id))
            .expect("epic exists in mock backlog");
        let child = epic
            .children
            .iter_mut()
            .find(|c| c.id.as_str() == task_id)
            .expect("child exists in mock backlog");
        edit(child);
    }
}

#[async_trait]
impl BacklogStore for MockBacklog {
    async fn fetch_children(&self, epic_id: &EpicId) -> Result<EpicChildren> {
        *self.fetches.lock().unwrap() += 1;
        if *self.unavailable.lock().unwrap() {
            return Err(Error::Backlog("connection refused".to_string()));
        }
        self.epics
            .lock()
            .unwrap()
            .get(epic_id)
            .cloned()
            .ok_or_else(|| Error::EpicNotFound(epic_id.to_string()))
    }
}

// ========== Persistence ==========

#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshot: Mutex<Option<SettingsSnapshot>>,
    corrupt: Mutex<bool>,
    puts: Mutex<usize>,
}

impl MemorySnapshotStore {
    pub fn current(&self) -> Option<SettingsSnapshot> {
        self.snapshot.lock().unwrap().clone()
    }

    pub fn seed(&self, snapshot: SettingsSnapshot) {
        *self.snapshot.lock().unwrap() = Some(snapshot);
    }

    /// Make `get` fail as if the stored document were unreadable.
    pub fn corrupt(&self) {
        *self.corrupt.lock().unwrap() = true;
    }

    pub fn is_corrupt(&self) -> bool {
        *self.corrupt.lock().unwrap()
    }

    pub fn put_count(&self) -> usize {
        *self.puts.lock().unwrap()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn put(&self, snapshot: &SettingsSnapshot) -> Result<()> {
        *self.puts.lock().unwrap() += 1;
        *self.snapshot.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }

    async fn get(&self) -> Result<Option<SettingsSnapshot>> {
        if self.is_corrupt() {
            let err = serde_json::from_str::<SettingsSnapshot>("{ truncated").unwrap_err();
            return Err(Error::Json(err));
        }
        Ok(self.current())
    }

    async fn delete(&self) -> Result<()> {
        *self.corrupt.lock().unwrap() = false;
        *self.snapshot.lock().unwrap() = None;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryClaimPublisher {
    marker: Mutex<Option<ClaimMarker>>,
    publishes: Mutex<usize>,
    retracts: Mutex<usize>,
}

impl MemoryClaimPublisher {
    pub fn current(&self) -> Option<ClaimMarker> {
        self.marker.lock().unwrap().clone()
    }

    pub fn publish_count(&self) -> usize {
        *self.publishes.lock().unwrap()
    }

    pub fn retract_count(&self) -> usize {
        *self.retracts.lock().unwrap()
    }
}

#[async_trait]
impl ClaimPublisher for MemoryClaimPublisher {
    async fn publish(&self, marker: &ClaimMarker) -> Result<()> {
        *self.publishes.lock().unwrap() += 1;
        *self.marker.lock().unwrap() = Some(marker.clone());
        Ok(())
    }

    async fn retract(&self) -> Result<()> {
        *self.retracts.lock().unwrap() += 1;
        *self.marker.lock().unwrap() = None;
        Ok(())
    }
}

// ========== Harness ==========

/// Test harness for scheduler tests.
pub struct SchedulerHarness {
    pub scheduler: Arc<Scheduler>,
    pub spawner: Arc<MockSpawner>,
    pub backlog: Arc<MockBacklog>,
    pub snapshots: Arc<MemorySnapshotStore>,
    pub claims: Arc<MemoryClaimPublisher>,
    pub event_rx: mpsc::UnboundedReceiver<SwarmEvent>,
}

impl SchedulerHarness {
    /// Harness over epic `bd-1` with the given children and no dispatch
    /// delays.
    pub fn new(children: Vec<RemoteChild>) -> Self {
        Self::with_timing(children, DispatchTiming::immediate())
    }

    pub fn with_timing(children: Vec<RemoteChild>, timing: DispatchTiming) -> Self {
        let spawner = Arc::new(MockSpawner::default());
        let backlog = Arc::new(MockBacklog::with_epic(EPIC, children));
        let snapshots = Arc::new(MemorySnapshotStore::default());
        let claims = Arc::new(MemoryClaimPublisher::default());
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let collab = Collaborators {
            spawner: spawner.clone(),
            backlog: backlog.clone(),
            snapshots: snapshots.clone(),
            claims: claims.clone(),
        };
        let scheduler = Arc::new(Scheduler::new(collab, timing, event_tx));

        Self {
            scheduler,
            spawner,
            backlog,
            snapshots,
            claims,
            event_rx,
        }
    }

    /// A second scheduler sharing this harness's collaborators, as after a
    /// process restart.
    pub fn restarted(&self) -> (Scheduler, mpsc::UnboundedReceiver<SwarmEvent>) {
        let collab = Collaborators {
            spawner: self.spawner.clone(),
            backlog: self.backlog.clone(),
            snapshots: self.snapshots.clone(),
            claims: self.claims.clone(),
        };
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Scheduler::new(collab, DispatchTiming::immediate(), event_tx),
            event_rx,
        )
    }

    pub async fn launch(&self, settings: ExecutionSettings) -> swarm::orchestration::LaunchReport {
        self.scheduler
            .launch(EpicId::from(EPIC), settings)
            .await
            .expect("launch succeeds")
    }

    pub async fn complete(&self, task_id: &str) -> swarm::orchestration::CompletionOutcome {
        self.scheduler
            .complete(&id(task_id))
            .await
            .expect("completion accepted")
    }

    /// Ids of children currently in the given state.
    pub async fn with_status(&self, status: swarm::core::ChildStatus) -> Vec<TaskId> {
        self.scheduler
            .status()
            .await
            .map(|v| v.ids_with_status(status))
            .unwrap_or_default()
    }

    pub async fn running(&self) -> Vec<WorkerId> {
        self.scheduler
            .status()
            .await
            .map(|v| v.running)
            .unwrap_or_default()
    }

    /// Every event emitted so far.
    pub fn drain_events(&mut self) -> Vec<SwarmEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    pub async fn assert_sound(&self) {
        let problems = self.scheduler.invariant_violations().await;
        assert!(problems.is_empty(), "invariants broken: {:?}", problems);
    }
}
