//! In-memory record of one launched epic.
//!
//! `EpicState` is pure bookkeeping: it is owned by the [`Scheduler`] behind a
//! mutex and only mutated through the scheduler's entry points.
//!
//! [`Scheduler`]: crate::orchestration::Scheduler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::core::{
    graph, ChildStatus, ChildTask, EpicId, ExecutionMode, ExecutionSettings, SessionId, TaskId,
    WorkerId,
};
use crate::{Error, Result};

/// Identity and settings of the launched epic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epic {
    pub id: EpicId,
    pub title: String,
    pub settings: ExecutionSettings,
    pub started_at: DateTime<Utc>,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}

/// Read-only copy of the state for display and assertions.
#[derive(Debug, Clone, Serialize)]
pub struct EpicStatusView {
    pub epic: Epic,
    pub children: Vec<ChildTask>,
    pub progress: Progress,
    pub running: Vec<WorkerId>,
    pub sessions: Vec<(TaskId, SessionId)>,
    pub last_error: Option<String>,
}

impl EpicStatusView {
    pub fn status_of(&self, id: &TaskId) -> Option<ChildStatus> {
        self.children.iter().find(|c| &c.id == id).map(|c| c.status)
    }

    pub fn ids_with_status(&self, status: ChildStatus) -> Vec<TaskId> {
        self.children
            .iter()
            .filter(|c| c.status == status)
            .map(|c| c.id.clone())
            .collect()
    }
}

/// How a successful spawn response was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnRecord {
    Attributed,
    /// The task stopped being ready while the request was outstanding.
    Stale,
    /// The spawner reported a worker that already holds another task.
    DuplicateWorker,
}

#[derive(Debug)]
pub struct EpicState {
    epic: Epic,
    children: Vec<ChildTask>,
    index: HashMap<TaskId, usize>,
    progress: Progress,
    /// Workers attributed to in-progress children.
    running: HashSet<WorkerId>,
    /// task -> session, recorded on successful dispatch only.
    sessions: HashMap<TaskId, SessionId>,
    /// Tasks with a spawn request outstanding. They occupy a slot.
    in_flight: HashSet<TaskId>,
    last_error: Option<String>,
    /// Launch counter value this state belongs to.
    generation: u64,
    completion_announced: bool,
}

impl EpicState {
    /// Build the state for a freshly fetched epic and run the first
    /// resolution. Duplicate child ids keep the first occurrence.
    pub fn new(epic: Epic, children: Vec<ChildTask>, generation: u64) -> Self {
        let mut state = Self {
            epic,
            children: Vec::with_capacity(children.len()),
            index: HashMap::new(),
            progress: Progress::default(),
            running: HashSet::new(),
            sessions: HashMap::new(),
            in_flight: HashSet::new(),
            last_error: None,
            generation,
            completion_announced: false,
        };
        for child in children {
            state.insert_child(child);
        }
        state.resolve();
        state.recompute_progress();
        state
    }

    fn insert_child(&mut self, child: ChildTask) -> bool {
        if self.index.contains_key(&child.id) {
            return false;
        }
        self.index.insert(child.id.clone(), self.children.len());
        self.children.push(child);
        true
    }

    pub fn epic(&self) -> &Epic {
        &self.epic
    }

    pub fn epic_mut(&mut self) -> &mut Epic {
        &mut self.epic
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.epic.settings
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_active(&self) -> bool {
        self.epic.active
    }

    pub fn children(&self) -> &[ChildTask] {
        &self.children
    }

    pub fn child(&self, id: &TaskId) -> Option<&ChildTask> {
        self.index.get(id).map(|&i| &self.children[i])
    }

    fn child_mut(&mut self, id: &TaskId) -> Option<&mut ChildTask> {
        match self.index.get(id) {
            Some(&i) => self.children.get_mut(i),
            None => None,
        }
    }

    pub fn child_ids(&self) -> Vec<TaskId> {
        self.children.iter().map(|c| c.id.clone()).collect()
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// Always derived from child statuses, never incremented.
    fn recompute_progress(&mut self) {
        self.progress = Progress {
            completed: self.children.iter().filter(|c| c.is_completed()).count(),
            total: self.children.len(),
        };
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Re-run the dependency resolver over all unsettled children.
    pub fn resolve(&mut self) -> Vec<TaskId> {
        graph::resolve(&mut self.children)
    }

    // ========== Concurrency gate ==========

    /// Running workers plus outstanding spawn requests.
    fn occupied(&self) -> usize {
        self.running.len() + self.in_flight.len()
    }

    pub fn can_spawn_more(&self) -> bool {
        match self.epic.settings.mode {
            ExecutionMode::Parallel => self.occupied() < self.epic.settings.max_concurrent,
            ExecutionMode::Sequential => self.occupied() == 0,
        }
    }

    pub fn available_slots(&self) -> usize {
        self.epic
            .settings
            .effective_limit()
            .saturating_sub(self.occupied())
    }

    // ========== Dispatch bookkeeping ==========

    /// Ready children without an outstanding spawn, most urgent first. Ties
    /// keep backlog order.
    pub fn ready_by_priority(&self) -> Vec<&ChildTask> {
        let mut ready: Vec<&ChildTask> = self
            .children
            .iter()
            .filter(|c| c.status == ChildStatus::Ready && !self.in_flight.contains(&c.id))
            .collect();
        ready.sort_by_key(|c| c.priority);
        ready
    }

    /// Claim a slot for `id` if it is ready, not already in flight and the
    /// gate allows it. Returns a copy of the task for the spawn request.
    pub fn reserve(&mut self, id: &TaskId) -> Option<ChildTask> {
        if !self.epic.active || !self.can_spawn_more() || self.in_flight.contains(id) {
            return None;
        }
        let task = self.child(id)?;
        if task.status != ChildStatus::Ready {
            return None;
        }
        let task = task.clone();
        self.in_flight.insert(id.clone());
        Some(task)
    }

    /// Apply a successful spawn. Only `Attributed` moves the task to
    /// `InProgress` and takes a slot; otherwise the worker is not tracked.
    /// A duplicate worker leaves the task ready and records the error.
    pub fn record_spawned(
        &mut self,
        id: &TaskId,
        worker: WorkerId,
        session: SessionId,
    ) -> SpawnRecord {
        self.in_flight.remove(id);
        if self.child(id).map(|t| t.status) != Some(ChildStatus::Ready) {
            return SpawnRecord::Stale;
        }
        if self.running.contains(&worker) {
            self.last_error = Some(format!("{}: worker {} already holds a task", id, worker));
            return SpawnRecord::DuplicateWorker;
        }
        if let Some(task) = self.child_mut(id) {
            task.start(Some(worker.clone()));
        }
        self.running.insert(worker);
        self.sessions.insert(id.clone(), session);
        SpawnRecord::Attributed
    }

    /// Apply a failed spawn. The task stays ready.
    pub fn record_spawn_failure(&mut self, id: &TaskId, error: &str) {
        self.in_flight.remove(id);
        self.last_error = Some(format!("{}: {}", id, error));
    }

    // ========== Completion ==========

    /// Mark `id` completed and release its worker.
    ///
    /// Returns `Ok(false)` for a task that is already completed, so duplicate
    /// signals neither release a second worker nor move progress.
    pub fn mark_completed(&mut self, id: &TaskId) -> Result<bool> {
        let task = self
            .child_mut(id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        if task.is_completed() {
            return Ok(false);
        }
        // Out-of-band assignees were never in the running set.
        let assignee = (!task.claimed_elsewhere)
            .then(|| task.assignee.clone())
            .flatten();
        task.complete();

        if let Some(worker) = assignee {
            self.running.remove(&worker);
        }
        self.in_flight.remove(id);
        self.recompute_progress();
        Ok(true)
    }

    /// Whether every child is completed. An epic without children is never
    /// complete.
    pub fn is_complete(&self) -> bool {
        self.progress.total > 0 && self.progress.completed == self.progress.total
    }

    /// True exactly once: the first time this is called after the epic
    /// became complete.
    pub fn take_completion_announcement(&mut self) -> bool {
        if self.is_complete() && !self.completion_announced {
            self.completion_announced = true;
            return true;
        }
        false
    }

    // ========== Reconciliation ==========

    /// Add a child discovered after launch. Returns false for a known id.
    pub fn add_child(&mut self, child: ChildTask) -> bool {
        let added = self.insert_child(child);
        if added {
            self.recompute_progress();
        }
        added
    }

    /// Record that someone outside this scheduler picked up a ready or
    /// blocked child. No local worker is attributed. A blocked child stays
    /// blocked until its dependencies complete.
    pub fn mark_claimed_elsewhere(&mut self, id: &TaskId, assignee: Option<WorkerId>) -> bool {
        if self.in_flight.contains(id) {
            return false;
        }
        match self.child_mut(id) {
            Some(task) if !task.is_settled() && !task.claimed_elsewhere => {
                task.claim_elsewhere(assignee);
                true
            }
            _ => false,
        }
    }

    pub fn view(&self) -> EpicStatusView {
        let mut running: Vec<WorkerId> = self.running.iter().cloned().collect();
        running.sort();
        let mut sessions: Vec<(TaskId, SessionId)> = self
            .sessions
            .iter()
            .map(|(t, s)| (t.clone(), s.clone()))
            .collect();
        sessions.sort();
        EpicStatusView {
            epic: self.epic.clone(),
            children: self.children.clone(),
            progress: self.progress,
            running,
            sessions,
            last_error: self.last_error.clone(),
        }
    }

    /// Every broken invariant, described. Empty when the state is sound.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.progress.completed > self.progress.total {
            problems.push(format!("progress {} exceeds total", self.progress));
        }
        let limit = self.epic.settings.effective_limit();
        if self.running.len() > limit {
            problems.push(format!(
                "{} running workers exceed limit {}",
                self.running.len(),
                limit
            ));
        }

        let statuses: HashMap<&TaskId, ChildStatus> =
            self.children.iter().map(|c| (&c.id, c.status)).collect();
        for child in &self.children {
            if !matches!(child.status, ChildStatus::Ready | ChildStatus::InProgress) {
                continue;
            }
            for dep in &child.depends_on {
                if let Some(status) = statuses.get(dep) {
                    if *status != ChildStatus::Completed {
                        problems.push(format!(
                            "{} is {} but dependency {} is {}",
                            child.id, child.status, dep, status
                        ));
                    }
                }
            }
        }

        let mut assignees = HashSet::new();
        for child in &self.children {
            if child.status == ChildStatus::InProgress {
                if let Some(worker) = &child.assignee {
                    if !assignees.insert(worker) {
                        problems.push(format!("worker {} holds two tasks", worker));
                    }
                }
            }
        }
        problems
    }
}
