//! Interfaces to the scheduler's external collaborators.
//!
//! The scheduler never spawns processes, reads the backlog or touches disk
//! itself; it talks to these traits. Concrete implementations live in
//! [`crate::backlog`], [`crate::persist`] and [`crate::spawn`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{
    ChildStatus, ChildTask, EpicId, ExecutionSettings, Priority, ReviewThreshold, SessionId,
    TaskId, WorkerId,
};
use crate::Result;

/// Status of a task as recorded in the backlog store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    Open,
    InProgress,
    Blocked,
    #[serde(alias = "done", alias = "completed")]
    Closed,
}

impl RemoteStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, RemoteStatus::Closed)
    }
}

/// A child as the backlog reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteChild {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub priority: Priority,
    pub status: RemoteStatus,
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    #[serde(default)]
    pub assignee: Option<WorkerId>,
}

impl RemoteChild {
    /// Local view of a freshly fetched child. Everything but closed children
    /// starts as `Pending` until the resolver runs.
    pub fn to_child_task(&self) -> ChildTask {
        let mut task = ChildTask::new(self.id.clone(), &self.title, self.priority)
            .with_dependencies(self.depends_on.iter().cloned());
        match self.status {
            RemoteStatus::Closed => task.complete(),
            RemoteStatus::InProgress => task.claim_elsewhere(self.assignee.clone()),
            RemoteStatus::Open | RemoteStatus::Blocked => task.status = ChildStatus::Pending,
        }
        task
    }
}

/// Result of `fetch_children`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicChildren {
    pub epic_title: String,
    pub epic_status: RemoteStatus,
    pub children: Vec<RemoteChild>,
}

/// Read side of the backlog store.
#[async_trait]
pub trait BacklogStore: Send + Sync {
    /// Fetch the epic's own status and all of its children.
    ///
    /// Unknown epic ids return [`crate::Error::EpicNotFound`].
    async fn fetch_children(&self, epic_id: &EpicId) -> Result<EpicChildren>;
}

/// What the scheduler hands the spawn collaborator for one task.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub epic_id: EpicId,
    pub task: ChildTask,
}

/// Outcome of a single spawn attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnOutcome {
    Spawned {
        worker_id: WorkerId,
        session_id: SessionId,
    },
    Failed {
        error: String,
    },
}

/// Starts one worker per call. A single attempt: no retry and no timeout.
#[async_trait]
pub trait Spawner: Send + Sync {
    async fn spawn(&self, request: SpawnRequest) -> SpawnOutcome;
}

/// What survives a restart: which epic, launched how. The child graph is
/// always re-fetched from the backlog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    pub epic_id: EpicId,
    pub settings: ExecutionSettings,
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn put(&self, snapshot: &SettingsSnapshot) -> Result<()>;
    async fn get(&self) -> Result<Option<SettingsSnapshot>>;
    async fn delete(&self) -> Result<()>;
}

/// Published while an epic is active so that unaffiliated workers skip its
/// children when self-assigning from the open backlog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimMarker {
    pub epic_id: EpicId,
    pub epic_title: String,
    pub child_task_ids: Vec<TaskId>,
    pub review_threshold: ReviewThreshold,
    pub claimed_at: DateTime<Utc>,
}

impl ClaimMarker {
    pub fn claims(&self, task_id: &TaskId) -> bool {
        self.child_task_ids.contains(task_id)
    }
}

/// The check an unaffiliated worker runs before self-assigning `task_id`.
pub fn is_claimed(marker: Option<&ClaimMarker>, task_id: &TaskId) -> bool {
    marker.is_some_and(|m| m.claims(task_id))
}

#[async_trait]
pub trait ClaimPublisher: Send + Sync {
    async fn publish(&self, marker: &ClaimMarker) -> Result<()>;
    async fn retract(&self) -> Result<()>;
}
