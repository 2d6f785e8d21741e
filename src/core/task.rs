//! Child task data model.
//!
//! Identifiers come from the external backlog and worker collaborators, so
//! they are opaque strings wrapped in newtypes rather than generated UUIDs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Backlog identifier of a child task.
    TaskId
);
string_id!(
    /// Backlog identifier of the parent epic.
    EpicId
);
string_id!(
    /// Identifier of a spawned worker, as reported by the spawn collaborator.
    WorkerId
);
string_id!(
    /// Terminal session backing a worker.
    SessionId
);

/// Task priority. Lower numbers are more urgent (P0 before P1).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Priority(pub u8);

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Lifecycle state of a child task inside the scheduler.
///
/// `Pending` only exists between fetching a child and the first graph
/// resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildStatus {
    #[default]
    Pending,
    Ready,
    InProgress,
    Completed,
    Blocked,
}

impl std::fmt::Display for ChildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChildStatus::Pending => write!(f, "pending"),
            ChildStatus::Ready => write!(f, "ready"),
            ChildStatus::InProgress => write!(f, "in_progress"),
            ChildStatus::Completed => write!(f, "completed"),
            ChildStatus::Blocked => write!(f, "blocked"),
        }
    }
}

/// A backlog item belonging to the epic being scheduled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildTask {
    pub id: TaskId,
    pub title: String,
    pub priority: Priority,
    pub status: ChildStatus,
    /// Worker currently attributed to this task.
    pub assignee: Option<WorkerId>,
    /// Dependency ids as reported by the backlog. Ids outside the epic are
    /// kept but never block.
    pub depends_on: Vec<TaskId>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Picked up outside this scheduler. Never dispatched here; becomes
    /// `InProgress` once its dependencies allow it.
    #[serde(default)]
    pub claimed_elsewhere: bool,
}

impl ChildTask {
    pub fn new(id: TaskId, title: &str, priority: Priority) -> Self {
        Self {
            id,
            title: title.to_string(),
            priority,
            status: ChildStatus::Pending,
            assignee: None,
            depends_on: Vec::new(),
            started_at: None,
            completed_at: None,
            claimed_elsewhere: false,
        }
    }

    /// Builder-style dependency list; duplicates are dropped.
    pub fn with_dependencies<I, T>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        for dep in deps {
            let dep = dep.into();
            if !self.depends_on.contains(&dep) {
                self.depends_on.push(dep);
            }
        }
        self
    }

    /// Transition to InProgress under the given worker.
    pub fn start(&mut self, worker: Option<WorkerId>) {
        self.status = ChildStatus::InProgress;
        self.assignee = worker;
        self.started_at = Some(Utc::now());
    }

    /// Record an out-of-band claim. A ready task goes straight to
    /// `InProgress`; anything else waits for the resolver.
    pub fn claim_elsewhere(&mut self, assignee: Option<WorkerId>) {
        self.claimed_elsewhere = true;
        self.assignee = assignee;
        self.started_at.get_or_insert_with(Utc::now);
        if self.status == ChildStatus::Ready {
            self.status = ChildStatus::InProgress;
        }
    }

    pub fn complete(&mut self) {
        self.status = ChildStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn is_completed(&self) -> bool {
        self.status == ChildStatus::Completed
    }

    /// Completed and in-progress tasks are left alone by graph resolution.
    pub fn is_settled(&self) -> bool {
        matches!(
            self.status,
            ChildStatus::Completed | ChildStatus::InProgress
        )
    }
}
