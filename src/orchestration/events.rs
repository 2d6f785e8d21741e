//! Events and reports returned by the scheduler.

use crate::core::{EpicId, SessionId, TaskId, WorkerId};
use crate::orchestration::state::Progress;

/// Why an epic was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop` was called.
    Requested,
    /// Reconciliation found the epic closed in the backlog.
    ClosedExternally,
}

/// Events emitted by the scheduler as the epic progresses.
///
/// Delivered on the channel passed to [`Scheduler::new`]; the scheduler never
/// waits for them to be consumed.
///
/// [`Scheduler::new`]: crate::orchestration::Scheduler::new
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwarmEvent {
    EpicLaunched {
        epic_id: EpicId,
        progress: Progress,
        restored: bool,
    },
    /// A spawn request is about to be issued.
    DispatchStarted { task_id: TaskId },
    DispatchSucceeded {
        task_id: TaskId,
        worker_id: WorkerId,
        session_id: SessionId,
    },
    DispatchFailed { task_id: TaskId, error: String },
    TaskCompleted { task_id: TaskId, progress: Progress },
    /// Children whose last in-epic dependency just completed.
    TasksUnblocked { task_ids: Vec<TaskId> },
    /// Children that depend on each other and can never start.
    CycleDetected { task_ids: Vec<TaskId> },
    EpicComplete { epic_id: EpicId },
    EpicStopped { epic_id: EpicId, reason: StopReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedTask {
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub session_id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDispatch {
    pub task_id: TaskId,
    pub error: String,
}

/// Aggregated outcome of one dispatch cycle, in the order spawns were issued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub dispatched: Vec<DispatchedTask>,
    pub failed: Vec<FailedDispatch>,
    /// Spawns whose response arrived after the epic was stopped or the task
    /// stopped being ready. Their workers are not tracked.
    pub dropped: Vec<TaskId>,
}

impl DispatchReport {
    pub fn is_empty(&self) -> bool {
        self.dispatched.is_empty() && self.failed.is_empty() && self.dropped.is_empty()
    }

    /// Total spawn requests issued.
    pub fn attempted(&self) -> usize {
        self.dispatched.len() + self.failed.len() + self.dropped.len()
    }

    pub fn dispatched_ids(&self) -> Vec<TaskId> {
        self.dispatched.iter().map(|d| d.task_id.clone()).collect()
    }

    pub fn merge(&mut self, other: DispatchReport) {
        self.dispatched.extend(other.dispatched);
        self.failed.extend(other.failed);
        self.dropped.extend(other.dropped);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    pub epic_id: EpicId,
    pub epic_title: String,
    pub progress: Progress,
    pub ready: Vec<TaskId>,
    pub blocked: Vec<TaskId>,
    pub cycles: Vec<Vec<TaskId>>,
    pub dispatch: DispatchReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReport {
    pub task_id: TaskId,
    pub progress: Progress,
    pub newly_ready: Vec<TaskId>,
    pub dispatch: DispatchReport,
    pub epic_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Applied(CompletionReport),
    /// The task was already completed; nothing changed.
    AlreadyCompleted,
    /// No epic is active, e.g. the signal arrived after `stop`.
    Ignored,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub completed: Vec<TaskId>,
    pub added: Vec<TaskId>,
    pub claimed_elsewhere: Vec<TaskId>,
    pub newly_ready: Vec<TaskId>,
    pub dispatch: DispatchReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Merged(MergeSummary),
    /// The backlog could not be read; local state was left alone.
    Skipped { error: String },
    /// The epic was closed out-of-band and has been torn down.
    EpicClosed,
    NoActiveEpic,
}
