//! Epic swarm scheduling: state, dispatch, completion and reconciliation.

pub mod events;
pub mod scheduler;
pub mod state;

pub use events::{
    CompletionOutcome, CompletionReport, DispatchReport, DispatchedTask, FailedDispatch,
    LaunchReport, MergeSummary, ReconcileOutcome, StopReason, SwarmEvent,
};
pub use scheduler::{Collaborators, DispatchTiming, Scheduler};
pub use state::{Epic, EpicState, EpicStatusView, Progress, SpawnRecord};
