//! Core domain models for epic scheduling.
//!
//! Child tasks, launch settings and the pure dependency resolver. Nothing in
//! here performs IO.

pub mod graph;
pub mod settings;
pub mod task;

pub use graph::{resolve, EpicGraph};
pub use settings::{ExecutionMode, ExecutionSettings, ReviewThreshold};
pub use task::{ChildStatus, ChildTask, EpicId, Priority, SessionId, TaskId, WorkerId};
