pub mod agent;
pub mod backlog;
pub mod collab;
pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;
pub mod persist;
pub mod spawn;
pub mod tmux;
pub mod util;

pub use error::{Error, Result};
pub use orchestration::{Collaborators, DispatchTiming, Scheduler, SwarmEvent};
