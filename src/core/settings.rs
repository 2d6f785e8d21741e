//! Execution settings chosen when an epic is launched.

use serde::{Deserialize, Serialize};

use crate::core::task::Priority;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Parallel,
    Sequential,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Parallel => write!(f, "parallel"),
            ExecutionMode::Sequential => write!(f, "sequential"),
        }
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "parallel" => Ok(ExecutionMode::Parallel),
            "sequential" => Ok(ExecutionMode::Sequential),
            other => Err(Error::Validation(format!("unknown mode '{}'", other))),
        }
    }
}

/// Priority bands whose work needs human review before it is accepted.
///
/// The scheduler only carries this value through to the claim marker;
/// reviewers and workers act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewThreshold {
    /// Nothing needs review.
    None,
    /// P0 only.
    Critical,
    /// P0 and P1.
    #[default]
    High,
    /// P0 through P2.
    Medium,
    /// Every task.
    All,
}

impl ReviewThreshold {
    pub fn requires_review(&self, priority: Priority) -> bool {
        match self {
            ReviewThreshold::None => false,
            ReviewThreshold::Critical => priority.0 == 0,
            ReviewThreshold::High => priority.0 <= 1,
            ReviewThreshold::Medium => priority.0 <= 2,
            ReviewThreshold::All => true,
        }
    }
}

impl std::str::FromStr for ReviewThreshold {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(ReviewThreshold::None),
            "critical" => Ok(ReviewThreshold::Critical),
            "high" => Ok(ReviewThreshold::High),
            "medium" => Ok(ReviewThreshold::Medium),
            "all" => Ok(ReviewThreshold::All),
            other => Err(Error::Validation(format!(
                "unknown review threshold '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSettings {
    pub mode: ExecutionMode,
    pub review_threshold: ReviewThreshold,
    pub max_concurrent: usize,
    pub auto_spawn: bool,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Parallel,
            review_threshold: ReviewThreshold::default(),
            max_concurrent: 3,
            auto_spawn: true,
        }
    }
}

impl ExecutionSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(Error::Validation(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Upper bound on simultaneously running workers.
    pub fn effective_limit(&self) -> usize {
        match self.mode {
            ExecutionMode::Parallel => self.max_concurrent,
            ExecutionMode::Sequential => 1,
        }
    }
}
