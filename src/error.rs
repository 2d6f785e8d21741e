use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Tmux error: {0}")]
    Tmux(String),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Agent not available: {0}")]
    AgentNotAvailable(String),

    #[error("Task join error: {0}")]
    TaskJoin(String),

    #[error("Backlog error: {0}")]
    Backlog(String),

    #[error("Epic not found: {0}")]
    EpicNotFound(String),

    #[error("Epic is already closed: {0}")]
    EpicClosed(String),

    #[error("Another epic is already active: {0}")]
    EpicAlreadyActive(String),

    #[error("No active epic")]
    NoActiveEpic,

    #[error("Task not found in epic: {0}")]
    TaskNotFound(String),
}

impl Error {
    /// Whether the error means the epic id itself is unusable, as opposed to
    /// a transient failure reaching the backlog.
    pub fn rejects_epic(&self) -> bool {
        matches!(
            self,
            Error::EpicNotFound(_) | Error::EpicClosed(_) | Error::Validation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
