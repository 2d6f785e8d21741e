//! JSON file backed backlog store.
//!
//! The file holds every epic with its children:
//!
//! ```json
//! { "epics": [ { "id": "bd-1", "title": "Auth", "status": "open",
//!                "children": [ { "id": "bd-2", "title": "Schema",
//!                                "priority": 0, "status": "open",
//!                                "depends_on": [] } ] } ] }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::collab::{BacklogStore, EpicChildren, RemoteChild, RemoteStatus};
use crate::core::{EpicId, TaskId};
use crate::util::{atomic_write, blocking};
use crate::{swlog_debug, Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicRecord {
    pub id: EpicId,
    pub title: String,
    pub status: RemoteStatus,
    #[serde(default)]
    pub children: Vec<RemoteChild>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacklogFile {
    #[serde(default)]
    pub epics: Vec<EpicRecord>,
}

impl BacklogFile {
    pub fn epic(&self, id: &EpicId) -> Option<&EpicRecord> {
        self.epics.iter().find(|e| &e.id == id)
    }

    fn child_mut(&mut self, task_id: &TaskId) -> Option<&mut RemoteChild> {
        self.epics
            .iter_mut()
            .flat_map(|e| e.children.iter_mut())
            .find(|c| &c.id == task_id)
    }
}

#[derive(Debug, Clone)]
pub struct FileBacklog {
    path: PathBuf,
}

impl FileBacklog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_sync(&self) -> Result<BacklogFile> {
        swlog_debug!("FileBacklog::read path={}", self.path.display());
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            Error::Backlog(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn write_sync(&self, file: &BacklogFile) -> Result<()> {
        let contents = serde_json::to_string_pretty(file)?;
        atomic_write(&self.path, &contents, false)
    }

    /// Set the backlog status of one child, e.g. when a worker closes its
    /// task. Returns the epic the child belongs to.
    pub async fn set_child_status(&self, task_id: &TaskId, status: RemoteStatus) -> Result<EpicId> {
        let backlog = self.clone();
        let task_id = task_id.clone();
        blocking(move || {
            let mut file = backlog.read_sync()?;
            let child = file
                .child_mut(&task_id)
                .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
            child.status = status;
            let epic_id = file
                .epics
                .iter()
                .find(|e| e.children.iter().any(|c| c.id == task_id))
                .map(|e| e.id.clone())
                .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
            backlog.write_sync(&file)?;
            swlog_debug!("Backlog: {} -> {:?}", task_id, status);
            Ok(epic_id)
        })
        .await
    }
}

#[async_trait]
impl BacklogStore for FileBacklog {
    async fn fetch_children(&self, epic_id: &EpicId) -> Result<EpicChildren> {
        let backlog = self.clone();
        let epic_id = epic_id.clone();
        blocking(move || {
            let file = backlog.read_sync()?;
            let epic = file
                .epic(&epic_id)
                .ok_or_else(|| Error::EpicNotFound(epic_id.to_string()))?;
            Ok(EpicChildren {
                epic_title: epic.title.clone(),
                epic_status: epic.status,
                children: epic.children.clone(),
            })
        })
        .await
    }
}
