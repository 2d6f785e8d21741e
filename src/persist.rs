//! On-disk settings snapshot and claim marker.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::collab::{ClaimMarker, ClaimPublisher, SettingsSnapshot, SnapshotStore};
use crate::util::{atomic_write, blocking, remove_if_exists};
use crate::{swlog_debug, Result};

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&contents)?))
}

async fn write_json<T: Serialize>(path: &Path, value: &T, keep_backup: bool) -> Result<()> {
    let contents = serde_json::to_string_pretty(value)?;
    let path = path.to_path_buf();
    blocking(move || atomic_write(&path, &contents, keep_backup)).await
}

async fn remove(path: &Path) -> Result<()> {
    let path = path.to_path_buf();
    blocking(move || {
        if remove_if_exists(&path)? {
            swlog_debug!("Removed {}", path.display());
        }
        Ok(())
    })
    .await
}

/// Settings snapshot stored as a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStore for JsonSnapshotStore {
    async fn put(&self, snapshot: &SettingsSnapshot) -> Result<()> {
        swlog_debug!("Snapshot put epic={}", snapshot.epic_id);
        write_json(&self.path, snapshot, true).await
    }

    async fn get(&self) -> Result<Option<SettingsSnapshot>> {
        let path = self.path.clone();
        blocking(move || read_json(&path)).await
    }

    async fn delete(&self) -> Result<()> {
        remove(&self.path).await
    }
}

/// Claim marker stored as a JSON file that unaffiliated workers read before
/// self-assigning.
#[derive(Debug, Clone)]
pub struct FileClaimPublisher {
    path: PathBuf,
}

impl FileClaimPublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The currently published marker, if any.
    pub async fn read(&self) -> Result<Option<ClaimMarker>> {
        let path = self.path.clone();
        blocking(move || read_json(&path)).await
    }
}

#[async_trait]
impl ClaimPublisher for FileClaimPublisher {
    async fn publish(&self, marker: &ClaimMarker) -> Result<()> {
        swlog_debug!(
            "Publishing claim for {} ({} children)",
            marker.epic_id,
            marker.child_task_ids.len()
        );
        write_json(&self.path, marker, false).await
    }

    async fn retract(&self) -> Result<()> {
        remove(&self.path).await
    }
}
