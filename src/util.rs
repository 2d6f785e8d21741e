//! Shared utility functions.

use std::fs;
use std::path::Path;

use tokio::task::spawn_blocking;

use crate::{swlog_debug, Error, Result};

/// Run blocking work (tmux, filesystem) off the async executor.
pub async fn blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    spawn_blocking(f)
        .await
        .map_err(|e| Error::TaskJoin(e.to_string()))?
}

/// Replace `path` with `contents` via a temp file and rename, so readers
/// never observe a half-written file. The previous version is kept as
/// `<path>.bak` when `keep_backup` is set.
pub fn atomic_write(path: &Path, contents: &str, keep_backup: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            swlog_debug!("Creating directory: {}", parent.display());
            fs::create_dir_all(parent)?;
        }
    }

    if keep_backup && path.exists() {
        let backup_path = path.with_extension("json.bak");
        fs::copy(path, &backup_path)?;
    }

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, contents)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Remove a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
