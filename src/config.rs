use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::orchestration::DispatchTiming;
use crate::{swlog_debug, Error, Result};

const DEFAULT_STAGGER_MS: u64 = 500;
const DEFAULT_CASCADE_DELAY_MS: u64 = 300;
const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_PROMPT_TEMPLATE: &str = "Work on task {task_id}: {title}";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Agent command line run inside each worker session.
    pub command: Option<String>,
    /// Working directory for spawned sessions and relative paths.
    pub workdir: Option<String>,
    pub backlog_path: Option<String>,
    pub claim_path: Option<String>,
    pub snapshot_path: Option<String>,
    pub stagger_ms: Option<u64>,
    pub cascade_delay_ms: Option<u64>,
    pub reconcile_interval_secs: Option<u64>,
    /// Supports `{task_id}`, `{title}` and `{epic_id}`.
    pub prompt_template: Option<String>,
}

impl Config {
    pub fn swarm_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".swarm"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::swarm_dir()?.join("swarm.toml"))
    }

    pub fn effective_command(&self) -> &str {
        self.command.as_deref().unwrap_or("claude")
    }

    pub fn effective_prompt_template(&self) -> &str {
        self.prompt_template
            .as_deref()
            .unwrap_or(DEFAULT_PROMPT_TEMPLATE)
    }

    pub fn workdir(&self) -> Result<PathBuf> {
        match &self.workdir {
            Some(dir) => Ok(expand_tilde(dir)),
            None => Ok(std::env::current_dir()?),
        }
    }

    pub fn backlog_path(&self) -> Result<PathBuf> {
        self.resolve(&self.backlog_path, ".swarm/backlog.json")
    }

    pub fn claim_path(&self) -> Result<PathBuf> {
        self.resolve(&self.claim_path, ".swarm/epic-claim.json")
    }

    pub fn snapshot_path(&self) -> Result<PathBuf> {
        match &self.snapshot_path {
            Some(p) => Ok(expand_tilde(p)),
            None => Ok(Self::swarm_dir()?.join("snapshot.json")),
        }
    }

    /// Relative paths resolve against the working directory.
    fn resolve(&self, value: &Option<String>, default: &str) -> Result<PathBuf> {
        let raw = value.as_deref().unwrap_or(default);
        let path = expand_tilde(raw);
        if path.is_absolute() {
            Ok(path)
        } else {
            Ok(self.workdir()?.join(path))
        }
    }

    pub fn dispatch_timing(&self) -> DispatchTiming {
        DispatchTiming {
            stagger: Duration::from_millis(self.stagger_ms.unwrap_or(DEFAULT_STAGGER_MS)),
            cascade_delay: Duration::from_millis(
                self.cascade_delay_ms.unwrap_or(DEFAULT_CASCADE_DELAY_MS),
            ),
        }
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(
            self.reconcile_interval_secs
                .unwrap_or(DEFAULT_RECONCILE_INTERVAL_SECS)
                .max(1),
        )
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        swlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            swlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        swlog_debug!(
            "Config loaded: command={:?}, workdir={:?}, backlog={:?}",
            config.command,
            config.workdir,
            config.backlog_path
        );
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        swlog_debug!("Config saved to {}", path.display());
        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
