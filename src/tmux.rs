use std::path::Path;
use std::process::Command;

use crate::{swlog_debug, swlog_trace, swlog_warn, Error, Result};

/// Prefix shared by every session the scheduler starts.
pub const SESSION_PREFIX: &str = "swarm_";

pub struct Tmux;

impl Tmux {
    /// Start a detached session running `cmd` in `cwd`, with `env` exported
    /// into the session environment.
    pub fn create_session(
        name: &str,
        cwd: &Path,
        cmd: &[String],
        env: &[(&str, &str)],
    ) -> Result<()> {
        if cmd.is_empty() {
            return Err(Error::Validation("Command cannot be empty".to_string()));
        }

        let cmd_str = cmd
            .iter()
            .map(|s| shell_escape(s))
            .collect::<Vec<_>>()
            .join(" ");
        swlog_debug!(
            "Tmux::create_session name={} cwd={} cmd={}",
            name,
            cwd.display(),
            cmd_str
        );

        let cwd_arg = cwd.display().to_string();
        let mut args: Vec<String> = vec![
            "new-session".into(),
            "-d".into(),
            "-s".into(),
            name.into(),
            "-c".into(),
            cwd_arg,
        ];
        for (key, value) in env {
            args.push("-e".into());
            args.push(format!("{}={}", key, value));
        }
        args.push(cmd_str);

        let output = Command::new("tmux").args(&args).output()?;
        if !output.status.success() {
            let err = format!(
                "Failed to create session '{}': {}",
                name,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            swlog_warn!("tmux create_session failed: {}", err);
            return Err(Error::Tmux(err));
        }

        // Keep the pane around after the agent exits so its output can be read.
        let _ = Command::new("tmux")
            .args(["set-option", "-t", name, "remain-on-exit", "on"])
            .output();

        swlog_debug!("Tmux session created: {}", name);
        Ok(())
    }

    pub fn list_sessions() -> Result<Vec<String>> {
        let output = Command::new("tmux")
            .args(["list-sessions", "-F", "#{session_name}"])
            .output()?;
        if !output.status.success() {
            // No server running means no sessions.
            return Ok(Vec::new());
        }
        let sessions: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(String::from)
            .collect();
        swlog_trace!("list_sessions: found {} sessions", sessions.len());
        Ok(sessions)
    }

    pub fn list_swarm_sessions() -> Result<Vec<String>> {
        Ok(Self::list_sessions()?
            .into_iter()
            .filter(|s| s.starts_with(SESSION_PREFIX))
            .collect())
    }

    pub fn is_available() -> bool {
        Command::new("tmux")
            .arg("-V")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    pub fn session_name(task_id: &str, short_id: &str) -> String {
        format!(
            "{}{}_{}",
            SESSION_PREFIX,
            sanitize_session_name(task_id),
            short_id
        )
    }
}

fn shell_escape(s: &str) -> String {
    if !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '/')
    {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\"'\"'"))
    }
}

/// tmux treats `.` and `:` as target separators, so only keep safe characters.
fn sanitize_session_name(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
