use crate::config::Config;
use crate::core::{ChildTask, EpicId};

/// The agent command line each worker session runs.
pub struct Agent {
    base_command: Vec<String>,
    prompt_template: String,
}

impl Agent {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_command: config
                .effective_command()
                .split_whitespace()
                .map(String::from)
                .collect(),
            prompt_template: config.effective_prompt_template().to_string(),
        }
    }

    pub fn binary(&self) -> &str {
        self.base_command
            .first()
            .map(|s| s.as_str())
            .unwrap_or("claude")
    }

    pub fn command(&self, prompt: Option<&str>) -> Vec<String> {
        let mut cmd = self.base_command.clone();
        if let Some(p) = prompt {
            cmd.push(p.to_string());
        }
        cmd
    }

    pub fn is_available(&self) -> bool {
        which::which(self.binary()).is_ok()
    }

    /// Render the task prompt handed to the agent.
    pub fn prompt_for(&self, epic_id: &EpicId, task: &ChildTask) -> String {
        self.prompt_template
            .replace("{task_id}", task.id.as_str())
            .replace("{title}", &task.title)
            .replace("{epic_id}", epic_id.as_str())
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
