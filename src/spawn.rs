//! Workers as detached tmux sessions running the agent.

use std::path::PathBuf;

use async_trait::async_trait;
use uuid::Uuid;

use crate::agent::Agent;
use crate::collab::{SpawnOutcome, SpawnRequest, Spawner};
use crate::core::{SessionId, WorkerId};
use crate::tmux::Tmux;
use crate::util::blocking;
use crate::{swlog_debug, swlog_warn, Error};

/// Everything needed to start one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlan {
    pub name: String,
    pub session_id: SessionId,
    pub command: Vec<String>,
    pub env: Vec<(String, String)>,
}

pub struct TmuxSpawner {
    agent: Agent,
    workdir: PathBuf,
}

impl TmuxSpawner {
    pub fn new(agent: Agent, workdir: impl Into<PathBuf>) -> Self {
        Self {
            agent,
            workdir: workdir.into(),
        }
    }

    pub fn plan(&self, request: &SpawnRequest) -> SessionPlan {
        let uuid = Uuid::new_v4();
        let short = uuid.simple().to_string()[..8].to_string();
        let prompt = self.agent.prompt_for(&request.epic_id, &request.task);
        SessionPlan {
            name: Tmux::session_name(request.task.id.as_str(), &short),
            session_id: SessionId::new(uuid.to_string()),
            command: self.agent.command(Some(&prompt)),
            env: vec![
                ("SWARM_EPIC_ID".to_string(), request.epic_id.to_string()),
                ("SWARM_TASK_ID".to_string(), request.task.id.to_string()),
                ("SWARM_SESSION_ID".to_string(), uuid.to_string()),
            ],
        }
    }
}

#[async_trait]
impl Spawner for TmuxSpawner {
    async fn spawn(&self, request: SpawnRequest) -> SpawnOutcome {
        if !self.agent.is_available() {
            let error = Error::AgentNotAvailable(self.agent.binary().to_string());
            swlog_warn!("Cannot spawn {}: {}", request.task.id, error);
            return SpawnOutcome::Failed {
                error: error.to_string(),
            };
        }

        let plan = self.plan(&request);
        swlog_debug!("Spawning {} in session {}", request.task.id, plan.name);

        let workdir = self.workdir.clone();
        let session = plan.clone();
        let result = blocking(move || {
            let env: Vec<(&str, &str)> = session
                .env
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            Tmux::create_session(&session.name, &workdir, &session.command, &env)
        })
        .await;

        match result {
            Ok(()) => SpawnOutcome::Spawned {
                worker_id: WorkerId::new(plan.name),
                session_id: plan.session_id,
            },
            Err(e) => SpawnOutcome::Failed {
                error: e.to_string(),
            },
        }
    }
}
