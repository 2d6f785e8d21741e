use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use swarm::agent::Agent;
use swarm::backlog::FileBacklog;
use swarm::collab::{is_claimed, RemoteStatus};
use swarm::config::Config;
use swarm::core::{EpicId, ExecutionMode, ExecutionSettings, ReviewThreshold, TaskId};
use swarm::orchestration::{Collaborators, LaunchReport, Scheduler, SwarmEvent};
use swarm::persist::{FileClaimPublisher, JsonSnapshotStore};
use swarm::spawn::TmuxSpawner;
use swarm::tmux::Tmux;
use swarm::{swlog, swlog_warn, Result};

/// Swarm - dependency-aware parallel dispatch of an epic's tasks to agent workers
#[derive(Parser, Debug)]
#[command(name = "swarm")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    SWARM_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.swarm/swarm.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Launch an epic and supervise it until it completes
    Launch {
        /// Backlog id of the epic
        epic_id: String,

        /// parallel or sequential
        #[arg(long, default_value = "parallel")]
        mode: ExecutionMode,

        /// Maximum simultaneous workers in parallel mode
        #[arg(long, default_value_t = 3)]
        max_concurrent: usize,

        /// none, critical, high, medium or all
        #[arg(long, default_value = "high")]
        review_threshold: ReviewThreshold,

        /// Resolve and claim, but do not start any workers
        #[arg(long)]
        no_auto_spawn: bool,
    },

    /// Resume the epic recorded in the snapshot (workers are not restarted)
    Restore {
        /// Re-enable automatic dispatch once restored
        #[arg(long)]
        auto_spawn: bool,
    },

    /// Clear the snapshot and the claim marker
    Stop,

    /// Show the snapshot, claim marker and worker sessions
    Status,

    /// Exit 0 if the task belongs to the claimed epic, 1 otherwise
    Claimed {
        task_id: String,
    },

    /// Mark a task closed in the backlog
    Done {
        task_id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    swarm::log::init(cli.debug);
    swlog!("swarm starting: {:?}", cli.command);

    let config = Config::load()?;
    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Command::Launch {
            epic_id,
            mode,
            max_concurrent,
            review_threshold,
            no_auto_spawn,
        } => {
            let settings = ExecutionSettings {
                mode,
                review_threshold,
                max_concurrent,
                auto_spawn: !no_auto_spawn,
            };
            rt.block_on(run_launch(&config, EpicId::new(epic_id), settings))
        }
        Command::Restore { auto_spawn } => rt.block_on(run_restore(&config, auto_spawn)),
        Command::Stop => rt.block_on(run_stop(&config)),
        Command::Status => rt.block_on(run_status(&config)),
        Command::Claimed { task_id } => {
            let claimed = rt.block_on(run_claimed(&config, TaskId::new(task_id)))?;
            if !claimed {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Done { task_id } => rt.block_on(run_done(&config, TaskId::new(task_id))),
    }
}

fn build_scheduler(config: &Config) -> Result<(Scheduler, mpsc::UnboundedReceiver<SwarmEvent>)> {
    let collab = Collaborators {
        spawner: Arc::new(TmuxSpawner::new(
            Agent::from_config(config),
            config.workdir()?,
        )),
        backlog: Arc::new(FileBacklog::new(config.backlog_path()?)),
        snapshots: Arc::new(JsonSnapshotStore::new(config.snapshot_path()?)),
        claims: Arc::new(FileClaimPublisher::new(config.claim_path()?)),
    };
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    Ok((
        Scheduler::new(collab, config.dispatch_timing(), event_tx),
        event_rx,
    ))
}

async fn run_launch(config: &Config, epic_id: EpicId, settings: ExecutionSettings) -> Result<()> {
    if settings.auto_spawn && !Tmux::is_available() {
        println!("Warning: tmux not found, every spawn will fail");
    }

    let (scheduler, events) = build_scheduler(config)?;
    let printer = tokio::spawn(print_events(events));

    let report = scheduler.launch(epic_id, settings).await?;
    print_launch(&report);
    supervise(config, scheduler).await;

    let _ = printer.await;
    Ok(())
}

async fn run_restore(config: &Config, auto_spawn: bool) -> Result<()> {
    let (scheduler, events) = build_scheduler(config)?;
    let printer = tokio::spawn(print_events(events));

    let Some(report) = scheduler.restore().await? else {
        println!("Nothing to restore");
        return Ok(());
    };
    print_launch(&report);

    if auto_spawn {
        let dispatch = scheduler.set_auto_spawn(true).await?;
        println!(
            "Automatic dispatch re-enabled: {} started",
            dispatch.dispatched.len()
        );
    } else {
        println!("Automatic dispatch is off; rerun with --auto-spawn to start new workers");
    }
    supervise(config, scheduler).await;

    let _ = printer.await;
    Ok(())
}

/// Reconcile periodically until the epic completes, is closed in the
/// backlog, or Ctrl-C. The snapshot is kept on Ctrl-C so `restore` can pick
/// the epic up again.
async fn supervise(config: &Config, scheduler: Scheduler) {
    let cancel = CancellationToken::new();

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nInterrupted; snapshot kept for `swarm restore`");
            ctrl_c.cancel();
        }
    });

    // Either side finishing cancels the other.
    let reconcile = async {
        let result = scheduler
            .supervise(config.reconcile_interval(), cancel.clone())
            .await;
        cancel.cancel();
        result
    };
    let watch = cancel.clone();
    let done = async {
        while !scheduler.is_epic_complete().await {
            if scheduler.active_epic().await.is_none() {
                break;
            }
            tokio::select! {
                _ = watch.cancelled() => return,
                _ = tokio::time::sleep(std::time::Duration::from_millis(250)) => {}
            }
        }
        watch.cancel();
    };

    let (result, ()) = tokio::join!(reconcile, done);
    if let Err(e) = result {
        swlog_warn!("Supervision ended with error: {}", e);
        println!("Supervision error: {}", e);
    }

    if scheduler.is_epic_complete().await {
        scheduler.stop().await;
    }
    cancel.cancel();
}

async fn print_events(mut events: mpsc::UnboundedReceiver<SwarmEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SwarmEvent::EpicLaunched {
                epic_id,
                progress,
                restored,
            } => {
                let how = if restored { "restored" } else { "launched" };
                println!("Epic {} {} ({} done)", epic_id, how, progress);
            }
            SwarmEvent::DispatchStarted { task_id } => println!("  → starting {}", task_id),
            SwarmEvent::DispatchSucceeded {
                task_id, worker_id, ..
            } => println!("  ✓ {} running in {}", task_id, worker_id),
            SwarmEvent::DispatchFailed { task_id, error } => {
                println!("  ✗ {} failed to start: {}", task_id, error)
            }
            SwarmEvent::TaskCompleted { task_id, progress } => {
                println!("  ● {} completed ({})", task_id, progress)
            }
            SwarmEvent::TasksUnblocked { task_ids } => {
                println!("  Unblocked: {}", join_ids(&task_ids))
            }
            SwarmEvent::CycleDetected { task_ids } => {
                println!("  Warning: dependency cycle, never runnable: {}", join_ids(&task_ids))
            }
            SwarmEvent::EpicComplete { epic_id } => println!("Epic {} complete", epic_id),
            SwarmEvent::EpicStopped { epic_id, reason } => {
                println!("Epic {} stopped ({:?})", epic_id, reason)
            }
        }
    }
}

fn print_launch(report: &LaunchReport) {
    println!();
    println!("  Epic:     {} ({})", report.epic_title, report.epic_id);
    println!("  Progress: {}", report.progress);
    println!("  Ready:    {}", join_ids(&report.ready));
    println!("  Blocked:  {}", join_ids(&report.blocked));
    println!(
        "  Started:  {} ({} failed)",
        report.dispatch.dispatched.len(),
        report.dispatch.failed.len()
    );
    println!();
}

fn join_ids(ids: &[TaskId]) -> String {
    if ids.is_empty() {
        return "-".to_string();
    }
    ids.iter().map(TaskId::as_str).collect::<Vec<_>>().join(", ")
}

async fn run_stop(config: &Config) -> Result<()> {
    let (scheduler, _events) = build_scheduler(config)?;
    scheduler.stop().await;
    println!("Snapshot and claim marker cleared");
    Ok(())
}

async fn run_status(config: &Config) -> Result<()> {
    use swarm::collab::SnapshotStore;

    let snapshot = JsonSnapshotStore::new(config.snapshot_path()?).get().await?;
    let marker = FileClaimPublisher::new(config.claim_path()?).read().await?;

    match snapshot {
        Some(s) => println!(
            "Snapshot: epic {} (mode={}, max_concurrent={}, auto_spawn={})",
            s.epic_id, s.settings.mode, s.settings.max_concurrent, s.settings.auto_spawn
        ),
        None => println!("Snapshot: none"),
    }
    match marker {
        Some(m) => {
            println!(
                "Claim:    {} \"{}\" since {}",
                m.epic_id,
                m.epic_title,
                m.claimed_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("          {}", join_ids(&m.child_task_ids));
        }
        None => println!("Claim:    none"),
    }

    let sessions = swarm::util::blocking(Tmux::list_swarm_sessions).await?;
    println!("Sessions: {}", sessions.len());
    for name in sessions {
        println!("  {}", name);
    }
    Ok(())
}

async fn run_claimed(config: &Config, task_id: TaskId) -> Result<bool> {
    let marker = FileClaimPublisher::new(config.claim_path()?).read().await?;
    let claimed = is_claimed(marker.as_ref(), &task_id);
    match (&marker, claimed) {
        (Some(m), true) => println!("{} is claimed by epic {}", task_id, m.epic_id),
        _ => println!("{} is not claimed", task_id),
    }
    Ok(claimed)
}

async fn run_done(config: &Config, task_id: TaskId) -> Result<()> {
    let backlog = FileBacklog::new(config.backlog_path()?);
    let epic_id = backlog
        .set_child_status(&task_id, RemoteStatus::Closed)
        .await?;
    println!("{} closed (epic {})", task_id, epic_id);
    Ok(())
}
