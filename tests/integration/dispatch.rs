//! Launch and initial dispatch tests.

use std::time::Duration;

use swarm::core::{ChildStatus, EpicId, ExecutionMode};
use swarm::orchestration::{DispatchTiming, SwarmEvent};
use swarm::Error;

use crate::fixtures::{
    assert_near, child, id, ids, parallel, sequential, settings, SchedulerHarness, EPIC,
};

/// Test: Scenario A launch
/// Given A(P0), B(P1, depends on A), C(P0) and max 2 parallel
/// When the epic is launched
/// Then A and C are dispatched and B stays blocked
#[tokio::test]
async fn test_launch_dispatches_ready_children() {
    let mut harness = SchedulerHarness::new(vec![
        child("A", 0, &[]),
        child("B", 1, &["A"]),
        child("C", 0, &[]),
    ]);

    let report = harness.launch(parallel(2)).await;

    assert_eq!(report.ready, ids(&["A", "C"]));
    assert_eq!(report.blocked, ids(&["B"]));
    assert_eq!(report.dispatch.dispatched_ids(), ids(&["A", "C"]));
    assert_eq!(harness.spawner.spawned(), ids(&["A", "C"]));
    assert_eq!(harness.with_status(ChildStatus::InProgress).await, ids(&["A", "C"]));
    assert_eq!(harness.with_status(ChildStatus::Blocked).await, ids(&["B"]));
    assert_eq!(harness.running().await.len(), 2);
    assert!(!harness.scheduler.can_spawn_more().await);
    harness.assert_sound().await;

    let events = harness.drain_events();
    assert!(matches!(
        events.first(),
        Some(SwarmEvent::EpicLaunched { restored: false, .. })
    ));
    let succeeded = events
        .iter()
        .filter(|e| matches!(e, SwarmEvent::DispatchSucceeded { .. }))
        .count();
    assert_eq!(succeeded, 2);
}

/// Test: Priority order under a tight limit
/// Given five ready children and max 2
/// When the epic is launched
/// Then the two most urgent start, ties broken by backlog order
#[tokio::test]
async fn test_most_urgent_children_start_first() {
    let harness = SchedulerHarness::new(vec![
        child("p3", 3, &[]),
        child("p1-first", 1, &[]),
        child("p2", 2, &[]),
        child("p1-second", 1, &[]),
        child("p4", 4, &[]),
    ]);

    let report = harness.launch(parallel(2)).await;

    assert_eq!(report.dispatch.dispatched_ids(), ids(&["p1-first", "p1-second"]));
    assert_eq!(
        harness.with_status(ChildStatus::Ready).await,
        ids(&["p3", "p2", "p4"])
    );
}

/// Test: Sequential mode
/// Given three independent children in sequential mode
/// When the epic is launched
/// Then exactly one worker starts
#[tokio::test]
async fn test_sequential_launch_starts_one() {
    let harness = SchedulerHarness::new(vec![
        child("D", 0, &[]),
        child("E", 1, &[]),
        child("F", 2, &[]),
    ]);

    let report = harness.launch(sequential()).await;

    assert_eq!(report.dispatch.dispatched_ids(), ids(&["D"]));
    assert_eq!(harness.running().await.len(), 1);
    assert!(!harness.scheduler.can_spawn_more().await);
}

/// Test: Launch with automatic dispatch off
/// Given ready children and auto_spawn disabled
/// When the epic is launched
/// Then no spawn is issued but the graph, snapshot and claim marker are set up
#[tokio::test]
async fn test_launch_without_auto_spawn() {
    let harness = SchedulerHarness::new(vec![child("A", 0, &[]), child("B", 0, &["A"])]);

    let report = harness
        .launch(settings(ExecutionMode::Parallel, 3, false))
        .await;

    assert!(report.dispatch.is_empty());
    assert!(harness.spawner.calls().is_empty());
    assert_eq!(report.ready, ids(&["A"]));
    assert_eq!(
        harness.snapshots.current().map(|s| s.settings.auto_spawn),
        Some(false)
    );
    let marker = harness.claims.current().expect("claim published");
    assert_eq!(marker.child_task_ids, ids(&["A", "B"]));
    assert!(harness.scheduler.can_spawn_more().await);
}

/// Test: Launch persists a snapshot and publishes the claim marker
#[tokio::test]
async fn test_launch_persists_snapshot_and_claim() {
    let harness = SchedulerHarness::new(vec![child("A", 0, &[])]);
    harness.launch(parallel(4)).await;

    let snapshot = harness.snapshots.current().expect("snapshot stored");
    assert_eq!(snapshot.epic_id, EpicId::from(EPIC));
    assert_eq!(snapshot.settings, parallel(4));

    let marker = harness.claims.current().expect("claim published");
    assert_eq!(marker.epic_id, EpicId::from(EPIC));
    assert_eq!(marker.epic_title, "Epic bd-1");
    assert!(marker.claims(&id("A")));
}

/// Test: Rejected launches leave nothing behind
#[tokio::test]
async fn test_rejected_launches() {
    let harness = SchedulerHarness::new(vec![child("A", 0, &[])]);

    let unknown = harness
        .scheduler
        .launch(EpicId::from("bd-404"), parallel(2))
        .await;
    assert!(matches!(unknown, Err(Error::EpicNotFound(_))));

    let zero = harness
        .scheduler
        .launch(EpicId::from(EPIC), parallel(0))
        .await;
    assert!(matches!(zero, Err(Error::Validation(_))));

    harness.backlog.set_unavailable(true);
    let down = harness.scheduler.launch(EpicId::from(EPIC), parallel(2)).await;
    assert!(matches!(down, Err(Error::Backlog(_))));

    assert!(harness.scheduler.active_epic().await.is_none());
    assert!(harness.snapshots.current().is_none());
    assert!(harness.claims.current().is_none());
    assert!(harness.spawner.calls().is_empty());
}

/// Test: Closed epics cannot be launched
#[tokio::test]
async fn test_closed_epic_is_rejected() {
    let harness = SchedulerHarness::new(vec![child("A", 0, &[])]);
    harness
        .backlog
        .set_epic_status(EPIC, swarm::collab::RemoteStatus::Closed);

    let result = harness.scheduler.launch(EpicId::from(EPIC), parallel(2)).await;
    assert!(matches!(result, Err(Error::EpicClosed(_))));
}

/// Test: Spawn failure
/// Given the top-priority child fails to spawn
/// When the epic is launched
/// Then it stays ready, the error is recorded and its slot is freed
#[tokio::test]
async fn test_spawn_failure_keeps_child_ready() {
    let mut harness = SchedulerHarness::new(vec![child("A", 0, &[]), child("B", 1, &[])]);
    harness.spawner.fail("A");

    let report = harness.launch(parallel(2)).await;

    assert_eq!(report.dispatch.dispatched_ids(), ids(&["B"]));
    assert_eq!(report.dispatch.failed.len(), 1);
    assert_eq!(report.dispatch.failed[0].task_id, id("A"));

    let view = harness.scheduler.status().await.unwrap();
    assert_eq!(view.status_of(&id("A")), Some(ChildStatus::Ready));
    assert!(view.last_error.as_deref().unwrap_or("").starts_with("A:"));
    assert_eq!(view.running.len(), 1);
    assert!(harness.scheduler.can_spawn_more().await);

    assert!(harness
        .drain_events()
        .iter()
        .any(|e| matches!(e, SwarmEvent::DispatchFailed { task_id, .. } if task_id == &id("A"))));
}

/// Test: Dependency cycles are reported and never dispatched
#[tokio::test]
async fn test_cycle_is_reported_and_blocked() {
    let mut harness = SchedulerHarness::new(vec![
        child("X", 0, &["Y"]),
        child("Y", 0, &["X"]),
        child("Z", 1, &[]),
    ]);

    let report = harness.launch(parallel(3)).await;

    assert_eq!(report.cycles, vec![ids(&["X", "Y"])]);
    assert_eq!(report.dispatch.dispatched_ids(), ids(&["Z"]));
    assert_eq!(harness.with_status(ChildStatus::Blocked).await, ids(&["X", "Y"]));
    assert!(harness
        .drain_events()
        .iter()
        .any(|e| matches!(e, SwarmEvent::CycleDetected { .. })));
}

/// Test: Dependencies outside the epic never block
#[tokio::test]
async fn test_external_dependency_is_ignored() {
    let harness = SchedulerHarness::new(vec![child("A", 0, &["other-epic-7"])]);
    let report = harness.launch(parallel(1)).await;
    assert_eq!(report.dispatch.dispatched_ids(), ids(&["A"]));
}

/// Test: Children already closed or in progress remotely
#[tokio::test]
async fn test_remote_statuses_seed_local_state() {
    let mut done = child("A", 0, &[]);
    done.status = swarm::collab::RemoteStatus::Closed;
    let mut busy = child("C", 0, &[]);
    busy.status = swarm::collab::RemoteStatus::InProgress;

    let harness = SchedulerHarness::new(vec![done, child("B", 1, &["A"]), busy]);
    let report = harness.launch(parallel(2)).await;

    assert_eq!(report.progress.completed, 1);
    assert_eq!(report.dispatch.dispatched_ids(), ids(&["B"]));
    assert!(harness.spawner.spawned().iter().all(|t| t != &id("C")));
}

/// Test: Remote claim on a blocked child
/// Given B in progress remotely but depending on open A
/// When the epic is launched and A later completes
/// Then B stays blocked, then moves to in progress without a local spawn
#[tokio::test]
async fn test_remote_claim_respects_dependencies() {
    let mut claimed = child("B", 0, &["A"]);
    claimed.status = swarm::collab::RemoteStatus::InProgress;
    let harness = SchedulerHarness::new(vec![child("A", 0, &[]), claimed]);

    harness.launch(parallel(2)).await;
    assert_eq!(harness.with_status(ChildStatus::Blocked).await, ids(&["B"]));
    assert_eq!(harness.spawner.spawned(), ids(&["A"]));
    harness.assert_sound().await;

    harness.complete("A").await;
    assert_eq!(harness.with_status(ChildStatus::InProgress).await, ids(&["B"]));
    assert_eq!(harness.spawner.spawned(), ids(&["A"]));
    assert!(harness.running().await.is_empty());
    harness.assert_sound().await;
}

/// Test: Only one epic at a time
#[tokio::test]
async fn test_second_epic_is_rejected_while_active() {
    let harness = SchedulerHarness::new(vec![child("A", 0, &[])]);
    harness.backlog.insert_epic("bd-2", vec![child("Q", 0, &[])]);
    harness.launch(parallel(1)).await;

    let result = harness.scheduler.launch(EpicId::from("bd-2"), parallel(1)).await;
    assert!(matches!(result, Err(Error::EpicAlreadyActive(_))));
}

/// Test: Initial batch is staggered
/// Given three ready children and the default 500ms stagger
/// When the epic is launched
/// Then spawn requests go out at 0ms, 500ms and 1000ms
#[tokio::test(start_paused = true)]
async fn test_initial_batch_is_staggered() {
    let harness = SchedulerHarness::with_timing(
        vec![child("A", 0, &[]), child("B", 1, &[]), child("C", 2, &[])],
        DispatchTiming::default(),
    );

    let start = tokio::time::Instant::now();
    harness.launch(parallel(3)).await;

    let offsets: Vec<Duration> = harness
        .spawner
        .calls()
        .iter()
        .map(|c| c.at.duration_since(start))
        .collect();
    assert_eq!(offsets.len(), 3);
    assert_near(offsets[0], Duration::ZERO);
    assert_near(offsets[1], Duration::from_millis(500));
    assert_near(offsets[2], Duration::from_millis(1000));
}

/// Test: Batch spawns run concurrently
/// Given a slow first spawn
/// When the epic is launched
/// Then later spawns do not wait for it
#[tokio::test(start_paused = true)]
async fn test_batch_spawns_overlap() {
    let harness = SchedulerHarness::with_timing(
        vec![child("A", 0, &[]), child("B", 1, &[])],
        DispatchTiming::default(),
    );
    harness.spawner.delay("A", Duration::from_secs(5));

    let start = tokio::time::Instant::now();
    let report = harness.launch(parallel(2)).await;

    let calls = harness.spawner.calls();
    assert_eq!(calls[1].task_id, id("B"));
    assert_near(calls[1].at.duration_since(start), Duration::from_millis(500));
    assert_eq!(report.dispatch.dispatched_ids(), ids(&["A", "B"]));
    assert_near(start.elapsed(), Duration::from_secs(5));
}
