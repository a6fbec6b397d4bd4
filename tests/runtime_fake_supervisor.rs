// tests/runtime_fake_supervisor.rs

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::Signal;
use tokio::time::Instant;

use envconsul::engine::{Runner, RunnerNotice, RunnerOptions};
use envconsul::errors::EnvconsulError;
use envconsul::store::StoreClient;
use envconsul_test_utils::{
    FakeStore, FakeSupervisor, RunnerOptionsBuilder, SupervisorLog, SupervisorOp, init_tracing,
    snapshot, with_timeout,
};

type TestResult = Result<(), Box<dyn Error>>;

fn start(options: RunnerOptions, store: &Arc<FakeStore>, log: &SupervisorLog) -> Runner {
    let client: Arc<dyn StoreClient> = store.clone();
    let log = log.clone();
    Runner::start(options, client, move |tx| FakeSupervisor::new(tx, log))
}

#[tokio::test(start_paused = true)]
async fn spawns_once_every_prefix_has_data() -> TestResult {
    init_tracing();
    let store = Arc::new(FakeStore::new());
    let log = SupervisorLog::new();
    let runner = start(RunnerOptionsBuilder::new(&["a", "b"]).build(), &store, &log);

    store.push("a", snapshot(1, &[("x", "from_a"), ("only_a", "1")]));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(log.ops().is_empty(), "must wait for every prefix");

    store.push("b", snapshot(1, &[("x", "from_b")]));
    with_timeout(log.wait_for_ops(1)).await;

    let envs = log.spawned_envs();
    assert_eq!(envs.len(), 1);
    assert_eq!(envs[0].get("x"), Some("from_b"));
    assert_eq!(envs[0].get("only_a"), Some("1"));

    runner.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn restart_stops_old_child_before_spawning_new_one() -> TestResult {
    init_tracing();
    let store = Arc::new(FakeStore::new());
    let log = SupervisorLog::new();
    let runner = start(RunnerOptionsBuilder::new(&["app"]).build(), &store, &log);

    store.push("app", snapshot(1, &[("k", "v1")]));
    with_timeout(log.wait_for_ops(1)).await;

    store.push("app", snapshot(2, &[("k", "v2")]));
    with_timeout(log.wait_for_ops(3)).await;

    let ops = log.ops();
    assert!(matches!(&ops[0], SupervisorOp::Spawn { generation: 1, .. }));
    assert_eq!(ops[1], SupervisorOp::Stop { generation: 1 });
    match &ops[2] {
        SupervisorOp::Spawn { generation, env } => {
            assert_eq!(*generation, 2);
            assert_eq!(env.get("k"), Some("v2"));
        }
        other => panic!("expected second spawn, got {other:?}"),
    }

    runner.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unchanged_content_does_not_restart() -> TestResult {
    init_tracing();
    let store = Arc::new(FakeStore::new());
    let log = SupervisorLog::new();
    let runner = start(RunnerOptionsBuilder::new(&["app"]).build(), &store, &log);

    store.push("app", snapshot(1, &[("k", "v")]));
    with_timeout(log.wait_for_ops(1)).await;

    store.push("app", snapshot(2, &[("k", "v")]));
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(log.ops().len(), 1);
    runner.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn burst_is_applied_after_quiet_period() -> TestResult {
    init_tracing();
    let store = Arc::new(FakeStore::new());
    let log = SupervisorLog::new();
    let options = RunnerOptionsBuilder::new(&["app"])
        .wait(Duration::from_secs(2), Duration::from_secs(10))
        .build();
    let runner = start(options, &store, &log);

    let started = Instant::now();
    store.push("app", snapshot(1, &[("k", "v1")]));
    tokio::time::sleep(Duration::from_millis(500)).await;
    store.push("app", snapshot(2, &[("k", "v2")]));
    tokio::time::sleep(Duration::from_millis(500)).await;
    store.push("app", snapshot(3, &[("k", "v3")]));

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(log.ops().is_empty(), "still inside the quiet period");

    with_timeout(log.wait_for_ops(1)).await;
    assert!(started.elapsed() >= Duration::from_secs(3));

    let envs = log.spawned_envs();
    assert_eq!(envs.len(), 1);
    assert_eq!(envs[0].get("k"), Some("v3"));

    runner.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn once_mode_reports_exit_then_done() -> TestResult {
    init_tracing();
    let store = Arc::new(FakeStore::new());
    let log = SupervisorLog::new();
    let mut runner = start(RunnerOptionsBuilder::new(&["app"]).once(true).build(), &store, &log);

    store.push("app", snapshot(1, &[("k", "v1")]));
    with_timeout(log.wait_for_ops(1)).await;

    store.push("app", snapshot(2, &[("k", "v2")]));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(log.exit_current(4).await);

    assert!(matches!(
        with_timeout(runner.next_notice()).await,
        Some(RunnerNotice::ChildExit(4))
    ));
    assert!(matches!(with_timeout(runner.next_notice()).await, Some(RunnerNotice::Done)));

    assert_eq!(log.spawned_envs().len(), 1, "once mode must never spawn twice");
    with_timeout(runner.join).await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_with_running_child_stops_it_and_reports_done() -> TestResult {
    init_tracing();
    let store = Arc::new(FakeStore::new());
    let log = SupervisorLog::new();
    let mut runner = start(RunnerOptionsBuilder::new(&["app"]).build(), &store, &log);

    store.push("app", snapshot(1, &[("k", "v")]));
    with_timeout(log.wait_for_ops(1)).await;

    runner.handle().stop();
    runner.handle().stop();

    assert!(matches!(with_timeout(runner.next_notice()).await, Some(RunnerNotice::Done)));
    assert!(with_timeout(runner.next_notice()).await.is_none());
    assert_eq!(log.ops()[1], SupervisorOp::Stop { generation: 1 });

    // No spawns after the stop, even if the store keeps changing.
    store.push("app", snapshot(2, &[("k", "other")]));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(log.spawned_envs().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn spawn_failure_is_reported_as_error() -> TestResult {
    init_tracing();
    let store = Arc::new(FakeStore::new());
    let log = SupervisorLog::new();
    log.fail_spawns(true);
    let mut runner = start(RunnerOptionsBuilder::new(&["app"]).build(), &store, &log);

    store.push("app", snapshot(1, &[("k", "v")]));

    match with_timeout(runner.next_notice()).await {
        Some(RunnerNotice::Error(EnvconsulError::SpawnError(msg))) => {
            assert!(msg.contains("fake spawn failure"));
        }
        other => panic!("expected spawn error, got {other:?}"),
    }
    with_timeout(runner.join).await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn store_errors_are_retried_without_surfacing() -> TestResult {
    init_tracing();
    let store = Arc::new(FakeStore::new());
    let log = SupervisorLog::new();
    let options = RunnerOptionsBuilder::new(&["app"])
        .retry(Duration::from_secs(1))
        .build();
    let mut runner = start(options, &store, &log);

    store.push_error("app", "connection refused");
    store.push_error("app", "connection refused");
    store.push("app", snapshot(5, &[("k", "v")]));

    with_timeout(log.wait_for_ops(1)).await;
    assert_eq!(&store.indices_for("app")[..3], &[0, 0, 0]);
    assert!(runner.notices.try_recv().is_err());

    runner.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn forwarded_signal_reaches_current_child() -> TestResult {
    init_tracing();
    let store = Arc::new(FakeStore::new());
    let log = SupervisorLog::new();
    let runner = start(RunnerOptionsBuilder::new(&["app"]).build(), &store, &log);

    store.push("app", snapshot(1, &[("k", "v")]));
    with_timeout(log.wait_for_ops(1)).await;

    runner.handle().forward_signal(nix::sys::signal::Signal::SIGHUP);
    with_timeout(log.wait_for_ops(2)).await;
    assert_eq!(
        log.ops()[1],
        SupervisorOp::Signal {
            generation: 1,
            signal: nix::sys::signal::Signal::SIGHUP
        }
    );

    runner.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_during_restart_skips_the_new_spawn() -> TestResult {
    init_tracing();
    let store = Arc::new(FakeStore::new());
    let log = SupervisorLog::new();
    log.set_stop_delay(Duration::from_secs(2));
    let mut runner = start(RunnerOptionsBuilder::new(&["app"]).build(), &store, &log);

    store.push("app", snapshot(1, &[("k", "v1")]));
    with_timeout(log.wait_for_ops(1)).await;

    // The old child is now being stopped; stop the runner before it is gone.
    store.push("app", snapshot(2, &[("k", "v2")]));
    with_timeout(log.wait_for_ops(2)).await;
    runner.handle().stop();

    assert!(matches!(with_timeout(runner.next_notice()).await, Some(RunnerNotice::Done)));
    with_timeout(runner.join).await?;

    let ops = log.ops();
    assert_eq!(ops.len(), 2, "no spawn may follow a stop request: {ops:?}");
    assert!(matches!(&ops[0], SupervisorOp::Spawn { generation: 1, .. }));
    assert_eq!(ops[1], SupervisorOp::Stop { generation: 1 });
    assert_eq!(log.current_generation(), None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn signal_forwarded_while_watchers_flood_is_not_lost() -> TestResult {
    init_tracing();
    let store = Arc::new(FakeStore::new());
    let log = SupervisorLog::new();
    log.set_stop_delay(Duration::from_secs(3));
    let runner = start(RunnerOptionsBuilder::new(&["app"]).build(), &store, &log);

    store.push("app", snapshot(1, &[("k", "v1")]));
    with_timeout(log.wait_for_ops(1)).await;

    store.push("app", snapshot(2, &[("k", "v2")]));
    with_timeout(log.wait_for_ops(2)).await;

    // While the restart is stuck stopping the old child, keep the store busy
    // until the runtime's event channel is full.
    for index in 3..103u64 {
        let value = format!("v{index}");
        store.push("app", snapshot(index, &[("k", value.as_str())]));
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    runner.handle().forward_signal(Signal::SIGHUP);
    with_timeout(log.wait_for_ops(4)).await;

    let ops = log.ops();
    assert!(matches!(&ops[2], SupervisorOp::Spawn { generation: 2, .. }));
    assert_eq!(
        ops[3],
        SupervisorOp::Signal {
            generation: 2,
            signal: Signal::SIGHUP
        }
    );

    runner.shutdown().await;
    Ok(())
}
