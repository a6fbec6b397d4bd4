// tests/control_loop.rs

use std::error::Error;
use std::sync::Arc;

use nix::sys::signal::Signal;
use tokio::sync::mpsc;

use envconsul::control_loop;
use envconsul::engine::Runner;
use envconsul::errors::exit_code;
use envconsul::store::StoreClient;
use envconsul_test_utils::{
    FakeStore, FakeSupervisor, RunnerOptionsBuilder, SupervisorLog, SupervisorOp, init_tracing,
    snapshot, with_timeout,
};

type TestResult = Result<(), Box<dyn Error>>;

struct Setup {
    store: Arc<FakeStore>,
    log: SupervisorLog,
    signals: mpsc::Sender<Signal>,
    exit: tokio::task::JoinHandle<i32>,
}

/// Start a runner on fakes and drive it through `control_loop` in the
/// background.
fn setup(once: bool) -> Setup {
    let store = Arc::new(FakeStore::new());
    let log = SupervisorLog::new();
    let client: Arc<dyn StoreClient> = store.clone();
    let sup_log = log.clone();
    let runner = Runner::start(
        RunnerOptionsBuilder::new(&["app"]).once(once).build(),
        client,
        move |tx| FakeSupervisor::new(tx, sup_log),
    );
    let (signals, signal_rx) = mpsc::channel(4);
    let exit = tokio::spawn(control_loop(runner, signal_rx));
    Setup {
        store,
        log,
        signals,
        exit,
    }
}

#[tokio::test(start_paused = true)]
async fn clean_child_exit_returns_ok() -> TestResult {
    init_tracing();
    let s = setup(false);
    s.store.push("app", snapshot(1, &[("k", "v")]));
    with_timeout(s.log.wait_for_ops(1)).await;

    assert!(s.log.exit_current(0).await);
    assert_eq!(with_timeout(s.exit).await?, exit_code::OK);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failing_child_exit_code_is_passed_through() -> TestResult {
    init_tracing();
    let s = setup(false);
    s.store.push("app", snapshot(1, &[("k", "v")]));
    with_timeout(s.log.wait_for_ops(1)).await;

    assert!(s.log.exit_current(42).await);
    assert_eq!(with_timeout(s.exit).await?, 42);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn interrupt_forwards_stops_and_exits() -> TestResult {
    init_tracing();
    let s = setup(false);
    s.store.push("app", snapshot(1, &[("k", "v")]));
    with_timeout(s.log.wait_for_ops(1)).await;

    s.signals.send(Signal::SIGINT).await?;
    assert_eq!(with_timeout(s.exit).await?, exit_code::INTERRUPT);

    let ops = s.log.ops();
    assert_eq!(
        ops[1..],
        [
            SupervisorOp::Signal {
                generation: 1,
                signal: Signal::SIGINT
            },
            SupervisorOp::Stop { generation: 1 },
        ]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn non_interrupt_signal_is_only_forwarded() -> TestResult {
    init_tracing();
    let s = setup(false);
    s.store.push("app", snapshot(1, &[("k", "v")]));
    with_timeout(s.log.wait_for_ops(1)).await;

    s.signals.send(Signal::SIGUSR1).await?;
    with_timeout(s.log.wait_for_ops(2)).await;
    assert!(!s.exit.is_finished());

    assert!(s.log.exit_current(0).await);
    assert_eq!(with_timeout(s.exit).await?, exit_code::OK);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn spawn_failure_returns_runner_error() -> TestResult {
    init_tracing();
    let s = setup(true);
    s.log.fail_spawns(true);
    s.store.push("app", snapshot(1, &[("k", "v")]));

    assert_eq!(with_timeout(s.exit).await?, exit_code::RUNNER_ERROR);
    Ok(())
}
