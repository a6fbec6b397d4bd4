// tests/process_supervisor.rs

use std::error::Error;
use std::fs;
use std::time::Duration;

use nix::sys::signal::Signal;
use tempfile::tempdir;
use tokio::sync::mpsc;

use envconsul::engine::RuntimeEvent;
use envconsul::env::EnvironmentMap;
use envconsul::errors::EnvconsulError;
use envconsul::exec::{ExitOutcome, ProcessSupervisor, ProcessSupervisorConfig, Supervisor};
use envconsul_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn supervisor(command: &[&str], pristine: bool) -> (ProcessSupervisor, mpsc::Receiver<RuntimeEvent>) {
    let (tx, rx) = mpsc::channel(16);
    let config = ProcessSupervisorConfig {
        command: command.iter().map(|s| s.to_string()).collect(),
        pristine,
        kill_signal: Signal::SIGTERM,
    };
    (ProcessSupervisor::new(config, tx), rx)
}

async fn next_exit(rx: &mut mpsc::Receiver<RuntimeEvent>) -> (u64, ExitOutcome) {
    match with_timeout(rx.recv()).await {
        Some(RuntimeEvent::ChildExited { generation, outcome }) => (generation, outcome),
        other => panic!("expected a child exit, got {other:?}"),
    }
}

#[tokio::test]
async fn child_sees_merged_environment() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let out = dir.path().join("out.txt");
    let script = format!("printf '%s' \"$GREETING\" > '{}'", out.display());
    let (mut sup, mut rx) = supervisor(&["/bin/sh", "-c", &script], false);

    let env: EnvironmentMap = [("GREETING", "hello")].into_iter().collect();
    sup.spawn(&env, 1)?;

    assert_eq!(next_exit(&mut rx).await, (1, ExitOutcome::Code(0)));
    assert_eq!(fs::read_to_string(&out)?, "hello");
    Ok(())
}

#[tokio::test]
async fn pristine_child_gets_only_the_merged_environment() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let out = dir.path().join("out.txt");
    let script = format!("printf '%s|%s' \"${{HOME:-unset}}\" \"$ONLY\" > '{}'", out.display());
    let (mut sup, mut rx) = supervisor(&["/bin/sh", "-c", &script], true);

    let env: EnvironmentMap = [("ONLY", "me")].into_iter().collect();
    sup.spawn(&env, 1)?;

    assert_eq!(next_exit(&mut rx).await.1, ExitOutcome::Code(0));
    assert_eq!(fs::read_to_string(&out)?, "unset|me");
    Ok(())
}

#[tokio::test]
async fn exit_code_is_reported_with_generation() -> TestResult {
    init_tracing();
    let (mut sup, mut rx) = supervisor(&["/bin/sh", "-c", "exit 3"], false);

    sup.spawn(&EnvironmentMap::new(), 7)?;

    let (generation, outcome) = next_exit(&mut rx).await;
    assert_eq!(generation, 7);
    assert_eq!(outcome.code(), 3);
    assert!(!outcome.success());
    Ok(())
}

#[tokio::test]
async fn graceful_stop_uses_kill_signal() -> TestResult {
    init_tracing();
    let (mut sup, mut rx) = supervisor(&["sleep", "30"], false);

    sup.spawn(&EnvironmentMap::new(), 1)?;
    assert!(sup.current_pid().is_some());

    let outcome = with_timeout(sup.stop(Duration::from_secs(3))).await?;
    assert_eq!(outcome, Some(ExitOutcome::Signaled(Signal::SIGTERM as i32)));
    assert!(sup.current_pid().is_none());

    // A stopped child never reports a natural exit.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn child_ignoring_kill_signal_is_killed_after_grace() -> TestResult {
    init_tracing();
    let (mut sup, _rx) = supervisor(&["/bin/sh", "-c", "trap '' TERM; sleep 30"], false);

    sup.spawn(&EnvironmentMap::new(), 1)?;
    // Let the shell install its trap.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let started = std::time::Instant::now();
    let outcome = with_timeout(sup.stop(Duration::from_millis(500))).await?;

    assert_eq!(outcome, Some(ExitOutcome::Signaled(Signal::SIGKILL as i32)));
    assert!(started.elapsed() >= Duration::from_millis(500));
    Ok(())
}

#[tokio::test]
async fn signal_reaches_child_process_group() -> TestResult {
    init_tracing();
    let script = "trap 'exit 7' USR1; while true; do sleep 0.1; done";
    let (mut sup, mut rx) = supervisor(&["/bin/sh", "-c", script], false);

    sup.spawn(&EnvironmentMap::new(), 1)?;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(sup.signal(Signal::SIGUSR1)?);
    assert_eq!(next_exit(&mut rx).await, (1, ExitOutcome::Code(7)));
    Ok(())
}

#[tokio::test]
async fn signal_and_stop_without_child_are_noops() -> TestResult {
    init_tracing();
    let (mut sup, _rx) = supervisor(&["true"], false);

    assert!(!sup.signal(Signal::SIGHUP)?);
    assert_eq!(sup.stop(Duration::from_millis(100)).await?, None);
    Ok(())
}

#[tokio::test]
async fn missing_program_is_a_spawn_error() -> TestResult {
    init_tracing();
    let (mut sup, _rx) = supervisor(&["/definitely/not/a/program"], false);

    match sup.spawn(&EnvironmentMap::new(), 1) {
        Err(EnvconsulError::SpawnError(_)) => Ok(()),
        other => panic!("expected SpawnError, got {other:?}"),
    }
}
