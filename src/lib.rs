// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod env;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod signals;
pub mod store;

use std::sync::Arc;

use nix::sys::signal::Signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::cli::CliArgs;
use crate::config::{Config, ConfigFile, load_and_validate};
use crate::engine::{Runner, RunnerNotice};
use crate::errors::{Result, exit_code};
use crate::exec::ProcessSupervisor;
use crate::store::ConsulClient;

/// Read the config file named by `--config`, if any.
pub fn load_config_file(args: &CliArgs) -> Result<ConfigFile> {
    match &args.config {
        Some(path) => load_and_validate(path),
        None => Ok(ConfigFile::default()),
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - the Consul client
/// - the runner (watchers, merger, quiescence timer, supervisor)
/// - OS signal listeners
///
/// and returns the exit code for the process.
pub async fn run(config: Config) -> i32 {
    let client = match ConsulClient::new(config.consul_client_config()) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "creating Consul client");
            return e.exit_code();
        }
    };

    let signals = match signals::listen() {
        Ok(rx) => rx,
        Err(e) => {
            error!(error = %e, "installing signal handlers");
            return exit_code::ERROR;
        }
    };

    info!(
        prefixes = config.prefixes.len(),
        command = ?config.command,
        once = config.once,
        "starting envconsul"
    );

    let supervisor_config = config.supervisor_config();
    let runner = Runner::start(config.runner_options(), Arc::new(client), move |events| {
        ProcessSupervisor::new(supervisor_config, events)
    });

    control_loop(runner, signals).await
}

/// React to whichever comes first: a runner notice or an OS signal.
///
/// - Runner error: exit with `RUNNER_ERROR`.
/// - Runner done: exit with `OK`.
/// - Child exit: stop the runner and exit with the child's code.
/// - Signal: forward it to the child; interrupts also stop the runner and
///   exit with `INTERRUPT`.
pub async fn control_loop(mut runner: Runner, mut os_signals: mpsc::Receiver<Signal>) -> i32 {
    loop {
        tokio::select! {
            notice = runner.next_notice() => match notice {
                Some(RunnerNotice::Error(e)) => {
                    error!(error = %e, "runner failed");
                    runner.shutdown().await;
                    return exit_code::RUNNER_ERROR;
                }
                Some(RunnerNotice::Done) | None => {
                    runner.shutdown().await;
                    return exit_code::OK;
                }
                Some(RunnerNotice::ChildExit(code)) => {
                    runner.shutdown().await;
                    if code == exit_code::OK {
                        return exit_code::OK;
                    }
                    warn!(code, "unexpected exit from subprocess");
                    return code;
                }
            },
            Some(signal) = os_signals.recv() => {
                runner.handle().forward_signal(signal);
                if signals::is_interrupt(signal) {
                    eprintln!("Received interrupt, cleaning up...");
                    runner.shutdown().await;
                    return exit_code::INTERRUPT;
                }
            }
        }
    }
}
