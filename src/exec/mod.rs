// src/exec/mod.rs

//! Process supervision layer.
//!
//! This module owns the supervised child process and reports its exit back to
//! the orchestration runtime via `RuntimeEvent`s.
//!
//! - [`supervisor`] provides the `Supervisor` trait the runtime talks to, and
//!   the `ExitOutcome` type.
//! - [`process`] is the production `ProcessSupervisor`, built on
//!   `tokio::process::Command`.
//! - [`child`] runs one child instance: waits for exit, relays signals, and
//!   performs the graceful-then-forced stop.

pub mod child;
pub mod process;
pub mod supervisor;

pub use process::{ProcessSupervisor, ProcessSupervisorConfig};
pub use supervisor::{ExitOutcome, Supervisor, SupervisorFuture};
