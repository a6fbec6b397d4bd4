// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::duration::{WaitBounds, parse_duration};
use crate::store::Prefix;

/// Command-line arguments for `envconsul`.
///
/// Boolean switches take an optional value (`--upcase`, `--upcase=false`) so a
/// flag can turn off something the config file turned on.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "envconsul",
    version,
    about = "Run a command with environment variables populated from Consul KV, restarting it when they change.",
    long_about = None
)]
pub struct CliArgs {
    /// Address of the Consul agent (`host:port` or URL).
    #[arg(long, value_name = "ADDRESS")]
    pub consul: Option<String>,

    /// ACL token sent with every request.
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// HTTP basic auth credentials.
    #[arg(long, value_name = "USER[:PASS]")]
    pub auth: Option<String>,

    /// Use HTTPS when talking to Consul.
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub ssl: Option<bool>,

    /// Verify the server certificate when using HTTPS.
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub ssl_verify: Option<bool>,

    /// Allow stale reads from any server; any non-zero value enables them.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub max_stale: Option<Duration>,

    /// Quiescence window as `min` or `min:max` (e.g. `2s:10s`).
    #[arg(long, value_name = "MIN[:MAX]", value_parser = parse_wait_arg)]
    pub wait: Option<WaitBounds>,

    /// Delay before retrying a failed read.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub retry: Option<Duration>,

    /// Prefix to watch, as `path[@datacenter]`. Repeatable; merged left to
    /// right with the right-most value winning.
    #[arg(long = "prefix", value_name = "PREFIX", value_parser = parse_prefix_arg)]
    pub prefixes: Vec<Prefix>,

    /// Replace characters that are invalid in variable names with `_`.
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub sanitize: Option<bool>,

    /// Upper-case every variable name.
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub upcase: Option<bool>,

    /// Do not pass the parent environment to the command.
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub pristine: Option<bool>,

    /// Signal sent to stop the command before it is killed.
    #[arg(long, value_name = "SIGNAL")]
    pub kill_signal: Option<String>,

    /// Grace period between the kill signal and SIGKILL.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub kill_timeout: Option<Duration>,

    /// Path to a TOML config file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, the config file, then `ENVCONSUL_LOG`, then `warn` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Run the command once and exit instead of restarting it on change.
    #[arg(long)]
    pub once: bool,

    /// Command to run, followed by its arguments.
    #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    #[value(alias = "err")]
    Error,
    #[value(alias = "warning")]
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_wait_arg(s: &str) -> Result<WaitBounds, String> {
    s.parse()
}

fn parse_prefix_arg(s: &str) -> Result<Prefix, String> {
    s.parse::<Prefix>().map_err(|e| e.to_string())
}

/// Parse the process arguments, leaving help/version/usage handling to the
/// caller.
pub fn try_parse() -> Result<CliArgs, clap::Error> {
    CliArgs::try_parse()
}
