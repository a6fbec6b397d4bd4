// src/config/model.rs

use std::time::Duration;

use nix::sys::signal::Signal;
use serde::Deserialize;

use crate::cli::LogLevel;
use crate::config::duration::WaitBounds;
use crate::store::Prefix;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// consul       = "127.0.0.1:8500"
/// token        = "abcd"
/// wait         = "2s:10s"
/// prefixes     = ["config/app", "config/app@dc2"]
/// upcase       = true
/// kill_signal  = "SIGTERM"
/// kill_timeout = "30s"
///
/// [ssl]
/// enabled = true
/// verify  = false
/// ```
///
/// Every key is optional. Anything left unset falls back to the command line
/// or to the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    /// Store address, `host:port` or a URL.
    #[serde(default)]
    pub consul: Option<String>,

    #[serde(default)]
    pub token: Option<String>,

    /// `user[:password]` for HTTP basic auth.
    #[serde(default)]
    pub auth: Option<String>,

    /// Any non-zero value enables stale reads.
    #[serde(default)]
    pub max_stale: Option<String>,

    /// `min` or `min:max`.
    #[serde(default)]
    pub wait: Option<String>,

    #[serde(default)]
    pub retry: Option<String>,

    /// Prefixes in merge order, later ones win.
    #[serde(default)]
    pub prefixes: Vec<String>,

    #[serde(default)]
    pub sanitize: Option<bool>,

    #[serde(default)]
    pub upcase: Option<bool>,

    #[serde(default)]
    pub pristine: Option<bool>,

    /// Signal name such as `"SIGTERM"` or `"INT"`.
    #[serde(default)]
    pub kill_signal: Option<String>,

    #[serde(default)]
    pub kill_timeout: Option<String>,

    #[serde(default)]
    pub log_level: Option<String>,

    #[serde(default)]
    pub ssl: RawSslSection,
}

/// `[ssl]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSslSection {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub verify: Option<bool>,
}

/// HTTP basic-auth credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Auth {
    pub username: String,
    pub password: Option<String>,
}

/// Validated config file contents.
///
/// Still partial: unset keys stay `None` so that command-line flags and
/// defaults can be layered on top by [`crate::config::resolve`].
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub consul: Option<String>,
    pub token: Option<String>,
    pub auth: Option<Auth>,
    pub max_stale: Option<Duration>,
    pub wait: Option<WaitBounds>,
    pub retry: Option<Duration>,
    pub prefixes: Vec<Prefix>,
    pub sanitize: Option<bool>,
    pub upcase: Option<bool>,
    pub pristine: Option<bool>,
    pub kill_signal: Option<Signal>,
    pub kill_timeout: Option<Duration>,
    pub log_level: Option<LogLevel>,
    pub ssl_enabled: Option<bool>,
    pub ssl_verify: Option<bool>,
}

/// Final, immutable settings for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub consul: String,
    pub token: Option<String>,
    pub auth: Option<Auth>,
    pub ssl: bool,
    pub ssl_verify: bool,
    pub max_stale: Duration,
    pub wait: WaitBounds,
    pub retry: Duration,
    pub prefixes: Vec<Prefix>,
    pub sanitize: bool,
    pub upcase: bool,
    pub pristine: bool,
    pub kill_signal: Signal,
    pub kill_timeout: Duration,
    pub log_level: Option<LogLevel>,
    /// Program and arguments to supervise.
    pub command: Vec<String>,
    /// Run the command a single time instead of watching forever.
    pub once: bool,
}
