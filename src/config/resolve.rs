// src/config/resolve.rs

//! Layering of defaults, the config file and command-line flags into one
//! [`Config`], plus the conversions into per-component settings.

use std::time::Duration;

use nix::sys::signal::Signal;
use tracing::warn;

use crate::cli::CliArgs;
use crate::config::model::{Config, ConfigFile};
use crate::config::validate::{parse_auth, parse_signal, validate_config};
use crate::engine::RunnerOptions;
use crate::env::KeyTransform;
use crate::errors::Result;
use crate::exec::ProcessSupervisorConfig;
use crate::store::{ConsulClientConfig, Prefix, WatcherOptions};

pub const DEFAULT_CONSUL_ADDRESS: &str = "127.0.0.1:8500";
pub const DEFAULT_RETRY: Duration = Duration::from_secs(5);
pub const DEFAULT_KILL_SIGNAL: Signal = Signal::SIGTERM;
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(30);

impl Config {
    /// Merge `args` over `file` over the defaults, then validate the result.
    ///
    /// Prefixes from the file come first and the flags' prefixes are appended
    /// after them, so flags win on conflicting keys. With no prefix from
    /// either source, the legacy `envconsul PREFIX COMMAND...` form is
    /// accepted: the first positional argument is taken as the prefix.
    pub fn resolve(args: CliArgs, file: ConfigFile) -> Result<Config> {
        let mut prefixes = file.prefixes;
        prefixes.extend(args.prefixes);

        let mut command = args.command;
        if prefixes.is_empty() && command.len() >= 2 {
            let legacy: Prefix = command.remove(0).parse()?;
            warn!(
                prefix = %legacy,
                "specifying a prefix as the first argument is deprecated; use --prefix instead"
            );
            prefixes.push(legacy);
        }

        let auth = match args.auth.as_deref() {
            Some(s) => Some(parse_auth(s)?),
            None => file.auth,
        };
        let kill_signal = match args.kill_signal.as_deref() {
            Some(s) => parse_signal(s)?,
            None => file.kill_signal.unwrap_or(DEFAULT_KILL_SIGNAL),
        };

        let config = Config {
            consul: args
                .consul
                .or(file.consul)
                .unwrap_or_else(|| DEFAULT_CONSUL_ADDRESS.to_string()),
            token: args.token.or(file.token),
            auth,
            ssl: args.ssl.or(file.ssl_enabled).unwrap_or(false),
            ssl_verify: args.ssl_verify.or(file.ssl_verify).unwrap_or(true),
            max_stale: args.max_stale.or(file.max_stale).unwrap_or_default(),
            wait: args.wait.or(file.wait).unwrap_or_default(),
            retry: args.retry.or(file.retry).unwrap_or(DEFAULT_RETRY),
            prefixes,
            sanitize: args.sanitize.or(file.sanitize).unwrap_or(false),
            upcase: args.upcase.or(file.upcase).unwrap_or(false),
            pristine: args.pristine.or(file.pristine).unwrap_or(false),
            kill_signal,
            kill_timeout: args
                .kill_timeout
                .or(file.kill_timeout)
                .unwrap_or(DEFAULT_KILL_TIMEOUT),
            log_level: args.log_level.or(file.log_level),
            command,
            once: args.once,
        };

        validate_config(&config)?;
        Ok(config)
    }

    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            prefixes: self.prefixes.clone(),
            transform: KeyTransform::new(self.sanitize, self.upcase),
            wait: self.wait,
            watcher: WatcherOptions {
                retry: self.retry,
                allow_stale: !self.max_stale.is_zero(),
                ..WatcherOptions::default()
            },
            kill_timeout: self.kill_timeout,
            once: self.once,
        }
    }

    pub fn consul_client_config(&self) -> ConsulClientConfig {
        ConsulClientConfig {
            address: self.consul.clone(),
            token: self.token.clone(),
            auth: self
                .auth
                .as_ref()
                .map(|a| (a.username.clone(), a.password.clone())),
            ssl: self.ssl,
            ssl_verify: self.ssl_verify,
        }
    }

    pub fn supervisor_config(&self) -> ProcessSupervisorConfig {
        ProcessSupervisorConfig {
            command: self.command.clone(),
            pristine: self.pristine,
            kill_signal: self.kill_signal,
        }
    }
}
