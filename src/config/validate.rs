// src/config/validate.rs

use std::str::FromStr;
use std::time::Duration;

use clap::ValueEnum;
use nix::sys::signal::Signal;

use crate::cli::LogLevel;
use crate::config::duration::{WaitBounds, parse_duration};
use crate::config::model::{Auth, Config, ConfigFile, RawConfigFile};
use crate::errors::{EnvconsulError, Result};
use crate::store::Prefix;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = EnvconsulError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let prefixes = raw
            .prefixes
            .iter()
            .map(|p| p.parse::<Prefix>())
            .collect::<Result<Vec<_>>>()?;

        let retry = raw
            .retry
            .as_deref()
            .map(|s| field_duration("retry", s))
            .transpose()?;
        if let Some(retry) = retry {
            ensure_positive_retry(retry)?;
        }

        Ok(ConfigFile {
            consul: raw.consul,
            token: raw.token,
            auth: raw.auth.as_deref().map(parse_auth).transpose()?,
            max_stale: raw
                .max_stale
                .as_deref()
                .map(|s| field_duration("max_stale", s))
                .transpose()?,
            wait: raw.wait.as_deref().map(parse_wait).transpose()?,
            retry,
            prefixes,
            sanitize: raw.sanitize,
            upcase: raw.upcase,
            pristine: raw.pristine,
            kill_signal: raw.kill_signal.as_deref().map(parse_signal).transpose()?,
            kill_timeout: raw
                .kill_timeout
                .as_deref()
                .map(|s| field_duration("kill_timeout", s))
                .transpose()?,
            log_level: raw.log_level.as_deref().map(parse_log_level).transpose()?,
            ssl_enabled: raw.ssl.enabled,
            ssl_verify: raw.ssl.verify,
        })
    }
}

/// Checks that only make sense once every source has been merged.
pub fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.command.is_empty() {
        return Err(EnvconsulError::ConfigError(
            "missing command to execute".to_string(),
        ));
    }
    if cfg.prefixes.is_empty() {
        return Err(EnvconsulError::ConfigError(
            "at least one prefix is required".to_string(),
        ));
    }
    ensure_positive_retry(cfg.retry)?;
    Ok(())
}

fn ensure_positive_retry(retry: Duration) -> Result<()> {
    if retry.is_zero() {
        return Err(EnvconsulError::ConfigError(
            "retry interval must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn field_duration(field: &str, s: &str) -> Result<Duration> {
    parse_duration(s).map_err(|e| EnvconsulError::ConfigError(format!("{field}: {e}")))
}

/// Parse a `min[:max]` wait window.
pub fn parse_wait(s: &str) -> Result<WaitBounds> {
    WaitBounds::from_str(s).map_err(|e| EnvconsulError::ConfigError(format!("wait: {e}")))
}

/// Parse `user[:password]`.
pub fn parse_auth(s: &str) -> Result<Auth> {
    let (username, password) = match s.split_once(':') {
        Some((user, pass)) => (user, Some(pass.to_string())),
        None => (s, None),
    };
    if username.is_empty() {
        return Err(EnvconsulError::ConfigError(
            "auth: username must not be empty".to_string(),
        ));
    }
    Ok(Auth {
        username: username.to_string(),
        password,
    })
}

/// Parse a signal name. `SIGTERM`, `TERM` and `term` are all accepted.
pub fn parse_signal(s: &str) -> Result<Signal> {
    let upper = s.trim().to_ascii_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    Signal::from_str(&name)
        .map_err(|_| EnvconsulError::ConfigError(format!("unknown signal '{s}'")))
}

pub fn parse_log_level(s: &str) -> Result<LogLevel> {
    let normalized = match s.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "err" => "error".to_string(),
        other => other.to_string(),
    };
    <LogLevel as ValueEnum>::from_str(&normalized, true)
        .map_err(|_| EnvconsulError::ConfigError(format!("unknown log level '{s}'")))
}
