// src/errors.rs

//! Crate-wide error type and process exit codes.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvconsulError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Spawn error: {0}")]
    SpawnError(String),

    #[error("Signal error: {0}")]
    SignalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EnvconsulError {
    /// Exit code the CLI should use when this error ends the invocation.
    pub fn exit_code(&self) -> i32 {
        match self {
            EnvconsulError::ConfigError(_) | EnvconsulError::TomlError(_) => {
                exit_code::PARSE_CONFIG_ERROR
            }
            EnvconsulError::StoreError(_) => exit_code::CONSUL_API_ERROR,
            EnvconsulError::SpawnError(_) | EnvconsulError::SignalError(_) => {
                exit_code::RUNNER_ERROR
            }
            EnvconsulError::IoError(_) | EnvconsulError::Other(_) => exit_code::ERROR,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, EnvconsulError>;

/// Exit codes returned by the `envconsul` binary.
///
/// Internal failures start at 10 so they never collide with the common
/// small exit codes of a supervised command, which is passed through as-is.
pub mod exit_code {
    pub const OK: i32 = 0;
    pub const ERROR: i32 = 10;
    pub const INTERRUPT: i32 = 11;
    pub const LOGGING_ERROR: i32 = 12;
    pub const PARSE_FLAGS_ERROR: i32 = 13;
    pub const PARSE_CONFIG_ERROR: i32 = 14;
    pub const RUNNER_ERROR: i32 = 15;
    pub const CONSUL_API_ERROR: i32 = 16;
    pub const WATCHER_ERROR: i32 = 17;
}
