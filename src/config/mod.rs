// src/config/mod.rs

//! Configuration loading and validation for envconsul.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate individual values (`validate.rs`).
//! - Layer defaults, file and flags into one [`Config`] (`resolve.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod resolve;
pub mod validate;

pub use duration::{WaitBounds, parse_duration};
pub use loader::{load_and_validate, load_from_path};
pub use model::{Auth, Config, ConfigFile, RawConfigFile};
pub use validate::validate_config;
