// src/env/mod.rs

//! Turning store snapshots into a process environment.
//!
//! - [`transform`] maps raw key paths to variable names.
//! - [`map`] holds the resulting name → value mapping.
//! - [`merge`] keeps the latest snapshot per prefix and folds them together
//!   in configured order.

pub mod map;
pub mod merge;
pub mod transform;

pub use map::EnvironmentMap;
pub use merge::Merger;
pub use transform::{transform_key, KeyTransform};
