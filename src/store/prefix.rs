// src/store/prefix.rs

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::errors::EnvconsulError;

/// A watched key prefix in the store, written as `path[@datacenter]`.
///
/// Identity is the normalized path plus datacenter; leading and trailing
/// slashes are not significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Prefix {
    path: String,
    datacenter: Option<String>,
}

fn prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([\w\s./-]+)?(@([\w.-]+))?$").expect("prefix regex is valid")
    })
}

impl Prefix {
    /// Path of the prefix, without surrounding slashes.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Datacenter to query, if not the agent's own.
    pub fn datacenter(&self) -> Option<&str> {
        self.datacenter.as_deref()
    }

    /// Turn a full key returned by the store into a key relative to this
    /// prefix.
    ///
    /// Returns `None` for folder entries (the prefix itself or keys ending in
    /// `/`), which carry no value of their own.
    pub fn relative_key<'a>(&self, full_key: &'a str) -> Option<&'a str> {
        let rel = full_key
            .strip_prefix(self.path.as_str())
            .unwrap_or(full_key)
            .trim_start_matches('/');
        if rel.is_empty() || rel.ends_with('/') {
            None
        } else {
            Some(rel)
        }
    }
}

impl FromStr for Prefix {
    type Err = EnvconsulError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let caps = prefix_regex().captures(trimmed).ok_or_else(|| {
            EnvconsulError::ConfigError(format!("invalid key prefix format: '{s}'"))
        })?;

        let path = caps
            .get(1)
            .map(|m| m.as_str().trim_matches('/').to_string())
            .unwrap_or_default();
        let datacenter = caps.get(3).map(|m| m.as_str().to_string());

        Ok(Self { path, datacenter })
    }
}

impl TryFrom<String> for Prefix {
    type Error = EnvconsulError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.datacenter {
            Some(dc) => write!(f, "{}@{}", self.path, dc),
            None => f.write_str(&self.path),
        }
    }
}
