// src/env/map.rs

use std::collections::BTreeMap;

use blake3::Hasher;

/// Final name → value mapping handed to the supervised process.
///
/// Ordered by name so that iteration, display and hashing are stable.
/// Two maps are equal exactly when they would produce the same child
/// environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentMap {
    vars: BTreeMap<String, String>,
}

impl EnvironmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a variable, replacing any earlier value with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Stable digest of the whole mapping, used for logging and as a quick
    /// inequality check before comparing maps entry by entry.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Hasher::new();
        for (name, value) in &self.vars {
            // Length-prefix both parts so ("a", "bc") and ("ab", "c") differ.
            hasher.update(&(name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            hasher.update(&(value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl<K, V> FromIterator<(K, V)> for EnvironmentMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = EnvironmentMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
