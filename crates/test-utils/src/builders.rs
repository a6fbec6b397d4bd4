#![allow(dead_code)]

use std::time::Duration;

use envconsul::config::{ConfigFile, RawConfigFile, WaitBounds};
use envconsul::engine::RunnerOptions;
use envconsul::env::KeyTransform;
use envconsul::store::{KvSnapshot, Prefix, WatcherOptions};

/// Build a snapshot at `index` holding `pairs`.
pub fn snapshot(index: u64, pairs: &[(&str, &str)]) -> KvSnapshot {
    pairs
        .iter()
        .fold(KvSnapshot::new(index), |snap, (k, v)| snap.with_pair(*k, v.as_bytes()))
}

/// Builder for `RunnerOptions` with test-friendly defaults: no quiescence
/// window, a short retry and a short kill timeout.
pub struct RunnerOptionsBuilder {
    options: RunnerOptions,
}

impl RunnerOptionsBuilder {
    pub fn new(prefixes: &[&str]) -> Self {
        let prefixes = prefixes
            .iter()
            .map(|p| p.parse::<Prefix>().expect("valid test prefix"))
            .collect();
        Self {
            options: RunnerOptions {
                prefixes,
                transform: KeyTransform::default(),
                wait: WaitBounds::default(),
                watcher: WatcherOptions {
                    retry: Duration::from_millis(100),
                    ..WatcherOptions::default()
                },
                kill_timeout: Duration::from_millis(500),
                once: false,
            },
        }
    }

    pub fn wait(mut self, min: Duration, max: Duration) -> Self {
        self.options.wait = WaitBounds::new(min, max).expect("valid test wait bounds");
        self
    }

    pub fn once(mut self, val: bool) -> Self {
        self.options.once = val;
        self
    }

    pub fn sanitize(mut self, val: bool) -> Self {
        self.options.transform.sanitize = val;
        self
    }

    pub fn upcase(mut self, val: bool) -> Self {
        self.options.transform.upcase = val;
        self
    }

    pub fn retry(mut self, retry: Duration) -> Self {
        self.options.watcher.retry = retry;
        self
    }

    pub fn kill_timeout(mut self, timeout: Duration) -> Self {
        self.options.kill_timeout = timeout;
        self
    }

    pub fn build(self) -> RunnerOptions {
        self.options
    }
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.config.prefixes.push(prefix.to_string());
        self
    }

    pub fn with_consul(mut self, address: &str) -> Self {
        self.config.consul = Some(address.to_string());
        self
    }

    pub fn with_wait(mut self, wait: &str) -> Self {
        self.config.wait = Some(wait.to_string());
        self
    }

    pub fn with_upcase(mut self, val: bool) -> Self {
        self.config.upcase = Some(val);
        self
    }

    pub fn with_kill_signal(mut self, signal: &str) -> Self {
        self.config.kill_signal = Some(signal.to_string());
        self
    }

    pub fn with_ssl(mut self, enabled: bool, verify: bool) -> Self {
        self.config.ssl.enabled = Some(enabled);
        self.config.ssl.verify = Some(verify);
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
