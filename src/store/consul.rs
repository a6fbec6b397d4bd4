// src/store/consul.rs

//! Consul KV implementation of [`StoreClient`].
//!
//! Uses the blocking-query form of the KV endpoint:
//!
//! `GET /v1/kv/<prefix>/?recurse&index=<I>&wait=<W>[&stale][&dc=<dc>]`
//!
//! The request is made against the prefix *folder* (trailing slash) so that
//! `config/app` does not also match `config/application`.

use std::time::Duration;

use base64::prelude::{BASE64_STANDARD, Engine as _};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, trace};

use super::client::{ReadOptions, StoreClient, StoreFuture};
use super::{KvSnapshot, Prefix};
use crate::errors::{EnvconsulError, Result};

/// Header carrying the index a blocking query result corresponds to.
const INDEX_HEADER: &str = "X-Consul-Index";
const TOKEN_HEADER: &str = "X-Consul-Token";

/// Extra time on top of the blocking wait before the HTTP request itself is
/// abandoned. Consul adds up to `wait / 16` of jitter on the server side.
const REQUEST_SLACK: Duration = Duration::from_secs(10);

/// Connection settings for [`ConsulClient`].
#[derive(Debug, Clone, Default)]
pub struct ConsulClientConfig {
    /// `host:port`, or a full URL including the scheme.
    pub address: String,
    pub token: Option<String>,
    /// Basic-auth credentials as `(username, password)`.
    pub auth: Option<(String, Option<String>)>,
    pub ssl: bool,
    pub ssl_verify: bool,
}

pub struct ConsulClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    auth: Option<(String, Option<String>)>,
}

impl std::fmt::Debug for ConsulClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsulClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KvEntry {
    key: String,
    #[serde(default)]
    value: Option<String>,
}

impl ConsulClient {
    pub fn new(config: ConsulClientConfig) -> Result<Self> {
        let http = Client::builder()
            .danger_accept_invalid_certs(config.ssl && !config.ssl_verify)
            .build()
            .map_err(|e| EnvconsulError::StoreError(format!("building HTTP client: {e}")))?;

        let address = config.address.trim_end_matches('/');
        let base_url = if address.contains("://") {
            address.to_string()
        } else if config.ssl {
            format!("https://{address}")
        } else {
            format!("http://{address}")
        };

        Ok(Self {
            http,
            base_url,
            token: config.token.filter(|t| !t.is_empty()),
            auth: config.auth,
        })
    }

    fn kv_url(&self, prefix: &Prefix) -> String {
        if prefix.path().is_empty() {
            format!("{}/v1/kv/", self.base_url)
        } else {
            format!("{}/v1/kv/{}/", self.base_url, prefix.path())
        }
    }

    async fn read(&self, prefix: &Prefix, options: ReadOptions) -> Result<KvSnapshot> {
        let mut query: Vec<(&str, String)> = vec![
            ("recurse", String::new()),
            ("index", options.since_index.to_string()),
            ("wait", format!("{}ms", options.wait.as_millis())),
        ];
        if options.allow_stale {
            query.push(("stale", String::new()));
        }
        if let Some(dc) = prefix.datacenter() {
            query.push(("dc", dc.to_string()));
        }

        let mut request = self
            .http
            .get(self.kv_url(prefix))
            .query(&query)
            .timeout(options.wait + REQUEST_SLACK);
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }
        if let Some((user, pass)) = &self.auth {
            request = request.basic_auth(user, pass.as_ref());
        }

        trace!(prefix = %prefix, index = options.since_index, "issuing blocking read");

        let response = request
            .send()
            .await
            .map_err(|e| EnvconsulError::StoreError(format!("reading prefix '{prefix}': {e}")))?;

        let status = response.status();
        let index = parse_index(response.headers().get(INDEX_HEADER))?;

        if status == StatusCode::NOT_FOUND {
            debug!(prefix = %prefix, index, "prefix has no keys");
            return Ok(KvSnapshot::new(index));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnvconsulError::StoreError(format!(
                "unexpected response {status} for prefix '{prefix}': {body}"
            )));
        }

        let entries: Vec<KvEntry> = response.json().await.map_err(|e| {
            EnvconsulError::StoreError(format!("decoding response for prefix '{prefix}': {e}"))
        })?;

        snapshot_from_entries(prefix, index, entries)
    }
}

impl StoreClient for ConsulClient {
    fn blocking_read<'a>(&'a self, prefix: &'a Prefix, options: ReadOptions) -> StoreFuture<'a> {
        Box::pin(self.read(prefix, options))
    }
}

fn parse_index(value: Option<&reqwest::header::HeaderValue>) -> Result<u64> {
    let value = value.ok_or_else(|| {
        EnvconsulError::StoreError(format!("response is missing the {INDEX_HEADER} header"))
    })?;
    value
        .to_str()
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .ok_or_else(|| EnvconsulError::StoreError(format!("invalid {INDEX_HEADER} header: {value:?}")))
}

fn snapshot_from_entries(prefix: &Prefix, index: u64, entries: Vec<KvEntry>) -> Result<KvSnapshot> {
    let mut snapshot = KvSnapshot::new(index);
    for entry in entries {
        let Some(key) = prefix.relative_key(&entry.key) else {
            continue;
        };
        let value = match entry.value {
            Some(encoded) => BASE64_STANDARD.decode(encoded.as_bytes()).map_err(|e| {
                EnvconsulError::StoreError(format!("decoding value of key '{}': {e}", entry.key))
            })?,
            None => Vec::new(),
        };
        snapshot.pairs.insert(key.to_string(), value);
    }
    Ok(snapshot)
}
