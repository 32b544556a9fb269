//! # 📡 THE ELASTICSEARCH BACKEND
//!
//! *Previously, on Skyload...*
//!
//! 🎬 COLD OPEN — INT. SERVER ROOM — 3:47 AM
//!
//! The dashboard glows amber. Eleven million flights are queued on local disk and the
//! cluster has just answered a HEAD request with a shrug. Our hero's coffee has gone cold.
//! "Elasticsearch scales horizontally," someone lied, once, at a conference.
//!
//! 🚀 This module speaks exactly six sentences of the Elasticsearch REST dialect:
//! `HEAD /<index>`, `PUT /<index>`, `DELETE /<index>`, `POST /_bulk`,
//! `GET /_cluster/health`, and `GET /_cat/indices/<pattern>`. It does not retry.
//! Retries are somebody else's problem, and today that somebody is nobody.
//!
//! 🔒 Auth is tri-modal: API key (preferred, the velvet rope), basic auth, or anonymous.
//! Custom headers ride on every request. TLS verification can be switched off for the
//! self-signed dev cluster everybody swears is temporary.
//!
//! 🦆 (mandatory duck, no context provided, none shall be requested)

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::backends::{BulkResponse, ClusterHealth, CreateOutcome, DocumentStore, IndexPresence};

// 📡 ElasticsearchConfig: "It's just Elasticsearch", she said, before the cluster went red.
#[derive(Debug, Deserialize, Clone)]
pub struct ElasticsearchConfig {
    /// 📡 Scheme, host, port. All of it. `localhost` alone is not a URL, it's a mood.
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    /// 🔒 If this is in plaintext in your config file, the Department of Security Choices has been notified.
    #[serde(default)]
    pub password: Option<String>,
    /// 🔒 API key auth. Beats basic auth when both are set. This is not a democracy.
    #[serde(default)]
    pub api_key: Option<String>,
    /// 📨 Extra headers sent on every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_ssl_verify")]
    pub ssl_verify: bool,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// ⏱️ Whole-request timeout. Bulk requests are meaty; be generous.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_ssl_verify() -> bool {
    true
}

// -- ⏱️ if ES can't shake hands in 10 seconds, it's not having a good time and neither are we
fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl ElasticsearchConfig {
    /// 🎯 A config pointing at `url` with every other knob at its default.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            api_key: None,
            headers: HashMap::new(),
            ssl_verify: default_ssl_verify(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// 🧹 `""` and `"   "` are not credentials. They are typos with ambition.
fn credential(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Deserialize)]
struct CatIndex {
    index: String,
}

/// 📦 The Elasticsearch store. One reqwest client, reused for every call, because a new
/// client per request is the networking equivalent of buying a car per grocery run.
#[derive(Debug)]
pub struct ElasticsearchStore {
    client: reqwest::Client,
    base_url: String,
    config: ElasticsearchConfig,
}

impl ElasticsearchStore {
    /// 🚀 Build the HTTP client. No network traffic happens here; the first call finds out
    /// whether anyone is home.
    pub fn new(config: ElasticsearchConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let the_name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("💀 Custom header name '{}' is not a valid HTTP header name", name))?;
            let the_value = HeaderValue::from_str(value)
                .with_context(|| format!("💀 Custom header '{}' has a value HTTP refuses to carry", name))?;
            default_headers.insert(the_name, the_value);
        }

        if !config.ssl_verify {
            warn!("⚠️ TLS certificate verification is OFF for '{}'. Fine for the dev cluster. Only the dev cluster.", config.url);
        }

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .danger_accept_invalid_certs(!config.ssl_verify)
            .build()
            .context("💀 The HTTP client refused to be born. Probably the TLS stack. Either way: tragic.")?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            config,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// 🔒 API key beats basic auth in this club. Anonymous if neither is set.
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(api_key) = credential(&self.config.api_key) {
            request.header("Authorization", format!("ApiKey {}", api_key))
        } else if let Some(username) = credential(&self.config.username) {
            request.basic_auth(username, credential(&self.config.password))
        } else {
            request
        }
    }

    /// 📡 Send, and name the endpoint if the network swallows the request.
    async fn send(&self, request: RequestBuilder, what: &str, url: &str) -> Result<Response> {
        trace!("📡 {} {}", what, url);
        self.authorized(request).send().await.with_context(|| {
            format!(
                "💀 {} {} never came back. The cluster at '{}' is unreachable, or the network is on a power trip.",
                what, url, self.base_url
            )
        })
    }
}

/// 💀 Turn a non-success response into an error that carries the body, because ES error bodies are poetry.
async fn unexpected(response: Response, what: &str, url: &str) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    anyhow::anyhow!("💀 {} {} answered {}: {}", what, url, status, body)
}

#[async_trait]
impl DocumentStore for ElasticsearchStore {
    async fn index_exists(&self, index: &str) -> Result<IndexPresence> {
        let url = self.endpoint(index);
        let response = self.send(self.client.head(&url), "HEAD", &url).await?;
        match response.status() {
            status if status.is_success() => Ok(IndexPresence::Exists),
            StatusCode::NOT_FOUND => Ok(IndexPresence::Missing),
            _ => Err(unexpected(response, "HEAD", &url).await),
        }
    }

    async fn create_index(&self, index: &str, mapping: &Value) -> Result<CreateOutcome> {
        let url = self.endpoint(index);
        let request = self
            .client
            .put(&url)
            .header("Content-Type", "application/json")
            .body(mapping.to_string());
        let response = self.send(request, "PUT", &url).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(CreateOutcome::Created);
        }

        let body = response.text().await.unwrap_or_default();
        // 🔁 409 on some versions, 400 + resource_already_exists_exception on others. Same story.
        if status == StatusCode::CONFLICT || body.contains("resource_already_exists_exception") {
            return Ok(CreateOutcome::AlreadyExists);
        }
        bail!("💀 PUT {} answered {}: {}", url, status, body)
    }

    async fn delete_index(&self, index: &str) -> Result<bool> {
        let url = self.endpoint(index);
        let response = self.send(self.client.delete(&url), "DELETE", &url).await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(unexpected(response, "DELETE", &url).await),
        }
    }

    async fn bulk(&self, payload: String, refresh: bool) -> Result<BulkResponse> {
        let url = if refresh {
            self.endpoint("_bulk?refresh=true")
        } else {
            self.endpoint("_bulk")
        };
        // ⚠️ application/x-ndjson, not application/json. ES has opinions about this.
        let request = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-ndjson")
            .body(payload);
        let response = self.send(request, "POST", &url).await?;
        if !response.status().is_success() {
            return Err(unexpected(response, "POST", &url).await);
        }
        let body = response
            .text()
            .await
            .with_context(|| format!("💀 POST {} response body went missing mid-flight", url))?;
        let parsed: BulkResponse = serde_json::from_str(&body)
            .with_context(|| format!("💀 POST {} returned something that is not a bulk response", url))?;
        debug!("📡 Bulk call returned {} item results (errors: {})", parsed.items.len(), parsed.errors);
        Ok(parsed)
    }

    async fn cluster_health(&self) -> Result<ClusterHealth> {
        let url = self.endpoint("_cluster/health");
        let response = self.send(self.client.get(&url), "GET", &url).await?;
        if !response.status().is_success() {
            return Err(unexpected(response, "GET", &url).await);
        }
        let body = response.text().await.context("💀 Cluster health body went missing")?;
        serde_json::from_str(&body).context("💀 Cluster health came back in a shape we don't recognise")
    }

    async fn list_indices(&self, pattern: &str) -> Result<Vec<String>> {
        let url = self.endpoint(&format!("_cat/indices/{}?format=json&h=index", pattern));
        let response = self.send(self.client.get(&url), "GET", &url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(unexpected(response, "GET", &url).await);
        }
        let body = response.text().await.context("💀 Index listing body went missing")?;
        let listed: Vec<CatIndex> =
            serde_json::from_str(&body).context("💀 Index listing is not the JSON array we asked for")?;
        let mut the_names: Vec<String> = listed.into_iter().map(|entry| entry.index).collect();
        the_names.sort();
        Ok(the_names)
    }
}
