//! 🔌 Backends: where the real I/O happens.
//!
//! 🎭 This module is the casting agency for document stores. The pipeline asks for a few
//! very specific things (does this index exist, make it, drop it, take this bulk payload,
//! how's the cluster feeling) and never learns who answered.
//!
//! - [`elasticsearch`]: the real thing, over reqwest.
//! - [`in_mem`]: a store that lives in RAM and remembers every call. Tests and `--dry-run`
//!   style configs use it. Do not deploy it to prod. Deploy a therapist instead.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

pub(crate) mod elasticsearch;
pub(crate) mod in_mem;

pub use elasticsearch::{ElasticsearchConfig, ElasticsearchStore};
pub use in_mem::{InMemoryStore, StoreCall};

// ===== Wire shapes =====

/// 🔍 Does the index exist? Transport failures are the `Err` side, not a third variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPresence {
    Exists,
    Missing,
}

/// 🏗️ Result of a create call. A conflict is an outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// 📡 The `_bulk` response, trimmed to the parts the flusher reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub errors: bool,
    /// Each item is `{ "<action>": { "status": .., "error": .. } }`.
    #[serde(default)]
    pub items: Vec<HashMap<String, BulkItemResult>>,
}

impl BulkResponse {
    /// 💀 Every item that carries an error, with the action it belonged to.
    pub fn item_errors(&self) -> impl Iterator<Item = (&str, &BulkItemResult)> {
        self.items
            .iter()
            .flat_map(|item| item.iter())
            .filter(|(_, result)| result.error.is_some())
            .map(|(action, result)| (action.as_str(), result))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkItemResult {
    #[serde(default, rename = "_index")]
    pub index: Option<String>,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub error: Option<Value>,
}

/// 🩺 The bits of `_cluster/health` worth printing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClusterHealth {
    #[serde(default)]
    pub cluster_name: Option<String>,
    pub status: String,
    #[serde(default)]
    pub active_shards: u64,
    #[serde(default)]
    pub number_of_nodes: u64,
}

// ===== DocumentStore Trait and Backend Enum =====

/// 🗄️ Everything the loader needs from a document store, and nothing more.
///
/// # Contract
/// - `index_exists` distinguishes "missing" from "couldn't ask" (the latter is `Err`).
/// - `create_index` maps an "already exists" conflict to [`CreateOutcome::AlreadyExists`].
/// - `delete_index` returns `false` for an index that was not there.
/// - `bulk` only errors on transport / non-2xx; per-item failures come back in the response.
#[async_trait]
pub trait DocumentStore: std::fmt::Debug + Send + Sync {
    async fn index_exists(&self, index: &str) -> Result<IndexPresence>;
    async fn create_index(&self, index: &str, mapping: &Value) -> Result<CreateOutcome>;
    async fn delete_index(&self, index: &str) -> Result<bool>;
    async fn bulk(&self, payload: String, refresh: bool) -> Result<BulkResponse>;
    async fn cluster_health(&self) -> Result<ClusterHealth>;
    /// 📋 Index names matching a `_cat/indices` style pattern (`flights-*`).
    async fn list_indices(&self, pattern: &str) -> Result<Vec<String>>;
}

/// 🎭 The many faces of a store. Callers hold one of these and never care which.
#[derive(Debug)]
pub enum StoreBackend {
    Elasticsearch(ElasticsearchStore),
    InMemory(InMemoryStore),
}

#[async_trait]
impl DocumentStore for StoreBackend {
    async fn index_exists(&self, index: &str) -> Result<IndexPresence> {
        match self {
            StoreBackend::Elasticsearch(es) => es.index_exists(index).await,
            StoreBackend::InMemory(mem) => mem.index_exists(index).await,
        }
    }

    async fn create_index(&self, index: &str, mapping: &Value) -> Result<CreateOutcome> {
        match self {
            StoreBackend::Elasticsearch(es) => es.create_index(index, mapping).await,
            StoreBackend::InMemory(mem) => mem.create_index(index, mapping).await,
        }
    }

    async fn delete_index(&self, index: &str) -> Result<bool> {
        match self {
            StoreBackend::Elasticsearch(es) => es.delete_index(index).await,
            StoreBackend::InMemory(mem) => mem.delete_index(index).await,
        }
    }

    async fn bulk(&self, payload: String, refresh: bool) -> Result<BulkResponse> {
        match self {
            StoreBackend::Elasticsearch(es) => es.bulk(payload, refresh).await,
            StoreBackend::InMemory(mem) => mem.bulk(payload, refresh).await,
        }
    }

    async fn cluster_health(&self) -> Result<ClusterHealth> {
        match self {
            StoreBackend::Elasticsearch(es) => es.cluster_health().await,
            StoreBackend::InMemory(mem) => mem.cluster_health().await,
        }
    }

    async fn list_indices(&self, pattern: &str) -> Result<Vec<String>> {
        match self {
            StoreBackend::Elasticsearch(es) => es.list_indices(pattern).await,
            StoreBackend::InMemory(mem) => mem.list_indices(pattern).await,
        }
    }
}
