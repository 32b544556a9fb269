//! # Previously, on Skyload...
//!
//! 🎬 The cluster was down. The deadline was not. Someone needed a document store so
//! simple it lives entirely in RAM, gone the moment you blink.
//!
//! That someone was this module.
//!
//! [`InMemoryStore`] implements [`DocumentStore`] against a `BTreeMap` and writes down
//! every call it receives behind an `Arc<Mutex<...>>`, so tests can hand a clone to the
//! pipeline and interrogate the other clone afterwards. It also powers the `InMemory`
//! store config: a dry run that parses, transforms, routes, and batches everything,
//! then sends it nowhere.
//!
//! 🦆
//!
//! ⚠️ This is NOT for production. If you're deploying this to prod, please also deploy a therapist.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::backends::{
    BulkItemResult, BulkResponse, ClusterHealth, CreateOutcome, DocumentStore, IndexPresence,
};

/// 📝 One call, as the store saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Exists(String),
    Create(String),
    Delete(String),
    Bulk { payload: String, refresh: bool },
    Health,
    List(String),
}

#[derive(Debug, Default)]
struct InMemoryState {
    /// 🗄️ index name → documents, in arrival order
    indices: BTreeMap<String, Vec<Value>>,
    calls: Vec<StoreCall>,
    /// 💀 when set, every bulk item comes back rejected with this error body
    rejected_items: Option<Value>,
    /// 💀 how many upcoming create calls should fail at the transport level
    failing_creates: usize,
    /// 🏎️ how many upcoming create calls lose a race to some other writer
    conflicting_creates: usize,
}

/// 📦 A store that never forgets. Clone it freely; every clone shares the same vault.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🏗️ Start with these indices already present (and empty).
    pub async fn with_indices<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        {
            let mut state = store.state.lock().await;
            for name in names {
                state.indices.insert(name.into(), Vec::new());
            }
        }
        store
    }

    /// 💀 From now on, reject every bulk item with `error`.
    pub async fn reject_bulk_items(&self, error: Value) {
        self.state.lock().await.rejected_items = Some(error);
    }

    /// 💀 Make the next `count` create calls fail as if the network dropped them.
    pub async fn fail_next_creates(&self, count: usize) {
        self.state.lock().await.failing_creates = count;
    }

    /// 🏎️ Make the next `count` create calls find the index already there, as if another
    /// writer created it between our delete and our create.
    pub async fn conflict_next_creates(&self, count: usize) {
        self.state.lock().await.conflicting_creates = count;
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().await.calls.clone()
    }

    /// 🏗️ Names passed to `create_index`, in call order.
    pub async fn creates(&self) -> Vec<String> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Create(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// 📡 Raw NDJSON payloads passed to `bulk`, in call order.
    pub async fn bulk_payloads(&self) -> Vec<String> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Bulk { payload, .. } => Some(payload),
                _ => None,
            })
            .collect()
    }

    /// 📄 Documents stored in `index`, in arrival order.
    pub async fn documents(&self, index: &str) -> Vec<Value> {
        self.state
            .lock()
            .await
            .indices
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn index_names(&self) -> Vec<String> {
        self.state.lock().await.indices.keys().cloned().collect()
    }
}

/// 🔍 `flights-*` style matching: a trailing `*` is a prefix match, anything else is exact.
fn matches_pattern(name: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => name == pattern,
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn index_exists(&self, index: &str) -> Result<IndexPresence> {
        // -- 🔄 give concurrent callers a chance to interleave, like a real network round-trip
        tokio::task::yield_now().await;
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Exists(index.to_string()));
        Ok(if state.indices.contains_key(index) {
            IndexPresence::Exists
        } else {
            IndexPresence::Missing
        })
    }

    async fn create_index(&self, index: &str, _mapping: &Value) -> Result<CreateOutcome> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Create(index.to_string()));
        if state.failing_creates > 0 {
            state.failing_creates -= 1;
            bail!("💀 PUT in-memory://{} never came back (simulated transport failure)", index);
        }
        if state.conflicting_creates > 0 {
            state.conflicting_creates -= 1;
            state.indices.entry(index.to_string()).or_default();
            return Ok(CreateOutcome::AlreadyExists);
        }
        if state.indices.contains_key(index) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        state.indices.insert(index.to_string(), Vec::new());
        Ok(CreateOutcome::Created)
    }

    async fn delete_index(&self, index: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Delete(index.to_string()));
        Ok(state.indices.remove(index).is_some())
    }

    async fn bulk(&self, payload: String, refresh: bool) -> Result<BulkResponse> {
        let mut guard = self.state.lock().await;
        // -- 🔓 reborrow through the guard once so the field borrows below stay disjoint
        let state = &mut *guard;
        state.calls.push(StoreCall::Bulk {
            payload: payload.clone(),
            refresh,
        });

        let mut lines = payload.lines().filter(|line| !line.trim().is_empty());
        let mut items = Vec::new();
        while let Some(action_line) = lines.next() {
            let action: Value = serde_json::from_str(action_line)?;
            let Some(document_line) = lines.next() else {
                bail!("💀 Bulk payload ended after an action line with no document");
            };
            let document: Value = serde_json::from_str(document_line)?;
            let index = action["index"]["_index"].as_str().unwrap_or_default().to_string();

            let result = match &state.rejected_items {
                Some(error) => BulkItemResult {
                    index: Some(index),
                    status: 400,
                    error: Some(error.clone()),
                },
                None => {
                    state.indices.entry(index.clone()).or_default().push(document);
                    BulkItemResult {
                        index: Some(index),
                        status: 201,
                        error: None,
                    }
                }
            };
            items.push(HashMap::from([("index".to_string(), result)]));
        }

        Ok(BulkResponse {
            errors: state.rejected_items.is_some() && !items.is_empty(),
            items,
        })
    }

    async fn cluster_health(&self) -> Result<ClusterHealth> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Health);
        Ok(ClusterHealth {
            cluster_name: Some("in-memory".to_string()),
            status: "green".to_string(),
            active_shards: state.indices.len() as u64,
            number_of_nodes: 1,
        })
    }

    async fn list_indices(&self, pattern: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::List(pattern.to_string()));
        Ok(state
            .indices
            .keys()
            .filter(|name| matches_pattern(name, pattern))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_one_where_the_vault_remembers_everything() -> Result<()> {
        let store = InMemoryStore::with_indices(["flights-2019"]).await;
        let spy = store.clone();

        assert_eq!(store.index_exists("flights-2019").await?, IndexPresence::Exists);
        assert_eq!(store.create_index("flights-2024", &json!({})).await?, CreateOutcome::Created);
        assert_eq!(
            store.create_index("flights-2024", &json!({})).await?,
            CreateOutcome::AlreadyExists
        );
        let the_response = store
            .bulk(
                "{\"index\":{\"_index\":\"flights-2024\"}}\n{\"Origin\":\"SFO\"}\n".to_string(),
                false,
            )
            .await?;
        assert!(!the_response.errors);

        assert_eq!(spy.creates().await, vec!["flights-2024", "flights-2024"]);
        assert_eq!(spy.documents("flights-2024").await, vec![json!({"Origin": "SFO"})]);
        assert_eq!(spy.list_indices("flights-*").await?, vec!["flights-2019", "flights-2024"]);
        assert!(spy.delete_index("flights-2019").await?);
        assert!(!spy.delete_index("flights-2019").await?);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_rejected_items_come_back_as_errors() -> Result<()> {
        let store = InMemoryStore::new();
        store
            .reject_bulk_items(json!({"type": "mapper_parsing_exception"}))
            .await;
        let the_response = store
            .bulk("{\"index\":{\"_index\":\"x\"}}\n{}\n".to_string(), false)
            .await?;
        assert!(the_response.errors);
        assert_eq!(the_response.item_errors().count(), 1);
        assert!(store.documents("x").await.is_empty());
        Ok(())
    }
}
