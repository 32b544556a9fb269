//! 🏗️ Provisioning: make sure an index exists, freshly, exactly once per run.
//!
//! The policy is destructive on purpose: an index that already exists is deleted and
//! recreated before the first document lands in it. A loader run never merges into
//! yesterday's data.
//!
//! 🔒 The "already ensured" set lives in [`ImportRun`], not in some process-wide static.
//! A name is marked *before* the remote calls start, so a second caller for the same
//! name walks straight past. If the remote calls fail, the mark is taken back and the
//! next caller gets to try again.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};

use crate::backends::{CreateOutcome, DocumentStore, IndexPresence, StoreBackend};
use crate::document::BUILTIN_MAPPING;
use crate::progress::ProgressTracker;

/// 🎫 Everything shared across the files of one import run.
#[derive(Debug)]
pub struct ImportRun {
    ensured: Mutex<HashSet<String>>,
    progress: ProgressTracker,
}

impl ImportRun {
    pub fn new(progress: ProgressTracker) -> Self {
        Self {
            ensured: Mutex::new(HashSet::new()),
            progress,
        }
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// 📋 Indices provisioned so far, sorted.
    pub fn ensured_partitions(&self) -> Vec<String> {
        let mut the_names: Vec<String> = self.ensured_set().iter().cloned().collect();
        the_names.sort();
        the_names
    }

    /// 🔒 `true` if this call claimed the name, `false` if someone already had.
    fn try_mark(&self, index: &str) -> bool {
        self.ensured_set().insert(index.to_string())
    }

    fn unmark(&self, index: &str) {
        self.ensured_set().remove(index);
    }

    fn ensured_set(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.ensured.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 🏗️ Runs exists → delete → create against the store, at most once per name per run.
#[derive(Debug, Clone)]
pub struct PartitionProvisioner {
    store: Arc<StoreBackend>,
    mapping: Arc<Value>,
}

impl PartitionProvisioner {
    pub fn new(store: Arc<StoreBackend>, mapping: Value) -> Self {
        Self {
            store,
            mapping: Arc::new(mapping),
        }
    }

    /// ✅ Idempotent, and safe to call from concurrent callers for the same name.
    pub async fn ensure(&self, run: &ImportRun, index: &str) -> Result<()> {
        if !run.try_mark(index) {
            return Ok(());
        }
        if let Err(e) = self.provision(index).await {
            run.unmark(index);
            return Err(e);
        }
        Ok(())
    }

    async fn provision(&self, index: &str) -> Result<()> {
        let presence = self
            .store
            .index_exists(index)
            .await
            .with_context(|| format!("💀 Could not check whether index '{}' exists", index))?;

        if presence == IndexPresence::Exists {
            info!("🗑️ Index '{}' already exists. Deleting it so this run starts fresh.", index);
            self.store
                .delete_index(index)
                .await
                .with_context(|| format!("💀 Could not delete stale index '{}'", index))?;
        }

        info!("🏗️ Creating index '{}'", index);
        match self
            .store
            .create_index(index, &self.mapping)
            .await
            .with_context(|| format!("💀 Could not create index '{}'", index))?
        {
            CreateOutcome::Created => info!("✅ Index '{}' is ready for documents", index),
            CreateOutcome::AlreadyExists => warn!(
                "⚠️ Index '{}' appeared between delete and create. Carrying on with it.",
                index
            ),
        }
        Ok(())
    }
}

/// 🗺️ The mapping from `mapping_file` if given, else the built-in flights mapping.
pub fn load_mapping(mapping_file: Option<&Path>) -> Result<Value> {
    match mapping_file {
        Some(path) => {
            let the_text = std::fs::read_to_string(path)
                .with_context(|| format!("💀 Could not read mapping file '{}'", path.display()))?;
            serde_json::from_str(&the_text)
                .with_context(|| format!("💀 Mapping file '{}' is not valid JSON", path.display()))
        }
        None => serde_json::from_str(BUILTIN_MAPPING).context("💀 The built-in mapping is not valid JSON"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{InMemoryStore, StoreCall};
    use futures::future::join_all;

    fn provisioner_over(store: &InMemoryStore) -> PartitionProvisioner {
        PartitionProvisioner::new(
            Arc::new(StoreBackend::InMemory(store.clone())),
            serde_json::json!({"mappings": {}}),
        )
    }

    #[tokio::test]
    async fn the_one_where_ten_callers_get_one_create() -> Result<()> {
        let store = InMemoryStore::new();
        let provisioner = provisioner_over(&store);
        let run = ImportRun::new(ProgressTracker::hidden(0));

        let the_results =
            join_all((0..10).map(|_| provisioner.ensure(&run, "flights-2024-07"))).await;
        assert!(the_results.iter().all(|result| result.is_ok()));

        assert_eq!(store.creates().await, vec!["flights-2024-07"]);
        assert_eq!(run.ensured_partitions(), vec!["flights-2024-07"]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_spawned_tasks_still_get_one_create() -> Result<()> {
        let store = InMemoryStore::new();
        let provisioner = provisioner_over(&store);
        let run = Arc::new(ImportRun::new(ProgressTracker::hidden(0)));

        let the_handles: Vec<_> = (0..8)
            .map(|_| {
                let provisioner = provisioner.clone();
                let run = Arc::clone(&run);
                tokio::spawn(async move { provisioner.ensure(&run, "flights-2023").await })
            })
            .collect();
        for handle in the_handles {
            handle.await??;
        }
        assert_eq!(store.creates().await, vec!["flights-2023"]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_existing_index_is_wiped_first() -> Result<()> {
        let store = InMemoryStore::with_indices(["flights-2019"]).await;
        let provisioner = provisioner_over(&store);
        let run = ImportRun::new(ProgressTracker::hidden(0));

        provisioner.ensure(&run, "flights-2019").await?;
        provisioner.ensure(&run, "flights-2019").await?;

        assert_eq!(
            store.calls().await,
            vec![
                StoreCall::Exists("flights-2019".into()),
                StoreCall::Delete("flights-2019".into()),
                StoreCall::Create("flights-2019".into()),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_failed_create_lets_the_next_caller_retry() -> Result<()> {
        let store = InMemoryStore::new();
        store.fail_next_creates(1).await;
        let provisioner = provisioner_over(&store);
        let run = ImportRun::new(ProgressTracker::hidden(0));

        assert!(provisioner.ensure(&run, "flights-2020").await.is_err());
        assert!(run.ensured_partitions().is_empty());

        provisioner.ensure(&run, "flights-2020").await?;
        assert_eq!(store.creates().await, vec!["flights-2020", "flights-2020"]);
        assert_eq!(store.index_names().await, vec!["flights-2020"]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_losing_the_create_race_is_shrugged_off() -> Result<()> {
        let store = InMemoryStore::with_indices(["flights-2021"]).await;
        store.conflict_next_creates(1).await;
        let provisioner = provisioner_over(&store);
        let run = ImportRun::new(ProgressTracker::hidden(0));

        provisioner.ensure(&run, "flights-2021").await?;
        assert_eq!(run.ensured_partitions(), vec!["flights-2021"]);

        // 🔁 already ensured: the second call never reaches the store
        provisioner.ensure(&run, "flights-2021").await?;
        assert_eq!(
            store.calls().await,
            vec![
                StoreCall::Exists("flights-2021".into()),
                StoreCall::Delete("flights-2021".into()),
                StoreCall::Create("flights-2021".into()),
            ]
        );
        assert_eq!(store.index_names().await, vec!["flights-2021"]);
        Ok(())
    }

    #[test]
    fn the_one_where_the_mapping_comes_from_a_file_or_the_box() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let the_file = dir.path().join("mapping.json");
        std::fs::write(&the_file, r#"{"mappings":{"properties":{}}}"#)?;

        assert_eq!(load_mapping(Some(&the_file))?["mappings"]["properties"], serde_json::json!({}));
        assert!(load_mapping(None)?["mappings"]["properties"]["Origin"].is_object());
        assert!(load_mapping(Some(&dir.path().join("missing.json"))).is_err());
        Ok(())
    }
}
