//! 🚽 Flushing: one batch, one bulk call, and zero tolerance for rejected items.
//!
//! A partial load is worse than a loud failure. If the bulk response says `errors: true`,
//! we log a handful of the item errors (five, enough to diagnose a mapping problem without
//! drowning the terminal in ten thousand copies of it) and abort the import.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error};

use crate::backends::{BulkResponse, DocumentStore, StoreBackend};
use crate::batching::Batch;
use crate::errors::IngestError;

/// 📏 Item errors worth logging per failed flush.
pub const MAX_LOGGED_ITEM_ERRORS: usize = 5;

#[derive(Debug, Clone)]
pub struct BulkFlusher {
    store: Arc<StoreBackend>,
    refresh: bool,
}

impl BulkFlusher {
    pub fn new(store: Arc<StoreBackend>, refresh: bool) -> Self {
        Self { store, refresh }
    }

    /// 📡 Send `batch`. `Ok(count)` means every document in it was accepted.
    pub async fn flush(&self, batch: Batch) -> Result<usize> {
        if batch.count == 0 {
            return Ok(0);
        }
        let the_payload = batch.to_ndjson();
        debug!(
            "📡 Flushing {} documents ({} bytes) into '{}'",
            batch.count,
            the_payload.len(),
            batch.partition
        );

        let the_response = self
            .store
            .bulk(the_payload, self.refresh)
            .await
            .with_context(|| format!("💀 Bulk write into '{}' failed", batch.partition))?;

        if the_response.errors {
            let (the_failed, the_samples) = sample_item_errors(&the_response, &batch.partition);
            for sample in &the_samples {
                error!("💀 {}", sample);
            }
            return Err(IngestError::BulkItemFailure {
                partition: batch.partition,
                failed: the_failed,
                samples: the_samples,
            }
            .into());
        }

        Ok(batch.count)
    }
}

/// 🔬 Count every rejected item, describe only the first [`MAX_LOGGED_ITEM_ERRORS`].
fn sample_item_errors(response: &BulkResponse, partition: &str) -> (usize, Vec<String>) {
    let mut the_failed = 0;
    let mut the_samples = Vec::with_capacity(MAX_LOGGED_ITEM_ERRORS);
    for (action, item) in response.item_errors() {
        if the_samples.len() < MAX_LOGGED_ITEM_ERRORS {
            the_samples.push(format!(
                "Bulk item rejected ({} into '{}', status {}): {}",
                action,
                item.index.as_deref().unwrap_or(partition),
                item.status,
                item.error
                    .as_ref()
                    .map(|cause| cause.to_string())
                    .unwrap_or_default()
            ));
        }
        the_failed += 1;
    }
    (the_failed, the_samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryStore;
    use serde_json::json;

    fn batch_of(count: usize) -> Batch {
        let mut lines = Vec::new();
        for n in 0..count {
            lines.push(r#"{"index":{"_index":"flights-2024"}}"#.to_string());
            lines.push(format!(r#"{{"Flights":{}}}"#, n));
        }
        Batch {
            partition: "flights-2024".into(),
            lines,
            count,
        }
    }

    #[tokio::test]
    async fn the_one_where_a_clean_flush_counts_its_documents() -> Result<()> {
        let store = InMemoryStore::new();
        let the_flusher = BulkFlusher::new(Arc::new(StoreBackend::InMemory(store.clone())), false);

        assert_eq!(the_flusher.flush(batch_of(4)).await?, 4);
        assert_eq!(store.documents("flights-2024").await.len(), 4);
        let the_payloads = store.bulk_payloads().await;
        assert_eq!(the_payloads.len(), 1);
        assert!(the_payloads[0].ends_with("{\"Flights\":3}\n"));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_rejected_items_abort_the_whole_import() -> Result<()> {
        let store = InMemoryStore::new();
        store
            .reject_bulk_items(json!({"type": "mapper_parsing_exception", "reason": "bad geo_point"}))
            .await;
        let the_flusher = BulkFlusher::new(Arc::new(StoreBackend::InMemory(store)), false);

        let the_error = the_flusher.flush(batch_of(12)).await.unwrap_err();
        match the_error.downcast_ref::<IngestError>() {
            Some(IngestError::BulkItemFailure {
                partition,
                failed,
                samples,
            }) => {
                assert_eq!(partition, "flights-2024");
                assert_eq!(*failed, 12);
                // 🤐 twelve rejections, five told
                assert_eq!(samples.len(), MAX_LOGGED_ITEM_ERRORS);
                assert!(samples.iter().all(|sample| sample.contains("bad geo_point")));
            }
            other => panic!("expected BulkItemFailure, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_empty_batch_never_leaves_the_house() -> Result<()> {
        let store = InMemoryStore::new();
        let the_flusher = BulkFlusher::new(Arc::new(StoreBackend::InMemory(store.clone())), true);
        assert_eq!(the_flusher.flush(batch_of(0)).await?, 0);
        assert!(store.calls().await.is_empty());
        Ok(())
    }
}
