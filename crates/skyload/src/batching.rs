//! 📦 Batching: per-index buffers of bulk lines, handed out whole when they fill up.
//!
//! Each index owns its own buffer of `(action, document)` line pairs plus a count. The
//! accumulator is per-file state (no locks), and order is preserved: documents routed to the
//! same index come out in the order they went in, in `batch_size` chunks.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::document::Document;

/// 🚚 A full (or final) load for one index, ready for the bulk endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub partition: String,
    /// Alternating action and document lines, no trailing newlines.
    pub lines: Vec<String>,
    pub count: usize,
}

impl Batch {
    /// 📡 NDJSON body: every line newline-terminated, including the last one.
    pub fn to_ndjson(&self) -> String {
        let the_size: usize = self.lines.iter().map(|line| line.len() + 1).sum();
        let mut body = String::with_capacity(the_size);
        for line in &self.lines {
            body.push_str(line);
            body.push('\n');
        }
        body
    }
}

#[derive(Serialize)]
struct IndexAction<'a> {
    index: IndexTarget<'a>,
}

#[derive(Serialize)]
struct IndexTarget<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
}

#[derive(Debug, Default)]
struct PartitionBuffer {
    lines: Vec<String>,
    count: usize,
}

/// 🧺 Buffers keyed by index name. A `BTreeMap`, so the end-of-input drain is in name order.
#[derive(Debug)]
pub struct BatchAccumulator {
    buffers: BTreeMap<String, PartitionBuffer>,
    batch_size: usize,
}

impl BatchAccumulator {
    /// 🚀 `batch_size` of 0 is treated as 1; a batch has to hold something.
    pub fn new(batch_size: usize) -> Self {
        Self {
            buffers: BTreeMap::new(),
            batch_size: batch_size.max(1),
        }
    }

    /// ➕ Queue one document. Returns the whole buffer as a [`Batch`] when this append filled it;
    /// the buffer is empty again afterwards.
    pub fn append(&mut self, partition: &str, document: &Document) -> Result<Option<Batch>> {
        let the_action = serde_json::to_string(&IndexAction {
            index: IndexTarget { index: partition },
        })
        .context("💀 Could not serialise a bulk action line")?;
        let the_document =
            serde_json::to_string(document).context("💀 Could not serialise a flight document")?;

        let buffer = self.buffers.entry(partition.to_string()).or_default();
        buffer.lines.push(the_action);
        buffer.lines.push(the_document);
        buffer.count += 1;

        if buffer.count >= self.batch_size {
            Ok(Some(Batch {
                partition: partition.to_string(),
                lines: std::mem::take(&mut buffer.lines),
                count: std::mem::replace(&mut buffer.count, 0),
            }))
        } else {
            Ok(None)
        }
    }

    /// 🧹 End of input: every non-empty buffer, once, emptied.
    pub fn drain(&mut self) -> Vec<Batch> {
        self.buffers
            .iter_mut()
            .filter(|(_, buffer)| buffer.count > 0)
            .map(|(partition, buffer)| Batch {
                partition: partition.clone(),
                lines: std::mem::take(&mut buffer.lines),
                count: std::mem::replace(&mut buffer.count, 0),
            })
            .collect()
    }

    /// 🔢 Documents waiting across all buffers.
    pub fn pending(&self) -> usize {
        self.buffers.values().map(|buffer| buffer.count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flight(origin: &str) -> Document {
        Document {
            origin: Some(origin.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn the_one_where_the_batch_leaves_on_the_exact_append() -> Result<()> {
        let mut the_accumulator = BatchAccumulator::new(3);
        assert!(the_accumulator.append("flights-2024", &flight("SFO"))?.is_none());
        assert!(the_accumulator.append("flights-2024", &flight("LAX"))?.is_none());

        let the_batch = the_accumulator
            .append("flights-2024", &flight("JFK"))?
            .expect("third append fills the batch");
        assert_eq!(the_batch.count, 3);
        assert_eq!(the_batch.lines.len(), 6);
        assert_eq!(the_batch.lines[0], r#"{"index":{"_index":"flights-2024"}}"#);
        assert_eq!(the_batch.lines[1], r#"{"Origin":"SFO"}"#);
        assert_eq!(the_batch.lines[5], r#"{"Origin":"JFK"}"#);

        assert_eq!(the_accumulator.pending(), 0);
        assert!(the_accumulator.drain().is_empty());
        Ok(())
    }

    #[test]
    fn the_one_where_leftovers_drain_exactly_once_per_index() -> Result<()> {
        let mut the_accumulator = BatchAccumulator::new(500);
        the_accumulator.append("flights-2024-02", &flight("SEA"))?;
        the_accumulator.append("flights-2024-01", &flight("ORD"))?;
        the_accumulator.append("flights-2024-02", &flight("DEN"))?;

        let the_batches = the_accumulator.drain();
        assert_eq!(the_batches.len(), 2);
        assert_eq!(the_batches[0].partition, "flights-2024-01");
        assert_eq!(the_batches[1].partition, "flights-2024-02");
        assert_eq!(the_batches[1].count, 2);

        assert!(the_accumulator.drain().is_empty());
        Ok(())
    }

    #[test]
    fn the_one_where_ndjson_ends_with_a_newline() {
        let the_batch = Batch {
            partition: "p".into(),
            lines: vec!["a".into(), "b".into()],
            count: 1,
        };
        assert_eq!(the_batch.to_ndjson(), "a\nb\n");
    }
}
