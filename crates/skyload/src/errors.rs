//! 💀 The failures we actually branch on.
//!
//! Everything else rides along as `anyhow::Error` with a context chain.
//! These few get names because somebody upstream needs to `downcast_ref` them and
//! make a decision: skip the file, or burn the whole run down. 🦆

use std::path::PathBuf;

use thiserror::Error;

/// 🏷️ Typed ingest failures. Wrapped in `anyhow::Error` on the way up; recovered with
/// `err.downcast_ref::<IngestError>()` where the policy cares.
#[derive(Debug, Error)]
pub enum IngestError {
    /// 🗜️ The archive opened fine, it just has no CSV in it. A gift box full of packing peanuts.
    #[error("💀 no entry ending in '.{extension}' inside archive '{}'", archive.display())]
    NoRowEntry { archive: PathBuf, extension: String },

    /// 🧾 A lookup file whose header forgot a column we need.
    #[error("💀 lookup file '{}' has no '{column}' column in its header", path.display())]
    InvalidLookupSchema { path: PathBuf, column: String },

    /// 📦 The container (zip, gzip, or the CSV inside) could not be opened or read.
    #[error("💀 could not read records from '{}': {reason}", path.display())]
    ContainerFormat { path: PathBuf, reason: String },

    /// 📡 The bulk endpoint accepted the request but rejected at least one item.
    /// `samples` holds the first few item errors (the ones that were logged), never all of them.
    #[error("💀 bulk write into '{partition}' reported {failed} item error(s); aborting the import")]
    BulkItemFailure {
        partition: String,
        failed: usize,
        samples: Vec<String>,
    },
}

impl IngestError {
    /// 🔍 Is this a per-file container problem (survivable when importing many files)?
    pub fn is_container_failure(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<IngestError>(),
            Some(IngestError::ContainerFormat { .. }) | Some(IngestError::NoRowEntry { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn the_one_where_container_failures_survive_a_context_layer() {
        let the_wrapped: anyhow::Error = Err::<(), _>(IngestError::ContainerFormat {
            path: PathBuf::from("flights-2024-07.zip"),
            reason: "invalid Zip archive".into(),
        })
        .context("while importing a very important file")
        .unwrap_err();

        assert!(IngestError::is_container_failure(&the_wrapped));
    }

    #[test]
    fn the_one_where_bulk_failures_are_not_container_failures() {
        let the_bulk_drama: anyhow::Error = IngestError::BulkItemFailure {
            partition: "flights-2024".into(),
            failed: 3,
            samples: vec!["mapper_parsing_exception".into()],
        }
        .into();
        assert!(!IngestError::is_container_failure(&the_bulk_drama));
        assert!(the_bulk_drama.to_string().contains("flights-2024"));
    }
}
