//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." (every developer at 3am) 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! ```toml
//! [store.Elasticsearch]
//! url = "http://localhost:9200"
//! api_key = "..."
//!
//! [loader]
//! index_prefix = "flights"
//! batch_size = 500
//!
//! [lookups]
//! geo_file = "data/airports.csv.gz"
//! ```
//!
//! Env vars work too: `SKYLOAD_LOADER__BATCH_SIZE=1000`,
//! `SKYLOAD_STORE__ELASTICSEARCH__URL=https://es.internal:9200`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::ElasticsearchConfig;

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 🗄️ Where documents go. Defaults to a local, unauthenticated Elasticsearch.
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub lookups: LookupConfig,
}

/// 🎭 Which store, and how to reach it.
#[derive(Debug, Deserialize, Clone)]
pub enum StoreConfig {
    #[serde(alias = "elasticsearch")]
    Elasticsearch(ElasticsearchConfig),
    /// 🧪 Nothing leaves the process. Everything else runs for real.
    #[serde(alias = "in_memory")]
    InMemory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Elasticsearch(ElasticsearchConfig::new("http://localhost:9200"))
    }
}

/// 🛫 How the import itself behaves.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoaderConfig {
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// 🔄 Ask ES to refresh after each bulk call. Slower, but searches see documents immediately.
    #[serde(default)]
    pub refresh: bool,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// 🗺️ A JSON mapping file. `None` means the built-in flights mapping.
    #[serde(default)]
    pub mapping_file: Option<PathBuf>,
}

fn default_index_prefix() -> String {
    "flights".to_string()
}

// 📦 500 flights per bulk call. Small enough to keep ES calm, big enough to finish before lunch.
fn default_batch_size() -> usize {
    500
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            index_prefix: default_index_prefix(),
            batch_size: default_batch_size(),
            refresh: false,
            data_dir: default_data_dir(),
            mapping_file: None,
        }
    }
}

/// 📚 Where the two reference files live.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LookupConfig {
    #[serde(default = "default_geo_file")]
    pub geo_file: PathBuf,
    #[serde(default = "default_reason_file")]
    pub reason_file: PathBuf,
}

fn default_geo_file() -> PathBuf {
    PathBuf::from("data/airports.csv.gz")
}

fn default_reason_file() -> PathBuf {
    PathBuf::from("data/cancellations.csv")
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            geo_file: default_geo_file(),
            reason_file: default_reason_file(),
        }
    }
}

/// 🚀 Load the config: from a file, from env vars, or from the sheer power of defaults.
///
/// 🔧 Merges `SKYLOAD_*` environment variables (nested keys split on `__`) with an optional
/// TOML file. TOML wins on conflicts, because it was merged last.
///
/// 📐 DESIGN NOTE (tribal knowledge):
///   - `config_file_name` None  → env vars only. No file, no assumptions.
///   - `config_file_name` Some  → env vars + TOML file.
///   Anything neither of them sets falls back to the serde defaults above.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {}",
        config_file_name
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "(environment only)".to_string())
    );

    let config = Figment::new().merge(Env::prefixed("SKYLOAD_").split("__"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    // 💬 A context message that actually TELLS you what went wrong.
    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (SKYLOAD_*).",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (SKYLOAD_*). \
                 No file was provided, so this one's all on the environment."
            .to_string(),
    };

    config.extract().context(context_msg)
}
