//! 🚀 skyload-cli: the gate agent. Checks your flags, scans your config, waves you aboard.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary is the thin wrapper that parses flags, loads config, sets up logging,
//! and then lets the library do the heavy lifting. Like a manager. 🦆

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use skyload::app_config::{AppConfig, StoreConfig};
use skyload::backends::ElasticsearchConfig;
use skyload::{Command, DEFAULT_INDEX_PATTERN, FileSelection, index_pattern_for};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// ✈️ Bulk-load BTS on-time flight records into date-partitioned Elasticsearch indices.
#[derive(Debug, Parser)]
#[command(name = "skyload", version, about)]
#[command(group(ArgGroup::new("selection").args(["file", "all", "glob"])))]
#[command(group(ArgGroup::new("operation").args(["status", "delete_index", "delete_all", "sample"])))]
struct Cli {
    /// TOML config file. Optional; `SKYLOAD_*` env vars and defaults fill the rest.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// One input file (.csv, .csv.gz, .zip), as given or relative to the data dir.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Every .zip, .csv and .csv.gz in the data dir.
    #[arg(long)]
    all: bool,

    /// A glob pattern, as given or relative to the data dir.
    #[arg(long)]
    glob: Option<String>,

    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Index name prefix (`flights` → `flights-2024-07`).
    #[arg(long)]
    index: Option<String>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// Refresh after each bulk call.
    #[arg(long)]
    refresh: bool,

    /// Elasticsearch base URL. Overrides the configured store.
    #[arg(long)]
    url: Option<String>,

    /// Run everything against an in-memory store. Nothing is written.
    #[arg(long, conflicts_with = "url")]
    dry_run: bool,

    #[arg(long)]
    airports_file: Option<PathBuf>,

    #[arg(long)]
    cancellations_file: Option<PathBuf>,

    /// Index mapping JSON. The built-in flights mapping otherwise.
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// Print cluster health and exit.
    #[arg(long)]
    status: bool,

    /// Delete every index under the prefix.
    #[arg(long)]
    delete_index: bool,

    /// Delete every `flights-*` index.
    #[arg(long)]
    delete_all: bool,

    /// Print the first transformed document of the first selected file. No writes.
    #[arg(long)]
    sample: bool,
}

impl Cli {
    fn selection(&self) -> Option<FileSelection> {
        if let Some(file) = &self.file {
            Some(FileSelection::File(file.clone()))
        } else if self.all {
            Some(FileSelection::All)
        } else {
            self.glob.clone().map(FileSelection::Glob)
        }
    }

    /// 🎛️ Flags win over config. Config wins over defaults.
    fn apply_overrides(&self, app_config: &mut AppConfig) {
        if let Some(data_dir) = &self.data_dir {
            app_config.loader.data_dir = data_dir.clone();
        }
        if let Some(index) = &self.index {
            app_config.loader.index_prefix = index.clone();
        }
        if let Some(batch_size) = self.batch_size {
            app_config.loader.batch_size = batch_size;
        }
        if self.refresh {
            app_config.loader.refresh = true;
        }
        if let Some(mapping) = &self.mapping {
            app_config.loader.mapping_file = Some(mapping.clone());
        }
        if let Some(airports) = &self.airports_file {
            app_config.lookups.geo_file = airports.clone();
        }
        if let Some(cancellations) = &self.cancellations_file {
            app_config.lookups.reason_file = cancellations.clone();
        }
        if self.dry_run {
            app_config.store = StoreConfig::InMemory;
        } else if let Some(url) = &self.url {
            // -- 🔐 keep credentials from the config when only the address moves
            app_config.store = match &app_config.store {
                StoreConfig::Elasticsearch(es) => StoreConfig::Elasticsearch(ElasticsearchConfig {
                    url: url.clone(),
                    ..es.clone()
                }),
                StoreConfig::InMemory => StoreConfig::Elasticsearch(ElasticsearchConfig::new(url)),
            };
        }
    }

    fn command(&self, index_prefix: &str) -> Result<Command> {
        if self.status {
            return Ok(Command::Status);
        }
        if self.delete_all {
            return Ok(Command::DeleteIndices {
                pattern: DEFAULT_INDEX_PATTERN.to_string(),
            });
        }
        if self.delete_index {
            return Ok(Command::DeleteIndices {
                pattern: index_pattern_for(index_prefix),
            });
        }
        let selection = self
            .selection()
            .context("💀 Nothing to do. Pick input files with --file, --all or --glob.")?;
        if self.sample {
            Ok(Command::Sample(selection))
        } else {
            Ok(Command::Import(selection))
        }
    }
}

/// 🚀 main(): init tracing, parse flags, load config, run, and if it all goes sideways,
/// explain why in a way that helps at 3am.
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 println! debugging is a lifestyle choice we're trying to move past
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let the_start = Instant::now();

    let result = run(&cli).await;

    if let Err(err) = result {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one layer at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("error sending request")
                || cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
            {
                the_vibes_are_giving_connection_issues = true;
            }
        }

        if the_vibes_are_giving_connection_issues {
            error!(
                "🔧 hint: Elasticsearch isn't answering. Check that it's running and that the \
                configured URL is right. If you're using Docker, `docker ps` shows what's up and \
                `docker compose up -d` resurrects it. Even clusters need a nudge sometimes. ☕"
            );
        }

        std::process::exit(1);
    }

    info!("⏱️ Total time: {:.2?}", the_start.elapsed());
    Ok(())
}

async fn run(cli: &Cli) -> Result<()> {
    // 🔒 a config path that's given but missing is a typo, not a request for defaults
    if let Some(path) = &cli.config {
        let the_file_is_there = path.try_exists().with_context(|| {
            format!("💀 Could not check for the config file at '{}'", path.display())
        })?;
        anyhow::ensure!(
            the_file_is_there,
            "💀 Config file '{}' does not exist. Relative paths start at the current directory.",
            path.display()
        );
    }

    let mut app_config = skyload::app_config::load_config(cli.config.as_deref())
        .context("💀 Couldn't load the configuration. Check the TOML and any SKYLOAD_* variables.")?;
    cli.apply_overrides(&mut app_config);

    let the_command = cli.command(&app_config.loader.index_prefix)?;
    skyload::run(app_config, the_command).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("skyload").chain(args.iter().copied()))
            .expect("💀 flags should parse")
    }

    #[test]
    fn the_one_where_flags_beat_the_config_file() {
        let mut app_config = AppConfig {
            store: StoreConfig::default(),
            loader: Default::default(),
            lookups: Default::default(),
        };
        parse(&["--all", "--index", "ontime", "--batch-size", "50", "--url", "http://es:9200"])
            .apply_overrides(&mut app_config);

        assert_eq!(app_config.loader.index_prefix, "ontime");
        assert_eq!(app_config.loader.batch_size, 50);
        assert!(matches!(app_config.store, StoreConfig::Elasticsearch(ref es) if es.url == "http://es:9200"));
    }

    #[test]
    fn the_one_where_each_flag_picks_its_command() -> Result<()> {
        assert_eq!(parse(&["--status"]).command("flights")?, Command::Status);
        assert_eq!(
            parse(&["--delete-index"]).command("ontime")?,
            Command::DeleteIndices { pattern: "ontime-*".into() }
        );
        assert_eq!(
            parse(&["--delete-all"]).command("ontime")?,
            Command::DeleteIndices { pattern: "flights-*".into() }
        );
        assert_eq!(
            parse(&["--sample", "--glob", "*.zip"]).command("flights")?,
            Command::Sample(FileSelection::Glob("*.zip".into()))
        );
        assert_eq!(
            parse(&["--file", "a.csv"]).command("flights")?,
            Command::Import(FileSelection::File("a.csv".into()))
        );
        assert!(parse(&[]).command("flights").is_err());
        Ok(())
    }

    #[test]
    fn the_one_where_two_selections_is_one_too_many() {
        assert!(Cli::try_parse_from(["skyload", "--all", "--glob", "*.csv"]).is_err());
    }
}
