use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wayback_harvester::config::Config;
use wayback_harvester::db::{
    get_urls_missing_catalog, upsert_capture_records, upsert_url, with_database, LotInfo,
};
use wayback_harvester::dedup::StatusFilter;
use wayback_harvester::fs_utils::write_snapshots;
use wayback_harvester::ingest::load_entries;
use wayback_harvester::preimport::{run_preimport, KnownUrlChecker, PreimportStore};
use wayback_harvester::validate::TldList;
use wayback_harvester::wayback::{memento, CatalogQuery, WaybackClient};

/// Earliest capture date the archive holds.
const EARLIEST_TIMESTAMP: &str = "19960101000000";

#[derive(Debug, Parser)]
#[command(name = "wayback-harvester", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check an input file: required keys and URL validity.
    Validate {
        file: PathBuf,
    },
    /// Fetch CDX catalogs for every entry of an input file into `<file>.db`.
    Preimport {
        file: PathBuf,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Raw CDX filter, e.g. `statuscode:200`.
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        bypass_validation: bool,
    },
    /// Register every URL of an input file under a lot.
    Import {
        file: PathBuf,
        #[arg(long)]
        lot_id: String,
        #[arg(long, default_value = "")]
        lot_path: String,
        #[arg(long, default_value = "")]
        lot_path_code: String,
        #[arg(long)]
        bypass_validation: bool,
    },
    /// Fetch and store the CDX catalog of a URL, or of every URL lacking one.
    Catalog {
        #[arg(required_unless_present = "pending")]
        url: Option<String>,
        #[arg(long, conflicts_with = "url")]
        pending: bool,
        #[arg(long, default_value_t = 100)]
        limit: i64,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        filter: Option<String>,
        /// Replace a catalog that is already stored.
        #[arg(long)]
        force: bool,
    },
    /// Download one snapshot per unique digest of a URL.
    Download {
        url: String,
        /// Inclusive lower bound, 14 digits.
        #[arg(long, default_value = EARLIEST_TIMESTAMP)]
        from: String,
        /// Inclusive upper bound, 14 digits; defaults to now.
        #[arg(long)]
        to: Option<String>,
        /// Comma-separated status codes to keep.
        #[arg(long, default_value = "200")]
        status: String,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the components of a memento URI.
    Memento {
        uri: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let tlds = match &config.tld_list_path {
        Some(path) => TldList::from_file(path)
            .with_context(|| format!("Failed to load TLD list from {}", path.display()))?,
        None => TldList::embedded(),
    };
    TldList::install(tlds)?;

    match cli.command {
        Command::Validate { file } => {
            let entries = load_entries(&file, TldList::global(), false)?;
            info!(entries = entries.len(), "URL validation passed");
        }
        Command::Preimport {
            file,
            from,
            to,
            filter,
            bypass_validation,
        } => {
            let entries = load_entries(&file, TldList::global(), bypass_validation)?;
            let client = WaybackClient::new(&config)?;
            let known = config
                .known_url_check_base
                .as_deref()
                .map(|base| KnownUrlChecker::new(base, config.http_timeout))
                .transpose()?;

            let store_path = PreimportStore::path_for(&file);
            let store = PreimportStore::open(&store_path).await?;
            let result = async {
                store.initialize(&entries).await?;
                let query = CatalogQuery { from, to, filter };
                run_preimport(&store, &client, &query, known.as_ref()).await
            }
            .await;
            store.close().await;

            let summary = result?;
            info!(
                store = %store_path.display(),
                fetched = summary.fetched,
                skipped_known = summary.skipped_known,
                "Pre-import finished"
            );
        }
        Command::Import {
            file,
            lot_id,
            lot_path,
            lot_path_code,
            bypass_validation,
        } => {
            let entries = load_entries(&file, TldList::global(), bypass_validation)?;
            with_database(&config.database_path, |db| async move {
                for entry in &entries {
                    let mut lot = LotInfo::new(lot_id.as_str(), entry.title.as_str())
                        .with_desc(entry.description.as_str())
                        .with_path(lot_path.as_str())
                        .with_path_code(lot_path_code.as_str());
                    lot.page_number = entry.page_number;
                    let outcome = upsert_url(db.pool(), &entry.url, &lot).await?;
                    info!(url = %entry.url, outcome = outcome.as_str(), "Imported URL");
                }
                Ok::<_, anyhow::Error>(())
            })
            .await?;
        }
        Command::Catalog {
            url,
            pending,
            limit,
            from,
            to,
            filter,
            force,
        } => {
            let client = WaybackClient::new(&config)?;
            let query = CatalogQuery { from, to, filter };
            with_database(&config.database_path, |db| async move {
                let urls = if pending {
                    get_urls_missing_catalog(db.pool(), limit).await?
                } else {
                    url.into_iter().collect()
                };
                for url in urls {
                    let records = client.fetch_catalog(&url, &query).await?;
                    upsert_capture_records(db.pool(), &url, &records, force).await?;
                }
                Ok::<_, anyhow::Error>(())
            })
            .await?;
        }
        Command::Download {
            url,
            from,
            to,
            status,
            out,
        } => {
            let to = to.unwrap_or_else(|| chrono::Utc::now().format("%Y%m%d%H%M%S").to_string());
            let status_filter: StatusFilter = status.parse()?;
            let client = WaybackClient::new(&config)?;

            let report = client
                .bulk_download_unique(&url, &from, &to, &status_filter)
                .await?;
            if !report.failed.is_empty() {
                warn!(failed = report.failed.len(), "Some snapshots could not be downloaded");
            }

            let manifest = write_snapshots(&out, &report).await?;
            info!(manifest = %manifest.display(), downloaded = report.downloaded.len(), "Snapshots written");
        }
        Command::Memento { uri } => {
            let m = memento::parse(&uri)?;
            let modifier = m
                .rewrite_modifier
                .as_ref()
                .map_or("", |r| r.as_str());
            println!("original:  {}", m.original);
            println!("timestamp: {}", m.timestamp);
            println!("modifier:  {modifier}");
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wayback_harvester=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
