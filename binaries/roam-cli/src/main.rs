//! Roam CLI
//!
//! ```bash
//! roam feed                          # Tokyo sample feed for "mika"
//! roam feed -d data.json -v ana -p 3 # three pages from a dataset
//! roam feed --json                   # machine-readable output
//! roam watch -s 10                   # live "new posts" demo
//! roam config                        # effective configuration
//! ```

mod report;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use roam_config::{LoggingConfig, RoamConfig};
use roam_core::PhotoChain;
use roam_feed::{FeedEngine, LoadOutcome};
use roam_store::{fixtures, Dataset, MemoryStore, StoreSettings};

#[derive(Parser)]
#[command(name = "roam")]
#[command(about = "Roam - travel journal feed")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.config/roam/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a viewer's feed
    Feed {
        /// Viewer user id
        #[arg(short, long, default_value = "mika")]
        viewer: String,

        /// JSON dataset (defaults to the built-in Tokyo sample)
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Number of pages to load
        #[arg(short, long, default_value_t = 1)]
        pages: usize,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Watch for new posts while simulated activity arrives
    Watch {
        #[arg(short, long, default_value = "mika")]
        viewer: String,

        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// How long to watch
        #[arg(short, long, default_value_t = 5)]
        seconds: u64,

        /// Interval between simulated logs
        #[arg(long, default_value_t = 1500)]
        every_ms: u64,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RoamConfig::load_from(path)?,
        None => RoamConfig::load()?,
    };
    init_tracing(&config.logging);

    match cli.command {
        Commands::Feed {
            viewer,
            dataset,
            pages,
            json,
        } => cmd_feed(&config, viewer, dataset, pages, json).await,
        Commands::Watch {
            viewer,
            dataset,
            seconds,
            every_ms,
        } => cmd_watch(&config, viewer, dataset, seconds, every_ms).await,
        Commands::Config => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    // RUST_LOG wins over the configured filter
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("roam=info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.json {
        subscriber.json().init();
    } else {
        subscriber.with_target(false).init();
    }
}

async fn open_store(config: &RoamConfig, dataset: Option<PathBuf>) -> Result<Arc<MemoryStore>> {
    let store = MemoryStore::new(StoreSettings {
        page_size: config.feed.page_size,
        discovery_limit: config.feed.discovery_limit,
    });

    let dataset = match dataset {
        Some(path) => {
            tracing::info!("Loading dataset from {}", path.display());
            Dataset::from_path(&path)?
        }
        None => fixtures::tokyo_dataset(),
    };
    store.load_dataset(dataset).await?;

    Ok(Arc::new(store))
}

// ============== Commands ==============

async fn cmd_feed(
    config: &RoamConfig,
    viewer: String,
    dataset: Option<PathBuf>,
    pages: usize,
    json: bool,
) -> Result<()> {
    let store = open_store(config, dataset).await?;
    let engine = FeedEngine::from_config(store, config);
    let session = engine.start_session(&viewer).await;

    session.load_feed().await?;
    for _ in 1..pages.max(1) {
        match session.load_more_feed().await? {
            LoadOutcome::Appended { added } => tracing::debug!(added, "page appended"),
            LoadOutcome::Exhausted => break,
            other => {
                tracing::warn!(?other, "unexpected load-more outcome");
                break;
            }
        }
    }

    let snapshot = session.snapshot();
    if json {
        report::print_json(&viewer, &snapshot)?;
    } else {
        let photos = PhotoChain::standard(config.photos.place_photo_url_template.clone());
        report::print_feed(&viewer, &snapshot, &photos);
    }

    engine.shutdown().await;
    Ok(())
}

async fn cmd_watch(
    config: &RoamConfig,
    viewer: String,
    dataset: Option<PathBuf>,
    seconds: u64,
    every_ms: u64,
) -> Result<()> {
    let store = open_store(config, dataset).await?;
    let engine = FeedEngine::from_config(store.clone(), config).with_social_graph(store.clone());
    let followed = engine.following(&viewer).await?.unwrap_or_default();
    let Some(author_id) = followed.first() else {
        bail!("{} follows nobody, nothing to simulate", viewer);
    };
    let author = store.user(author_id).await?;

    let session = engine.start_session(&viewer).await;
    let photos = PhotoChain::standard(config.photos.place_photo_url_template.clone());

    session.load_feed().await?;
    report::print_feed(&viewer, &session.snapshot(), &photos);
    session.subscribe_to_realtime_updates()?;

    let writer = {
        let store = Arc::clone(&store);
        let every = Duration::from_millis(every_ms.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            for n in 1.. {
                ticker.tick().await;
                let log = fixtures::log(&format!("live-{}", n), &author, Utc::now());
                tracing::info!(author = %author.id, log = %log.id, "simulated log");
                store.add_log(log).await;
            }
        })
    };

    let mut updates = session.subscribe();
    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let pending = updates.borrow_and_update().new_posts_available;
                if !pending {
                    continue;
                }

                println!("\n▲ New posts");
                session.show_new_posts().await?;
                let snapshot = session.snapshot();
                if let Some(top) = snapshot.entries.first() {
                    report::print_entry(top, &photos);
                }
            }
        }
    }

    writer.abort();
    engine.shutdown().await;
    Ok(())
}
