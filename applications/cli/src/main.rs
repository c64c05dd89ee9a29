/// smart-bridge - headless adaptive playback for Smart Bridge releases
use anyhow::Context;
use bridge_cli::commands::{self, PlanOutcome, PlayOutcome};
use bridge_cli::{render, CliConfig, VirtualDevice};
use bridge_client::{BackendClient, HttpCatalogLoader, HttpSourceResolver};
use bridge_core::{CatalogLoader, JsonFileCollectionStore, ReleaseId};
use bridge_playback::PlaybackConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "smart-bridge")]
#[command(about = "Adaptive song/bridge playback for published releases", long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./smart-bridge.toml when present)
    #[arg(short, long, global = true, env = "BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Release backend base URL
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Seed for route drawing and bridge label delays
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a release and print a planned queue
    Plan {
        /// Share id, manifest URL, or legacy project key
        release: String,
        /// Routes to draw before giving up
        #[arg(short, long, default_value_t = 1)]
        attempts: u32,
    },
    /// Play a release on the virtual device
    Play {
        /// Share id, manifest URL, or legacy project key
        release: String,
        /// Cap every item even if the release is owned
        #[arg(long)]
        preview: bool,
        /// Clock acceleration of the virtual device
        #[arg(long)]
        speed: Option<f64>,
    },
    /// Add a release to the collection
    Collect {
        release: String,
    },
    /// List owned releases, newest first
    Collection,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "smart_bridge=info,bridge_cli=info,bridge_playback=info,bridge_client=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = CliConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(api_base) = cli.api_base {
        config.backend.api_base = api_base;
    }
    if cli.seed.is_some() {
        config.playback.seed = cli.seed;
    }

    match cli.command {
        Commands::Plan { release, attempts } => plan(&config, &release, attempts).await?,
        Commands::Play {
            release,
            preview,
            speed,
        } => {
            if let Some(speed) = speed {
                config.device.speed = speed;
                config.validate()?;
            }
            play(&config, &release, preview).await?;
        }
        Commands::Collect { release } => collect(&config, &release)?,
        Commands::Collection => list_collection(&config)?,
    }

    Ok(())
}

fn backend(config: &CliConfig) -> anyhow::Result<BackendClient> {
    BackendClient::new(config.backend.clone()).context("creating backend client")
}

async fn plan(config: &CliConfig, release: &str, attempts: u32) -> anyhow::Result<()> {
    let loader = HttpCatalogLoader::new(backend(config)?);
    let release = ReleaseId::new(release);

    let (catalog, outcome) =
        commands::plan(&loader, &release, attempts, config.playback.seed).await?;
    println!("{}", render::catalog_summary(&catalog));

    match outcome {
        PlanOutcome::Planned(queue) => {
            for line in render::queue_lines(&queue) {
                println!("{}", line);
            }
        }
        PlanOutcome::Unavailable(reason) => println!("{}", reason),
    }
    Ok(())
}

async fn play(config: &CliConfig, release: &str, force_preview: bool) -> anyhow::Result<()> {
    let client = backend(config)?;
    let loader = HttpCatalogLoader::new(client.clone());
    let resolver = Arc::new(HttpSourceResolver::new(client));
    let store = JsonFileCollectionStore::new(&config.collection.path);
    let release = ReleaseId::new(release);

    let catalog = loader
        .load_catalog(&release)
        .await
        .with_context(|| format!("loading release {}", release))?;
    println!("{}", render::catalog_summary(&catalog));

    let mode = commands::listening_mode_for(&store, &release, force_preview)?;
    let playback = PlaybackConfig {
        listening_mode: mode,
        ..config.playback.clone()
    };
    tracing::info!(mode = ?mode, speed = config.device.speed, "Starting playback");

    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let outcome = commands::play(
        &catalog,
        resolver,
        VirtualDevice::new(&config.device),
        playback,
        |snapshot| println!("{}", render::snapshot_line(snapshot)),
        interrupt,
    )
    .await?;

    match outcome {
        PlayOutcome::Unavailable(started) => {
            println!("{}", started.reason.unwrap_or_default());
        }
        PlayOutcome::Finished(_) => println!("Finished."),
        PlayOutcome::Interrupted(snapshot) => {
            println!("Stopped at {}", render::snapshot_line(&snapshot));
        }
    }
    Ok(())
}

fn collect(config: &CliConfig, release: &str) -> anyhow::Result<()> {
    let store = JsonFileCollectionStore::new(&config.collection.path);
    let release = ReleaseId::new(release);

    if commands::collect(&store, &release)? {
        println!("Added {} to the collection", release);
    } else {
        println!("{} is already in the collection", release);
    }
    Ok(())
}

fn list_collection(config: &CliConfig) -> anyhow::Result<()> {
    let store = JsonFileCollectionStore::new(&config.collection.path);
    let entries = store.entries()?;

    if entries.is_empty() {
        println!("Collection is empty");
    }
    for entry in entries {
        println!(
            "{}  {}",
            entry.added_at.format("%Y-%m-%d %H:%M"),
            entry.release_id
        );
    }
    Ok(())
}
