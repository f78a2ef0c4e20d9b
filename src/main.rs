//! fakestore -- command-line front end for the emulator's storage core.
//!
//! Every subcommand opens the configured backend, performs one storage
//! operation and exits.  `serve` seeds the backend and keeps it open until
//! SIGTERM/SIGINT, exposing metrics if configured.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use fakestore::config::{load_config, Config, LoggingConfig};
use fakestore::metrics::InstrumentedStorage;
use fakestore::{bootstrap, storage, Object, Storage};

/// Command-line arguments for fakestore.
#[derive(Parser, Debug)]
#[command(
    name = "fakestore",
    version,
    about = "Bucket and object storage backend for the storage emulator"
)]
struct Cli {
    /// Path to the YAML configuration file (defaults apply if absent).
    #[arg(short, long, default_value = "fakestore.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed the backend from the bootstrap directory, then wait for a signal.
    Serve,
    /// Load a mounted directory tree into the backend.
    Seed {
        /// Directory to load (defaults to `bootstrap.seed_dir`).
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Create a bucket.
    Mb { bucket: String },
    /// List buckets.
    Buckets,
    /// Check that a bucket exists.
    Stat { bucket: String },
    /// List the objects in a bucket.
    Ls { bucket: String },
    /// Store a local file as an object.
    Put {
        bucket: String,
        name: String,
        file: PathBuf,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Print an object's content, or write it to a file.
    Get {
        bucket: String,
        name: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete an object.
    Rm { bucket: String, name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        load_config(&cli.config)
            .with_context(|| format!("failed to load {}", cli.config.display()))?
    } else {
        Config::default()
    }
    .with_env_overrides();

    init_logging(&config.logging);

    let serving = matches!(cli.command, Command::Serve);
    if serving && config.observability.metrics {
        fakestore::metrics::init_metrics(config.observability.metrics_listen.as_deref())?;
    }

    let backend = storage::open_storage(&config.storage)?;
    let storage: Arc<dyn Storage> = if config.observability.metrics {
        Arc::new(InstrumentedStorage::new(backend))
    } else {
        backend
    };

    // A memory backend starts empty every run, so it is always seeded.
    let seeded = serving || config.storage.backend == "memory";
    if seeded && !matches!(cli.command, Command::Seed { .. }) {
        if let Some(seed_dir) = &config.bootstrap.seed_dir {
            seed_from(storage.as_ref(), Path::new(seed_dir)).await?;
        }
    }

    run(cli.command, storage.as_ref(), &config).await
}

async fn run(command: Command, storage: &dyn Storage, config: &Config) -> anyhow::Result<()> {
    match command {
        Command::Serve => {
            info!("fakestore ready (backend={})", config.storage.backend);
            shutdown_signal().await;
            info!("fakestore shut down");
        }
        Command::Seed { from } => {
            let seed_dir = from
                .or_else(|| config.bootstrap.seed_dir.as_ref().map(PathBuf::from))
                .context("no seed directory: pass --from or set bootstrap.seed_dir")?;
            let count = seed_from(storage, &seed_dir).await?;
            println!("seeded {count} object(s) from {}", seed_dir.display());
        }
        Command::Mb { bucket } => {
            storage.create_bucket(&bucket).await?;
        }
        Command::Buckets => {
            for bucket in storage.list_buckets().await? {
                println!("{bucket}");
            }
        }
        Command::Stat { bucket } => {
            storage.get_bucket(&bucket).await?;
            println!("{bucket}: exists");
        }
        Command::Ls { bucket } => {
            for object in storage.list_objects(&bucket).await? {
                println!("{}\t{}", object.size(), object.name);
            }
        }
        Command::Put {
            bucket,
            name,
            file,
            content_type,
        } => {
            let content = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let mut object = Object::new(bucket, name, content);
            object.content_type = content_type;
            storage.create_object(object).await?;
        }
        Command::Get {
            bucket,
            name,
            output,
        } => {
            let object = storage.get_object(&bucket, &name).await?;
            match output {
                Some(path) => std::fs::write(&path, &object.content)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => std::io::stdout().write_all(&object.content)?,
            }
        }
        Command::Rm { bucket, name } => {
            storage.delete_object(&bucket, &name).await?;
        }
    }
    Ok(())
}

/// Load `seed_dir` and replay it into `storage`.  Any failure here is
/// fatal: a half-seeded emulator cannot serve meaningfully.
async fn seed_from(storage: &dyn Storage, seed_dir: &Path) -> anyhow::Result<usize> {
    info!("Loading objects from {}", seed_dir.display());
    let objects = bootstrap::load_objects(seed_dir)?;
    storage::seed(storage, objects).await
}

/// Initialize tracing.  `RUST_LOG` wins over the configured level.
fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for SIGTERM or SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
