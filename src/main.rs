use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use docvault::config::{DEFAULT_DATABASE_NAME, DEFAULT_MAX_UPLOAD_BYTES, ServerConfig};
use docvault::records::ensure_indexes;
use docvault::server::{AppState, create_router};
use docvault::store::StoreProvider;

#[derive(Parser)]
#[command(name = "docvault")]
#[command(about = "A document and file storage API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StorageArgs {
    /// Directory holding the database file
    #[arg(long, env = "DOCVAULT_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Database name; the file is <data-dir>/<name>.db
    #[arg(long, env = "DOCVAULT_DB_NAME", default_value = DEFAULT_DATABASE_NAME)]
    database_name: String,

    /// Use the disposable <name>_test database with a resettable store provider
    #[arg(long, env = "DOCVAULT_TESTING")]
    testing: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and its indexes, then exit
    Init {
        #[command(flatten)]
        storage: StorageArgs,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, env = "DOCVAULT_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, env = "DOCVAULT_PORT", default_value = "8080")]
        port: u16,

        /// Largest accepted request body, in bytes
        #[arg(long, env = "DOCVAULT_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
        max_upload_bytes: usize,

        #[command(flatten)]
        storage: StorageArgs,
    },
}

/// Initializes the provider and makes sure the storage indexes exist.
fn open_provider(config: &ServerConfig) -> anyhow::Result<Arc<StoreProvider>> {
    let provider = Arc::new(if config.testing {
        StoreProvider::for_tests()
    } else {
        StoreProvider::new()
    });
    provider.initialize(config.store_config());
    ensure_indexes(provider.get_store()?.as_ref())?;
    Ok(provider)
}

fn run_init(config: ServerConfig) -> anyhow::Result<()> {
    let provider = open_provider(&config)?;
    provider.reset();

    println!("Database ready at {}", config.store_config().db_path().display());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    let provider = open_provider(&config)?;
    let addr = config.socket_addr()?;

    let state = Arc::new(AppState::new(Arc::clone(&provider), config)?);
    let app = create_router(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    provider.reset();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("docvault=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { storage } => run_init(ServerConfig {
            data_dir: storage.data_dir,
            database_name: storage.database_name,
            testing: storage.testing,
            ..ServerConfig::default()
        }),
        Commands::Serve {
            host,
            port,
            max_upload_bytes,
            storage,
        } => {
            run_serve(ServerConfig {
                host,
                port,
                data_dir: storage.data_dir,
                database_name: storage.database_name,
                testing: storage.testing,
                max_upload_bytes,
                ..ServerConfig::default()
            })
            .await
        }
    }
}
