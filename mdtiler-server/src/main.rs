use anyhow::Result;
use clap::Parser;
use mdtiler_server::{
    AppState, CachedDatasetReader, DatasetCacheStore, FileSystemOpener, ServerConfig,
    create_router, init_metrics,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "mdtiler-server", about = "Tile server for multidimensional datasets")]
struct Args {
    /// Path to a YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the configured bind port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    config.apply_env();
    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("Starting mdtiler server v{}", env!("CARGO_PKG_VERSION"));

    init_metrics();

    // Composition root: the store is built once and handed to the reader
    let store = Arc::new(DatasetCacheStore::new(&config.cache));
    let opener = Arc::new(FileSystemOpener::new());
    let reader = Arc::new(CachedDatasetReader::new(
        store.clone(),
        opener,
        &config.cache,
    ));

    let state = AppState {
        reader,
        store,
        settings: config.api.clone(),
    };
    let app = create_router(state);

    let addr = config.server_addr();
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
