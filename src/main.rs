use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, RestConfig};
use meditache_core::constants::ATTACHMENTS_COLLECTION;
use meditache_core::{CoreConfig, FileStore, Store};
use meditache_files::FilesService;

/// Main entry point for the Meditache service
///
/// Loads configuration from the environment (and `.env`), opens the file-backed store and
/// serves the REST API.
///
/// # Environment Variables
/// - `MEDITACHE_DATA_DIR`: record storage directory (default: "meditache_data")
/// - `MEDITACHE_UPLOADS_DIR`: attachment storage directory (default: "uploads")
/// - `API_HOST`: bind host (default: "0.0.0.0")
/// - `API_PORT`: bind port (default: 5550)
/// - `CORS_ORIGINS`: comma-separated allowed origins (default: any origin)
/// - `API_KEY`: when set, every request must carry it in `x-api-key`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("meditache=info".parse()?)
                .add_directive("meditache_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let env = |name: &str| std::env::var(name).ok();

    let core_config = CoreConfig::from_env_values(env("MEDITACHE_DATA_DIR"), env("MEDITACHE_UPLOADS_DIR"))?;
    core_config.ensure_directories()?;

    let rest_config = RestConfig::from_env_values(
        env("API_HOST"),
        env("API_PORT"),
        env("CORS_ORIGINS"),
        env("API_KEY"),
    )?;

    let store: Arc<dyn Store> = Arc::new(FileStore::open(core_config.data_dir())?);
    let files = FilesService::new(core_config.uploads_dir(), ATTACHMENTS_COLLECTION)?;

    let addr = rest_config.bind_addr();
    tracing::info!("++ Data directory: {}", core_config.data_dir().display());
    tracing::info!("++ Uploads directory: {}", core_config.uploads_dir().display());
    if rest_config.api_key.is_none() {
        tracing::warn!("API_KEY is not set; only actor headers are checked");
    }
    tracing::info!("++ Starting Meditache REST on {}", addr);

    let app = api_rest::router(AppState::new(store, files, rest_config));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
