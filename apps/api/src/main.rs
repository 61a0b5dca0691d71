use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use prismvid_api::config::Config;
use prismvid_api::db::create_pool;
use prismvid_api::routes::build_router;
use prismvid_api::sharing::store::PgShareStore;
use prismvid_api::state::AppState;
use prismvid_api::storage::StorageRoot;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("prismvid_api={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting PrismVid API v{} ({})",
        env!("CARGO_PKG_VERSION"),
        config.app_env
    );

    // Initialize PostgreSQL (migrations run on connect)
    let db = create_pool(&config.database_url, config.db_max_connections).await?;

    let storage = StorageRoot::new(config.storage_base_path.clone());
    storage.ensure().await?;
    info!("Storage root: {}", storage.path().display());

    let state = AppState {
        shares: Arc::new(PgShareStore::new(db.clone())),
        db,
        config: config.clone(),
        http: reqwest::Client::new(),
        storage,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
