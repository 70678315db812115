// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use quiz_runtime::{
    catalog::Catalog,
    config::Config,
    routes,
    state::AppState,
    store::{AttemptStore, MemoryAttemptStore, SqliteAttemptStore},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (.env included)
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "quiz-runtime.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let catalog = match &config.seed_file {
        Some(path) => {
            tracing::info!("Loading catalog from {}", path.display());
            Catalog::load_seed_file(path).await?
        }
        None => Catalog::with_default_categories(),
    };

    let store = connect_store(&config).await?;

    let state = AppState::new(Arc::new(catalog), store, config.clone());
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

/// SQLite when `DATABASE_URL` is set, process memory otherwise.
async fn connect_store(config: &Config) -> Result<Arc<dyn AttemptStore>, Box<dyn std::error::Error>> {
    let Some(url) = &config.database_url else {
        tracing::info!("DATABASE_URL not set, attempts are kept in memory");
        return Ok(Arc::new(MemoryAttemptStore::new()));
    };

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let store = loop {
        match SqliteAttemptStore::connect(url).await {
            Ok(store) => break store,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    return Err(format!("Failed to connect to database after 5 retries: {}", e).into());
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };
    tracing::info!("Database connected...");

    tracing::info!("Running migrations...");
    store.migrate().await?;
    tracing::info!("Migrations applied successfully.");

    Ok(Arc::new(store))
}
