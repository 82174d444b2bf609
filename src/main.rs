// src/main.rs

use std::{net::SocketAddr, sync::Arc, time::Duration};

use quiz_portal::{
    cache::{MemoryCache, SharedCache},
    config::{Config, StoreSettings},
    routes,
    state::AppState,
    store::{Collection, JsonFileStore, RecordStore, RemoteStore, SharedStore, StoreError},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load configuration from environment (.env included)
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
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

    // Open the record store with retry
    let store = match open_store(&config).await {
        Some(store) => store,
        None => {
            tracing::error!("Record store could not be opened, shutting down");
            return;
        }
    };

    let cache: SharedCache = match &config.cache_path {
        Some(path) => {
            tracing::info!("Local cache persisted to {}", path.display());
            Arc::new(MemoryCache::persistent(path).await)
        }
        None => Arc::new(MemoryCache::new()),
    };

    let state = AppState::new(store, cache, config.clone());

    // Create the Axum application router
    let app = routes::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}

/// Builds the configured store and checks it up to five times, two seconds
/// apart. A remote store that never answers is still returned so reads fall
/// back; a local file that cannot be loaded is fatal.
async fn open_store(config: &Config) -> Option<SharedStore> {
    let mut retry_count = 0;
    loop {
        let attempt: Result<SharedStore, StoreError> = match &config.store {
            StoreSettings::Path(path) => JsonFileStore::open(path)
                .await
                .map(|store| Arc::new(store) as SharedStore),
            StoreSettings::Remote(url) => match RemoteStore::new(url.clone()) {
                Ok(store) => {
                    let store: SharedStore = Arc::new(store);
                    match store.list(Collection::Subjects, None).await {
                        Ok(_) => Ok(store),
                        Err(e) if retry_count >= 5 => {
                            tracing::warn!("Record store at {} still unreachable: {}", url, e);
                            return Some(store);
                        }
                        Err(e) => Err(e),
                    }
                }
                Err(e) => {
                    tracing::error!("Unusable STORE_URL: {}", e);
                    return None;
                }
            },
        };

        match attempt {
            Ok(store) => {
                tracing::info!("Record store ready...");
                return Some(store);
            }
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    tracing::error!("Failed to open record store after 5 retries: {}", e);
                    return None;
                }
                tracing::warn!("Record store not ready, retrying in 2s... (Attempt {}): {}", retry_count, e);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
