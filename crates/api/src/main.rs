//! API server entry point.

use std::sync::Arc;

use api::AppState;
use api::config::{Config, LogFormat};
use doc_store::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore, StoreError, TimeoutStore};
use domain::LoggingNotifier;
use metrics_exporter_prometheus::{BuildError, PrometheusHandle};
use thiserror::Error;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Failures that stop the server from starting or running.
#[derive(Debug, Error)]
enum ServerError {
    #[error("failed to install Prometheus recorder: {0}")]
    Metrics(#[from] BuildError),

    #[error("failed to open the document store: {0}")]
    Store(#[from] StoreError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Serves the API over `store` until a shutdown signal arrives.
async fn serve<S: DocumentStore + Clone + 'static>(
    config: &Config,
    store: S,
    metrics_handle: PrometheusHandle,
) -> Result<(), ServerError> {
    let store = TimeoutStore::new(store, config.store_timeout);
    let state = Arc::new(AppState::new(
        store,
        Arc::new(LoggingNotifier),
        config.session_cookie.clone(),
    ));
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Open the store and serve
    let result = match config.database_url.as_deref() {
        Some(url) => {
            tracing::info!(timeout = ?config.store_timeout, "using PostgreSQL document store");
            let store = PostgresDocumentStore::connect(url).await?;
            store.run_migrations().await?;
            serve(&config, store, metrics_handle).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set; data is kept in memory only");
            serve(&config, InMemoryDocumentStore::new(), metrics_handle).await
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "server stopped with an error");
    } else {
        tracing::info!("server shut down gracefully");
    }
    result
}
