//! HTTP surface of the cache
//!
//! ```text
//! GET /{code}
//!   validate_code   4-6 digits, else 404
//!   serve_cached    cached bytes on hit
//!   serve_code      aggregate, written through CachingWriter
//! ```

pub mod handler;
pub mod interceptor;
pub mod middleware;

use axum::routing::get;
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;

use crate::cache::ExpiringCache;
use crate::cli::ServerConfig;
use crate::data::{Aggregator, FetchError, UpstreamClient};

pub use interceptor::{BufferedResponse, CachingWriter, ResponseSink};

/// Errors that stop the server from starting or running
#[derive(Debug, Error)]
pub enum ServerError {
    /// The upstream client could not be built
    #[error("failed to build upstream client: {0}")]
    Client(#[from] FetchError),

    /// Binding or serving failed
    #[error("server io error: {0}")]
    Io(#[from] std::io::Error),
}

/// State shared by every request: the response cache and the aggregator
#[derive(Debug, Clone)]
pub struct AppState {
    pub cache: Arc<ExpiringCache>,
    pub aggregator: Aggregator,
}

impl AppState {
    pub fn new(cache: ExpiringCache, aggregator: Aggregator) -> Self {
        Self {
            cache: Arc::new(cache),
            aggregator,
        }
    }

    /// Builds the cache and upstream client described by `config`
    pub fn from_config(config: &ServerConfig) -> Result<Self, FetchError> {
        let client = UpstreamClient::new(&config.upstream_url, config.upstream_timeout)?;
        Ok(Self::new(ExpiringCache::new(config.cache_ttl), Aggregator::new(client)))
    }
}

/// Build the router; the layer added last runs first
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/:code", get(handler::serve_code))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::serve_cached,
        ))
        .route_layer(axum::middleware::from_fn(middleware::validate_code))
        .fallback(middleware::not_found)
        .with_state(state)
}

/// Serve on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Build state from `config`, bind and serve until SIGINT/SIGTERM
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let state = AppState::from_config(&config)?;

    let listener = TcpListener::bind(config.addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        upstream = %state.aggregator.client().base_url(),
        ttl_secs = state.cache.ttl().as_secs(),
        "server listening"
    );

    serve(listener, state, shutdown_signal()).await?;
    tracing::info!("server stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
