//! HTTP server for the Prometheus metrics endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::sync::{Mutex, watch};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::fetcher::DeviceClient;
use crate::registry::SharedRegistry;

/// Cached scrape response. The guarding mutex doubles as the critical
/// section around refresh+render, so concurrent scrapes serialize and a
/// render never mixes values from two fetch cycles.
struct ScrapeCache {
    window: Duration,
    rendered: Option<(Instant, String)>,
}

impl ScrapeCache {
    fn new(window: Duration) -> Self {
        Self {
            window,
            rendered: None,
        }
    }

    /// Return the cached body if it is still inside the window.
    fn fresh(&self) -> Option<String> {
        match &self.rendered {
            Some((at, body)) if at.elapsed() < self.window => Some(body.clone()),
            _ => None,
        }
    }

    fn store(&mut self, body: String) {
        self.rendered = Some((Instant::now(), body));
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    registry: SharedRegistry,
    client: Arc<DeviceClient>,
    cache: Arc<Mutex<ScrapeCache>>,
}

/// Create the HTTP router.
fn create_router(
    registry: SharedRegistry,
    client: Arc<DeviceClient>,
    metrics_path: &str,
    cache_window: Duration,
) -> Router {
    let state = AppState {
        registry,
        client,
        cache: Arc::new(Mutex::new(ScrapeCache::new(cache_window))),
    };

    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the /metrics endpoint.
///
/// Always answers 200 with a valid exposition body; the device status gauge
/// carries health, not the HTTP response code.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let mut cache = state.cache.lock().await;

    let body = match cache.fresh() {
        Some(body) => body,
        None => {
            state.client.refresh(&state.registry).await;
            let body = state.registry.render();
            cache.store(body.clone());
            body
        }
    };

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// Handler for the /ready endpoint.
async fn ready_handler(State(state): State<AppState>) -> Response {
    // Ready once the first scrape cycle has completed, whatever its outcome.
    if state.registry.scrape_count() > 0 {
        (StatusCode::OK, "ready\n").into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "not ready - device not scraped yet\n",
        )
            .into_response()
    }
}

/// HTTP server configuration.
pub struct HttpServer {
    registry: SharedRegistry,
    client: Arc<DeviceClient>,
    listen_addr: SocketAddr,
    metrics_path: String,
    cache_window: Duration,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(
        registry: SharedRegistry,
        client: Arc<DeviceClient>,
        listen_addr: SocketAddr,
        metrics_path: String,
        cache_window: Duration,
    ) -> Self {
        Self {
            registry,
            client,
            listen_addr,
            metrics_path,
            cache_window,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let router = create_router(
            self.registry,
            self.client,
            &self.metrics_path,
            self.cache_window,
        );

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(
            addr = %self.listen_addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
