//! HTTP endpoints for probes and introspection.
//!
//! - Probe server: `/healthz` (alive while the process runs), `/readyz`
//!   (200 once the manager has started its controller loops)
//! - Metrics server: `/metrics` (Prometheus text), `/controllers` (JSON
//!   snapshot of the registry)

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use kubeplug_core::{ControllerInfo, ControllerRegistry, Manager};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// What the handlers read from
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<Manager>,
    pub registry: Arc<ControllerRegistry>,
}

pub fn probe_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
}

pub fn metrics_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/controllers", get(controllers))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.manager.is_started() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let mut body = state.manager.stats().snapshot().to_prometheus();
    let name = "kubeplug_controllers_registered";
    let _ = writeln!(body, "# HELP {name} Controllers in the registry");
    let _ = writeln!(body, "# TYPE {name} gauge");
    let _ = writeln!(body, "{name} {}", state.registry.len());

    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body)
}

async fn controllers(State(state): State<AppState>) -> Json<Vec<ControllerInfo>> {
    Json(state.registry.snapshot())
}

/// Bind the listener for the `name` server
pub async fn bind(name: &'static str, addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {name} server to {addr}"))
}

/// Serve `router` on `listener` until `shutdown` is cancelled
pub async fn serve(
    name: &'static str,
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(server = name, %addr, "Listening");
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .with_context(|| format!("{name} server failed"))
}
