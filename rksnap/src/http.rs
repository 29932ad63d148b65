use std::net::SocketAddr;

use anyhow::Context;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::info;

const SERVICE_NAME: &str = "rksnap";
const SERVICE_DESCRIPTION: &str =
    "rksnap handles snapshot creation/deletion on GCE for a given set of disks";
const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub fn router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .route("/__/health", get(health))
        .route("/__/ready", get(ready))
        .with_state(handle)
}

pub async fn serve(addr: SocketAddr, handle: PrometheusHandle) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not bind HTTP endpoints on {addr}"))?;
    serve_on(listener, handle).await
}

pub async fn serve_on(listener: TcpListener, handle: PrometheusHandle) -> anyhow::Result<()> {
    info!("serving HTTP endpoints on {}", listener.local_addr()?);
    axum::serve(listener, router(handle))
        .await
        .context("HTTP endpoints stopped")
}

async fn render_metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)],
        handle.render(),
    )
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "name": SERVICE_NAME,
        "description": SERVICE_DESCRIPTION,
        "health": "healthy",
        "checks": [{"name": "running", "health": "healthy", "output": "service is running"}],
    }))
}

async fn ready() -> Json<serde_json::Value> {
    Json(json!({ "name": SERVICE_NAME, "ready": true }))
}
