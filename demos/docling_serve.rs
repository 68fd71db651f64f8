//! Docling Serve Demo
//!
//! Hosts a stand-in document-conversion application the way the production
//! deployment does: registered as `docling-serve`, mounted at `/`, with a
//! ten-minute traffic timeout for long-running conversions. The real
//! deployment passes its own application factory; everything below
//! `create_app` is unchanged.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example docling-serve
//! ```
//!
//! # Environment Variables
//!
//! All optional:
//! - `SERVE_HOST_PORT`: Traffic port (default: 3000)
//! - `SERVE_HOST_ADMIN_PORT`: Admin port for health/metrics (default: 3001)
//! - `SERVE_HOST_SHUTDOWN_GRACE_SECS`: Drain window (default: 30)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `RUST_LOG`: Log level (default: info)

use std::time::Duration;

use axum::extract::Path;
use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::SinkExt;
use serde_json::{Value, json};

use serve_host::{ServiceName, ServiceRegistration, TrafficPolicy, bootstrap, ports};

/// Build the application. Route registration only; a real conversion
/// backend would initialize its heavy resources in its own startup hooks.
fn create_app() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/convert/source", post(convert_source))
        .route("/v1/status/poll/{task_id}", get(poll_status))
        .route("/v1/status/ws/{task_id}", get(status_ws))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn convert_source(Json(request): Json<Value>) -> Json<Value> {
    let sources = request
        .get("sources")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    Json(json!({
        "status": "completed",
        "sources": sources,
        "document": { "md_content": "# Converted document\n" },
    }))
}

async fn poll_status(Path(task_id): Path<String>) -> Json<Value> {
    Json(json!({ "task_id": task_id, "task_status": "success" }))
}

async fn status_ws(Path(task_id): Path<String>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |mut socket| async move {
        for state in ["started", "success"] {
            let update = json!({ "task_id": task_id, "task_status": state }).to_string();
            if socket.send(Message::Text(update.into())).await.is_err() {
                return;
            }
        }
        let _ = socket.close().await;
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registration = ServiceRegistration::new(
        ServiceName::parse("docling-serve")?,
        ports::infallible(create_app),
    )
    .with_traffic(TrafficPolicy::default().with_timeout(Duration::from_secs(600)));

    bootstrap::run(registration).await?;
    Ok(())
}
