//! Admin Endpoint
//!
//! HTTP sidecar for health checks, host status reporting, and Prometheus
//! metrics. Used by container orchestrators, load balancers, and monitoring
//! systems.
//!
//! The admin server binds its own port so the traffic port carries only the
//! mounted application's routes; the host never injects paths the
//! application did not define.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON host status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (checks serving phase)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::host::{HostPhase, HostState};
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Status Response Types
// =============================================================================

/// Host status response.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Overall status: "healthy", "draining", or "unavailable".
    pub status: ServiceHealth,
    /// Registered service name.
    pub service: String,
    /// Host version.
    pub version: String,
    /// Host uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Lifecycle phase of the host.
    pub phase: HostPhase,
    /// Mount configuration.
    pub mount: MountStatus,
    /// Traffic policy in force.
    pub traffic: TrafficStatus,
    /// Request counters since startup.
    pub requests: RequestStatus,
}

/// Overall host health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    /// Accepting and serving traffic.
    Healthy,
    /// Shutting down; in-flight requests still complete.
    Draining,
    /// Not accepting traffic.
    Unavailable,
}

/// Mount configuration as served.
#[derive(Debug, Clone, Serialize)]
pub struct MountStatus {
    /// Path prefix the application is mounted under.
    pub path: String,
}

/// Traffic policy as enforced.
#[derive(Debug, Clone, Serialize)]
pub struct TrafficStatus {
    /// Per-request processing bound in seconds.
    pub timeout_secs: u64,
    /// Admission bound, absent when unbounded.
    pub max_concurrency: Option<usize>,
}

/// Request counters.
#[derive(Debug, Clone, Serialize)]
pub struct RequestStatus {
    /// Requests observed by the host.
    pub served: u64,
    /// Requests terminated by the traffic timeout.
    pub timed_out: u64,
}

// =============================================================================
// Admin Server
// =============================================================================

/// Admin HTTP server.
pub struct AdminServer {
    port: u16,
    state: Arc<HostState>,
    cancel: CancellationToken,
}

impl AdminServer {
    /// Create a new admin server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HostState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the admin server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `AdminServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), AdminServerError> {
        let app = admin_router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AdminServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Admin server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| AdminServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Admin server stopped");
        Ok(())
    }
}

/// Build the admin router over shared host state.
#[must_use]
pub fn admin_router(state: Arc<HostState>) -> Router {
    Router::new()
        .route("/health", get(status_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn status_handler(State(state): State<Arc<HostState>>) -> impl IntoResponse {
    let response = build_status_response(&state);
    let status_code = match response.status {
        ServiceHealth::Healthy | ServiceHealth::Draining => StatusCode::OK,
        ServiceHealth::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HostState>>) -> impl IntoResponse {
    if state.is_serving() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_status_response(state: &HostState) -> StatusResponse {
    let phase = state.phase();
    let traffic = state.traffic();

    StatusResponse {
        status: health_from_phase(phase),
        service: state.service_name().to_string(),
        version: state.version().to_string(),
        uptime_secs: state.uptime_secs(),
        current_time: Utc::now(),
        phase,
        mount: MountStatus {
            path: state.mount_path().to_string(),
        },
        traffic: TrafficStatus {
            timeout_secs: traffic.timeout.as_secs(),
            max_concurrency: traffic.max_concurrency,
        },
        requests: RequestStatus {
            served: state.requests_served(),
            timed_out: state.requests_timed_out(),
        },
    }
}

const fn health_from_phase(phase: HostPhase) -> ServiceHealth {
    match phase {
        HostPhase::Serving => ServiceHealth::Healthy,
        HostPhase::Draining => ServiceHealth::Draining,
        HostPhase::Starting | HostPhase::Stopped => ServiceHealth::Unavailable,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Admin server errors.
#[derive(Debug, thiserror::Error)]
pub enum AdminServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
