#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Serve Host - Web Application Serving Adapter
//!
//! A thin hosting layer that mounts a pre-built axum application onto a
//! production serving process. The application is built by a factory the
//! host invokes exactly once; the host contributes the listener, a traffic
//! policy (per-request timeout, optional admission bound), an admin sidecar
//! for health and metrics, and graceful shutdown. It adds no routes to the
//! traffic port and rewrites no responses.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Service description types with no external dependencies
//!   - `service`: Service name, mount path, traffic policy
//!
//! - **Application**: Registration API and port definitions
//!   - `ports`: The application factory seam
//!   - `registration`: Binding a name, factory, mount, and policy together
//!
//! - **Infrastructure**: Serving machinery
//!   - `host`: Factory invocation, mount composition, the serve loop
//!   - `traffic`: Timeout and admission enforcement middleware
//!   - `admin`: Health/readiness/metrics sidecar
//!   - `config`: Environment configuration
//!   - `bootstrap`: Process composition root
//!
//! # Request Flow
//!
//! ```text
//!            ┌──────────────┐    ┌──────────────┐    ┌─────────────────┐
//! Client ───►│   Observer   │───►│ Traffic Gate │───►│  Mounted App    │
//!            │ (log/metrics)│    │ (timeout/cap)│    │ (factory-built) │
//!            └──────────────┘    └──────────────┘    └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use axum::{Router, routing::get};
//! use serve_host::{ServiceName, ServiceRegistration, bootstrap, ports};
//!
//! fn create_app() -> Router {
//!     Router::new().route("/health", get(|| async { "ok" }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registration = ServiceRegistration::new(
//!         ServiceName::parse("docling-serve")?,
//!         ports::infallible(create_app),
//!     );
//!     bootstrap::run(registration).await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Service description types with no external dependencies.
pub mod domain;

/// Application layer - Registration API and port definitions.
pub mod application;

/// Infrastructure layer - Serving machinery.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::service::{
    DEFAULT_TRAFFIC_TIMEOUT, MAX_SERVICE_NAME_LEN, MountPath, MountPathError, ServiceName,
    ServiceNameError, TrafficPolicy, TrafficPolicyError,
};

// Application registration surface
pub use application::ports;
pub use application::ports::{AppFactory, BoxError};
pub use application::registration::ServiceRegistration;

// Host (for embedding and integration tests)
pub use infrastructure::host::{AppHost, HostError, HostPhase, HostState};

// Traffic enforcement (for embedding into an existing router)
pub use infrastructure::traffic::TrafficGateLayer;

// Admin sidecar
pub use infrastructure::admin::{AdminServer, AdminServerError, admin_router};

// Infrastructure config
pub use infrastructure::config::{ConfigError, HostConfig, ServerSettings, ShutdownSettings};

// Bootstrap
pub use infrastructure::bootstrap::{self, BootstrapError};

// Metrics
pub use infrastructure::metrics::{get_metrics_handle, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
