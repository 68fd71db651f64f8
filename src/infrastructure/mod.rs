//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete serving machinery behind the
//! application layer's registration API.

/// Admin HTTP sidecar (health, readiness, metrics).
pub mod admin;

/// Process composition root (env, telemetry, signals, serve loop).
pub mod bootstrap;

/// Environment configuration.
pub mod config;

/// Host assembly and the traffic serve loop.
pub mod host;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;

/// Traffic policy enforcement middleware.
pub mod traffic;
