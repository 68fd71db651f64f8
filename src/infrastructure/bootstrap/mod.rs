//! Host Bootstrap
//!
//! Composition root for running a registered service as a process: loads
//! environment configuration, initializes telemetry and metrics, assembles
//! the host, starts the admin sidecar, and serves until a shutdown signal
//! arrives.
//!
//! # Usage
//!
//! ```ignore
//! use serve_host::{ServiceName, ServiceRegistration, bootstrap, ports};
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

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::application::ports::AppFactory;
use crate::application::registration::ServiceRegistration;
use crate::infrastructure::admin::AdminServer;
use crate::infrastructure::config::{ConfigError, HostConfig};
use crate::infrastructure::host::{AppHost, HostError, HostPhase};
use crate::infrastructure::metrics::init_metrics;
use crate::infrastructure::telemetry::{self, TelemetryConfig};

/// Bootstrap errors.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Environment configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Host assembly or serving failed.
    #[error("host error: {0}")]
    Host(#[from] HostError),
}

/// Run a registered service as a full process.
///
/// Loads `.env`, initializes telemetry and metrics, reads [`HostConfig`]
/// from the environment, and serves until SIGTERM or Ctrl+C. Traces are
/// attributed to the registered service unless `OTEL_SERVICE_NAME` says
/// otherwise.
///
/// # Errors
///
/// Returns `BootstrapError` if configuration is invalid or the host fails
/// to assemble, bind, or serve.
pub async fn run<F: AppFactory>(
    registration: ServiceRegistration<F>,
) -> Result<(), BootstrapError> {
    load_dotenv();

    let mut telemetry_config = TelemetryConfig::from_env();
    if !TelemetryConfig::service_name_overridden() {
        telemetry_config.service_name = registration.name().to_string();
    }
    let _telemetry_guard = telemetry::init_with_config(telemetry_config);

    tracing::info!(service = %registration.name(), "Starting serving host");

    let _metrics_handle = init_metrics();

    let config = HostConfig::from_env()?;
    log_config(&config);

    let shutdown = CancellationToken::new();
    let signal_shutdown = shutdown.clone();
    let grace = config.shutdown.grace;
    tokio::spawn(async move {
        await_shutdown(signal_shutdown, grace).await;
    });

    run_with_shutdown(registration, config, shutdown).await?;

    tracing::info!("Serving host stopped");
    Ok(())
}

/// Run a registered service until the given token is cancelled.
///
/// Assumes telemetry and metrics are already initialized (or intentionally
/// absent). The admin sidecar runs on its own port for the lifetime of the
/// serve loop. After cancellation, in-flight requests get the configured
/// grace window to finish; once it elapses the host stops waiting and
/// returns, leaving still-open connections behind (under [`run`] the
/// process exits shortly after).
///
/// # Errors
///
/// Returns `BootstrapError` if configuration is invalid or the host fails
/// to assemble, bind, or serve.
pub async fn run_with_shutdown<F: AppFactory>(
    registration: ServiceRegistration<F>,
    config: HostConfig,
    shutdown: CancellationToken,
) -> Result<(), BootstrapError> {
    config.validate()?;

    let host = AppHost::assemble(registration)?;

    let admin = AdminServer::new(config.server.admin_port, host.state(), shutdown.clone());
    tokio::spawn(async move {
        if let Err(e) = admin.run().await {
            tracing::error!(error = %e, "Admin server error");
        }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.traffic_port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| HostError::BindFailed(addr, e.to_string()))?;

    serve_with_drain_cap(host, listener, shutdown, config.shutdown.grace).await?;
    Ok(())
}

/// Serve until shutdown, waiting at most `grace` past cancellation.
///
/// Dropping the serve future stops the listener and stops waiting;
/// connection tasks already spawned are left to finish on their own.
async fn serve_with_drain_cap(
    host: AppHost,
    listener: TcpListener,
    shutdown: CancellationToken,
    grace: Duration,
) -> Result<(), HostError> {
    let state = host.state();
    let drain_cap = {
        let shutdown = shutdown.clone();
        async move {
            shutdown.cancelled().await;
            tokio::time::sleep(grace).await;
        }
    };

    tokio::select! {
        result = host.serve(listener, shutdown) => result,
        () = drain_cap => {
            state.set_phase(HostPhase::Stopped);
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "Drain window elapsed, abandoning remaining connections"
            );
            Ok(())
        }
    }
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &HostConfig) {
    tracing::info!(
        traffic_port = config.server.traffic_port,
        admin_port = config.server.admin_port,
        shutdown_grace_secs = config.shutdown.grace.as_secs(),
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken, grace: Duration) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(grace_secs = grace.as_secs(), "Graceful shutdown started");
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::routing::get;

    use super::*;
    use crate::application::ports;
    use crate::domain::service::ServiceName;
    use crate::infrastructure::config::{ServerSettings, ShutdownSettings};

    fn registration() -> ServiceRegistration<impl AppFactory> {
        ServiceRegistration::new(
            ServiceName::parse("bootstrap-test").unwrap(),
            ports::infallible(|| Router::new().route("/ping", get(|| async { "pong" }))),
        )
    }

    fn ephemeral_config() -> HostConfig {
        HostConfig {
            server: ServerSettings {
                traffic_port: 0,
                admin_port: 0,
            },
            shutdown: ShutdownSettings {
                grace: Duration::from_secs(5),
            },
        }
    }

    #[tokio::test]
    async fn run_with_shutdown_drains_cleanly_on_cancel() {
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_with_shutdown(
            registration(),
            ephemeral_config(),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("shutdown exceeded the grace window")
            .expect("serve task panicked");
        assert!(result.is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drain_cap_stops_waiting_for_stragglers() {
        let slow = ports::infallible(|| {
            Router::new().route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    "late"
                }),
            )
        });
        let reg = ServiceRegistration::new(ServiceName::parse("bootstrap-test").unwrap(), slow);
        let host = AppHost::assemble(reg).unwrap();
        let state = host.state();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();

        let serving = tokio::spawn(serve_with_drain_cap(
            host,
            listener,
            shutdown.clone(),
            Duration::from_millis(200),
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Park a request on the slow handler so the drain never finishes.
        let straggler =
            tokio::spawn(async move { reqwest::get(format!("http://{addr}/slow")).await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), serving)
            .await
            .expect("drain cap did not stop the serve loop")
            .expect("serve task panicked");
        assert!(result.is_ok());
        assert_eq!(state.phase(), HostPhase::Stopped);

        straggler.abort();
    }

    #[tokio::test]
    async fn colliding_ports_fail_before_binding() {
        let config = HostConfig {
            server: ServerSettings {
                traffic_port: 9099,
                admin_port: 9099,
            },
            shutdown: ShutdownSettings::default(),
        };

        let err = run_with_shutdown(registration(), config, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Config(ConfigError::PortCollision(9099))
        ));
    }
}
