//! Application Host
//!
//! Turns a [`ServiceRegistration`] into a running service: invokes the
//! application factory exactly once, composes the mount and the traffic
//! gate, and serves the result until cancelled.
//!
//! The host stays out of the application's way. It adds no routes to the
//! traffic port and no response headers; admin endpoints live on their own
//! port (see `infrastructure::admin`). The only response the host ever
//! writes itself is the traffic-timeout 504.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::ports::{AppFactory, BoxError};
use crate::application::registration::ServiceRegistration;
use crate::domain::service::{TrafficPolicy, TrafficPolicyError};
use crate::infrastructure::metrics;
use crate::infrastructure::traffic::{GateTimeout, TrafficGateLayer};

// =============================================================================
// Host Phase
// =============================================================================

/// Lifecycle phase of the host process (not of the mounted application).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostPhase {
    /// Assembled, not yet accepting traffic.
    Starting,
    /// Listener bound and accepting traffic.
    Serving,
    /// Shutdown requested; finishing in-flight requests.
    Draining,
    /// Serve loop has exited.
    Stopped,
}

impl HostPhase {
    /// Phase name for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Serving => "serving",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

// =============================================================================
// Host State
// =============================================================================

/// Shared host state, read by the admin sidecar.
#[derive(Debug)]
pub struct HostState {
    service_name: String,
    mount_path: String,
    version: String,
    traffic: TrafficPolicy,
    started_at: Instant,
    phase: parking_lot::RwLock<HostPhase>,
    requests_served: AtomicU64,
    requests_timed_out: AtomicU64,
}

impl HostState {
    pub(crate) fn new(service_name: String, mount_path: String, traffic: TrafficPolicy) -> Self {
        Self {
            service_name,
            mount_path,
            version: env!("CARGO_PKG_VERSION").to_string(),
            traffic,
            started_at: Instant::now(),
            phase: parking_lot::RwLock::new(HostPhase::Starting),
            requests_served: AtomicU64::new(0),
            requests_timed_out: AtomicU64::new(0),
        }
    }

    /// The registered service name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The mount path the application is served under.
    #[must_use]
    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    /// Host version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The traffic policy in force.
    #[must_use]
    pub const fn traffic(&self) -> TrafficPolicy {
        self.traffic
    }

    /// Host uptime in whole seconds.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> HostPhase {
        *self.phase.read()
    }

    /// Whether the host is accepting traffic.
    #[must_use]
    pub fn is_serving(&self) -> bool {
        self.phase() == HostPhase::Serving
    }

    /// Requests observed by the host since startup.
    #[must_use]
    pub fn requests_served(&self) -> u64 {
        self.requests_served.load(Ordering::Relaxed)
    }

    /// Requests terminated by the traffic timeout since startup.
    #[must_use]
    pub fn requests_timed_out(&self) -> u64 {
        self.requests_timed_out.load(Ordering::Relaxed)
    }

    pub(crate) fn set_phase(&self, phase: HostPhase) {
        *self.phase.write() = phase;
    }

    fn increment_requests(&self) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_timeouts(&self) {
        self.requests_timed_out.fetch_add(1, Ordering::Relaxed);
    }
}

// =============================================================================
// App Host
// =============================================================================

/// A service assembled from a [`ServiceRegistration`] and ready to serve.
#[derive(Debug)]
pub struct AppHost {
    router: Router,
    state: Arc<HostState>,
}

impl AppHost {
    /// Assemble a host from a registration.
    ///
    /// The application factory is invoked here, exactly once, before any
    /// listener exists; no request can be served ahead of it.
    ///
    /// # Errors
    ///
    /// Returns `HostError::InvalidTraffic` if the policy fails validation,
    /// or `HostError::AppBuild` carrying the factory's error unmodified.
    pub fn assemble<F: AppFactory>(
        registration: ServiceRegistration<F>,
    ) -> Result<Self, HostError> {
        let (name, factory, mount_path, traffic) = registration.into_parts();
        traffic.validate()?;

        let app = factory.build().map_err(HostError::AppBuild)?;

        let state = Arc::new(HostState::new(
            name.as_str().to_string(),
            mount_path.as_str().to_string(),
            traffic,
        ));

        // axum forbids nesting at "/": the root mount merges the application
        // router instead, serving every app route at its own path.
        let mounted = if mount_path.is_root() {
            Router::new().merge(app)
        } else {
            Router::new().nest(mount_path.as_str(), app)
        };

        // Last layer added runs first: observation wraps the gate so
        // host-written 504s are recorded like any other response.
        let router = mounted
            .layer(TrafficGateLayer::new(&name, traffic))
            .layer(middleware::from_fn_with_state(
                Arc::clone(&state),
                observe_requests,
            ));

        tracing::info!(
            service = %name,
            mount_path = %mount_path,
            timeout_secs = traffic.timeout.as_secs(),
            max_concurrency = traffic.max_concurrency,
            "Service registered"
        );

        Ok(Self { router, state })
    }

    /// Shared host state, for wiring the admin sidecar.
    #[must_use]
    pub fn state(&self) -> Arc<HostState> {
        Arc::clone(&self.state)
    }

    /// Serve on an already-bound listener until `cancel` fires, then drain.
    ///
    /// # Errors
    ///
    /// Returns `HostError::ServerFailed` if the serve loop ends abnormally.
    pub async fn serve(
        self,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), HostError> {
        let addr = listener
            .local_addr()
            .map_err(|e| HostError::ServerFailed(e.to_string()))?;

        self.state.set_phase(HostPhase::Serving);
        tracing::info!(
            service = %self.state.service_name,
            %addr,
            "Traffic server listening"
        );

        let state = Arc::clone(&self.state);
        let shutdown = async move {
            cancel.cancelled().await;
            state.set_phase(HostPhase::Draining);
            tracing::info!("Traffic server draining");
        };

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| HostError::ServerFailed(e.to_string()))?;

        self.state.set_phase(HostPhase::Stopped);
        tracing::info!("Traffic server stopped");
        Ok(())
    }

    /// Consume the host, returning the composed router.
    ///
    /// For embedding the mounted-and-gated service into an existing axum
    /// server instead of running the host's own serve loop.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Access-log and metrics middleware wrapped around the traffic gate.
async fn observe_requests(
    State(state): State<Arc<HostState>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let request_id = Uuid::new_v4();
    let started = Instant::now();

    let inflight = InflightGuard::acquire(&state.service_name);
    let response = next.run(req).await;
    drop(inflight);

    let elapsed = started.elapsed();
    let status = response.status();

    state.increment_requests();
    if response.extensions().get::<GateTimeout>().is_some() {
        state.increment_timeouts();
    }
    metrics::record_request(
        &state.service_name,
        method.as_str(),
        status.as_u16(),
        elapsed,
    );

    tracing::info!(
        service = %state.service_name,
        %request_id,
        %method,
        path = %path,
        status = status.as_u16(),
        latency_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        "Request completed"
    );

    response
}

/// Inflight-gauge handle: increments on acquire, decrements on drop. A
/// request future dropped mid-flight (client disconnect, reset stream)
/// still runs the decrement.
struct InflightGuard {
    service: String,
}

impl InflightGuard {
    fn acquire(service: &str) -> Self {
        metrics::inflight_inc(service);
        Self {
            service: service.to_string(),
        }
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        metrics::inflight_dec(&self.service);
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Host assembly and serving errors.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The registration's traffic policy failed validation.
    #[error("invalid traffic policy: {0}")]
    InvalidTraffic(#[from] TrafficPolicyError),

    /// The application factory returned an error; carried unmodified.
    #[error("application factory failed: {0}")]
    AppBuild(#[source] BoxError),

    /// Failed to bind the traffic listener.
    #[error("failed to bind {0}: {1}")]
    BindFailed(SocketAddr, String),

    /// The serve loop ended abnormally.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;
    use crate::application::ports;
    use crate::domain::service::{MountPath, ServiceName};

    fn app() -> Router {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .route("/v1/status", get(|| async { "ready" }))
    }

    fn registration(
        factory: impl AppFactory,
    ) -> ServiceRegistration<impl AppFactory> {
        ServiceRegistration::new(ServiceName::parse("host-test").unwrap(), factory)
    }

    #[test]
    fn factory_runs_exactly_once_at_assembly() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let factory = ports::infallible(move || {
            seen.fetch_add(1, Ordering::SeqCst);
            app()
        });

        let host = AppHost::assemble(registration(factory)).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(host.state().phase(), HostPhase::Starting);
    }

    #[test]
    fn factory_error_propagates_unmodified() {
        let factory = || Err::<Router, BoxError>("orchestrator unavailable".into());
        let err = AppHost::assemble(registration(factory)).unwrap_err();

        match &err {
            HostError::AppBuild(source) => {
                assert_eq!(source.to_string(), "orchestrator unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn zero_timeout_policy_is_rejected() {
        let reg = registration(ports::infallible(app)).with_traffic(
            TrafficPolicy::default().with_timeout(std::time::Duration::ZERO),
        );
        let err = AppHost::assemble(reg).unwrap_err();
        assert!(matches!(err, HostError::InvalidTraffic(_)));
    }

    #[tokio::test]
    async fn root_mount_serves_routes_at_their_own_paths() {
        let host = AppHost::assemble(registration(ports::infallible(app))).unwrap();
        let router = host.into_router();

        let response = router
            .oneshot(
                HttpRequest::builder()
                    .uri("/v1/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn prefix_mount_nests_routes() {
        let reg = registration(ports::infallible(app))
            .mount_at(MountPath::parse("/docling").unwrap());
        let router = AppHost::assemble(reg).unwrap().into_router();

        let nested = router
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .uri("/docling/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(nested.status(), StatusCode::OK);

        let bare = router
            .oneshot(
                HttpRequest::builder()
                    .uri("/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(bare.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn state_counts_requests_and_timeouts() {
        let slow = ports::infallible(|| {
            Router::new().route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    "late"
                }),
            )
        });
        let reg = registration(slow).with_traffic(
            TrafficPolicy::default().with_timeout(std::time::Duration::from_millis(20)),
        );
        let host = AppHost::assemble(reg).unwrap();
        let state = host.state();
        let router = host.into_router();

        let response = router
            .oneshot(
                HttpRequest::builder()
                    .uri("/slow")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(state.requests_served(), 1);
        assert_eq!(state.requests_timed_out(), 1);
    }

    #[tokio::test]
    async fn inflight_gauge_recovers_after_abandoned_request() {
        let handle = metrics::init_metrics();

        let slow = ports::infallible(|| {
            Router::new().route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                    "late"
                }),
            )
        });
        let reg = ServiceRegistration::new(ServiceName::parse("gauge-test").unwrap(), slow);
        let router = AppHost::assemble(reg).unwrap().into_router();

        // A disconnecting client drops the request future mid-flight.
        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            router.oneshot(
                HttpRequest::builder()
                    .uri("/slow")
                    .body(Body::empty())
                    .unwrap(),
            ),
        )
        .await;
        assert!(abandoned.is_err());

        let rendered = handle.render();
        assert!(
            rendered.contains(r#"serve_host_inflight_requests{service="gauge-test"} 0"#),
            "inflight gauge did not return to zero: {rendered}"
        );
    }
}
