//! Traffic Policy Enforcement
//!
//! A tower layer that wraps the mounted application and enforces the
//! registration's [`TrafficPolicy`] at the host level:
//!
//! - Each request's processing is bounded by the policy timeout. On expiry
//!   the in-flight handler future is dropped and the host answers
//!   `504 Gateway Timeout` on the application's behalf.
//! - When an admission bound is configured, requests over the bound queue
//!   on a semaphore while remaining subject to the same timeout.
//!
//! The gate never touches a response the application produced in time:
//! bodies, status codes, and headers pass through untouched. A completed
//! protocol upgrade (WebSocket handshake) hands the connection to the
//! application; only the upgrade response itself is subject to the bound.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::Semaphore;
use tower::{Layer, Service};

use crate::domain::service::{ServiceName, TrafficPolicy};
use crate::infrastructure::metrics;

// =============================================================================
// Layer
// =============================================================================

/// Tower layer applying a [`TrafficPolicy`] around an inner service.
///
/// All services produced by one layer share a single admission semaphore,
/// so the bound holds across every connection the host accepts.
#[derive(Debug, Clone)]
pub struct TrafficGateLayer {
    shared: Arc<GateShared>,
}

#[derive(Debug)]
struct GateShared {
    service_name: String,
    timeout: Duration,
    admission: Option<Arc<Semaphore>>,
}

impl TrafficGateLayer {
    /// Create a layer enforcing `policy` for the named service.
    #[must_use]
    pub fn new(service_name: &ServiceName, policy: TrafficPolicy) -> Self {
        Self {
            shared: Arc::new(GateShared {
                service_name: service_name.as_str().to_string(),
                timeout: policy.timeout,
                admission: policy
                    .max_concurrency
                    .map(|limit| Arc::new(Semaphore::new(limit))),
            }),
        }
    }
}

impl<S> Layer<S> for TrafficGateLayer {
    type Service = TrafficGate<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TrafficGate {
            inner,
            shared: Arc::clone(&self.shared),
        }
    }
}

// =============================================================================
// Service
// =============================================================================

/// Service produced by [`TrafficGateLayer`].
#[derive(Debug, Clone)]
pub struct TrafficGate<S> {
    inner: S,
    shared: Arc<GateShared>,
}

type GateFuture = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

impl<S> Service<Request> for TrafficGate<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Infallible;
    type Future = GateFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let shared = Arc::clone(&self.shared);
        // Swap in the clone and drive the instance that was polled ready.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let processed = tokio::time::timeout(shared.timeout, async {
                let _permit = match shared.admission.as_ref() {
                    Some(semaphore) => match Arc::clone(semaphore).acquire_owned().await {
                        Ok(permit) => Some(permit),
                        // The semaphore is never closed; admit if it ever is.
                        Err(_) => None,
                    },
                    None => None,
                };
                inner.call(req).await
            })
            .await;

            match processed {
                Ok(result) => result,
                Err(_elapsed) => {
                    metrics::record_request_timeout(&shared.service_name);
                    tracing::warn!(
                        service = %shared.service_name,
                        timeout_secs = shared.timeout.as_secs(),
                        "Request exceeded traffic timeout"
                    );
                    Ok(timeout_response(&shared.service_name, shared.timeout))
                }
            }
        })
    }
}

/// Response-extension marker identifying a 504 the gate itself produced,
/// as opposed to one the application returned. Extensions are in-process
/// metadata and never reach the wire.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GateTimeout;

fn timeout_response(service: &str, timeout: Duration) -> Response {
    let body = format!(
        "{service}: request processing exceeded the {}s traffic timeout",
        timeout.as_secs()
    );
    let mut response = (StatusCode::GATEWAY_TIMEOUT, body).into_response();
    response.extensions_mut().insert(GateTimeout);
    response
}

// =============================================================================
// Tests
// =============================================================================
