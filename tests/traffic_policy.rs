//! Traffic Policy Integration Tests
//!
//! Exercises the host-enforced processing bound at its exact boundary
//! using tokio's paused clock, so ten-minute timeouts cost no wall time.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use tower::ServiceExt;

use serve_host::{AppFactory, AppHost, ServiceName, ServiceRegistration, TrafficPolicy, ports};

/// Application whose handler completes after a caller-chosen delay.
fn delayed_app(delay: Duration) -> impl AppFactory {
    ports::infallible(move || {
        Router::new().route(
            "/work",
            get(move || async move {
                tokio::time::sleep(delay).await;
                "finished"
            }),
        )
    })
}

fn host(factory: impl AppFactory, traffic: TrafficPolicy) -> AppHost {
    let registration =
        ServiceRegistration::new(ServiceName::parse("docling-serve").unwrap(), factory)
            .with_traffic(traffic);
    AppHost::assemble(registration).unwrap()
}

async fn get_work(router: Router) -> (StatusCode, String) {
    let response = router
        .oneshot(Request::builder().uri("/work").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

// =============================================================================
// Default Boundary Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_request_under_default_budget_completes() {
    let router = host(
        delayed_app(Duration::from_secs(599)),
        TrafficPolicy::default(),
    )
    .into_router();

    let (status, body) = get_work(router).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "finished");
}

#[tokio::test(start_paused = true)]
async fn test_request_over_default_budget_is_terminated() {
    let router = host(
        delayed_app(Duration::from_secs(601)),
        TrafficPolicy::default(),
    )
    .into_router();

    let (status, body) = get_work(router).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(body.contains("docling-serve"), "body was: {body}");
    assert!(body.contains("600"), "body was: {body}");
}

#[tokio::test(start_paused = true)]
async fn test_custom_budget_moves_the_boundary() {
    let policy = TrafficPolicy::default().with_timeout(Duration::from_secs(5));

    let fast = host(delayed_app(Duration::from_secs(4)), policy).into_router();
    let (status, _) = get_work(fast).await;
    assert_eq!(status, StatusCode::OK);

    let slow = host(delayed_app(Duration::from_secs(6)), policy).into_router();
    let (status, body) = get_work(slow).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(body.contains("5s"), "body was: {body}");
}

// =============================================================================
// Attribution Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_application_504_is_not_mistaken_for_host_timeout() {
    let app = ports::infallible(|| {
        Router::new().route(
            "/work",
            get(|| async { (StatusCode::GATEWAY_TIMEOUT, "the app's own 504 body") }),
        )
    });
    let host = host(app, TrafficPolicy::default());
    let state = host.state();

    let (status, body) = get_work(host.into_router()).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body, "the app's own 504 body");

    // The host only counts timeouts it produced itself.
    assert_eq!(state.requests_served(), 1);
    assert_eq!(state.requests_timed_out(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_host_timeout_is_counted() {
    let host = host(
        delayed_app(Duration::from_secs(10)),
        TrafficPolicy::default().with_timeout(Duration::from_secs(1)),
    );
    let state = host.state();

    let (status, _) = get_work(host.into_router()).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(state.requests_timed_out(), 1);
}

// =============================================================================
// Admission Bound Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_admission_bound_queues_rather_than_rejects() {
    let policy = TrafficPolicy::default()
        .with_timeout(Duration::from_secs(600))
        .with_max_concurrency(1);
    let router = host(delayed_app(Duration::from_secs(10)), policy).into_router();

    let first = tokio::spawn(get_work(router.clone()));
    let second = tokio::spawn(get_work(router));

    let (first, second) = (first.await.unwrap(), second.await.unwrap());
    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_queue_wait_counts_against_the_budget() {
    // One slot, both requests need 400s of work: the queued request spends
    // 400s waiting plus 400s working and crosses its 600s budget.
    let policy = TrafficPolicy::default()
        .with_timeout(Duration::from_secs(600))
        .with_max_concurrency(1);
    let router = host(delayed_app(Duration::from_secs(400)), policy).into_router();

    let first = tokio::spawn(get_work(router.clone()));
    tokio::task::yield_now().await;
    let second = tokio::spawn(get_work(router));

    let (first, second) = (first.await.unwrap(), second.await.unwrap());
    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::GATEWAY_TIMEOUT);
}
