//! Application Factory Port
//!
//! The single inbound contract of the host: a zero-argument factory that
//! produces a fully-routed application. The host owns the invocation and
//! performs it exactly once at startup, before any request is served; the
//! `FnOnce`-shaped trait makes a second invocation unrepresentable.
//!
//! The factory is expected to do route registration only. Heavy resource
//! initialization belongs to the application's own startup hooks, not to
//! the factory, so assembling a host stays cheap and deterministic.

use axum::Router;

/// Boxed error type carried across the factory seam.
///
/// Application construction errors are foreign to the host; they pass
/// through unmodified as the source of the host's startup failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A zero-argument factory producing a fully-routed application.
///
/// Implemented for any `FnOnce() -> Result<Router, BoxError>` closure. For
/// factories that cannot fail, wrap with [`infallible`].
pub trait AppFactory {
    /// Build the application, consuming the factory.
    ///
    /// # Errors
    ///
    /// Returns whatever error the application's construction raised; the
    /// host propagates it without catching or retrying.
    fn build(self) -> Result<Router, BoxError>;
}

impl<F> AppFactory for F
where
    F: FnOnce() -> Result<Router, BoxError>,
{
    fn build(self) -> Result<Router, BoxError> {
        self()
    }
}

/// Adapt a factory that cannot fail into an [`AppFactory`].
pub fn infallible<F>(factory: F) -> impl AppFactory
where
    F: FnOnce() -> Router,
{
    move || Ok::<_, BoxError>(factory())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use axum::routing::get;

    use super::*;

    #[test]
    fn closure_factory_builds() {
        let factory = || Ok::<_, BoxError>(Router::new().route("/ping", get(|| async { "pong" })));
        assert!(factory.build().is_ok());
    }

    #[test]
    fn infallible_factory_builds() {
        let factory = infallible(|| Router::new().route("/ping", get(|| async { "pong" })));
        assert!(factory.build().is_ok());
    }

    #[test]
    fn factory_error_passes_through() {
        let factory = || Err::<Router, BoxError>("model weights missing".into());
        let err = factory.build().unwrap_err();
        assert_eq!(err.to_string(), "model weights missing");
    }
}
