//! Service Registration
//!
//! Pairs an application factory with the service description the host
//! serves it under: a validated name, a mount path, and a traffic policy.
//! A registration is inert data; nothing runs until a host consumes it.

use crate::application::ports::AppFactory;
use crate::domain::service::{MountPath, ServiceName, TrafficPolicy};

/// A named service registration.
///
/// Defaults to the root mount (`/`) and the default traffic policy
/// (600 second timeout, no admission bound).
///
/// # Example
///
/// ```rust
/// use serve_host::{ports, MountPath, ServiceName, ServiceRegistration, TrafficPolicy};
/// use std::time::Duration;
///
/// # fn create_app() -> axum::Router { axum::Router::new() }
/// let registration = ServiceRegistration::new(
///     ServiceName::parse("docling-serve")?,
///     ports::infallible(create_app),
/// )
/// .mount_at(MountPath::root())
/// .with_traffic(TrafficPolicy::default().with_timeout(Duration::from_secs(600)));
///
/// assert_eq!(registration.name().as_str(), "docling-serve");
/// # Ok::<(), serve_host::ServiceNameError>(())
/// ```
#[derive(Debug)]
pub struct ServiceRegistration<F> {
    name: ServiceName,
    factory: F,
    mount_path: MountPath,
    traffic: TrafficPolicy,
}

impl<F: AppFactory> ServiceRegistration<F> {
    /// Create a registration for `factory` under `name`, mounted at root
    /// with the default traffic policy.
    #[must_use]
    pub fn new(name: ServiceName, factory: F) -> Self {
        Self {
            name,
            factory,
            mount_path: MountPath::root(),
            traffic: TrafficPolicy::default(),
        }
    }

    /// Set the mount path.
    #[must_use]
    pub fn mount_at(mut self, path: MountPath) -> Self {
        self.mount_path = path;
        self
    }

    /// Set the traffic policy.
    #[must_use]
    pub const fn with_traffic(mut self, traffic: TrafficPolicy) -> Self {
        self.traffic = traffic;
        self
    }

    /// The service name.
    #[must_use]
    pub const fn name(&self) -> &ServiceName {
        &self.name
    }

    /// The mount path.
    #[must_use]
    pub const fn mount_path(&self) -> &MountPath {
        &self.mount_path
    }

    /// The traffic policy.
    #[must_use]
    pub const fn traffic(&self) -> TrafficPolicy {
        self.traffic
    }

    /// Decompose into parts, handing the factory to the host.
    pub(crate) fn into_parts(self) -> (ServiceName, F, MountPath, TrafficPolicy) {
        (self.name, self.factory, self.mount_path, self.traffic)
    }
}

// =============================================================================
// Tests
// =============================================================================
