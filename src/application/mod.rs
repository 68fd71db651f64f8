//! Application Layer - Hosting contracts and registration composition.
//!
//! This layer defines how an externally built application reaches the host:
//! the factory port it must satisfy and the registration that pairs a
//! factory with a service description.

/// The application factory port consumed by the host.
pub mod ports;

/// Named service registrations binding factories to mount points.
pub mod registration;
