//! Domain Layer - Core hosting types and validation logic.
//!
//! This layer contains the value types that describe a hosted service
//! (name, mount path, traffic policy) with no serving dependencies.

/// Service identity, mount path, and traffic policy types.
pub mod service;
