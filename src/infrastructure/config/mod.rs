//! Configuration Module
//!
//! Configuration loading for the serving host.

mod settings;

pub use settings::{ConfigError, HostConfig, ServerSettings, ShutdownSettings};
