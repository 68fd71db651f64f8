//! Host Configuration Settings
//!
//! Configuration types for the serving host, loaded from environment
//! variables. The mounted application's own configuration is none of the
//! host's business; only listener ports and shutdown behavior live here.
//!
//! All variables are optional. A variable that is set but unparseable is an
//! error: the host refuses to start rather than silently falling back to a
//! default the operator did not ask for.

use std::str::FromStr;
use std::time::Duration;

/// Server port settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSettings {
    /// Traffic port carrying the mounted application's routes.
    pub traffic_port: u16,
    /// Admin sidecar port for health and metrics.
    pub admin_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            traffic_port: 3000,
            admin_port: 3001,
        }
    }
}

/// Shutdown settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownSettings {
    /// How long to wait for in-flight requests after a shutdown signal.
    pub grace: Duration,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
        }
    }
}

/// Complete host configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostConfig {
    /// Server port settings.
    pub server: ServerSettings,
    /// Shutdown settings.
    pub shutdown: ShutdownSettings,
}

impl HostConfig {
    /// Create configuration from environment variables.
    ///
    /// Recognized variables, all optional:
    ///
    /// - `SERVE_HOST_PORT` - traffic port (default 3000)
    /// - `SERVE_HOST_ADMIN_PORT` - admin port (default 3001)
    /// - `SERVE_HOST_SHUTDOWN_GRACE_SECS` - drain window (default 30)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable is set but does not
    /// parse, or `ConfigError::PortCollision` if both ports are equal.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let server = ServerSettings {
            traffic_port: parse_env("SERVE_HOST_PORT", defaults.server.traffic_port)?,
            admin_port: parse_env("SERVE_HOST_ADMIN_PORT", defaults.server.admin_port)?,
        };

        let shutdown = ShutdownSettings {
            grace: parse_env("SERVE_HOST_SHUTDOWN_GRACE_SECS", defaults.shutdown.grace.as_secs())
                .map(Duration::from_secs)?,
        };

        let config = Self { server, shutdown };
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::PortCollision` if the traffic and admin ports
    /// are equal; the two servers cannot share a listener. Port 0 is exempt,
    /// each bind gets its own kernel-assigned port.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.server.traffic_port == self.server.admin_port && self.server.traffic_port != 0 {
            return Err(ConfigError::PortCollision(self.server.traffic_port));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable is set but does not parse.
    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// The rejected raw value.
        value: String,
    },
    /// Traffic and admin ports are equal.
    #[error("traffic and admin ports must differ, both are {0}")]
    PortCollision(u16),
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn server_settings_defaults() {
        let settings = ServerSettings::default();
        assert_eq!(settings.traffic_port, 3000);
        assert_eq!(settings.admin_port, 3001);
    }

    #[test]
    fn shutdown_settings_defaults() {
        let settings = ShutdownSettings::default();
        assert_eq!(settings.grace, Duration::from_secs(30));
    }

    #[test]
    fn default_config_validates() {
        assert!(HostConfig::default().validate().is_ok());
    }

    #[test]
    fn colliding_ports_are_rejected() {
        let config = HostConfig {
            server: ServerSettings {
                traffic_port: 8080,
                admin_port: 8080,
            },
            shutdown: ShutdownSettings::default(),
        };
        assert_eq!(config.validate(), Err(ConfigError::PortCollision(8080)));
    }

    #[test]
    fn ephemeral_ports_do_not_collide() {
        let config = HostConfig {
            server: ServerSettings {
                traffic_port: 0,
                admin_port: 0,
            },
            shutdown: ShutdownSettings::default(),
        };
        assert!(config.validate().is_ok());
    }

    #[test_case("3000", Ok(3000); "plain port")]
    #[test_case(" 8443 ", Ok(8443); "whitespace trimmed")]
    #[test_case("0", Ok(0); "zero parses")]
    fn parse_value_accepts(raw: &str, expected: Result<u16, ()>) {
        assert_eq!(parse_value::<u16>("SERVE_HOST_PORT", raw).map_err(|_| ()), expected);
    }

    #[test_case(""; "empty")]
    #[test_case("not-a-port"; "alphabetic")]
    #[test_case("70000"; "out of range")]
    #[test_case("-1"; "negative")]
    fn parse_value_rejects(raw: &str) {
        let err = parse_value::<u16>("SERVE_HOST_PORT", raw).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "SERVE_HOST_PORT".to_string(),
                value: raw.to_string(),
            }
        );
    }
}
