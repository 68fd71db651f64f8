//! Service Description Types
//!
//! Domain types for describing a hosted service: its name, the path prefix
//! it is mounted under, and the traffic policy the host enforces around it.
//! All types validate on construction so the serving layer never sees a
//! malformed description.
//!
//! # Design
//!
//! - `ServiceName` is restricted to a DNS-label-like alphabet because it is
//!   reused as a logging field, a metrics label, and an admin payload value.
//! - `MountPath` is stored normalized (no trailing slash except root) so
//!   mount composition never has to re-handle `/api` vs `/api/`.
//! - `TrafficPolicy` carries the per-request processing bound and an
//!   optional admission bound; both are host-level settings, not application
//!   settings.

use std::fmt;
use std::time::Duration;

// =============================================================================
// Service Name
// =============================================================================

/// Maximum length of a service name, matching DNS label limits.
pub const MAX_SERVICE_NAME_LEN: usize = 63;

/// Validated service identifier.
///
/// Names are 1-63 characters drawn from lowercase ASCII alphanumerics plus
/// `-`, `_` and `.`, and must start and end with an alphanumeric character.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceName(String);

impl ServiceName {
    /// Parse and validate a service name.
    ///
    /// # Errors
    ///
    /// Returns `ServiceNameError` if the name is empty, too long, contains a
    /// character outside the allowed alphabet, or starts/ends with a
    /// non-alphanumeric character.
    pub fn parse(name: &str) -> Result<Self, ServiceNameError> {
        if name.is_empty() {
            return Err(ServiceNameError::Empty);
        }
        if name.len() > MAX_SERVICE_NAME_LEN {
            return Err(ServiceNameError::TooLong(name.len()));
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !matches!(c, 'a'..='z' | '0'..='9' | '-' | '_' | '.'))
        {
            return Err(ServiceNameError::InvalidCharacter(bad));
        }
        let edges_ok = name.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
            && name.ends_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit());
        if !edges_ok {
            return Err(ServiceNameError::InvalidBoundary);
        }
        Ok(Self(name.to_string()))
    }

    /// Get the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ServiceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Service name validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceNameError {
    /// Name is empty.
    #[error("service name cannot be empty")]
    Empty,
    /// Name exceeds the maximum length.
    #[error("service name is {0} characters, maximum is {MAX_SERVICE_NAME_LEN}")]
    TooLong(usize),
    /// Name contains a character outside `[a-z0-9._-]`.
    #[error("service name contains invalid character {0:?}")]
    InvalidCharacter(char),
    /// Name starts or ends with a non-alphanumeric character.
    #[error("service name must start and end with a lowercase alphanumeric character")]
    InvalidBoundary,
}

// =============================================================================
// Mount Path
// =============================================================================

/// Normalized URL path prefix a service is mounted under.
///
/// The root mount is `/`. Non-root mounts start with `/`, contain no empty
/// or dot segments, and are stored without a trailing slash. Braces are
/// rejected so a prefix stays a literal path, never a route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MountPath(String);

impl MountPath {
    /// The root mount (`/`).
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Parse and normalize a mount path.
    ///
    /// A single trailing slash is accepted and removed (`/api/` becomes
    /// `/api`); the root path stays `/`.
    ///
    /// # Errors
    ///
    /// Returns `MountPathError` if the path is empty, does not start with
    /// `/`, contains empty or `.`/`..` segments, or contains whitespace,
    /// control, query, fragment, or brace characters.
    pub fn parse(path: &str) -> Result<Self, MountPathError> {
        if path.is_empty() {
            return Err(MountPathError::Empty);
        }
        if !path.starts_with('/') {
            return Err(MountPathError::MissingLeadingSlash);
        }
        if path == "/" {
            return Ok(Self::root());
        }

        if let Some(bad) = path
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || matches!(c, '?' | '#' | '{' | '}'))
        {
            return Err(MountPathError::InvalidCharacter(bad));
        }

        // Accept one trailing slash, then validate each segment. "//" leaves
        // a lone "/" here and falls out as an empty segment below.
        let trimmed = path.strip_suffix('/').unwrap_or(path);
        for segment in trimmed[1..].split('/') {
            if segment.is_empty() {
                return Err(MountPathError::EmptySegment);
            }
            if segment == "." || segment == ".." {
                return Err(MountPathError::DotSegment);
            }
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Whether this is the root mount.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Get the normalized path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MountPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mount path validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MountPathError {
    /// Path is empty.
    #[error("mount path cannot be empty")]
    Empty,
    /// Path does not start with `/`.
    #[error("mount path must start with '/'")]
    MissingLeadingSlash,
    /// Path contains an empty segment (`//`).
    #[error("mount path contains an empty segment")]
    EmptySegment,
    /// Path contains a `.` or `..` segment.
    #[error("mount path must not contain '.' or '..' segments")]
    DotSegment,
    /// Path contains whitespace, control, query, fragment, or brace
    /// characters.
    #[error("mount path contains invalid character {0:?}")]
    InvalidCharacter(char),
}

// =============================================================================
// Traffic Policy
// =============================================================================

/// Default per-request processing bound.
pub const DEFAULT_TRAFFIC_TIMEOUT: Duration = Duration::from_secs(600);

/// Host-level traffic policy applied around a mounted application.
///
/// The timeout bounds a single request's processing time; on expiry the
/// host abandons the request and answers 504 on the application's behalf.
/// The bound covers the request/response exchange only: a completed
/// protocol upgrade (for example a WebSocket handshake) hands the
/// connection to the application and is not severed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficPolicy {
    /// Maximum duration a single request may take before the host aborts it.
    pub timeout: Duration,
    /// Optional bound on concurrently processed requests. Requests over the
    /// bound queue for admission and remain subject to `timeout`.
    pub max_concurrency: Option<usize>,
}

impl Default for TrafficPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TRAFFIC_TIMEOUT,
            max_concurrency: None,
        }
    }
}

impl TrafficPolicy {
    /// Set the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the admission bound.
    #[must_use]
    pub const fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    /// Validate the policy.
    ///
    /// # Errors
    ///
    /// Returns `TrafficPolicyError` if the timeout is zero or the admission
    /// bound is zero.
    pub const fn validate(&self) -> Result<(), TrafficPolicyError> {
        if self.timeout.is_zero() {
            return Err(TrafficPolicyError::ZeroTimeout);
        }
        if let Some(0) = self.max_concurrency {
            return Err(TrafficPolicyError::ZeroConcurrency);
        }
        Ok(())
    }
}

/// Traffic policy validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrafficPolicyError {
    /// The timeout is zero, which would fail every request.
    #[error("traffic timeout must be greater than zero")]
    ZeroTimeout,
    /// The admission bound is zero, which would admit no requests.
    #[error("max_concurrency must be greater than zero when set")]
    ZeroConcurrency,
}

// =============================================================================
// Tests
// =============================================================================
