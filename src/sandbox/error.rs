//! Sandbox error types with retry classification.
//!
//! Distinguishes between transient errors (worth another readiness poll) and
//! permanent errors (bad credentials, unsupported provider).

use std::fmt;
use std::time::Duration;

/// Error from sandbox provider calls.
#[derive(Debug, thiserror::Error)]
#[error("{kind}{}: {message}", .status_code.map(|c| format!(" ({})", c)).unwrap_or_default())]
pub struct SandboxError {
    /// The kind of error
    pub kind: SandboxErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    /// Error message
    pub message: String,
}

impl SandboxError {
    pub fn rate_limited(message: String) -> Self {
        Self {
            kind: SandboxErrorKind::RateLimited,
            status_code: Some(429),
            message,
        }
    }

    pub fn server_error(status_code: u16, message: String) -> Self {
        Self {
            kind: SandboxErrorKind::ServerError,
            status_code: Some(status_code),
            message,
        }
    }

    /// Bad request, auth failure, unknown sandbox.
    pub fn client_error(status_code: u16, message: String) -> Self {
        Self {
            kind: SandboxErrorKind::ClientError,
            status_code: Some(status_code),
            message,
        }
    }

    pub fn network_error(message: String) -> Self {
        Self {
            kind: SandboxErrorKind::NetworkError,
            status_code: None,
            message,
        }
    }

    pub fn parse_error(message: String) -> Self {
        Self {
            kind: SandboxErrorKind::ParseError,
            status_code: None,
            message,
        }
    }

    /// The sandbox never answered the readiness probe.
    pub fn start_timeout(waited: Duration, last_error: Option<&str>) -> Self {
        let mut message = format!("sandbox failed to start within {:?}", waited);
        if let Some(last) = last_error {
            message.push_str(&format!(" (last error: {})", last));
        }
        Self {
            kind: SandboxErrorKind::StartTimeout,
            status_code: None,
            message,
        }
    }

    pub fn unsupported(provider: &str) -> Self {
        Self {
            kind: SandboxErrorKind::Unsupported,
            status_code: None,
            message: format!(
                "sandbox provider '{}' has no client in this build; use daytona or runloop",
                provider
            ),
        }
    }

    /// Build an error from an HTTP status and response body.
    pub fn from_status(status_code: u16, body: &str) -> Self {
        match classify_http_status(status_code) {
            SandboxErrorKind::RateLimited => Self::rate_limited(body.to_string()),
            SandboxErrorKind::ClientError => Self::client_error(status_code, body.to_string()),
            _ => Self::server_error(status_code, body.to_string()),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl From<reqwest::Error> for SandboxError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::network_error(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            Self::network_error(format!("Connection failed: {}", e))
        } else if e.is_decode() {
            Self::parse_error(format!("Failed to decode response: {}", e))
        } else {
            Self::network_error(format!("Request failed: {}", e))
        }
    }
}

/// Classification of sandbox errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxErrorKind {
    /// Rate limited (429)
    RateLimited,
    /// Server error (5xx)
    ServerError,
    /// Client error (4xx except 429)
    ClientError,
    /// Network/connection error
    NetworkError,
    /// Response parsing error
    ParseError,
    /// Readiness polling exhausted
    StartTimeout,
    /// Provider selected but not implemented
    Unsupported,
}

impl SandboxErrorKind {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::NetworkError
        )
    }
}

impl fmt::Display for SandboxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RateLimited => "rate limited",
            Self::ServerError => "server error",
            Self::ClientError => "client error",
            Self::NetworkError => "network error",
            Self::ParseError => "parse error",
            Self::StartTimeout => "start timeout",
            Self::Unsupported => "unsupported provider",
        };
        f.write_str(s)
    }
}

/// Parse HTTP status code into error kind.
pub fn classify_http_status(status: u16) -> SandboxErrorKind {
    match status {
        429 => SandboxErrorKind::RateLimited,
        500..=599 => SandboxErrorKind::ServerError,
        400..=499 => SandboxErrorKind::ClientError,
        _ => SandboxErrorKind::ServerError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SandboxErrorKind::RateLimited.is_transient());
        assert!(SandboxErrorKind::ServerError.is_transient());
        assert!(SandboxErrorKind::NetworkError.is_transient());
        assert!(!SandboxErrorKind::ClientError.is_transient());
        assert!(!SandboxErrorKind::StartTimeout.is_transient());
        assert!(!SandboxErrorKind::Unsupported.is_transient());
    }

    #[test]
    fn test_http_status_classification() {
        assert_eq!(classify_http_status(429), SandboxErrorKind::RateLimited);
        assert_eq!(classify_http_status(500), SandboxErrorKind::ServerError);
        assert_eq!(classify_http_status(503), SandboxErrorKind::ServerError);
        assert_eq!(classify_http_status(401), SandboxErrorKind::ClientError);
        assert_eq!(classify_http_status(404), SandboxErrorKind::ClientError);
    }

    #[test]
    fn test_display_includes_status() {
        let err = SandboxError::from_status(401, "bad key");
        assert_eq!(err.to_string(), "client error (401): bad key");

        let err = SandboxError::start_timeout(Duration::from_secs(180), None);
        assert_eq!(
            err.to_string(),
            "start timeout: sandbox failed to start within 180s"
        );

        let err = SandboxError::start_timeout(Duration::from_millis(20), Some("exit code 1"));
        assert_eq!(
            err.to_string(),
            "start timeout: sandbox failed to start within 20ms (last error: exit code 1)"
        );
    }
}
