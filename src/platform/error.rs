//! Remote platform error types with retry classification.
//!
//! Distinguishes between transient errors (safe to retry on idempotent reads)
//! and permanent errors (surface immediately).

use std::time::Duration;

/// Error from a remote agent platform call.
#[derive(Debug, Clone)]
pub struct PlatformError {
    /// The kind of error
    pub kind: PlatformErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    /// Error message (may contain remote error text; log it, don't show it)
    pub message: String,
    /// Suggested retry delay from a Retry-After header
    pub retry_after: Option<Duration>,
}

impl PlatformError {
    fn new(kind: PlatformErrorKind, status_code: Option<u16>, message: String) -> Self {
        Self {
            kind,
            status_code,
            message,
            retry_after: None,
        }
    }

    /// Create a rate limit error.
    pub fn rate_limited(message: String, retry_after: Option<Duration>) -> Self {
        Self {
            retry_after,
            ..Self::new(PlatformErrorKind::RateLimited, Some(429), message)
        }
    }

    /// Create a server error.
    pub fn server_error(status_code: u16, message: String) -> Self {
        Self::new(PlatformErrorKind::ServerError, Some(status_code), message)
    }

    /// Create a client error (bad request, auth, not found).
    pub fn client_error(status_code: u16, message: String) -> Self {
        Self::new(PlatformErrorKind::ClientError, Some(status_code), message)
    }

    /// Create a network error.
    pub fn network_error(message: String) -> Self {
        Self::new(PlatformErrorKind::NetworkError, None, message)
    }

    /// Create a parse error.
    pub fn parse_error(message: String) -> Self {
        Self::new(PlatformErrorKind::ParseError, None, message)
    }

    /// Create a timeout error for a call that exceeded its deadline.
    pub fn timeout(elapsed: Duration) -> Self {
        Self::new(
            PlatformErrorKind::Timeout,
            None,
            format!("call exceeded {:?}", elapsed),
        )
    }

    /// Build an error from an unsuccessful HTTP status and its body.
    pub fn from_status(status_code: u16, body: &str, retry_after: Option<Duration>) -> Self {
        match classify_http_status(status_code) {
            PlatformErrorKind::RateLimited => Self::rate_limited(body.to_string(), retry_after),
            PlatformErrorKind::ClientError => Self::client_error(status_code, body.to_string()),
            _ => Self::server_error(status_code, body.to_string()),
        }
    }

    /// Check if this error is transient and could be retried.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Get the suggested delay before retry.
    ///
    /// Returns the `retry_after` if set, otherwise an exponential backoff
    /// based on error kind.
    pub fn suggested_delay(&self, attempt: u32) -> Duration {
        if let Some(retry_after) = self.retry_after {
            return retry_after;
        }

        let base_ms: u64 = match self.kind {
            PlatformErrorKind::RateLimited => 2_000,
            PlatformErrorKind::ServerError => 1_000,
            _ => 500,
        };

        // base * 2^attempt, capped at 30 seconds
        let multiplier = 2u64.saturating_pow(attempt);
        Duration::from_millis(base_ms.saturating_mul(multiplier).min(30_000))
    }
}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for PlatformError {}

/// Classification of platform errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformErrorKind {
    /// Rate limited (429) - transient
    RateLimited,
    /// Server error (5xx) - transient
    ServerError,
    /// Client error (4xx) - permanent
    ClientError,
    /// Connection failed or dropped - transient
    NetworkError,
    /// Response body did not match the expected shape - permanent
    ParseError,
    /// Call exceeded its per-call deadline
    Timeout,
}

impl PlatformErrorKind {
    /// Check if this error kind is transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlatformErrorKind::RateLimited
                | PlatformErrorKind::ServerError
                | PlatformErrorKind::NetworkError
        )
    }
}

impl std::fmt::Display for PlatformErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformErrorKind::RateLimited => write!(f, "Rate limited"),
            PlatformErrorKind::ServerError => write!(f, "Server error"),
            PlatformErrorKind::ClientError => write!(f, "Client error"),
            PlatformErrorKind::NetworkError => write!(f, "Network error"),
            PlatformErrorKind::ParseError => write!(f, "Parse error"),
            PlatformErrorKind::Timeout => write!(f, "Timeout"),
        }
    }
}

/// Retry behaviour for idempotent reads.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Maximum total time to spend retrying one call
    pub max_retry_duration: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_retry_duration: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            max_retry_duration: Duration::ZERO,
        }
    }

    /// Check if the given error should be retried at this attempt.
    pub fn should_retry(&self, error: &PlatformError, attempt: u32) -> bool {
        error.is_transient() && attempt < self.max_retries
    }
}

/// Parse HTTP status code into error kind.
pub fn classify_http_status(status: u16) -> PlatformErrorKind {
    match status {
        429 => PlatformErrorKind::RateLimited,
        400..=499 => PlatformErrorKind::ClientError,
        _ => PlatformErrorKind::ServerError,
    }
}
