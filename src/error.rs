//! Cryptarch error types

/// Cryptarch error types.
///
/// `Clone` so that every caller coalesced onto one in-flight request
/// observes the same rejection. Sources that cannot be cloned
/// (`reqwest::Error`, `serde_json::Error`) are flattened to their
/// display string at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptarchError {
    // Network errors
    /// No HTTP response was obtained (connection refused, reset, DNS...).
    #[error("transport error: {0}")]
    Transport(String),

    /// A well-formed HTTP response with a non-success status.
    #[error("HTTP error ({status}): {body}")]
    Http { status: u16, body: String },

    // Reference data errors
    /// Every table in the essential tier failed to load.
    #[error("essential reference data unavailable: {0}")]
    DataUnavailable(String),

    #[error("invalid item category: {0}")]
    InvalidCategory(String),

    // Data errors
    #[error("decode error: {0}")]
    Decode(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CryptarchError {
    /// Whether the error is worth retrying at the transport layer.
    ///
    /// Only transport failures qualify. HTTP statuses, including 429 and
    /// 5xx, are handed back to the caller untouched.
    pub fn is_transient(&self) -> bool {
        matches!(self, CryptarchError::Transport(_))
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            CryptarchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Session expired or missing: the user has to sign in again.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Upstream request budget exhausted.
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// Server-side fault (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(s) if (500..600).contains(&s))
    }
}

impl From<serde_json::Error> for CryptarchError {
    fn from(err: serde_json::Error) -> Self {
        CryptarchError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for CryptarchError {
    fn from(err: reqwest::Error) -> Self {
        CryptarchError::Transport(err.to_string())
    }
}

/// Result type alias for Cryptarch operations
pub type Result<T> = std::result::Result<T, CryptarchError>;
