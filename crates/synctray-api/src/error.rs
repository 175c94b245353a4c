use thiserror::Error;

/// Top-level error type for the `synctray-api` crate.
///
/// Covers every failure mode of talking to the daemon: transport, TLS,
/// HTTP status and body decoding. `synctray-core` classifies these via
/// [`Error::kind`] and maps them into reported errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Request was aborted before it completed.
    #[error("Request canceled")]
    Canceled,

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Daemon ──────────────────────────────────────────────────────
    /// The daemon refused the API key or basic-auth credentials.
    #[error("Daemon rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    /// Any other non-success HTTP status.
    #[error("Daemon responded with HTTP {status}: {message}")]
    Http { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

/// Coarse classification used by the connection engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ErrorKind {
    /// Aborted by the engine itself. Never surfaced.
    Canceled,
    /// No response within the request window.
    Timeout,
    /// Body could not be decoded.
    Parse,
    /// Everything else.
    Other,
}

impl Error {
    /// Classify this error for recovery decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Canceled => ErrorKind::Canceled,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Transport(e) if e.is_timeout() => ErrorKind::Timeout,
            Self::Deserialization { .. } => ErrorKind::Parse,
            _ => ErrorKind::Other,
        }
    }

    /// Returns `true` if the request was aborted locally.
    pub fn is_canceled(&self) -> bool {
        self.kind() == ErrorKind::Canceled
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status } | Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
