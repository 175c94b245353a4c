// ── Core error types ──
//
// Errors surfaced by the connection engine. Transport failures from
// synctray-api are translated here; the `Canceled` kind never reaches a
// consumer. Every reported error also carries an `ErrorCategory` so a UI
// can decide whether to alarm on it.

use serde::Serialize;
use thiserror::Error;

use synctray_api::ErrorKind;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Connection configuration is insufficient: {missing} is not set")]
    ConfigInsufficient { missing: &'static str },

    #[error("Unable to use self-signed certificate: {message}")]
    Certificate { message: String },

    // ── Data ─────────────────────────────────────────────────────────
    #[error("Unable to parse {what}: {message}")]
    Parse { what: &'static str, message: String },

    // ── Transport ────────────────────────────────────────────────────
    #[error("Request canceled")]
    Canceled,

    #[error("Request timed out")]
    Timeout,

    #[error("{0}")]
    Transport(String),

    // ── Engine ───────────────────────────────────────────────────────
    #[error("Connection engine has stopped")]
    EngineStopped,
}

impl CoreError {
    /// Returns `true` for the locally initiated cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Attach a description of what was being decoded to a parse failure.
    pub(crate) fn parsing(what: &'static str, err: &synctray_api::Error) -> Self {
        let message = match err {
            synctray_api::Error::Deserialization { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self::Parse { what, message }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<synctray_api::Error> for CoreError {
    fn from(err: synctray_api::Error) -> Self {
        match err.kind() {
            ErrorKind::Canceled => Self::Canceled,
            ErrorKind::Timeout => Self::Timeout,
            ErrorKind::Parse => Self::parsing("response", &err),
            ErrorKind::Other => match err {
                synctray_api::Error::Tls(message) => Self::Certificate { message },
                other => Self::Transport(other.to_string()),
            },
        }
    }
}

/// What a reported error affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
pub enum ErrorCategory {
    /// The connection as a whole; may force Disconnected.
    OverallConnection,
    /// A single command such as a rescan.
    SpecificRequest,
    /// A response body could not be decoded.
    Parsing,
}

/// An error as emitted to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub message: String,
    pub category: ErrorCategory,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            message: message.into(),
            category,
        }
    }

    /// Report `err` with context, choosing `Parsing` for decode failures.
    pub(crate) fn from_error(context: &str, err: &CoreError, category: ErrorCategory) -> Self {
        let category = if matches!(err, CoreError::Parse { .. }) {
            ErrorCategory::Parsing
        } else {
            category
        };
        Self::new(format!("{context}: {err}"), category)
    }
}
