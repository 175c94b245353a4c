//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use synctray_config::ConfigError;
use synctray_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to the daemon at {url}")]
    #[diagnostic(
        code(synctray::connection_failed),
        help(
            "{message}\n\
             Check that the daemon is running and that its GUI address is reachable."
        )
    )]
    ConnectionFailed { url: String, message: String },

    #[error("Unable to use the daemon's HTTPS certificate")]
    #[diagnostic(
        code(synctray::certificate),
        help(
            "{message}\n\
             Set https_cert in your profile to the daemon's https-cert.pem."
        )
    )]
    Certificate { message: String },

    #[error("Daemon request failed: {message}")]
    #[diagnostic(code(synctray::request_failed))]
    RequestFailed { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("No API key configured for profile '{profile}'")]
    #[diagnostic(
        code(synctray::no_credentials),
        help(
            "Add api_key or api_key_env to the profile, store the key in the system keyring\n\
             under service 'synctray' as '{profile}/api-key', or set SYNCTRAY_API_KEY."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(synctray::not_found),
        help("Run: synctray status to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(synctray::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(synctray::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(synctray::no_config),
        help(
            "Pass --url and --api-key, or create a profile.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(synctray::config))]
    Config(Box<ConfigError>),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Gave up after {seconds}s")]
    #[diagnostic(
        code(synctray::timeout),
        help("Increase the timeout or check the daemon's responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize config: {0}")]
    #[diagnostic(code(synctray::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Certificate { .. } => exit_code::CONNECTION,
            Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::UnknownProfile { name } => Self::ProfileNotFound {
                name,
                available: String::new(),
            },
            other => Self::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConfigInsufficient { missing } => Self::Validation {
                field: missing.into(),
                reason: "not set".into(),
            },
            CoreError::Certificate { message } => Self::Certificate { message },
            CoreError::Timeout => Self::RequestFailed {
                message: "request timed out".into(),
            },
            CoreError::EngineStopped => Self::RequestFailed {
                message: "connection engine stopped".into(),
            },
            other => Self::RequestFailed {
                message: other.to_string(),
            },
        }
    }
}
