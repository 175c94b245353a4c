//! Shared configuration for synctray.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `synctray_core::ConnectionSettings`. The CLI adds
//! flag-aware wrappers on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use synctray_core::{BasicAuth, ConnectionSettings};

const KEYRING_SERVICE: &str = "synctray";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API key configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named daemon profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile, falling back to the default profile name.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

/// Poll cadence and timeouts applied when a profile does not override
/// them. All values in milliseconds except `timeout`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_traffic_poll_ms")]
    pub traffic_poll_ms: u64,

    #[serde(default = "default_stats_poll_ms")]
    pub dir_stats_poll_ms: u64,

    #[serde(default = "default_stats_poll_ms")]
    pub dev_stats_poll_ms: u64,

    #[serde(default = "default_errors_poll_ms")]
    pub errors_poll_ms: u64,

    /// Zero disables auto-reconnect.
    #[serde(default)]
    pub reconnect_ms: u64,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            traffic_poll_ms: default_traffic_poll_ms(),
            dir_stats_poll_ms: default_stats_poll_ms(),
            dev_stats_poll_ms: default_stats_poll_ms(),
            errors_poll_ms: default_errors_poll_ms(),
            reconnect_ms: 0,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_traffic_poll_ms() -> u64 {
    2000
}
fn default_stats_poll_ms() -> u64 {
    60_000
}
fn default_errors_poll_ms() -> u64 {
    30_000
}
fn default_timeout() -> u64 {
    30
}

/// A named daemon profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Daemon GUI address (e.g., "http://127.0.0.1:8384").
    pub url: String,

    /// API key (plaintext, prefer keyring or env var).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    /// GUI user when basic auth is enabled.
    pub user: Option<String>,

    /// GUI password (plaintext, prefer keyring).
    pub password: Option<String>,

    /// Path of the daemon's HTTPS certificate.
    pub https_cert: Option<PathBuf>,

    pub traffic_poll_ms: Option<u64>,
    pub dir_stats_poll_ms: Option<u64>,
    pub dev_stats_poll_ms: Option<u64>,
    pub errors_poll_ms: Option<u64>,
    pub reconnect_ms: Option<u64>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "synctray", "synctray").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("synctray");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
///
/// Nested keys are addressed with a double underscore, e.g.
/// `SYNCTRAY_DEFAULTS__RECONNECT_MS=5000`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SYNCTRAY_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Resolve an API key from the credential chain (no CLI flag step).
pub fn resolve_api_key(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's api_key_env → env var lookup
    if let Some(ref env_name) = profile.api_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Some(secret) = keyring_secret(profile_name, "api-key") {
        return Ok(SecretString::from(secret));
    }

    // 3. Plaintext in config
    if let Some(ref key) = profile.api_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve basic-auth credentials. `None` when the profile has no user.
pub fn resolve_credentials(profile: &Profile, profile_name: &str) -> Option<BasicAuth> {
    let user = profile
        .user
        .clone()
        .or_else(|| std::env::var("SYNCTRAY_USER").ok())?;

    let password = std::env::var("SYNCTRAY_PASSWORD")
        .ok()
        .or_else(|| keyring_secret(profile_name, "password"))
        .or_else(|| profile.password.clone())
        .unwrap_or_default();

    Some(BasicAuth {
        user,
        password: SecretString::from(password),
    })
}

fn keyring_secret(profile_name: &str, kind: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{kind}"))
        .ok()?
        .get_password()
        .ok()
}

/// Build `ConnectionSettings` from a profile, filling unset intervals
/// from `defaults`.
pub fn profile_to_settings(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ConnectionSettings, ConfigError> {
    let url: url::Url = profile.url.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {}", profile.url),
    })?;

    let api_key = resolve_api_key(profile, profile_name)?;
    let ms = |value: Option<u64>, fallback: u64| Duration::from_millis(value.unwrap_or(fallback));

    let mut settings = ConnectionSettings::new(url, api_key);
    settings.credentials = resolve_credentials(profile, profile_name);
    settings.https_cert.clone_from(&profile.https_cert);
    settings.traffic_poll_interval = ms(profile.traffic_poll_ms, defaults.traffic_poll_ms);
    settings.dir_stats_poll_interval = ms(profile.dir_stats_poll_ms, defaults.dir_stats_poll_ms);
    settings.dev_stats_poll_interval = ms(profile.dev_stats_poll_ms, defaults.dev_stats_poll_ms);
    settings.errors_poll_interval = ms(profile.errors_poll_ms, defaults.errors_poll_ms);
    settings.reconnect_interval = ms(profile.reconnect_ms, defaults.reconnect_ms);
    settings.request_timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    Ok(settings)
}
