//! CLI configuration: thin wrapper around `synctray_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--url, --api-key, --profile).

use secrecy::SecretString;

use synctray_core::ConnectionSettings;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use synctray_config::{Config, Profile, config_path, load_config_or_default};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build `ConnectionSettings` from the config file, the active profile
/// and CLI overrides. Flags take priority over profile values.
pub fn build_settings(global: &GlobalOpts) -> Result<ConnectionSettings, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.url.is_some() => Profile::default(),
        None if global.profile.is_some() => {
            let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            available.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available.join(", "),
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    // Flag > env > profile
    if let Some(ref url) = global.url {
        profile.url.clone_from(url);
    }
    if let Some(ref key) = global.api_key {
        profile.api_key = Some(key.clone());
        profile.api_key_env = None;
    }

    let mut settings = synctray_config::profile_to_settings(&profile, &profile_name, &cfg.defaults)?;
    if let Some(ref key) = global.api_key {
        settings.api_key = SecretString::from(key.clone());
    }
    Ok(settings)
}
