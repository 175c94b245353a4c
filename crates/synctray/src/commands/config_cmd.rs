//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

/// Replace plaintext secrets so the config can be printed.
fn redact(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        if profile.api_key.is_some() {
            profile.api_key = Some(REDACTED.into());
        }
        if profile.password.is_some() {
            profile.password = Some(REDACTED.into());
        }
    }
    cfg
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redact(config::load_config_or_default());
            let out = match global.output {
                // TOML reads closer to the file on disk than a debug dump
                OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&cfg)?,
                format => output::render_single(format, &cfg, |_| String::new(), |_| String::new()),
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Profile;

    #[test]
    fn redact_hides_plaintext_secrets() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                url: "http://127.0.0.1:8384".into(),
                api_key: Some("abc123".into()),
                api_key_env: Some("HOME_KEY".into()),
                password: Some("hunter2".into()),
                ..Profile::default()
            },
        );

        let cfg = redact(cfg);
        let profile = &cfg.profiles["home"];
        assert_eq!(profile.api_key.as_deref(), Some(REDACTED));
        assert_eq!(profile.password.as_deref(), Some(REDACTED));
        assert_eq!(profile.api_key_env.as_deref(), Some("HOME_KEY"));
        assert_eq!(profile.url, "http://127.0.0.1:8384");
    }
}
