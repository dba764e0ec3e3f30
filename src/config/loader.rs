//! Configuration loader for courier-rs
//!
//! Layered loading in priority order: `default.toml` (required),
//! `local.toml` (optional), then `COURIER_*` environment variables.
//! A single explicit file can replace the layered sources.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};

use crate::config::error::ConfigError;
use crate::config::settings::Settings;

/// Environment variable for configuration directory
const CONFIG_DIR_ENV: &str = "COURIER_CONFIG_DIR";

/// Environment variable for specific configuration file
const CONFIG_FILE_ENV: &str = "COURIER_CONFIG_FILE";

/// Default configuration directory
const DEFAULT_CONFIG_DIR: &str = "config";

/// Environment variable prefix for configuration overrides
const ENV_PREFIX: &str = "COURIER";

/// Separator for nested configuration keys in environment variables
const ENV_SEPARATOR: &str = "__";

/// Layered configuration loader.
///
/// `COURIER_FACTORY__INITIALIZATION_TIMEOUT_MS=5000` maps to
/// `factory.initialization_timeout_ms`, always at highest priority.
#[derive(Debug)]
pub struct ConfigLoader {
    config_dir: PathBuf,
    /// Specific configuration file path (if set, skips layered loading)
    config_file: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader from `COURIER_CONFIG_DIR` / `COURIER_CONFIG_FILE`.
    ///
    /// # Errors
    ///
    /// Returns an error if both variables are set; they are mutually
    /// exclusive.
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = std::env::var(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_DIR));

        let config_file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);

        if config_file.is_some() && std::env::var(CONFIG_DIR_ENV).is_ok() {
            return Err(ConfigError::mutual_exclusivity(
                "COURIER_CONFIG_DIR and COURIER_CONFIG_FILE cannot both be set. \
                 Use COURIER_CONFIG_DIR for layered configuration or \
                 COURIER_CONFIG_FILE for a single configuration file.",
            ));
        }

        Ok(Self {
            config_dir,
            config_file,
        })
    }

    /// Create a loader reading a single explicit file, ignoring env layout
    /// variables. Useful for embedding and tests.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            config_file: Some(path.into()),
        }
    }

    /// Load and validate configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if `default.toml` is missing (layered mode), if
    /// parsing fails, or if validation rejects the result.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let config = self.build_config()?;
        let settings: Settings = config.try_deserialize().map_err(|e| {
            ConfigError::ParseError(format!("Failed to deserialize configuration: {}", e))
        })?;

        settings.validate()?;

        Ok(settings)
    }

    fn build_config(&self) -> Result<Config, ConfigError> {
        let builder = Config::builder();

        let builder = if let Some(ref config_file) = self.config_file {
            self.add_file_source(builder, config_file, true)?
        } else {
            let default_path = self.config_dir.join("default.toml");
            let builder = self.add_file_source(builder, &default_path, true)?;
            let local_path = self.config_dir.join("local.toml");
            self.add_file_source(builder, &local_path, false)?
        };

        // Environment variables always win: COURIER_FACTORY__AUTO_RECOVERY -> factory.auto_recovery
        let builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator(ENV_SEPARATOR)
                .ignore_empty(true)
                .try_parsing(true),
        );

        builder.build().map_err(ConfigError::from)
    }

    fn add_file_source(
        &self,
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        path: &Path,
        required: bool,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        if required && !path.exists() {
            return Err(ConfigError::file_not_found(format!(
                "Required configuration file not found: {}",
                path.display()
            )));
        }

        Ok(builder.add_source(
            File::new(path.to_str().unwrap_or_default(), FileFormat::Toml).required(required),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{ChannelSettings, PayloadFormat};
    use crate::models::NotificationChannel;
    use std::fs;
    use tempfile::TempDir;

    const BASE_CONFIG: &str = r#"
[logger]
level = "info"

[factory]
enabled_channels = ["sms", "webhook"]
initialization_timeout_ms = 5000

[factory.channels.sms]
type = "sms"
provider = "memory"
account_id = "acct"
auth_token = "token"
from_number = "+15550001111"
max_per_minute = 30

[factory.channels.webhook]
type = "webhook"
default_url = "https://hooks.example.com/notify"
format = "json"
"#;

    fn write_config(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).expect("Failed to write config file");
        path
    }

    #[test]
    fn test_load_single_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, "courier.toml", BASE_CONFIG);

        let settings = ConfigLoader::from_file(&path).load().expect("Should load settings");

        assert_eq!(settings.factory.enabled_channels.len(), 2);
        assert_eq!(settings.factory.initialization_timeout_ms, 5000);

        match settings
            .factory
            .channel_settings(NotificationChannel::Webhook)
            .expect("webhook block present")
        {
            ChannelSettings::Webhook(w) => assert_eq!(w.format, PayloadFormat::Json),
            _ => panic!("expected webhook settings"),
        }
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = ConfigLoader::from_file("/nonexistent/courier.toml").load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_rejects_invalid_settings() {
        let temp_dir = TempDir::new().unwrap();
        // max_length below the minimum the validator accepts
        let bad = BASE_CONFIG.replace("max_per_minute = 30", "max_length = 2");
        let path = write_config(&temp_dir, "bad.toml", &bad);

        let result = ConfigLoader::from_file(&path).load();
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_load_rejects_mismatched_channel_block() {
        let temp_dir = TempDir::new().unwrap();
        let bad = BASE_CONFIG.replace(
            "[factory.channels.webhook]\ntype = \"webhook\"",
            "[factory.channels.webhook]\ntype = \"sms\"\nprovider = \"memory\"\naccount_id = \"a\"\nauth_token = \"t\"\nfrom_number = \"+15550001111\"",
        );
        let path = write_config(&temp_dir, "mismatch.toml", &bad);

        let result = ConfigLoader::from_file(&path).load();
        assert!(result.is_err());
    }
}
