//! Daemon settings — TOML file with environment variable overrides.
//!
//! Looks for `hauslink.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values. The device/hub state itself lives in the
//! configuration document, not here.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Configuration document settings.
    pub document: DocumentConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Where the persisted configuration document lives.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Path of the JSON document, read at startup and rewritten on every
    /// mutation.
    pub path: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Settings {
    /// Load settings from `hauslink.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = Self::from_file("hauslink.toml")?;
        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    fn from_file(path: &str) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(SettingsError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(SettingsError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HAUSLINK_CONFIG") {
            self.document.path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("HAUSLINK_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.document.path.as_os_str().is_empty() {
            return Err(SettingsError::Validation(
                "document path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("config.json"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hauslinkd=info,hauslink=info,tower_http=debug".to_string(),
        }
    }
}

/// Settings errors.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// TOML parse failure.
    #[error("failed to parse settings file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read settings file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid settings: {0}")]
    Validation(String),
}
