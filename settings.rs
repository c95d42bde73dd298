//! Tool-level settings with environment variable support.
//!
//! [`Settings`] covers what the `filecrypt` binary needs before an
//! operation can be configured: where key material lives. Per-operation
//! behavior is configured through [`crate::config::OperationConfig`].
//!
//! ## Environment Variables
//!
//! - `FILECRYPT_KEY_DIR`: Override key directory path
//! - `FILECRYPT_CONFIG`: Override settings file path

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Environment variable names for settings overrides
pub const ENV_KEY_DIR: &str = "FILECRYPT_KEY_DIR";
pub const ENV_CONFIG_PATH: &str = "FILECRYPT_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub key_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            key_dir: "./keys".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a file path
    pub fn load(path: &str) -> Result<Self> {
        let s =
            fs::read_to_string(path).with_context(|| format!("reading settings file {}", path))?;
        let mut settings: Settings = serde_json::from_str(&s)?;
        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings with environment variable overrides
    /// Priority: ENV vars > settings file > defaults
    pub fn load_with_env(path: Option<&str>) -> Result<Self> {
        let settings_path = path
            .map(String::from)
            .or_else(|| env::var(ENV_CONFIG_PATH).ok());

        let mut settings = match settings_path {
            Some(ref p) if Path::new(p).exists() => {
                info!(path = p, "loading settings from file");
                let s = fs::read_to_string(p)
                    .with_context(|| format!("reading settings file {}", p))?;
                serde_json::from_str(&s)?
            }
            _ => {
                debug!("using default settings");
                Settings::default()
            }
        };

        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key_dir) = env::var(ENV_KEY_DIR) {
            debug!(key_dir = %key_dir, "overriding key_dir from environment");
            self.key_dir = key_dir;
        }
    }

    /// Validate settings values
    pub fn validate(&self) -> Result<()> {
        if self.key_dir.trim().is_empty() {
            anyhow::bail!("key_dir cannot be empty");
        }

        // Warn if the key directory looks like it might be public
        let lowered = self.key_dir.to_lowercase();
        if lowered.contains("public") || lowered.contains("www") || lowered.contains("htdocs") {
            warn!(
                path = %self.key_dir,
                "key directory appears to be in a public location - this is a security risk"
            );
        }

        if self.key_dir.contains("..") {
            warn!("key_dir contains '..' - consider using absolute paths");
        }

        Ok(())
    }

    pub fn new(key_dir: impl Into<String>) -> Self {
        Self {
            key_dir: key_dir.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_key_dir() {
        let settings = Settings::new("  ");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn load_round_trips_through_json() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        let settings = Settings::new("/var/lib/filecrypt/keys");
        fs::write(&path, serde_json::to_string_pretty(&settings).unwrap()).unwrap();

        let loaded = Settings::load(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.key_dir, "/var/lib/filecrypt/keys");
    }
}
