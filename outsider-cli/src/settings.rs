//! Application settings

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// HID device path of the amplifier; `None` finds it by USB IDs
    #[serde(default)]
    pub device: Option<PathBuf>,
    /// How long a read waits before reporting no data
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// tracing filter used when RUST_LOG is not set
    #[serde(default)]
    pub log_filter: Option<String>,
}

fn default_read_timeout_ms() -> u64 {
    100
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device: None,
            read_timeout_ms: default_read_timeout_ms(),
            log_filter: None,
        }
    }
}

impl Settings {
    /// Get the XDG config directory for outsider
    /// Uses $XDG_CONFIG_HOME/outsider, falls back to ~/.config/outsider
    fn config_dir() -> Option<PathBuf> {
        // First try XDG_CONFIG_HOME environment variable
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("outsider"));
            }
        }

        // Fall back to ~/.config/outsider (XDG default)
        dirs::home_dir().map(|h| h.join(".config").join("outsider"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .map(|s| Self::from_json(&s))
            .unwrap_or_default()
    }

    /// Parse settings, falling back to defaults on invalid JSON
    fn from_json(json: &str) -> Self {
        serde_json::from_str(json).unwrap_or_default()
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::settings_path().context("Could not determine settings path")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;

        Ok(path)
    }

    /// Read timeout as a duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings = Settings::from_json(r#"{ "read_timeout_ms": 250 }"#);
        assert_eq!(settings.read_timeout_ms, 250);
        assert_eq!(settings.device, None);
        assert_eq!(settings.log_filter, None);
    }

    #[test]
    fn test_invalid_file_uses_defaults() {
        assert_eq!(Settings::from_json("not json"), Settings::default());
    }

    #[test]
    fn test_roundtrip() {
        let settings = Settings {
            device: Some(PathBuf::from("/dev/hidraw3")),
            read_timeout_ms: 20,
            log_filter: Some("outsider=debug".to_string()),
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        assert_eq!(Settings::from_json(&json), settings);
        assert_eq!(settings.read_timeout(), Duration::from_millis(20));
    }
}
