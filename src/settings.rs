use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::session::SessionConfig;

/// Persisted application settings. Every field has a serde default so
/// settings files from older versions keep loading.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppSettings {
    /// Port to connect to when none is given on the command line
    #[serde(default)]
    pub default_port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Wait after open before traffic (peer boot/reset), milliseconds
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Pacing between read attempts, milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Blocking-read timeout inside the read loop, milliseconds
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Directory for log files (None = stderr only)
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_baud_rate() -> u32 {
    9600
}
fn default_settle_delay_ms() -> u64 {
    2000
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_read_timeout_ms() -> u64 {
    50
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            default_port: None,
            baud_rate: default_baud_rate(),
            settle_delay_ms: default_settle_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            log_dir: None,
        }
    }
}

impl AppSettings {
    /// Platform default settings path, e.g. `~/.config/seriline/settings.json`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("seriline")
            .join("settings.json")
    }

    /// Load settings from the given file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read settings file: {}", e))?;
        serde_json::from_str(&data).map_err(|e| format!("Failed to parse settings: {}", e))
    }

    /// Write settings to the given file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create settings dir: {}", e))?;
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        std::fs::write(path, data).map_err(|e| format!("Failed to write settings file: {}", e))
    }

    /// Session configuration seeded from these settings.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            port: self.default_port.clone(),
            baud_rate: self.baud_rate,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            secret: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = AppSettings::default();
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.settle_delay_ms, 2000);
        assert_eq!(settings.poll_interval_ms, 1000);
        assert!(settings.default_port.is_none());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = AppSettings::load(&dir.path().join("nope.json")).expect("load");
        assert_eq!(settings.baud_rate, 9600);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");

        let settings = AppSettings {
            default_port: Some("/dev/ttyACM0".to_string()),
            baud_rate: 115200,
            ..AppSettings::default()
        };
        settings.save(&path).expect("save");

        let loaded = AppSettings::load(&path).expect("load");
        assert_eq!(loaded.default_port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(loaded.baud_rate, 115200);
        assert_eq!(loaded.poll_interval_ms, 1000);
    }

    #[test]
    fn test_partial_file_gets_field_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"baud_rate": 57600}"#).expect("write");

        let loaded = AppSettings::load(&path).expect("load");
        assert_eq!(loaded.baud_rate, 57600);
        assert_eq!(loaded.settle_delay_ms, 2000);
        assert!(loaded.log_dir.is_none());
    }

    #[test]
    fn test_session_config_conversion() {
        let settings = AppSettings {
            default_port: Some("COM3".to_string()),
            ..AppSettings::default()
        };
        let config = settings.session_config();
        assert_eq!(config.port.as_deref(), Some("COM3"));
        assert_eq!(config.settle_delay, Duration::from_secs(2));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }
}
