//! Deskshell configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::events::{DEFAULT_MAX_HISTORY, DEFAULT_NAMESPACE};
use crate::logging::{DEFAULT_MAX_ENTRIES, DEFAULT_REDACT_KEYS, LogLevel, LoggingOptions};
use crate::windows::{DEFAULT_HEIGHT, DEFAULT_WIDTH, Viewport};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Process diagnostics level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Structured application logging
    pub logging: LoggingConfig,

    /// Event bus
    pub events: EventsConfig,

    /// Host bridge timeouts
    pub bridge: BridgeConfig,

    /// Screen size used for window placement
    pub viewport: ViewportConfig,
}

impl Config {
    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.logging.max_entries == 0 {
            return Err(eyre::eyre!("logging.max-entries must be at least 1"));
        }
        if self.events.max_history == 0 {
            return Err(eyre::eyre!("events.max-history must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .deskshell.yml
        let local_config = PathBuf::from(".deskshell.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/deskshell/deskshell.yml
        if let Some(user_config) = Self::user_config_path().filter(|p| p.exists()) {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only `log-level` from the config file that `load` would pick
    ///
    /// Runs before logging is initialised, so failures are silent.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => std::iter::once(PathBuf::from(".deskshell.yml"))
                .chain(Self::user_config_path())
                .collect(),
        };
        candidates
            .into_iter()
            .find(|p| p.exists())
            .and_then(|p| fs::read_to_string(p).ok())
            .and_then(|content| serde_yaml::from_str::<Self>(&content).ok())
            .and_then(|config| config.log_level)
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("deskshell").join("deskshell.yml"))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Structured logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,

    /// Lowest level that is emitted
    #[serde(rename = "min-level")]
    pub min_level: LogLevel,

    /// Ring buffer capacity
    #[serde(rename = "max-entries")]
    pub max_entries: usize,

    /// Context keys whose values are replaced with `[REDACTED]` (case-insensitive)
    #[serde(rename = "redact-keys")]
    pub redact_keys: Vec<String>,

    /// Forward entries to the diagnostics log
    #[serde(rename = "console-sink")]
    pub console_sink: bool,

    /// Forward entries to the host `log_message` function
    #[serde(rename = "bridge-sink")]
    pub bridge_sink: bool,
}

impl LoggingConfig {
    pub fn options(&self) -> LoggingOptions {
        LoggingOptions {
            enabled: self.enabled,
            min_level: self.min_level,
            max_entries: self.max_entries,
            redact_keys: self.redact_keys.clone(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_level: LogLevel::Debug,
            max_entries: DEFAULT_MAX_ENTRIES,
            redact_keys: DEFAULT_REDACT_KEYS.iter().map(|k| k.to_string()).collect(),
            console_sink: true,
            bridge_sink: true,
        }
    }
}

/// Event bus configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub namespace: String,

    /// History capacity (events)
    #[serde(rename = "max-history")]
    pub max_history: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

/// Host bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Timeout for user-facing calls in milliseconds
    #[serde(rename = "call-timeout-ms")]
    pub call_timeout_ms: u64,

    /// Timeout for diagnostics polling in milliseconds
    #[serde(rename = "diagnostics-timeout-ms")]
    pub diagnostics_timeout_ms: u64,
}

impl BridgeConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn diagnostics_timeout(&self) -> Duration {
        Duration::from_millis(self.diagnostics_timeout_ms)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 30_000,
            diagnostics_timeout_ms: 5_000,
        }
    }
}

/// Screen size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
}

impl ViewportConfig {
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.logging.enabled);
        assert_eq!(config.logging.min_level, LogLevel::Debug);
        assert_eq!(config.logging.max_entries, 500);
        assert_eq!(config.events.namespace, "app");
        assert_eq!(config.events.max_history, 300);
        assert_eq!(config.bridge.call_timeout(), Duration::from_secs(30));
        assert_eq!(config.bridge.diagnostics_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug

logging:
  enabled: true
  min-level: warn
  max-entries: 50
  redact-keys: [password, apiKey]
  console-sink: false

events:
  namespace: shell
  max-history: 20

bridge:
  call-timeout-ms: 1000

viewport:
  width: 1280
  height: 800
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.logging.min_level, LogLevel::Warn);
        assert_eq!(config.logging.max_entries, 50);
        assert_eq!(config.logging.redact_keys, vec!["password", "apiKey"]);
        assert!(!config.logging.console_sink);
        assert!(config.logging.bridge_sink);
        assert_eq!(config.events.namespace, "shell");
        assert_eq!(config.bridge.call_timeout_ms, 1000);
        assert_eq!(config.bridge.diagnostics_timeout_ms, 5000);
        assert_eq!(config.viewport.viewport().available_rect().width, 1260);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
events:
  max-history: 10
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.events.max_history, 10);
        assert_eq!(config.events.namespace, "app");
        assert_eq!(config.logging.max_entries, 500);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_capacities() {
        let mut config = Config::default();
        config.logging.max_entries = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.events.max_history = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "log-level: warn\nevents:\n  namespace: test").unwrap();
        let path = file.path().to_path_buf();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.events.namespace, "test");
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("warn"));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/nonexistent/deskshell.yml");
        assert!(Config::load(Some(&path)).is_err());
        assert!(Config::load_log_level(Some(&path)).is_none());
    }

    #[test]
    fn test_logging_options_from_config() {
        let options = LoggingConfig::default().options();
        assert_eq!(options, LoggingOptions::default());
    }

    #[test]
    fn test_serialized_config_round_trips_defaults() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(yaml.contains("max-history: 300"));
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
