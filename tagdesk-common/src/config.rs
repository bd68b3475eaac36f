//! Configuration loading for the Tagdesk station
//!
//! All knobs live in one TOML file resolved in priority order:
//! 1. Explicit path handed in by the host (highest priority)
//! 2. `TAGDESK_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/tagdesk/config.toml` or OS equivalent)
//! 4. Built-in defaults (code constants)
//!
//! Every field has a built-in default, so a partial file (or none at all)
//! yields a usable configuration.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Station configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Event bus channel capacity
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Identity-switch protocol timing
    #[serde(default)]
    pub switch: SwitchConfig,

    /// Scan admission limits
    #[serde(default)]
    pub admission: AdmissionConfig,
}

/// Timing knobs for the identity-switch protocol
#[derive(Debug, Clone, Deserialize)]
pub struct SwitchConfig {
    /// Ignore repeated tag presentations within this window (reader debounce)
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Pause after `SessionResetRequested` so consumers can clear stale state
    #[serde(default = "default_reset_settle_ms")]
    pub reset_settle_ms: u64,

    /// Pause after the logout notifications, before creating the new session
    #[serde(default = "default_logout_settle_ms")]
    pub logout_settle_ms: u64,
}

/// Limit knobs for the scan admission gate
#[derive(Debug, Clone, Deserialize)]
pub struct AdmissionConfig {
    /// Maximum admissions per session within the rolling rate window
    #[serde(default = "default_rate_cap")]
    pub rate_cap: u32,

    /// Rolling rate window length in seconds
    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,

    /// Identical-payload guard window in milliseconds
    #[serde(default = "default_duplicate_guard_ms")]
    pub duplicate_guard_ms: u64,
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tagdesk").join("tagdesk.db"))
        .unwrap_or_else(|| PathBuf::from("./tagdesk.db"))
}

fn default_event_capacity() -> usize {
    1000
}

fn default_cooldown_ms() -> u64 {
    2000
}

fn default_reset_settle_ms() -> u64 {
    100
}

fn default_logout_settle_ms() -> u64 {
    200
}

fn default_rate_cap() -> u32 {
    20
}

fn default_rate_window_secs() -> u64 {
    60
}

fn default_duplicate_guard_ms() -> u64 {
    3000
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            reset_settle_ms: default_reset_settle_ms(),
            logout_settle_ms: default_logout_settle_ms(),
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            rate_cap: default_rate_cap(),
            rate_window_secs: default_rate_window_secs(),
            duplicate_guard_ms: default_duplicate_guard_ms(),
        }
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            event_capacity: default_event_capacity(),
            switch: SwitchConfig::default(),
            admission: AdmissionConfig::default(),
        }
    }
}

impl SwitchConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn reset_settle(&self) -> Duration {
        Duration::from_millis(self.reset_settle_ms)
    }

    pub fn logout_settle(&self) -> Duration {
        Duration::from_millis(self.logout_settle_ms)
    }
}

impl AdmissionConfig {
    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }

    pub fn duplicate_guard(&self) -> Duration {
        Duration::from_millis(self.duplicate_guard_ms)
    }
}

impl StationConfig {
    /// Load configuration, resolving the file in priority order.
    ///
    /// Missing file is not an error (defaults apply); an unreadable or
    /// malformed file is.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match resolve_config_file(explicit_path) {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("no config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: StationConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Resolve the config file path following the priority order.
fn resolve_config_file(explicit_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: explicit path from the host
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: environment variable
    if let Ok(path) = std::env::var("TAGDESK_CONFIG") {
        return Some(PathBuf::from(path));
    }

    // Priority 3: platform config directory
    let candidate = dirs::config_dir().map(|d| d.join("tagdesk").join("config.toml"));
    match candidate {
        Some(path) if path.exists() => Some(path),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_station_contract() {
        let config = StationConfig::default();
        assert_eq!(config.switch.cooldown(), Duration::from_secs(2));
        assert_eq!(config.switch.reset_settle(), Duration::from_millis(100));
        assert_eq!(config.switch.logout_settle(), Duration::from_millis(200));
        assert_eq!(config.admission.rate_cap, 20);
        assert_eq!(config.admission.rate_window(), Duration::from_secs(60));
        assert_eq!(config.admission.duplicate_guard(), Duration::from_secs(3));
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let config: StationConfig = toml::from_str(
            r#"
            database_path = "/tmp/station.db"

            [admission]
            rate_cap = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/station.db"));
        assert_eq!(config.admission.rate_cap, 5);
        assert_eq!(config.admission.rate_window_secs, 60);
        assert_eq!(config.switch.cooldown_ms, 2000);
    }

    #[test]
    fn load_from_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "database_path = [not toml").unwrap();
        assert!(StationConfig::load_from(&path).is_err());
    }
}
