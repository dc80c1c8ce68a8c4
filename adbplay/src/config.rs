//! Runtime settings
//!
//! Resolution priority, highest first:
//! 1. Command-line options
//! 2. Environment variables (`ADBPLAY_*`)
//! 3. TOML config file (explicit path, or `<config_dir>/adbplay/config.toml`)
//! 4. Built-in defaults

use crate::error::{Error, Result};
use crate::logging::DEFAULT_LOG_FILTER;
use crate::subsystem::{Permille, PERMILLE_FULL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "ADBPLAY_";

/// Settings for one run. Every key is optional in the TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Delay between play-state polls
    pub poll_interval_ms: u64,

    /// Output device name; `None` selects the host default
    pub output_device: Option<String>,

    /// Capacity of the read-ahead buffer, in milliseconds of audio
    pub prefetch_buffer_ms: u64,

    /// Fill level at which an underflowing player has enough data again
    pub sufficient_fill_permille: Permille,

    /// Minimum fill level movement that raises a fill-level event
    pub fill_update_permille: Permille,

    /// Played audio between two new-position events
    pub position_update_ms: u64,

    /// tracing filter directive for the diagnostic log
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            output_device: None,
            prefetch_buffer_ms: 2000,
            sufficient_fill_permille: 250,
            fill_update_permille: 100,
            position_update_ms: 1000,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Values given on the command line; `None` leaves the lower layers in charge
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub poll_interval_ms: Option<u64>,
    pub output_device: Option<String>,
    pub log_filter: Option<String>,
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn prefetch_buffer(&self) -> Duration {
        Duration::from_millis(self.prefetch_buffer_ms)
    }

    pub fn position_update(&self) -> Duration {
        Duration::from_millis(self.position_update_ms)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Resolve settings from every layer and validate the result
    pub fn resolve(overrides: &Overrides) -> Result<Self> {
        let mut settings = match &overrides.config_file {
            // An explicit file must exist
            Some(path) => {
                info!("Loading config from {}", path.display());
                Self::load_file(path)?
            }
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => {
                    info!("Loading config from {}", path.display());
                    Self::load_file(&path)?
                }
                None => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        settings.apply_env()?;
        settings.apply_overrides(overrides);
        settings.validate()?;
        Ok(settings)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_value("POLL_INTERVAL_MS")? {
            self.poll_interval_ms = v;
        }
        if let Some(v) = env_string("OUTPUT_DEVICE") {
            self.output_device = Some(v);
        }
        if let Some(v) = env_value("PREFETCH_BUFFER_MS")? {
            self.prefetch_buffer_ms = v;
        }
        if let Some(v) = env_value("SUFFICIENT_FILL_PERMILLE")? {
            self.sufficient_fill_permille = v;
        }
        if let Some(v) = env_value("FILL_UPDATE_PERMILLE")? {
            self.fill_update_permille = v;
        }
        if let Some(v) = env_value("POSITION_UPDATE_MS")? {
            self.position_update_ms = v;
        }
        if let Some(v) = env_string("LOG_FILTER") {
            self.log_filter = v;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(v) = overrides.poll_interval_ms {
            self.poll_interval_ms = v;
        }
        if let Some(v) = &overrides.output_device {
            self.output_device = Some(v.clone());
        }
        if let Some(v) = &overrides.log_filter {
            self.log_filter = v.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be greater than 0".to_string()));
        }
        if self.prefetch_buffer_ms == 0 {
            return Err(Error::Config("prefetch_buffer_ms must be greater than 0".to_string()));
        }
        if self.position_update_ms == 0 {
            return Err(Error::Config("position_update_ms must be greater than 0".to_string()));
        }
        if self.sufficient_fill_permille > PERMILLE_FULL {
            return Err(Error::Config(format!(
                "sufficient_fill_permille must be at most {}, got {}",
                PERMILLE_FULL, self.sufficient_fill_permille
            )));
        }
        if self.fill_update_permille == 0 || self.fill_update_permille > PERMILLE_FULL {
            return Err(Error::Config(format!(
                "fill_update_permille must be in 1..={}, got {}",
                PERMILLE_FULL, self.fill_update_permille
            )));
        }
        Ok(())
    }
}

/// `<config_dir>/adbplay/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("adbplay").join("config.toml"))
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, key))
        .ok()
        .filter(|v| !v.is_empty())
}

fn env_value<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        Some(raw) => raw.trim().parse().map(Some).map_err(|e| {
            Error::Config(format!("{}{}={:?}: {}", ENV_PREFIX, key, raw, e))
        }),
        None => Ok(None),
    }
}
