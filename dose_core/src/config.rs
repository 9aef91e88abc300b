//! Configuration file support for dosectl.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/dosectl/config.toml`.

use crate::recurrence::parse_timezone;
use crate::service::DEFAULT_WINDOW_DAYS;
use crate::{Error, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub caregiver: CaregiverConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Care plan file; defaults to `care_plan.toml` inside `data_dir`
    #[serde(default)]
    pub care_plan: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            care_plan: None,
        }
    }
}

impl DataConfig {
    pub fn care_plan_path(&self, data_dir: &Path) -> PathBuf {
        self.care_plan
            .clone()
            .unwrap_or_else(|| data_dir.join("care_plan.toml"))
    }
}

/// Schedule evaluation configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Zone for schedules that do not name one
    #[serde(default = "default_timezone")]
    pub default_timezone: String,

    /// Listing window length when no end is given
    #[serde(default = "default_window_days")]
    pub window_days: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            default_timezone: default_timezone(),
            window_days: default_window_days(),
        }
    }
}

impl ScheduleConfig {
    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.default_timezone)
            .map_err(|_| Error::Config(format!("Unknown timezone '{}'", self.default_timezone)))
    }
}

/// Acting caregiver
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CaregiverConfig {
    #[serde(default)]
    pub user_id: Option<String>,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("dosectl")
}

fn default_timezone() -> String {
    "UTC".into()
}

fn default_window_days() -> i64 {
    DEFAULT_WINDOW_DAYS
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        self.schedule.timezone()?;
        if self.schedule.window_days < 1 {
            return Err(Error::Config(format!(
                "window_days must be at least 1, got {}",
                self.schedule.window_days
            )));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("dosectl").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
