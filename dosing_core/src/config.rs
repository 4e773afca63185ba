//! Configuration file support for dosekit.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/dosekit/config.toml`.

use crate::reconstitution::ReconstitutionLimits;
use crate::{Error, Result};
use chrono::NaiveTime;
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
    pub rotation: RotationConfig,

    #[serde(default)]
    pub reconstitution: ReconstitutionLimits,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Scheduling defaults
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Dose time for regimens without their own, as "HH:MM"
    #[serde(default = "default_dose_time")]
    pub default_time: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            default_time: default_dose_time(),
        }
    }
}

impl ScheduleConfig {
    /// Parsed default dose time
    pub fn default_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.default_time, "%H:%M").map_err(|e| {
            Error::Config(format!(
                "schedule.default_time {:?} is not HH:MM: {}",
                self.default_time, e
            ))
        })
    }
}

/// Site rotation parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RotationConfig {
    #[serde(default = "default_lookback")]
    pub lookback: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            lookback: default_lookback(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("dosekit")
}

fn default_dose_time() -> String {
    "08:00".into()
}

fn default_lookback() -> usize {
    crate::rotation::DEFAULT_LOOKBACK
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

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("dosekit").join("config.toml")
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        self.schedule.default_time()?;

        if self.rotation.lookback == 0 {
            return Err(Error::Config("rotation.lookback must be at least 1".into()));
        }

        let limits = &self.reconstitution;
        if limits.max_vial_size <= 0.0 || limits.min_diluent_ml < 0.0 {
            return Err(Error::Config(
                "reconstitution limits must be positive".into(),
            ));
        }
        if limits.min_diluent_ml > limits.max_diluent_ml {
            return Err(Error::Config(format!(
                "reconstitution.min_diluent_ml ({}) exceeds max_diluent_ml ({})",
                limits.min_diluent_ml, limits.max_diluent_ml
            )));
        }

        Ok(())
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
