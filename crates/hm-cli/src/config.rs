//! Configuration loading and management.

use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use hm_core::{AnalysisConfig, Delta, DeviceId, SensorTypeId};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Device metering draw from the utility grid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_meter_device: Option<String>,

    /// Sensor type of grid and production power readings.
    pub power_sensor_type: String,

    /// Sensor type of temperature readings.
    pub temperature_sensor_type: String,

    /// Matching tolerance used when a command is given no `--delta`.
    pub default_delta_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("hm.db"),
            grid_meter_device: None,
            power_sensor_type: "EnergyConsumptionSensor".to_string(),
            temperature_sensor_type: "TemperatureSensor".to_string(),
            default_delta_minutes: Delta::DEFAULT_MINUTES,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (HM_*)
        figment = figment.merge(Env::prefixed("HM_"));

        figment.extract()
    }

    /// Builds the identities the analysis pipelines query by.
    pub fn analysis(&self) -> anyhow::Result<AnalysisConfig> {
        let grid_meter_device = self
            .grid_meter_device
            .as_deref()
            .map(DeviceId::new)
            .transpose()
            .context("invalid grid_meter_device")?;
        Ok(AnalysisConfig {
            grid_meter_device,
            power_sensor_type: SensorTypeId::new(self.power_sensor_type.as_str())
                .context("invalid power_sensor_type")?,
            temperature_sensor_type: SensorTypeId::new(self.temperature_sensor_type.as_str())
                .context("invalid temperature_sensor_type")?,
        })
    }

    /// Resolves a command's `--delta`, falling back to the configured default.
    pub fn delta(&self, requested: Option<i64>) -> anyhow::Result<Delta> {
        let minutes = requested.unwrap_or(self.default_delta_minutes);
        Delta::minutes(minutes).context("invalid delta")
    }
}

/// Returns the platform-specific config directory for hm.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("hm"))
}

/// Returns the platform-specific data directory for hm.
///
/// On Linux: `~/.local/share/hm`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("hm"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_hm() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "hm");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("hm.db"));
    }

    #[test]
    fn test_default_sensor_types_and_delta() {
        let config = Config::default();
        let analysis = config.analysis().unwrap();
        assert_eq!(analysis.power_sensor_type.as_str(), "EnergyConsumptionSensor");
        assert_eq!(analysis.temperature_sensor_type.as_str(), "TemperatureSensor");
        assert!(analysis.grid_meter_device.is_none());
        assert_eq!(config.delta(None).unwrap().as_minutes(), 5);
        assert_eq!(config.delta(Some(0)).unwrap().as_minutes(), 0);
    }

    #[test]
    fn test_negative_delta_is_rejected() {
        let config = Config::default();
        assert!(config.delta(Some(-1)).is_err());
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hm.toml");
        std::fs::write(
            &path,
            "grid_meter_device = \"meter-1\"\ndefault_delta_minutes = 2\n",
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.grid_meter_device.as_deref(), Some("meter-1"));
        assert_eq!(config.default_delta_minutes, 2);
        assert_eq!(config.power_sensor_type, "EnergyConsumptionSensor");
    }

    #[test]
    fn test_blank_grid_meter_is_rejected() {
        let config = Config {
            grid_meter_device: Some("  ".to_string()),
            ..Config::default()
        };
        assert!(config.analysis().is_err());
    }
}
