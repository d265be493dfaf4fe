//! Station configuration.
//!
//! Everything the original firmware hard-coded as build-time constants —
//! cycle periods, the averaging window, the clock plausibility floor — is a
//! value here, loadable from a JSON file next to the data root.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::reconcile::ReconcilerConfig;

/// Top-level station configuration.
///
/// # Example
///
/// ```
/// use aeris::config::StationConfig;
///
/// let config = StationConfig::default();
/// assert!(config.validate().is_ok());
/// assert_eq!(config.averaging_window, 60);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Root of the station data directory on the storage device.
    pub data_root: PathBuf,
    /// Interval between measurements appended to the rotating logs.
    pub logging_interval: Duration,
    /// Raw samples averaged into one record of the averaging log.
    pub averaging_window: usize,
    /// Interval between image captures.
    pub picture_interval: Duration,
    /// Interval between stats reports.
    pub stats_interval: Duration,
    /// Time reconciler tuning.
    pub reconciler: ReconcilerConfig,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("./station_data"),
            logging_interval: Duration::from_secs(1),
            averaging_window: 60,
            picture_interval: Duration::from_secs(300),
            stats_interval: Duration::from_secs(10),
            reconciler: ReconcilerConfig::default(),
        }
    }
}

impl StationConfig {
    /// Loads and validates configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] / [`ConfigError::Parse`] for file
    /// problems and [`ConfigError::InvalidValue`] for out-of-range values.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a zero averaging window or
    /// zero intervals.
    pub fn validate(&self) -> Result<()> {
        if self.averaging_window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "averaging_window",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        for (field, interval) in [
            ("logging_interval", self.logging_interval),
            ("picture_interval", self.picture_interval),
            ("stats_interval", self.stats_interval),
        ] {
            if interval.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be non-zero".to_string(),
                }
                .into());
            }
        }
        self.reconciler.validate()
    }
}
