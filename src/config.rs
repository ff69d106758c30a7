//! Application settings.
//! Loaded from an optional JSON file; every field falls back to its default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Region used for the national narrative charts.
    pub national_region: String,
    /// Number of largest regions shown on the bubble map.
    pub map_top_n: u32,
    /// Size of each group in the largest vs smallest comparison.
    pub comparison_group_size: u32,
    /// First year included in the largest vs smallest comparison.
    pub comparison_since: i32,
    pub histogram_bin_width: f64,
    pub max_trend_regions: usize,
    /// Milliseconds between frames when a year widget is playing.
    pub animation_interval_ms: u64,
    /// Marker radius in pixels per unit of price-to-income.
    pub marker_radius_scale: f64,
    /// Number of rows at each end of the affordability ranking table.
    pub ranking_rows: usize,
    pub export_width: u32,
    pub export_height: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            national_region: "United States".to_string(),
            map_top_n: 25,
            comparison_group_size: 100,
            comparison_since: 2000,
            histogram_bin_width: 0.5,
            max_trend_regions: 3,
            animation_interval_ms: 800,
            marker_radius_scale: 4.0,
            ranking_rows: 10,
            export_width: 1400,
            export_height: 900,
        }
    }
}

impl Settings {
    /// Read settings from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the views cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.histogram_bin_width > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "histogram_bin_width must be positive, got {}",
                self.histogram_bin_width
            )));
        }
        if self.map_top_n == 0 {
            return Err(ConfigError::Invalid(
                "map_top_n must be at least 1".to_string(),
            ));
        }
        if self.comparison_group_size == 0 {
            return Err(ConfigError::Invalid(
                "comparison_group_size must be at least 1".to_string(),
            ));
        }
        if self.max_trend_regions == 0 {
            return Err(ConfigError::Invalid(
                "max_trend_regions must be at least 1".to_string(),
            ));
        }
        if self.export_width == 0 || self.export_height == 0 {
            return Err(ConfigError::Invalid(
                "export image size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
