use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::LapDeltaError;

const CONFIG_FILE_NAME: &str = "config.json";
const APP_DIR_NAME: &str = "lapdelta";

/// Tuning parameters of the analysis. Every field has a default, so partial config files are
/// accepted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Median speed above which a speed channel is treated as km/h
    pub speed_unit_threshold: f64,
    /// Replacement for zero or negative time steps (s)
    pub min_time_step_s: f64,
    /// Speed floor used when integrating time from distance (m/s)
    pub min_integration_speed_mps: f64,
    /// Symmetric clip for longitudinal acceleration (g)
    pub max_longitudinal_g: f64,
    /// Upper clip for lateral acceleration (g)
    pub max_lateral_g: f64,
    pub lateral_smoothing_window: usize,
    pub lateral_smoothing_polyorder: usize,
    /// Fewer samples than this skip lateral estimation entirely
    pub min_lateral_samples: usize,
    /// Floor for the length of one path step during curvature estimation
    pub min_path_step: f64,
    /// Percentile of |curvature| used as the clipping bound
    pub curvature_clip_percentile: f64,
    /// Lower bound for the curvature clip (rad per distance unit)
    pub min_curvature_limit: f64,
    /// Curvature results peaking at or below this are considered implausible (g)
    pub min_plausible_lateral_g: f64,
    pub full_throttle_pct: f64,
    pub heavy_braking_pct: f64,
    pub cornering_speed_kmh: f64,
    /// Points on the common distance grid used to compare two laps
    pub grid_resolution: usize,
    pub time_delta_smoothing_window: usize,
    /// Upper bound of coloured segments on a track map
    pub track_map_max_segments: usize,
    /// Fraction of the lap covered by the track map smoothing window
    pub track_map_smoothing_fraction: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            speed_unit_threshold: 60.,
            min_time_step_s: 0.001,
            min_integration_speed_mps: 0.5,
            max_longitudinal_g: 6.,
            max_lateral_g: 8.,
            lateral_smoothing_window: 5,
            lateral_smoothing_polyorder: 2,
            min_lateral_samples: 7,
            min_path_step: 0.1,
            curvature_clip_percentile: 99.,
            min_curvature_limit: 0.1,
            min_plausible_lateral_g: 0.5,
            full_throttle_pct: 98.,
            heavy_braking_pct: 50.,
            cornering_speed_kmh: 200.,
            grid_resolution: 2000,
            time_delta_smoothing_window: 31,
            track_map_max_segments: 1200,
            track_map_smoothing_fraction: 0.02,
        }
    }
}

impl AnalysisConfig {
    pub fn default_path() -> Result<PathBuf, LapDeltaError> {
        Ok(dirs::config_dir()
            .ok_or(LapDeltaError::NoConfigDir)?
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME))
    }

    /// Config stored in the user's config directory, if any.
    pub fn from_local_file() -> Result<Option<Self>, LapDeltaError> {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(None);
        };
        let config_path = config_dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::from_path(&config_path).map(Some)
        } else {
            debug!("No config file at {:?}, using defaults", config_path);
            Ok(None)
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, LapDeltaError> {
        let file =
            std::fs::File::open(path).map_err(|e| LapDeltaError::ConfigIOError { source: e })?;
        let config: Self = serde_json::from_reader(file)
            .map_err(|e| LapDeltaError::ConfigSerializeError { source: e })?;
        config.validate()
    }

    /// Reject values the estimators cannot work with, such as an inverted clip range.
    pub fn validate(self) -> Result<Self, LapDeltaError> {
        let positive = [
            ("speed_unit_threshold", self.speed_unit_threshold),
            ("min_time_step_s", self.min_time_step_s),
            ("min_integration_speed_mps", self.min_integration_speed_mps),
            ("max_longitudinal_g", self.max_longitudinal_g),
            ("max_lateral_g", self.max_lateral_g),
            ("min_path_step", self.min_path_step),
            ("min_curvature_limit", self.min_curvature_limit),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0. {
                return Err(invalid(field, format!("must be finite and positive, got {value}")));
            }
        }

        let finite = [
            ("min_plausible_lateral_g", self.min_plausible_lateral_g),
            ("full_throttle_pct", self.full_throttle_pct),
            ("heavy_braking_pct", self.heavy_braking_pct),
            ("cornering_speed_kmh", self.cornering_speed_kmh),
            ("track_map_smoothing_fraction", self.track_map_smoothing_fraction),
        ];
        for (field, value) in finite {
            if !value.is_finite() || value < 0. {
                return Err(invalid(field, format!("must be finite and not negative, got {value}")));
            }
        }

        if !(self.curvature_clip_percentile > 0. && self.curvature_clip_percentile <= 100.) {
            return Err(invalid(
                "curvature_clip_percentile",
                format!("must be in (0, 100], got {}", self.curvature_clip_percentile),
            ));
        }
        Ok(self)
    }

    /// Explicit path first, then the local config file, then defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self, LapDeltaError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::from_local_file()?.unwrap_or_default().validate(),
        }
    }

    pub fn save(&self) -> Result<PathBuf, LapDeltaError> {
        let config_path = Self::default_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), LapDeltaError> {
        if let Some(parent) = config_path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| LapDeltaError::ConfigIOError { source: e })?;
        }

        let file = std::fs::File::create(config_path)
            .map_err(|e| LapDeltaError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| LapDeltaError::ConfigSerializeError { source: e })
    }
}

fn invalid(field: &str, reason: String) -> LapDeltaError {
    LapDeltaError::InvalidUserInput {
        field: field.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, tempdir};

    #[test]
    fn test_partial_config_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"grid_resolution": 500, "curvature_clip_percentile": 95.0}}"#).unwrap();

        let config = AnalysisConfig::from_path(file.path()).unwrap();
        assert_eq!(config.grid_resolution, 500);
        assert_eq!(config.curvature_clip_percentile, 95.0);
        assert_eq!(config.min_curvature_limit, 0.1);
        assert_eq!(config.speed_unit_threshold, 60.);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = AnalysisConfig {
            cornering_speed_kmh: 180.,
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(AnalysisConfig::from_path(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        assert!(matches!(
            AnalysisConfig::from_path(file.path()),
            Err(LapDeltaError::ConfigSerializeError { .. })
        ));
    }

    #[test]
    fn test_explicit_path_wins() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"grid_resolution": 64}}"#).unwrap();
        let config = AnalysisConfig::resolve(Some(file.path())).unwrap();
        assert_eq!(config.grid_resolution, 64);
    }

    #[test]
    fn test_negative_clip_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"max_longitudinal_g": -1.0}}"#).unwrap();
        match AnalysisConfig::from_path(file.path()) {
            Err(LapDeltaError::InvalidUserInput { field, .. }) => {
                assert_eq!(field, "max_longitudinal_g")
            }
            other => panic!("expected InvalidUserInput, got {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let percentile = AnalysisConfig {
            curvature_clip_percentile: 120.,
            ..Default::default()
        };
        assert!(percentile.validate().is_err());

        let lateral = AnalysisConfig {
            max_lateral_g: f64::NAN,
            ..Default::default()
        };
        assert!(lateral.validate().is_err());

        assert!(AnalysisConfig::default().validate().is_ok());
    }
}
