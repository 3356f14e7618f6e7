use std::collections::BTreeMap;

use log::error;
use serde::Serialize;

use super::LapTelemetry;
use super::kinematics::SpeedProfile;
use super::numeric::{finite_max, finite_min, mean, median, percentile, sample_std, share_pct};
use crate::config::AnalysisConfig;

/// Scalar summary of one lap. A `None` metric means the channel it is computed from is absent,
/// which is not the same thing as a measured zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    /// % of samples at full throttle
    pub full_throttle: Option<f64>,
    /// % of samples with heavy braking
    pub heavy_braking: Option<f64>,
    /// % of samples below the cornering speed
    pub cornering: Option<f64>,
    /// km/h
    pub max_speed: Option<f64>,
    /// km/h
    pub min_speed: Option<f64>,
    pub max_accel_g: Option<f64>,
    pub max_braking_g: Option<f64>,
    pub max_lateral_g: Option<f64>,
}

impl PerformanceMetrics {
    /// Flat name to value view, the shape consumed by report writers.
    pub fn as_map(&self) -> BTreeMap<&'static str, Option<f64>> {
        BTreeMap::from([
            ("full_throttle", self.full_throttle),
            ("heavy_braking", self.heavy_braking),
            ("cornering", self.cornering),
            ("max_speed", self.max_speed),
            ("min_speed", self.min_speed),
            ("max_accel_g", self.max_accel_g),
            ("max_braking_g", self.max_braking_g),
            ("max_lateral_g", self.max_lateral_g),
        ])
    }

    pub fn is_empty(&self) -> bool {
        self.as_map().values().all(Option::is_none)
    }
}

/// Pedal channel on a 0-100 scale. Missing samples count as released, a channel that never
/// exceeds 1 is taken as a 0-1 fraction.
pub fn pedal_percent(values: &[f64]) -> Vec<f64> {
    let filled: Vec<f64> = values
        .iter()
        .map(|v| if v.is_finite() { *v } else { 0. })
        .collect();
    if finite_max(&filled).is_some_and(|max| max <= 1.) {
        filled.iter().map(|v| v * 100.).collect()
    } else {
        filled
    }
}

fn rounded_share(values: &[f64], predicate: impl Fn(f64) -> bool) -> f64 {
    let matching = values.iter().filter(|v| predicate(**v)).count();
    share_pct(matching, values.len()).round()
}

/// A derived column that does not line up with the lap is reported and ignored.
fn checked_column<'a>(
    lap: &LapTelemetry,
    name: &str,
    column: Option<&'a [f64]>,
) -> Option<&'a [f64]> {
    let values = column?;
    if values.len() != lap.len() {
        error!(
            "Column {} has {} samples but the lap has {}, dropping the metrics derived from it",
            name,
            values.len(),
            lap.len()
        );
        return None;
    }
    Some(values)
}

/// Reduce a lap annotated by [`super::kinematics::annotate`] to its performance metrics.
///
/// Never fails: an empty lap gives an empty set of metrics, and every metric whose input
/// channel is absent stays `None`.
pub fn calculate_performance_metrics(
    lap: &LapTelemetry,
    config: &AnalysisConfig,
) -> PerformanceMetrics {
    if lap.is_empty() {
        return PerformanceMetrics::default();
    }
    let mut metrics = PerformanceMetrics::default();

    if let Some(throttle) = checked_column(lap, "throttle", lap.throttle.as_deref()) {
        let throttle = pedal_percent(throttle);
        metrics.full_throttle = Some(rounded_share(&throttle, |t| t >= config.full_throttle_pct));
    }

    if let Some(brake) = checked_column(lap, "brake", lap.brake.as_deref()) {
        let brake = pedal_percent(brake);
        metrics.heavy_braking = Some(if brake.iter().sum::<f64>() > 0. {
            rounded_share(&brake, |b| b > config.heavy_braking_pct)
        } else {
            0.
        });
    }

    if checked_column(lap, "speed", lap.speed.as_deref()).is_some()
        && let Some(speed) = SpeedProfile::from_lap(lap, config)
    {
        metrics.cornering = Some(rounded_share(&speed.kmh, |v| v < config.cornering_speed_kmh));
        metrics.max_speed = finite_max(&speed.kmh);
        metrics.min_speed = finite_min(&speed.kmh);
    }

    if let Some(accel) = checked_column(
        lap,
        "longitudinal_accel_g",
        lap.longitudinal_accel_g.as_deref(),
    ) {
        // the first sample is always 0 and carries no information
        let measured = accel.get(1..).unwrap_or_default();
        metrics.max_accel_g = finite_max(measured).map(|v| v.max(0.));
        metrics.max_braking_g = finite_min(measured).map(|v| (-v).max(0.));
    }

    if lap.positions().is_some()
        && lap.speed.is_some()
        && let Some(lateral) =
            checked_column(lap, "lateral_accel_g", lap.lateral_accel_g.as_deref())
    {
        metrics.max_lateral_g = Some(finite_max(lateral).unwrap_or(0.));
    }

    metrics
}

/// Distribution of the speed channel, km/h.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpeedStatistics {
    pub mean_kmh: f64,
    pub median_kmh: f64,
    pub p25_kmh: f64,
    pub p75_kmh: f64,
    /// `None` with fewer than two samples
    pub std_kmh: Option<f64>,
}

impl SpeedStatistics {
    pub fn from_lap(lap: &LapTelemetry, config: &AnalysisConfig) -> Option<Self> {
        let speed = SpeedProfile::from_lap(lap, config)?;
        Some(Self {
            mean_kmh: mean(&speed.kmh)?,
            median_kmh: median(&speed.kmh)?,
            p25_kmh: percentile(&speed.kmh, 25.)?,
            p75_kmh: percentile(&speed.kmh, 75.)?,
            std_kmh: sample_std(&speed.kmh),
        })
    }
}

/// How the throttle was used over the lap, 0-100 scale.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThrottleProfile {
    pub full_pct: f64,
    pub partial_pct: f64,
    pub none_pct: f64,
    pub mean: f64,
}

impl ThrottleProfile {
    pub fn from_lap(lap: &LapTelemetry) -> Option<Self> {
        let throttle = pedal_percent(lap.throttle.as_deref()?);
        let total = throttle.len();
        let count = |f: &dyn Fn(f64) -> bool| throttle.iter().filter(|t| f(**t)).count();
        Some(Self {
            full_pct: share_pct(count(&|t| t == 100.), total),
            partial_pct: share_pct(count(&|t| t > 0. && t < 100.), total),
            none_pct: share_pct(count(&|t| t == 0.), total),
            mean: mean(&throttle)?,
        })
    }
}

/// Brake usage split into pressure bands, 0-100 scale.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BrakingProfile {
    /// above 80
    pub heavy_pct: f64,
    /// above 30, up to 80
    pub medium_pct: f64,
    /// above 0, up to 30
    pub light_pct: f64,
    pub none_pct: f64,
    pub max: f64,
    pub mean: f64,
}

impl BrakingProfile {
    pub fn from_lap(lap: &LapTelemetry) -> Option<Self> {
        let brake = pedal_percent(lap.brake.as_deref()?);
        let total = brake.len();
        let count = |f: &dyn Fn(f64) -> bool| brake.iter().filter(|b| f(**b)).count();
        Some(Self {
            heavy_pct: share_pct(count(&|b| b > 80.), total),
            medium_pct: share_pct(count(&|b| b > 30. && b <= 80.), total),
            light_pct: share_pct(count(&|b| b > 0. && b <= 30.), total),
            none_pct: share_pct(count(&|b| b == 0.), total),
            max: finite_max(&brake)?,
            mean: mean(&brake)?,
        })
    }
}
