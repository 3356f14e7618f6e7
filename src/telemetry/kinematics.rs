use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uom::si::acceleration::{meter_per_second_squared, standard_gravity};
use uom::si::f64::{Acceleration, Velocity};
use uom::si::velocity::{kilometer_per_hour, meter_per_second};

use super::distance::compute_distance;
use super::lateral::{LateralEstimate, estimate_lateral};
use super::numeric::{diff, fill_gaps, finite_max, finite_min, median};
use super::{LapTelemetry, TimeSource};
use crate::config::AnalysisConfig;

/// Unit of a raw speed channel, guessed from its magnitude.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SpeedUnit {
    KilometersPerHour,
    MetersPerSecond,
}

impl SpeedUnit {
    /// A median speed above `threshold` means km/h, anything else is taken as m/s.
    ///
    /// This is a heuristic: a race car averaging more than 60 m/s (216 km/h) over a lap, or
    /// a slow lap averaging below 60 km/h, will be misread.
    pub fn detect(speeds: &[f64], threshold: f64) -> Self {
        match median(&speeds.iter().map(|v| v.abs()).collect::<Vec<_>>()) {
            Some(m) if m > threshold => SpeedUnit::KilometersPerHour,
            _ => SpeedUnit::MetersPerSecond,
        }
    }

    pub fn to_mps(&self, value: f64) -> f64 {
        match self {
            SpeedUnit::KilometersPerHour => {
                Velocity::new::<kilometer_per_hour>(value).get::<meter_per_second>()
            }
            SpeedUnit::MetersPerSecond => value,
        }
    }

    pub fn to_kmh(&self, value: f64) -> f64 {
        match self {
            SpeedUnit::KilometersPerHour => value,
            SpeedUnit::MetersPerSecond => {
                Velocity::new::<meter_per_second>(value).get::<kilometer_per_hour>()
            }
        }
    }
}

pub fn mps2_to_g(value: f64) -> f64 {
    Acceleration::new::<meter_per_second_squared>(value).get::<standard_gravity>()
}

/// Speed channel of a lap converted to both m/s and km/h, gaps filled.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeedProfile {
    pub unit: SpeedUnit,
    pub mps: Vec<f64>,
    pub kmh: Vec<f64>,
}

impl SpeedProfile {
    pub fn from_lap(lap: &LapTelemetry, config: &AnalysisConfig) -> Option<Self> {
        let raw = fill_gaps(lap.speed.as_deref()?)?;
        let unit = SpeedUnit::detect(&raw, config.speed_unit_threshold);
        Some(Self {
            unit,
            mps: raw.iter().map(|v| unit.to_mps(*v)).collect(),
            kmh: raw.iter().map(|v| unit.to_kmh(*v)).collect(),
        })
    }
}

/// What the time steps used for differentiation were derived from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeBasis {
    Recorded(TimeSource),
    /// Rebuilt from distance and speed
    Integrated,
}

/// Per-sample time steps. The first step has no predecessor and gets `min_time_step_s`, as
/// does every non-positive or missing step.
pub fn time_deltas(
    lap: &LapTelemetry,
    distance: &[f64],
    speed_mps: &[f64],
    config: &AnalysisConfig,
) -> (Vec<f64>, TimeBasis) {
    let epsilon = config.min_time_step_s;
    let clamp = |dt: f64| if dt.is_finite() && dt > 0. { dt } else { epsilon };

    if let Some((source, time)) = lap.usable_time() {
        let steps = diff(time, f64::NAN).into_iter().map(clamp).collect();
        return (steps, TimeBasis::Recorded(source));
    }

    debug!("No usable time channel, integrating time from distance and speed");
    let steps = diff(distance, 0.)
        .into_iter()
        .zip(speed_mps)
        .map(|(ds, v)| clamp(ds / v.max(config.min_integration_speed_mps)))
        .collect();
    (steps, TimeBasis::Integrated)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LongitudinalEstimate {
    pub accel_g: Vec<f64>,
    pub max_accel_g: Option<f64>,
    pub max_braking_g: Option<f64>,
    pub time_basis: TimeBasis,
}

/// Longitudinal acceleration from speed changes over time. `None` without a speed channel.
pub fn estimate_longitudinal(
    lap: &LapTelemetry,
    config: &AnalysisConfig,
) -> Option<LongitudinalEstimate> {
    let speed = SpeedProfile::from_lap(lap, config)?;
    let distance = match lap.distance_values() {
        Some(d) => d.to_vec(),
        None => compute_distance(lap).values,
    };
    let (dt, time_basis) = time_deltas(lap, &distance, &speed.mps, config);
    let limit = config.max_longitudinal_g;

    let accel_g: Vec<f64> = diff(&speed.mps, 0.)
        .iter()
        .zip(&dt)
        .enumerate()
        .map(|(i, (dv, dt))| {
            let g = mps2_to_g(dv / dt);
            if i == 0 || !g.is_finite() {
                0.
            } else {
                g.max(-limit).min(limit)
            }
        })
        .collect();

    // the first sample has no predecessor and does not count
    let measured = accel_g.get(1..).unwrap_or_default();
    let max_accel_g = finite_max(measured).map(|v| v.max(0.));
    let max_braking_g = finite_min(measured).map(|v| (-v).max(0.));

    Some(LongitudinalEstimate {
        accel_g,
        max_accel_g,
        max_braking_g,
        time_basis,
    })
}

/// A lap augmented with distance and acceleration channels plus the details of how they were
/// obtained.
#[derive(Clone, Debug, PartialEq)]
pub struct Kinematics {
    pub telemetry: LapTelemetry,
    pub longitudinal: Option<LongitudinalEstimate>,
    pub lateral: LateralEstimate,
}

/// Normalize distance and derive both acceleration channels on a private copy of `lap`.
pub fn annotate(lap: &LapTelemetry, config: &AnalysisConfig) -> Kinematics {
    let mut telemetry = lap.clone();
    telemetry.distance = Some(compute_distance(lap));

    let longitudinal = estimate_longitudinal(&telemetry, config);
    if longitudinal.is_none() {
        warn!("No speed channel, longitudinal acceleration unavailable");
    }
    let lateral = estimate_lateral(&telemetry, config);

    telemetry.longitudinal_accel_g = longitudinal.as_ref().map(|l| l.accel_g.clone());
    telemetry.lateral_accel_g = Some(lateral.lateral_g.clone());

    Kinematics {
        telemetry,
        longitudinal,
        lateral,
    }
}
