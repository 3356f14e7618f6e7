pub mod distance;
pub mod kinematics;
pub mod lateral;
pub mod loader;
pub mod metrics;
pub mod numeric;
pub mod smoothing;

use serde::{Deserialize, Serialize};

pub use distance::{DistanceSource, DistanceTrace, normalize_distance};
pub use loader::{DriverLap, load_laps_jsonl, select_lap};

/// Brake channel as reported by the data source: either a pressure/percentage or an on/off
/// switch.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum BrakeInput {
    Pressed(bool),
    Pressure(f64),
}

impl BrakeInput {
    /// On/off brakes map to 100 (pressed) and 0 (released), pressures pass through.
    pub fn value(&self) -> f64 {
        match self {
            BrakeInput::Pressed(true) => 100.,
            BrakeInput::Pressed(false) => 0.,
            BrakeInput::Pressure(p) => *p,
        }
    }
}

/// A single raw telemetry sample. Every channel is optional.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetrySample {
    /// Elapsed session time (s)
    pub session_time_s: Option<f64>,
    /// Generic time channel, usually time since lap start (s)
    pub time_s: Option<f64>,
    /// Running lap time (s)
    pub lap_time_s: Option<f64>,
    /// Absolute timestamp (s since an arbitrary epoch)
    pub timestamp_s: Option<f64>,
    /// Planar position, arbitrary track units
    pub x: Option<f64>,
    pub y: Option<f64>,
    /// Speed, km/h or m/s
    pub speed: Option<f64>,
    /// Throttle, 0-100 or 0-1
    pub throttle: Option<f64>,
    pub brake: Option<BrakeInput>,
    pub gear: Option<i32>,
    /// Distance along the lap, when the data source already provides it
    pub distance: Option<f64>,
}

/// Lap header emitted by the data source before the samples of each lap.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LapInfo {
    pub driver: String,
    pub lap_number: u32,
    pub lap_time_s: Option<f64>,
    pub sector_times_s: Vec<Option<f64>>,
    pub compound: Option<String>,
    pub team: Option<String>,
}

impl Default for LapInfo {
    fn default() -> Self {
        Self {
            driver: "UNK".to_string(),
            lap_number: 0,
            lap_time_s: None,
            sector_times_s: Vec::new(),
            compound: None,
            team: None,
        }
    }
}

/// One line of a lap telemetry file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum LapRecord {
    LapStart(LapInfo),
    Sample(Box<TelemetrySample>),
}

/// Time channels in the order of preference used for differentiation and lap timing.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeSource {
    SessionTime,
    Time,
    LapTime,
    Timestamp,
}

impl TimeSource {
    pub const PRIORITY: [TimeSource; 4] = [
        TimeSource::SessionTime,
        TimeSource::Time,
        TimeSource::LapTime,
        TimeSource::Timestamp,
    ];
}

/// Column oriented telemetry of one lap.
///
/// A channel is present (`Some`) when at least one sample carried it; samples lacking the value
/// hold `NaN`. Every present column has exactly [`LapTelemetry::len`] entries.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct LapTelemetry {
    samples: usize,
    pub session_time_s: Option<Vec<f64>>,
    pub time_s: Option<Vec<f64>>,
    pub lap_time_s: Option<Vec<f64>>,
    pub timestamp_s: Option<Vec<f64>>,
    pub x: Option<Vec<f64>>,
    pub y: Option<Vec<f64>>,
    pub speed: Option<Vec<f64>>,
    pub throttle: Option<Vec<f64>>,
    pub brake: Option<Vec<f64>>,
    pub gear: Option<Vec<i32>>,
    pub distance: Option<DistanceTrace>,
    pub longitudinal_accel_g: Option<Vec<f64>>,
    pub lateral_accel_g: Option<Vec<f64>>,
}

fn column<F>(samples: &[TelemetrySample], channel: F) -> Option<Vec<f64>>
where
    F: Fn(&TelemetrySample) -> Option<f64>,
{
    if !samples.iter().any(|s| channel(s).is_some()) {
        return None;
    }
    Some(
        samples
            .iter()
            .map(|s| channel(s).unwrap_or(f64::NAN))
            .collect(),
    )
}

impl LapTelemetry {
    pub fn from_samples(samples: &[TelemetrySample]) -> Self {
        let gear = if samples.iter().any(|s| s.gear.is_some()) {
            Some(samples.iter().map(|s| s.gear.unwrap_or(0)).collect())
        } else {
            None
        };
        Self {
            samples: samples.len(),
            session_time_s: column(samples, |s| s.session_time_s),
            time_s: column(samples, |s| s.time_s),
            lap_time_s: column(samples, |s| s.lap_time_s),
            timestamp_s: column(samples, |s| s.timestamp_s),
            x: column(samples, |s| s.x),
            y: column(samples, |s| s.y),
            speed: column(samples, |s| s.speed),
            throttle: column(samples, |s| s.throttle),
            brake: column(samples, |s| s.brake.map(|b| b.value())),
            gear,
            distance: column(samples, |s| s.distance).map(DistanceTrace::measured),
            longitudinal_accel_g: None,
            lateral_accel_g: None,
        }
    }

    pub fn len(&self) -> usize {
        self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    pub fn time_column(&self, source: TimeSource) -> Option<&[f64]> {
        match source {
            TimeSource::SessionTime => self.session_time_s.as_deref(),
            TimeSource::Time => self.time_s.as_deref(),
            TimeSource::LapTime => self.lap_time_s.as_deref(),
            TimeSource::Timestamp => self.timestamp_s.as_deref(),
        }
    }

    /// First time channel, in priority order, with at least two finite samples.
    pub fn usable_time(&self) -> Option<(TimeSource, &[f64])> {
        TimeSource::PRIORITY.iter().find_map(|&source| {
            let values = self.time_column(source)?;
            let finite = values.iter().filter(|v| v.is_finite()).count();
            (finite >= 2).then_some((source, values))
        })
    }

    /// Both planar axes, when present.
    pub fn positions(&self) -> Option<(&[f64], &[f64])> {
        Some((self.x.as_deref()?, self.y.as_deref()?))
    }

    pub fn distance_values(&self) -> Option<&[f64]> {
        self.distance.as_ref().map(|d| d.values.as_slice())
    }
}
