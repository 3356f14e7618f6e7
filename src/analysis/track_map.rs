use itertools::{Itertools, MinMaxResult};
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::telemetry::LapTelemetry;
use crate::telemetry::kinematics::SpeedProfile;
use crate::telemetry::numeric::{fill_gaps, mean};
use crate::telemetry::smoothing::{SavitzkyGolay, proportional_window};

const MIN_SMOOTHING_WINDOW: usize = 5;
const SMOOTHING_ORDER: usize = 2;
const MIN_SPEED_SPAN: f64 = 1e-9;

/// Straight piece of the racing line coloured by speed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackSegment {
    pub start: [f64; 2],
    pub end: [f64; 2],
    pub speed_kmh: f64,
    /// Speed rescaled to [0, 1] between the slowest and fastest point of the lap
    pub intensity: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackMap {
    pub segments: Vec<TrackSegment>,
    pub min_speed_kmh: f64,
    pub max_speed_kmh: f64,
}

/// Speed coloured outline of the lap. Needs positions and speed.
pub fn build_track_map(lap: &LapTelemetry, config: &AnalysisConfig) -> Option<TrackMap> {
    let (x, y) = lap.positions()?;
    let (x, y) = (fill_gaps(x)?, fill_gaps(y)?);
    let raw_speed = SpeedProfile::from_lap(lap, config)?.kmh;
    let window = proportional_window(
        raw_speed.len(),
        config.track_map_smoothing_fraction,
        MIN_SMOOTHING_WINDOW,
    );
    let speed = SavitzkyGolay::new(window, SMOOTHING_ORDER).apply(&raw_speed);

    let (min_speed_kmh, max_speed_kmh) = match speed.iter().copied().minmax_by(f64::total_cmp) {
        MinMaxResult::NoElements => return None,
        MinMaxResult::OneElement(v) => (v, v),
        MinMaxResult::MinMax(min, max) => (min, max),
    };
    let span = (max_speed_kmh - min_speed_kmh).max(MIN_SPEED_SPAN);

    let len = speed.len();
    let step = len.div_ceil(config.track_map_max_segments.max(1)).max(1);
    let segments = (0..len.saturating_sub(1))
        .step_by(step)
        .map(|i| {
            let j = (i + step).min(len - 1);
            let speed_kmh = mean(&speed[i..j]).unwrap_or(min_speed_kmh);
            TrackSegment {
                start: [x[i], y[i]],
                end: [x[j], y[j]],
                speed_kmh,
                intensity: ((speed_kmh - min_speed_kmh) / span).clamp(0., 1.),
            }
        })
        .collect_vec();

    Some(TrackMap {
        segments,
        min_speed_kmh,
        max_speed_kmh,
    })
}
