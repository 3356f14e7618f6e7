use log::{debug, warn};
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::telemetry::LapTelemetry;
use crate::telemetry::distance::{DistanceSource, compute_distance};
use crate::telemetry::kinematics::SpeedProfile;
use crate::telemetry::numeric::{diff, fill_gaps, interp, linspace, running_max};
use crate::telemetry::smoothing::SavitzkyGolay;

const SPEED_SMOOTHING_ORDER: usize = 2;
const TIME_DELTA_SMOOTHING_ORDER: usize = 2;

/// Speed of both drivers on the common grid, km/h.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpeedAdvantage {
    pub speed_a_kmh: Vec<f64>,
    pub speed_b_kmh: Vec<f64>,
    /// A - B, positive where A is faster
    pub diff_kmh: Vec<f64>,
    /// Advantage of A where A is at least as fast as B, `None` elsewhere
    pub a_faster: Vec<Option<f64>>,
    /// Advantage of B (as a positive number) where B is faster, `None` elsewhere
    pub b_faster: Vec<Option<f64>>,
}

impl SpeedAdvantage {
    fn from_speeds(speed_a_kmh: Vec<f64>, speed_b_kmh: Vec<f64>) -> Self {
        let diff_kmh: Vec<f64> = speed_a_kmh
            .iter()
            .zip(&speed_b_kmh)
            .map(|(a, b)| a - b)
            .collect();
        // a tie goes to A, so every grid point lands on exactly one side
        let a_faster = diff_kmh.iter().map(|d| (*d >= 0.).then_some(*d)).collect();
        let b_faster = diff_kmh.iter().map(|d| (*d < 0.).then_some(-d)).collect();
        Self {
            speed_a_kmh,
            speed_b_kmh,
            diff_kmh,
            a_faster,
            b_faster,
        }
    }
}

/// Driver A's racing line resampled on the common grid.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReferencePath {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimeDelta {
    /// Elapsed time of A at each grid distance (s)
    pub time_a_s: Vec<f64>,
    pub time_b_s: Vec<f64>,
    /// B - A, smoothed: positive where B is behind
    pub delta_s: Vec<f64>,
    pub final_gap_s: f64,
}

/// Two laps aligned on a shared distance grid.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LapComparison {
    pub driver_a: String,
    pub driver_b: String,
    /// Common grid over the distance both laps cover (m)
    pub distance: Vec<f64>,
    pub distance_source_a: DistanceSource,
    pub distance_source_b: DistanceSource,
    pub speed: SpeedAdvantage,
    pub reference_path: Option<ReferencePath>,
    pub time_delta: TimeDelta,
}

/// Channels of one lap needed for the alignment.
struct AlignmentInput {
    distance: Vec<f64>,
    source: DistanceSource,
    speed: SpeedProfile,
}

impl AlignmentInput {
    fn from_lap(lap: &LapTelemetry, driver: &str, config: &AnalysisConfig) -> Option<Self> {
        if lap.is_empty() {
            return None;
        }
        let speed = SpeedProfile::from_lap(lap, config)?;
        let trace = compute_distance(lap);
        if trace.is_synthetic() {
            warn!(
                "Lap of {} has no distance or positions, aligning on sample index",
                driver
            );
        }
        Some(Self {
            distance: running_max(&trace.values),
            source: trace.source,
            speed,
        })
    }

    fn max_distance(&self) -> f64 {
        self.distance.last().copied().unwrap_or(0.)
    }
}

/// Savitzky-Golay window for the speed curves: about 1% of the grid, never below 11.
pub fn speed_smoothing_window(grid_len: usize) -> usize {
    ((grid_len / 150) * 2 + 1).max(11)
}

/// Elapsed time against distance, 0 at the start of the distance trace.
///
/// Uses the first usable time channel and otherwise integrates the speed over distance.
pub fn cumulative_time(
    lap: &LapTelemetry,
    distance: &[f64],
    speed_mps: &[f64],
    config: &AnalysisConfig,
) -> Vec<f64> {
    if let Some((source, time)) = lap.usable_time()
        && let Some(time) = fill_gaps(time)
    {
        debug!("Cumulative time from {:?}", source);
        let start_distance = distance.first().copied().unwrap_or(0.);
        let t0 = interp(&[start_distance], distance, &time)[0];
        return time.iter().map(|t| t - t0).collect();
    }

    debug!("Cumulative time integrated from speed");
    let mut elapsed = 0.;
    diff(distance, 0.)
        .iter()
        .zip(speed_mps)
        .map(|(ds, v)| {
            let step = ds / v.max(config.min_integration_speed_mps);
            if step.is_finite() {
                elapsed += step;
            }
            elapsed
        })
        .collect()
}

/// Align two processed laps and compute where each driver gains.
///
/// Returns `None` when either lap is empty or has no speed channel. Laps that barely overlap
/// still produce a (degenerate) comparison.
pub fn compare_laps(
    lap_a: &LapTelemetry,
    driver_a: &str,
    lap_b: &LapTelemetry,
    driver_b: &str,
    config: &AnalysisConfig,
) -> Option<LapComparison> {
    let Some(a) = AlignmentInput::from_lap(lap_a, driver_a, config) else {
        warn!("Cannot compare: lap of {} is empty or has no speed", driver_a);
        return None;
    };
    let Some(b) = AlignmentInput::from_lap(lap_b, driver_b, config) else {
        warn!("Cannot compare: lap of {} is empty or has no speed", driver_b);
        return None;
    };

    if (a.source == DistanceSource::SampleIndex) != (b.source == DistanceSource::SampleIndex) {
        warn!(
            "Distance of {} is {:?} but {} is {:?}, the grid mixes samples and meters",
            driver_a, a.source, driver_b, b.source
        );
    }

    let overlap = a.max_distance().min(b.max_distance());
    if overlap <= 0. {
        warn!(
            "Laps of {} and {} share no distance, comparison is degenerate",
            driver_a, driver_b
        );
    }
    let grid = linspace(0., overlap.max(0.), config.grid_resolution.max(2));

    let speed_filter =
        SavitzkyGolay::new(speed_smoothing_window(grid.len()), SPEED_SMOOTHING_ORDER);
    let speed = SpeedAdvantage::from_speeds(
        speed_filter.apply(&interp(&grid, &a.distance, &a.speed.kmh)),
        speed_filter.apply(&interp(&grid, &b.distance, &b.speed.kmh)),
    );

    let reference_path = lap_a.positions().and_then(|(x, y)| {
        Some(ReferencePath {
            x: interp(&grid, &a.distance, &fill_gaps(x)?),
            y: interp(&grid, &a.distance, &fill_gaps(y)?),
        })
    });

    let time_a_s = interp(
        &grid,
        &a.distance,
        &cumulative_time(lap_a, &a.distance, &a.speed.mps, config),
    );
    let time_b_s = interp(
        &grid,
        &b.distance,
        &cumulative_time(lap_b, &b.distance, &b.speed.mps, config),
    );
    let raw_delta: Vec<f64> = time_b_s.iter().zip(&time_a_s).map(|(b, a)| b - a).collect();
    let delta_s = SavitzkyGolay::new(
        config.time_delta_smoothing_window,
        TIME_DELTA_SMOOTHING_ORDER,
    )
    .apply(&raw_delta);
    let final_gap_s = delta_s.last().copied().unwrap_or(0.);
    debug!(
        "{} vs {}: final gap {:+.3}s over {:.0}m",
        driver_a, driver_b, final_gap_s, overlap
    );

    Some(LapComparison {
        driver_a: driver_a.to_string(),
        driver_b: driver_b.to_string(),
        distance: grid,
        distance_source_a: a.source,
        distance_source_b: b.source,
        speed,
        reference_path,
        time_delta: TimeDelta {
            time_a_s,
            time_b_s,
            delta_s,
            final_gap_s,
        },
    })
}
