//! Lateral acceleration estimation.
//!
//! Lateral g is not measured directly, it is estimated from the shape of the driven path. The
//! estimate is produced by an ordered set of strategies, each of which either succeeds (and ends
//! the search) or reports why it failed, which decides the next strategy to try:
//!
//! ```text
//! Curvature --implausible--> SpeedDrop --any--> RollingVariance --any--> Zero
//!     |                                              ^
//!     +-------------numeric failure------------------+
//!     +--missing channels / too few samples--> Zero
//! ```

use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use simple_moving_average::{SMA, SumTreeSMA};

use super::LapTelemetry;
use super::kinematics::{SpeedProfile, mps2_to_g};
use super::numeric::{finite_max, gradient, percentile};
use super::smoothing::SavitzkyGolay;
use crate::config::AnalysisConfig;

/// Samples in the rolling window of the variance fallback
const ROLLING_WINDOW: usize = 10;
/// Cap of the variance fallback (g)
const ROLLING_MAX_G: f64 = 5.;
/// Corner zone of the speed-drop fallback: below this share of the 80th percentile speed
const CORNER_SPEED_RATIO: f64 = 0.75;
const CORNER_REFERENCE_PERCENTILE: f64 = 80.;

/// Strategy that produced a lateral acceleration channel.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum LateralMethod {
    /// Path curvature times speed squared
    Curvature,
    /// Fixed mapping of reduced cornering speed to 2-5 g
    SpeedDrop,
    /// Rolling standard deviation of speed
    RollingVariance,
    /// Nothing could be estimated
    Zero,
}

/// Reason a strategy gave up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageFailure {
    MissingChannels,
    TooFewSamples,
    Implausible,
    NoCornerZone,
    Numeric,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StageFailure::MissingChannels => "required channels missing",
            StageFailure::TooFewSamples => "not enough samples",
            StageFailure::Implausible => "result implausibly low",
            StageFailure::NoCornerZone => "no low speed zone found",
            StageFailure::Numeric => "numeric failure",
        };
        write!(f, "{reason}")
    }
}

impl LateralMethod {
    /// Strategy to try after `self` failed with `failure`.
    pub fn next(self, failure: StageFailure) -> LateralMethod {
        match (self, failure) {
            (LateralMethod::Curvature, StageFailure::Implausible) => LateralMethod::SpeedDrop,
            (LateralMethod::Curvature, StageFailure::Numeric) => LateralMethod::RollingVariance,
            (LateralMethod::Curvature, _) => LateralMethod::Zero,
            (LateralMethod::SpeedDrop, _) => LateralMethod::RollingVariance,
            (LateralMethod::RollingVariance, _) | (LateralMethod::Zero, _) => LateralMethod::Zero,
        }
    }

    fn run(self, input: &LateralInput, config: &AnalysisConfig) -> Result<Vec<f64>, StageFailure> {
        match self {
            LateralMethod::Curvature => curvature_lateral(input, config),
            LateralMethod::SpeedDrop => speed_drop_lateral(input, config),
            LateralMethod::RollingVariance => rolling_variance_lateral::<ROLLING_WINDOW>(input),
            LateralMethod::Zero => Ok(vec![0.; input.len]),
        }
    }
}

/// Channels the lateral strategies work from.
#[derive(Clone, Debug, PartialEq)]
pub struct LateralInput {
    pub len: usize,
    pub x: Option<Vec<f64>>,
    pub y: Option<Vec<f64>>,
    pub speed: Option<SpeedProfile>,
}

impl LateralInput {
    pub fn from_lap(lap: &LapTelemetry, config: &AnalysisConfig) -> Self {
        Self {
            len: lap.len(),
            x: lap.x.clone(),
            y: lap.y.clone(),
            speed: SpeedProfile::from_lap(lap, config),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LateralEstimate {
    pub lateral_g: Vec<f64>,
    /// `None` when the channels needed for any estimate are absent
    pub max_lateral_g: Option<f64>,
    pub method: LateralMethod,
}

/// Run the strategy chain on `lap`. Always returns a channel of `lap.len()` samples.
pub fn estimate_lateral(lap: &LapTelemetry, config: &AnalysisConfig) -> LateralEstimate {
    let input = LateralInput::from_lap(lap, config);
    let mut method = LateralMethod::Curvature;
    let mut last_failure = None;

    loop {
        match method.run(&input, config) {
            Ok(lateral_g) => {
                let max_lateral_g = match (method, last_failure) {
                    (LateralMethod::Zero, Some(StageFailure::MissingChannels)) => None,
                    _ => Some(finite_max(&lateral_g).unwrap_or(0.)),
                };
                debug!("Lateral acceleration estimated with {:?}", method);
                return LateralEstimate {
                    lateral_g,
                    max_lateral_g,
                    method,
                };
            }
            Err(failure) => {
                let next = method.next(failure);
                if failure == StageFailure::Implausible || next != LateralMethod::Zero {
                    warn!(
                        "Lateral estimate via {:?} failed ({}), falling back to {:?}",
                        method, failure, next
                    );
                } else {
                    debug!("Lateral estimate via {:?} skipped: {}", method, failure);
                }
                last_failure = Some(failure);
                method = next;
            }
        }
    }
}

/// Heading change per unit of path length, clipped to a data driven bound.
pub fn path_curvature(
    x: &[f64],
    y: &[f64],
    config: &AnalysisConfig,
) -> Result<Vec<f64>, StageFailure> {
    let filter = SavitzkyGolay::new(
        config.lateral_smoothing_window,
        config.lateral_smoothing_polyorder,
    );
    let x_smooth = filter.try_apply(x).map_err(|_| StageFailure::Numeric)?;
    let y_smooth = filter.try_apply(y).map_err(|_| StageFailure::Numeric)?;

    let dx = gradient(&x_smooth);
    let dy = gradient(&y_smooth);
    let ds: Vec<f64> = dx
        .iter()
        .zip(&dy)
        .map(|(dx, dy)| dx.hypot(*dy).max(config.min_path_step))
        .collect();
    let heading: Vec<f64> = dx.iter().zip(&dy).map(|(dx, dy)| dy.atan2(*dx)).collect();

    let mut raw: Vec<f64> = heading
        .windows(2)
        .zip(&ds)
        .map(|(h, ds)| wrap_angle(h[1] - h[0]) / ds)
        .collect();
    raw.push(0.);

    if raw.iter().any(|k| !k.is_finite()) {
        return Err(StageFailure::Numeric);
    }
    let magnitudes: Vec<f64> = raw.iter().map(|k| k.abs()).collect();
    let limit = percentile(&magnitudes, config.curvature_clip_percentile)
        .ok_or(StageFailure::Numeric)?
        .max(config.min_curvature_limit);
    Ok(raw.iter().map(|k| k.max(-limit).min(limit)).collect())
}

/// Wrap the difference of two `atan2` headings (always within [-2pi, 2pi]) into (-pi, pi].
fn wrap_angle(angle: f64) -> f64 {
    use std::f64::consts::PI;
    if angle > PI {
        angle - 2. * PI
    } else if angle <= -PI {
        angle + 2. * PI
    } else {
        angle
    }
}

pub fn curvature_lateral(
    input: &LateralInput,
    config: &AnalysisConfig,
) -> Result<Vec<f64>, StageFailure> {
    let (Some(x), Some(y), Some(speed)) = (&input.x, &input.y, &input.speed) else {
        return Err(StageFailure::MissingChannels);
    };
    if input.len < config.min_lateral_samples.max(2) {
        return Err(StageFailure::TooFewSamples);
    }

    let curvature = path_curvature(x, y, config)?;
    let lateral: Vec<f64> = speed
        .mps
        .iter()
        .zip(&curvature)
        .map(|(v, k)| mps2_to_g(v.powi(2) * k.abs()).min(config.max_lateral_g).max(0.))
        .collect();
    if lateral.iter().any(|g| !g.is_finite()) {
        return Err(StageFailure::Numeric);
    }

    match finite_max(&lateral) {
        Some(max) if max > config.min_plausible_lateral_g => Ok(lateral),
        _ => Err(StageFailure::Implausible),
    }
}

/// Empirical cornering load from how far speed drops below the fast sections.
pub fn speed_drop_lateral(
    input: &LateralInput,
    config: &AnalysisConfig,
) -> Result<Vec<f64>, StageFailure> {
    let speed = input.speed.as_ref().ok_or(StageFailure::MissingChannels)?;
    let threshold = percentile(&speed.kmh, CORNER_REFERENCE_PERCENTILE)
        .ok_or(StageFailure::Numeric)?
        * CORNER_SPEED_RATIO;

    let lateral: Vec<f64> = speed
        .kmh
        .iter()
        .zip(&speed.mps)
        .map(|(kmh, mps)| {
            if *kmh < threshold {
                (mps / 20. + 2.).min(config.max_lateral_g).max(0.)
            } else {
                0.
            }
        })
        .collect();

    if lateral.iter().all(|g| *g == 0.) {
        return Err(StageFailure::NoCornerZone);
    }
    Ok(lateral)
}

/// Rolling sample standard deviation of speed (km/h) scaled down to a 0-5 g range.
pub fn rolling_variance_lateral<const WINDOW_SIZE: usize>(
    input: &LateralInput,
) -> Result<Vec<f64>, StageFailure> {
    let speed = input.speed.as_ref().ok_or(StageFailure::MissingChannels)?;
    let mut values = SumTreeSMA::<f64, f64, WINDOW_SIZE>::new();
    let mut squares = SumTreeSMA::<f64, f64, WINDOW_SIZE>::new();

    let mut lateral = Vec::with_capacity(speed.kmh.len());
    for v in &speed.kmh {
        values.add_sample(*v);
        squares.add_sample(v * v);
        let n = values.get_num_samples();
        if n < WINDOW_SIZE || n < 2 {
            lateral.push(0.);
            continue;
        }
        let mean = values.get_average();
        let variance = (squares.get_average() - mean * mean) * n as f64 / (n - 1) as f64;
        let std = variance.max(0.).sqrt();
        lateral.push((std / 10.).clamp(0., ROLLING_MAX_G));
    }

    if lateral.iter().any(|g| !g.is_finite()) {
        return Err(StageFailure::Numeric);
    }
    Ok(lateral)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetrySample;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn lap(points: &[(f64, f64, f64)]) -> LapTelemetry {
        let samples: Vec<TelemetrySample> = points
            .iter()
            .map(|&(x, y, v)| TelemetrySample {
                x: Some(x),
                y: Some(y),
                speed: Some(v),
                ..Default::default()
            })
            .collect();
        LapTelemetry::from_samples(&samples)
    }

    /// Constant radius arc at constant speed.
    fn circle(radius: f64, speed_kmh: f64, samples: usize) -> LapTelemetry {
        let step = 5. / radius;
        let points: Vec<(f64, f64, f64)> = (0..samples)
            .map(|i| {
                let a = i as f64 * step;
                (radius * a.cos(), radius * a.sin(), speed_kmh)
            })
            .collect();
        lap(&points)
    }

    #[test]
    fn test_transitions() {
        use LateralMethod::*;
        use StageFailure::*;
        assert_eq!(Curvature.next(Implausible), SpeedDrop);
        assert_eq!(Curvature.next(Numeric), RollingVariance);
        assert_eq!(Curvature.next(MissingChannels), Zero);
        assert_eq!(Curvature.next(TooFewSamples), Zero);
        assert_eq!(SpeedDrop.next(NoCornerZone), RollingVariance);
        assert_eq!(RollingVariance.next(Numeric), Zero);
    }

    #[test]
    fn test_wrap_angle() {
        use std::f64::consts::PI;
        assert_abs_diff_eq!(wrap_angle(1.5 * PI), -0.5 * PI, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_angle(-1.5 * PI), 0.5 * PI, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_angle(PI), PI, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_angle(0.3), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_circle_curvature_matches_radius() {
        // 100 m radius at 108 km/h = 30 m/s -> v^2/r = 9 m/s^2
        let telemetry = circle(100., 108., 60);
        let estimate = estimate_lateral(&telemetry, &AnalysisConfig::default());
        assert_eq!(estimate.method, LateralMethod::Curvature);
        let expected = 9. / 9.80665;
        for g in &estimate.lateral_g[5..50] {
            assert_abs_diff_eq!(*g, expected, epsilon = 0.02);
        }
    }

    #[test]
    fn test_heading_wraps_across_pi() {
        // the circle crosses the -pi/pi heading seam twice
        let telemetry = circle(50., 90., 200);
        let (x, y) = (telemetry.x.as_ref().unwrap(), telemetry.y.as_ref().unwrap());
        let curvature = path_curvature(x, y, &AnalysisConfig::default()).unwrap();
        let inner = &curvature[3..195];
        assert!(inner.iter().all(|k| (k - 0.02).abs() < 0.002), "{inner:?}");
    }

    #[test]
    fn test_straight_line_falls_through_to_variance() {
        let points: Vec<(f64, f64, f64)> = (0..100).map(|i| (i as f64 * 10., 0., 300.)).collect();
        let estimate = estimate_lateral(&lap(&points), &AnalysisConfig::default());
        assert_eq!(estimate.method, LateralMethod::RollingVariance);
        assert!(estimate.lateral_g.iter().all(|g| g.abs() < 1e-3));
        assert!(estimate.max_lateral_g.unwrap() < 1e-3);
    }

    #[test]
    fn test_speed_drop_fallback() {
        // straight path, so curvature is implausible, but speed drops in the middle
        let points: Vec<(f64, f64, f64)> = (0..100)
            .map(|i| {
                let v = if (40..60).contains(&i) { 108. } else { 300. };
                (i as f64 * 10., 0., v)
            })
            .collect();
        let estimate = estimate_lateral(&lap(&points), &AnalysisConfig::default());
        assert_eq!(estimate.method, LateralMethod::SpeedDrop);
        // 30 m/s / 20 + 2
        assert_abs_diff_eq!(estimate.lateral_g[50], 3.5, epsilon = 1e-9);
        assert_eq!(estimate.lateral_g[10], 0.);
        assert_abs_diff_eq!(estimate.max_lateral_g.unwrap(), 3.5, epsilon = 1e-9);
    }

    #[test]
    fn test_rolling_variance_of_step() {
        let mut kmh = vec![100.; 10];
        kmh.extend(vec![150.; 10]);
        let input = LateralInput {
            len: kmh.len(),
            x: None,
            y: None,
            speed: Some(SpeedProfile {
                unit: crate::telemetry::kinematics::SpeedUnit::KilometersPerHour,
                mps: kmh.iter().map(|v| v / 3.6).collect(),
                kmh,
            }),
        };
        let lateral = rolling_variance_lateral::<ROLLING_WINDOW>(&input).unwrap();
        assert!(lateral[..9].iter().all(|g| *g == 0.));
        assert_abs_diff_eq!(lateral[9], 0., epsilon = 1e-6);
        // window of five 100s and five 150s: std = 26.35 km/h
        assert_abs_diff_eq!(lateral[14], 2.635_231_383_473_649, epsilon = 1e-6);
        assert!(lateral.iter().all(|g| (0.0..=5.0).contains(g)));
    }

    #[test]
    fn test_missing_positions_give_null_max() {
        let samples: Vec<TelemetrySample> = (0..20)
            .map(|_| TelemetrySample {
                speed: Some(200.),
                ..Default::default()
            })
            .collect();
        let lap = LapTelemetry::from_samples(&samples);
        let estimate = estimate_lateral(&lap, &AnalysisConfig::default());
        assert_eq!(estimate.method, LateralMethod::Zero);
        assert_eq!(estimate.max_lateral_g, None);
        assert_eq!(estimate.lateral_g, vec![0.; 20]);
    }

    #[test]
    fn test_too_few_samples_give_zero_max() {
        let points: Vec<(f64, f64, f64)> =
            (0..6).map(|i| (i as f64, (i * i) as f64, 150.)).collect();
        let estimate = estimate_lateral(&lap(&points), &AnalysisConfig::default());
        assert_eq!(estimate.method, LateralMethod::Zero);
        assert_eq!(estimate.max_lateral_g, Some(0.));
        assert_eq!(estimate.lateral_g.len(), 6);
    }

    #[test]
    fn test_straight_with_dropout_falls_through_speed_drop() {
        // the gap is filled, the straight is implausible and has no slow zone
        let mut points: Vec<(f64, f64, f64)> = (0..30)
            .map(|i| (i as f64 * 10., 0., 150. + (i % 3) as f64 * 20.))
            .collect();
        points[10].0 = f64::INFINITY;
        let lap = lap(&points);
        let config = AnalysisConfig::default();
        let input = LateralInput::from_lap(&lap, &config);
        assert_eq!(curvature_lateral(&input, &config), Err(StageFailure::Implausible));
        assert_eq!(speed_drop_lateral(&input, &config), Err(StageFailure::NoCornerZone));
        let estimate = estimate_lateral(&lap, &config);
        assert_eq!(estimate.method, LateralMethod::RollingVariance);
    }

    #[test]
    fn test_unusable_positions_skip_to_variance() {
        // x is recorded but never finite, so the curvature stage cannot run at all
        let points: Vec<(f64, f64, f64)> = (0..30)
            .map(|i| (f64::NAN, i as f64 * 10., 150. + (i % 3) as f64 * 20.))
            .collect();
        let lap = lap(&points);
        let config = AnalysisConfig::default();
        let xs = lap.x.clone().unwrap();
        let ys = lap.y.clone().unwrap();
        assert_eq!(path_curvature(&xs, &ys, &config), Err(StageFailure::Numeric));

        let estimate = estimate_lateral(&lap, &config);
        assert_eq!(estimate.method, LateralMethod::RollingVariance);
        assert!(estimate.max_lateral_g.is_some_and(|g| g > 0.));
        assert_eq!(estimate.lateral_g.len(), 30);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_lateral_g_is_clipped(
            points in prop::collection::vec(
                (-1000.0f64..1000.0, -1000.0f64..1000.0, 0.0f64..2000.0),
                0..150,
            )
        ) {
            let estimate = estimate_lateral(&lap(&points), &AnalysisConfig::default());
            prop_assert_eq!(estimate.lateral_g.len(), points.len());
            prop_assert!(estimate.lateral_g.iter().all(|g| (0.0..=8.0).contains(g)));
        }
    }
}
