use log::warn;
use serde::{Deserialize, Serialize};

use super::LapTelemetry;
use super::numeric::{is_non_decreasing, running_max};

/// Where the distance channel of a lap came from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum DistanceSource {
    /// Provided by the data source
    Measured,
    /// Cumulative arc length of the X/Y trace
    PositionDerived,
    /// Sample index used as a stand-in: spatial results are not trustworthy
    SampleIndex,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DistanceTrace {
    pub values: Vec<f64>,
    pub source: DistanceSource,
}

impl DistanceTrace {
    pub fn measured(values: Vec<f64>) -> Self {
        Self {
            values,
            source: DistanceSource::Measured,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.source == DistanceSource::SampleIndex
    }
}

/// Cumulative arc length of a planar trace. Missing steps count as zero length.
pub fn arc_length(x: &[f64], y: &[f64]) -> Vec<f64> {
    let mut total = 0.0;
    let mut out = Vec::with_capacity(x.len().min(y.len()));
    for (i, (&xi, &yi)) in x.iter().zip(y).enumerate() {
        if i > 0 {
            let step = (xi - x[i - 1]).hypot(yi - y[i - 1]);
            if step.is_finite() {
                total += step;
            }
        }
        out.push(total);
    }
    out
}

/// Distance trace for `lap` without touching the lap itself.
pub fn compute_distance(lap: &LapTelemetry) -> DistanceTrace {
    if let Some(existing) = &lap.distance {
        if is_non_decreasing(&existing.values) && existing.values.iter().all(|v| v.is_finite()) {
            return existing.clone();
        }
        warn!("Distance channel is not monotonic, clamping it with a running maximum");
        return DistanceTrace {
            values: running_max(&existing.values),
            source: existing.source,
        };
    }

    if let Some((x, y)) = lap.positions() {
        return DistanceTrace {
            values: arc_length(x, y),
            source: DistanceSource::PositionDerived,
        };
    }

    warn!(
        "No distance or position channel, using the sample index as distance for {} samples",
        lap.len()
    );
    DistanceTrace {
        values: (0..lap.len()).map(|i| i as f64).collect(),
        source: DistanceSource::SampleIndex,
    }
}

/// Copy of `lap` guaranteed to carry a non-decreasing distance channel.
///
/// A lap that already has a valid distance channel comes back unchanged.
pub fn normalize_distance(lap: &LapTelemetry) -> LapTelemetry {
    let mut normalized = lap.clone();
    normalized.distance = Some(compute_distance(lap));
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetrySample;
    use proptest::prelude::*;

    fn lap_from_xy(points: &[(f64, f64)]) -> LapTelemetry {
        let samples: Vec<TelemetrySample> = points
            .iter()
            .map(|&(x, y)| TelemetrySample {
                x: Some(x),
                y: Some(y),
                speed: Some(200.),
                ..Default::default()
            })
            .collect();
        LapTelemetry::from_samples(&samples)
    }

    #[test]
    fn test_distance_from_positions() {
        let lap = lap_from_xy(&[(0., 0.), (3., 4.), (3., 10.)]);
        let normalized = normalize_distance(&lap);
        let trace = normalized.distance.unwrap();
        assert_eq!(trace.values, vec![0., 5., 11.]);
        assert_eq!(trace.source, DistanceSource::PositionDerived);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let lap = lap_from_xy(&[(0., 0.), (1., 1.), (5., 2.), (4., 8.)]);
        let once = normalize_distance(&lap);
        let twice = normalize_distance(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_existing_distance_kept() {
        let samples: Vec<TelemetrySample> = (0..4)
            .map(|i| TelemetrySample {
                x: Some(i as f64 * 100.),
                y: Some(0.),
                distance: Some(i as f64 * 7.),
                ..Default::default()
            })
            .collect();
        let lap = LapTelemetry::from_samples(&samples);
        let normalized = normalize_distance(&lap);
        assert_eq!(normalized.distance, lap.distance);
        assert_eq!(
            normalized.distance.unwrap().source,
            DistanceSource::Measured
        );
    }

    #[test]
    fn test_gps_dip_keeps_distance_monotonic() {
        // the car appears to jump backwards for one sample
        let lap = lap_from_xy(&[(0., 0.), (10., 0.), (20., 0.), (17., 0.), (30., 0.), (40., 0.)]);
        let values = normalize_distance(&lap).distance.unwrap().values;
        assert!(values.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_measured_distance_dip_is_clamped() {
        let samples: Vec<TelemetrySample> = [0., 10., 20., 15., 30.]
            .iter()
            .map(|&d| TelemetrySample {
                distance: Some(d),
                ..Default::default()
            })
            .collect();
        let lap = LapTelemetry::from_samples(&samples);
        let trace = normalize_distance(&lap).distance.unwrap();
        assert_eq!(trace.values, vec![0., 10., 20., 20., 30.]);
        assert_eq!(trace.source, DistanceSource::Measured);
    }

    #[test]
    fn test_sample_index_fallback_is_tagged() {
        let samples: Vec<TelemetrySample> = (0..5)
            .map(|_| TelemetrySample {
                speed: Some(100.),
                ..Default::default()
            })
            .collect();
        let trace = normalize_distance(&LapTelemetry::from_samples(&samples))
            .distance
            .unwrap();
        assert_eq!(trace.values, vec![0., 1., 2., 3., 4.]);
        assert!(trace.is_synthetic());
    }

    #[test]
    fn test_normalize_does_not_mutate_input() {
        let lap = lap_from_xy(&[(0., 0.), (1., 0.)]);
        let _ = normalize_distance(&lap);
        assert!(lap.distance.is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_distance_never_decreases(
            points in prop::collection::vec((-5000.0f64..5000.0, -5000.0f64..5000.0), 0..200)
        ) {
            let lap = lap_from_xy(&points);
            let trace = normalize_distance(&lap).distance.unwrap();
            prop_assert_eq!(trace.values.len(), points.len());
            prop_assert!(trace.values.windows(2).all(|w| w[1] >= w[0]));
        }
    }
}
