pub mod compare;
pub mod timing;
pub mod track_map;

use log::{info, warn};
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::telemetry::kinematics::{TimeBasis, annotate};
use crate::telemetry::lateral::LateralMethod;
use crate::telemetry::metrics::{
    BrakingProfile, PerformanceMetrics, SpeedStatistics, ThrottleProfile,
    calculate_performance_metrics,
};
use crate::telemetry::{DistanceSource, DriverLap, LapInfo, LapTelemetry};
pub use compare::{LapComparison, compare_laps};
pub use timing::{LapTiming, format_lap_time};
pub use track_map::{TrackMap, build_track_map};

/// Everything derived from a single lap.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LapReport {
    pub info: LapInfo,
    pub timing: LapTiming,
    pub distance_source: Option<DistanceSource>,
    /// How longitudinal acceleration timing was obtained, `None` without speed
    pub time_basis: Option<TimeBasis>,
    pub lateral_method: LateralMethod,
    pub metrics: PerformanceMetrics,
    pub speed_statistics: Option<SpeedStatistics>,
    pub throttle_profile: Option<ThrottleProfile>,
    pub braking_profile: Option<BrakingProfile>,
    pub track_map: Option<TrackMap>,
    /// The lap with `distance`, `longitudinal_accel_g` and `lateral_accel_g` filled in
    pub telemetry: LapTelemetry,
}

pub fn analyze_lap(lap: &DriverLap, config: &AnalysisConfig) -> LapReport {
    let kinematics = annotate(&lap.telemetry, config);
    let telemetry = kinematics.telemetry;
    let metrics = calculate_performance_metrics(&telemetry, config);
    if metrics.is_empty() {
        warn!(
            "No metric could be computed for lap {} of {}",
            lap.info.lap_number, lap.info.driver
        );
    }
    info!(
        "Analyzed lap {} of {} ({} samples, lateral via {:?})",
        lap.info.lap_number,
        lap.info.driver,
        telemetry.len(),
        kinematics.lateral.method
    );

    LapReport {
        info: lap.info.clone(),
        timing: LapTiming::from_info(&lap.info),
        distance_source: telemetry.distance.as_ref().map(|d| d.source),
        time_basis: kinematics.longitudinal.as_ref().map(|l| l.time_basis),
        lateral_method: kinematics.lateral.method,
        speed_statistics: SpeedStatistics::from_lap(&telemetry, config),
        throttle_profile: ThrottleProfile::from_lap(&telemetry),
        braking_profile: BrakingProfile::from_lap(&telemetry),
        track_map: build_track_map(&telemetry, config),
        metrics,
        telemetry,
    }
}

/// Two analyzed laps and their alignment.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub lap_a: LapReport,
    pub lap_b: LapReport,
    pub comparison: LapComparison,
}

/// Analyze both laps, then align the processed laps. `None` when they cannot be compared.
pub fn compare(
    lap_a: &DriverLap,
    lap_b: &DriverLap,
    config: &AnalysisConfig,
) -> Option<ComparisonReport> {
    let report_a = analyze_lap(lap_a, config);
    let report_b = analyze_lap(lap_b, config);
    let comparison = compare_laps(
        &report_a.telemetry,
        &report_a.info.driver,
        &report_b.telemetry,
        &report_b.info.driver,
        config,
    )?;
    info!(
        "{} vs {}: final gap {:+.3}s",
        comparison.driver_a, comparison.driver_b, comparison.time_delta.final_gap_s
    );
    Some(ComparisonReport {
        lap_a: report_a,
        lap_b: report_b,
        comparison,
    })
}
