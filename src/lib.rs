// Library interface for lapdelta
// The binary and the integration tests both go through these modules

pub mod analysis;
pub mod config;
pub mod errors;
pub mod telemetry;
pub mod writer;

// Re-export commonly used types
pub use analysis::{ComparisonReport, LapComparison, LapReport, analyze_lap, compare, compare_laps};
pub use config::AnalysisConfig;
pub use errors::LapDeltaError;
pub use telemetry::kinematics::{Kinematics, annotate};
pub use telemetry::metrics::{PerformanceMetrics, calculate_performance_metrics};
pub use telemetry::smoothing::{SavitzkyGolay, smooth};
pub use telemetry::{
    DistanceSource, DistanceTrace, DriverLap, LapTelemetry, TelemetrySample, load_laps_jsonl,
    normalize_distance, select_lap,
};
