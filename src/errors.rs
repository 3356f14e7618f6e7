// Error types for lapdelta

use snafu::Snafu;
use std::io;

#[derive(Debug, Snafu)]
pub enum LapDeltaError {
    // Errors for the lap file loader
    #[snafu(display("Invalid telemetry file: {path}"))]
    InvalidTelemetryFile { path: String },
    #[snafu(display("Error loading telemetry file"))]
    TelemetryLoaderError { source: io::Error },
    #[snafu(display("Telemetry file {path} does not contain any lap"))]
    EmptyTelemetryFile { path: String },
    #[snafu(display("No lap found for driver {driver}{}", lap_suffix(lap_number)))]
    LapNotFound {
        driver: String,
        lap_number: Option<u32>,
    },

    // Errors for the report writer
    #[snafu(display("Error writing report file"))]
    WriterError { source: io::Error },
    #[snafu(display("Error serializing report"))]
    ReportSerializeError { source: serde_json::Error },

    // Config management errors
    #[snafu(display("Could not find application data directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },

    // User input validation errors
    #[snafu(display("Invalid user input: {field} - {reason}"))]
    InvalidUserInput { field: String, reason: String },
}

fn lap_suffix(lap_number: &Option<u32>) -> String {
    lap_number.map(|l| format!(" lap {l}")).unwrap_or_default()
}
