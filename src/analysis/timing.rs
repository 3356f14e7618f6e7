use serde::Serialize;

use crate::telemetry::LapInfo;

/// `m:ss.mmm`, or `N/A` for a missing or invalid time.
pub fn format_lap_time(seconds: Option<f64>) -> String {
    match seconds {
        Some(s) if s.is_finite() && s >= 0. => {
            let millis = (s * 1000.).round() as u64;
            format!("{}:{:02}.{:03}", millis / 60_000, (millis / 1000) % 60, millis % 1000)
        }
        _ => "N/A".to_string(),
    }
}

/// Lap and sector times of a lap, ready for display.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LapTiming {
    pub lap_time: String,
    pub sectors: Vec<String>,
}

impl LapTiming {
    pub fn from_info(info: &LapInfo) -> Self {
        Self {
            lap_time: format_lap_time(info.lap_time_s),
            sectors: info
                .sector_times_s
                .iter()
                .map(|s| format_lap_time(*s))
                .collect(),
        }
    }
}
