use std::path::Path;

use log::{debug, info};

use super::{LapInfo, LapRecord, LapTelemetry, TelemetrySample};
use crate::LapDeltaError;

/// One lap of one driver as read from a telemetry file.
#[derive(Clone, Debug, PartialEq)]
pub struct DriverLap {
    pub info: LapInfo,
    pub telemetry: LapTelemetry,
}

struct PendingLap {
    info: LapInfo,
    samples: Vec<TelemetrySample>,
}

impl PendingLap {
    fn finish(self) -> DriverLap {
        DriverLap {
            telemetry: LapTelemetry::from_samples(&self.samples),
            info: self.info,
        }
    }
}

/// Read every lap of a JSON lines telemetry file.
///
/// Samples that precede the first `LapStart` record form an anonymous lap. Laps without any
/// sample are dropped.
pub fn load_laps_jsonl(source_file: &Path) -> Result<Vec<DriverLap>, LapDeltaError> {
    if !source_file.is_file() {
        return Err(LapDeltaError::InvalidTelemetryFile {
            path: source_file.display().to_string(),
        });
    }

    let records = serde_jsonlines::json_lines(source_file)
        .map_err(|e| LapDeltaError::TelemetryLoaderError { source: e })?
        .collect::<Result<Vec<LapRecord>, std::io::Error>>()
        .map_err(|e| LapDeltaError::TelemetryLoaderError { source: e })?;

    let mut laps = Vec::new();
    let mut current = PendingLap {
        info: LapInfo::default(),
        samples: Vec::new(),
    };
    for record in records {
        match record {
            LapRecord::LapStart(info) => {
                let finished = std::mem::replace(
                    &mut current,
                    PendingLap {
                        info,
                        samples: Vec::new(),
                    },
                );
                if finished.samples.is_empty() {
                    debug!(
                        "Skipping lap {} of {} without samples",
                        finished.info.lap_number, finished.info.driver
                    );
                } else {
                    laps.push(finished.finish());
                }
            }
            LapRecord::Sample(sample) => current.samples.push(*sample),
        }
    }
    if !current.samples.is_empty() {
        laps.push(current.finish());
    }

    if laps.is_empty() {
        return Err(LapDeltaError::EmptyTelemetryFile {
            path: source_file.display().to_string(),
        });
    }
    info!(
        "Loaded {:?}, found {} laps from {} drivers",
        source_file,
        laps.len(),
        drivers(&laps).len()
    );
    Ok(laps)
}

/// Distinct driver codes in file order.
pub fn drivers(laps: &[DriverLap]) -> Vec<&str> {
    let mut codes: Vec<&str> = Vec::new();
    for lap in laps {
        if !codes.contains(&lap.info.driver.as_str()) {
            codes.push(&lap.info.driver);
        }
    }
    codes
}

/// Pick a lap by driver and lap number.
///
/// Without a driver every lap in the file is a candidate. Without a lap number the fastest timed
/// candidate is chosen, falling back to the first candidate when no lap carries a time.
pub fn select_lap<'a>(
    laps: &'a [DriverLap],
    driver: Option<&str>,
    lap_number: Option<u32>,
) -> Result<&'a DriverLap, LapDeltaError> {
    let not_found = || LapDeltaError::LapNotFound {
        driver: driver.unwrap_or("any").to_string(),
        lap_number,
    };
    let candidates: Vec<&DriverLap> = laps
        .iter()
        .filter(|lap| driver.is_none_or(|d| lap.info.driver.eq_ignore_ascii_case(d)))
        .collect();

    if let Some(number) = lap_number {
        return candidates
            .into_iter()
            .find(|lap| lap.info.lap_number == number)
            .ok_or_else(not_found);
    }

    let fastest = candidates
        .iter()
        .filter_map(|lap| Some((*lap, lap.info.lap_time_s.filter(|t| t.is_finite())?)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(lap, _)| lap);
    fastest
        .or_else(|| candidates.first().copied())
        .ok_or_else(not_found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_lines(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_loads_laps_in_order() {
        let file = write_lines(&[
            r#"{"LapStart":{"driver":"VER","lap_number":1,"lap_time_s":81.2}}"#,
            r#"{"Sample":{"time_s":0.0,"speed":280.0,"x":0.0,"y":0.0}}"#,
            r#"{"Sample":{"time_s":0.1,"speed":281.0,"x":7.8,"y":0.0}}"#,
            r#"{"LapStart":{"driver":"HAM","lap_number":1,"lap_time_s":81.5,"team":"Mercedes"}}"#,
            r#"{"Sample":{"time_s":0.0,"speed":279.0,"brake":false}}"#,
        ]);
        let laps = load_laps_jsonl(file.path()).unwrap();
        assert_eq!(laps.len(), 2);
        assert_eq!(laps[0].info.driver, "VER");
        assert_eq!(laps[0].telemetry.len(), 2);
        assert_eq!(laps[1].info.team.as_deref(), Some("Mercedes"));
        assert_eq!(laps[1].telemetry.brake, Some(vec![0.]));
        assert_eq!(drivers(&laps), vec!["VER", "HAM"]);
    }

    #[test]
    fn test_samples_before_lap_start_are_anonymous() {
        let file = write_lines(&[
            r#"{"Sample":{"speed":100.0}}"#,
            r#"{"LapStart":{"driver":"LEC","lap_number":3}}"#,
            r#"{"LapStart":{"driver":"LEC","lap_number":4}}"#,
            r#"{"Sample":{"speed":120.0}}"#,
        ]);
        let laps = load_laps_jsonl(file.path()).unwrap();
        // lap 3 has no samples
        assert_eq!(laps.len(), 2);
        assert_eq!(laps[0].info.driver, "UNK");
        assert_eq!(laps[0].info.lap_number, 0);
        assert_eq!(laps[1].info.lap_number, 4);
    }

    #[test]
    fn test_empty_file_is_an_error() {
        let file = write_lines(&[r#"{"LapStart":{"driver":"VER","lap_number":1}}"#]);
        assert!(matches!(
            load_laps_jsonl(file.path()),
            Err(LapDeltaError::EmptyTelemetryFile { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(matches!(
            load_laps_jsonl(Path::new("/nonexistent/laps.jsonl")),
            Err(LapDeltaError::InvalidTelemetryFile { .. })
        ));
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let file = write_lines(&[r#"{"Sample":{"speed":"fast"}}"#]);
        assert!(matches!(
            load_laps_jsonl(file.path()),
            Err(LapDeltaError::TelemetryLoaderError { .. })
        ));
    }

    fn driver_lap(driver: &str, lap_number: u32, lap_time_s: Option<f64>) -> DriverLap {
        DriverLap {
            info: LapInfo {
                driver: driver.to_string(),
                lap_number,
                lap_time_s,
                ..Default::default()
            },
            telemetry: LapTelemetry::default(),
        }
    }

    #[test]
    fn test_select_fastest_lap() {
        let laps = vec![
            driver_lap("VER", 1, Some(82.0)),
            driver_lap("VER", 2, Some(80.9)),
            driver_lap("VER", 3, None),
            driver_lap("HAM", 1, Some(79.0)),
        ];
        assert_eq!(select_lap(&laps, Some("VER"), None).unwrap().info.lap_number, 2);
        assert_eq!(select_lap(&laps, Some("ver"), Some(3)).unwrap().info.lap_number, 3);
        assert_eq!(select_lap(&laps, None, None).unwrap().info.driver, "HAM");
    }

    #[test]
    fn test_select_untimed_falls_back_to_first() {
        let laps = vec![driver_lap("NOR", 5, None), driver_lap("NOR", 6, None)];
        assert_eq!(select_lap(&laps, Some("NOR"), None).unwrap().info.lap_number, 5);
    }

    #[test]
    fn test_select_unknown_lap() {
        let laps = vec![driver_lap("VER", 1, Some(82.0))];
        assert!(matches!(
            select_lap(&laps, Some("ALO"), None),
            Err(LapDeltaError::LapNotFound { .. })
        ));
        assert!(matches!(
            select_lap(&laps, Some("VER"), Some(9)),
            Err(LapDeltaError::LapNotFound { lap_number: Some(9), .. })
        ));
    }
}
