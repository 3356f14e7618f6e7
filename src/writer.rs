use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use log::info;
use serde::Serialize;

use crate::LapDeltaError;

/// Pretty print `report` as JSON to `output`, or to stdout when no file is given.
pub fn write_report<T: Serialize>(output: Option<&Path>, report: &T) -> Result<(), LapDeltaError> {
    match output {
        Some(file) => {
            let report_file =
                File::create(file).map_err(|e| LapDeltaError::WriterError { source: e })?;
            write_json(BufWriter::new(report_file), report)?;
            info!("Report written to {:?}", file);
            Ok(())
        }
        None => write_json(io::stdout().lock(), report),
    }
}

fn write_json<W: Write, T: Serialize>(mut writer: W, report: &T) -> Result<(), LapDeltaError> {
    serde_json::to_writer_pretty(&mut writer, report)
        .map_err(|e| LapDeltaError::ReportSerializeError { source: e })?;
    writeln!(writer).map_err(|e| LapDeltaError::WriterError { source: e })?;
    writer
        .flush()
        .map_err(|e| LapDeltaError::WriterError { source: e })
}
