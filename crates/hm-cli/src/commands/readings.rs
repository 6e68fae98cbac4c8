//! Readings command for listing what a device has logged.

use std::fmt::Write;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use hm_core::{AnalysisConfig, Analyzer, DeviceId, Reading};
use hm_db::Database;

/// Fetches a device's readings, optionally bounded by a window.
pub fn run(
    db: &Database,
    config: AnalysisConfig,
    device: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<Vec<Reading>> {
    let device = DeviceId::new(device)?;
    let analyzer = Analyzer::new(db, db, config);
    Ok(analyzer.device_readings(&device, start, end)?)
}

/// Renders readings as aligned text, one per line.
pub fn format_readings(readings: &[Reading]) -> String {
    if readings.is_empty() {
        return "No readings found.".to_string();
    }
    let mut output = String::new();
    for reading in readings {
        let _ = writeln!(
            output,
            "{}  {:<24} {:>10.2}",
            reading.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            reading.sensor_type_id,
            reading.value
        );
    }
    output
}
