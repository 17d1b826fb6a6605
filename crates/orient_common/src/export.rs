//! CSV export of a sample window.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::io::Write;

use crate::sample::{SampleRecord, SampleWindow};

/// One header row, then one row per sample ascending by timestamp
pub fn write_csv<W: Write>(window: &SampleWindow, writer: W) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    for sample in window {
        csv.serialize(SampleRecord::from(sample))
            .context("Failed to write CSV row")?;
    }
    if window.is_empty() {
        csv.write_record(crate::sample::RECORD_COLUMNS)
            .context("Failed to write CSV header")?;
    }
    csv.flush().context("Failed to flush CSV output")?;
    Ok(window.len())
}

/// `sensor_data_YYYYmmdd_HHMMSS.csv`
pub fn default_export_name(now: DateTime<Utc>) -> String {
    format!("sensor_data_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::fixtures::sample_at;
    use crate::sample::RECORD_COLUMNS;
    use chrono::TimeZone;

    #[test]
    fn test_rows_follow_window_order() {
        let window = SampleWindow::new(vec![sample_at(2, 1.0, 0.0), sample_at(1, 2.0, 0.0)]);
        let mut out = Vec::new();
        assert_eq!(write_csv(&window, &mut out).unwrap(), 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], RECORD_COLUMNS.join(","));
        // orient_z carries roll; the earlier sample has roll 2.0
        assert!(lines[1].starts_with("2023-11-14T22:13:21Z,ESP32_001,120.0,0.0,2.0,"));
    }

    #[test]
    fn test_empty_window_still_has_header() {
        let mut out = Vec::new();
        write_csv(&SampleWindow::empty(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim_end(), RECORD_COLUMNS.join(","));
    }

    #[test]
    fn test_default_export_name() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(default_export_name(now), "sensor_data_20240309_140507.csv");
    }
}
