//! Dashboard frame: one cached window plus everything derived from it.

use chrono::{DateTime, Utc};
use orient_common::alerts::{Alert, AlertEvaluator, TiltViolations};
use orient_common::cache::{CacheHealth, Freshness, PollingCache, WindowQuery, WindowSnapshot};
use orient_common::config::DashboardConfig;
use orient_common::presentation::{series, AxisFamily, CalibrationLevel};
use orient_common::sample::Sample;
use orient_common::stats::WindowStats;
use orient_common::{CacheError, SampleStore};
use owo_colors::OwoColorize;
use std::fmt::Write;
use std::sync::Arc;

use crate::commands::THIN_SEP;

/// What the dashboard shows for one refresh tick
#[derive(Debug, Clone)]
pub enum Frame {
    /// Nothing has ever been fetched successfully
    NoData,
    Ready(Box<ReadyFrame>),
}

#[derive(Debug, Clone)]
pub struct ReadyFrame {
    pub snapshot: WindowSnapshot,
    pub alerts: Vec<Alert>,
    pub stats: Option<WindowStats>,
    pub violations: TiltViolations,
}

pub struct Dashboard {
    cache: PollingCache,
    evaluator: AlertEvaluator,
    query: WindowQuery,
}

impl Dashboard {
    pub fn new(store: Arc<dyn SampleStore>, config: &DashboardConfig, query: WindowQuery) -> Self {
        Self {
            cache: PollingCache::new(store, config.min_refresh_interval()),
            evaluator: AlertEvaluator::new(config.tilt_threshold_degrees),
            query,
        }
    }

    pub fn query(&self) -> WindowQuery {
        self.query
    }

    pub fn cache(&self) -> &PollingCache {
        &self.cache
    }

    pub fn threshold(&self) -> f64 {
        self.evaluator.threshold()
    }

    /// Next poll reads from the store even inside the refresh interval
    pub async fn refresh_now(&self) {
        self.cache.invalidate().await;
    }

    /// Read through the cache and derive alerts and statistics
    pub async fn poll(&self) -> Frame {
        match self.cache.get_window(self.query).await {
            Ok(snapshot) => {
                let window = snapshot.window();
                let alerts = self.evaluator.evaluate(window);
                let stats = WindowStats::compute(window);
                let violations = self.evaluator.tilt_violations(window);
                Frame::Ready(Box::new(ReadyFrame {
                    snapshot,
                    alerts,
                    stats,
                    violations,
                }))
            }
            Err(CacheError::NoDataAvailable) => Frame::NoData,
        }
    }
}

/// Extra context shown around a frame
#[derive(Debug, Clone, Default)]
pub struct FrameContext {
    pub total_records: Option<u64>,
    pub health: CacheHealth,
    pub threshold: f64,
    pub range: String,
}

pub fn render(frame: &Frame, ctx: &FrameContext) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "  Orient Telemetry Dashboard".bold());
    let _ = writeln!(out, "{}", THIN_SEP);

    match frame {
        Frame::NoData => render_no_data(&mut out),
        Frame::Ready(ready) => render_ready(&mut out, ready, ctx),
    }

    let _ = writeln!(out, "{}", THIN_SEP);
    let _ = writeln!(
        out,
        "  Range: {}   Records: {}   Fetches: {}   Hits: {}   Failed: {}",
        ctx.range,
        ctx.total_records.map_or_else(|| "n/a".to_string(), |n| n.to_string()),
        ctx.health.remote_fetches,
        ctx.health.cache_hits,
        ctx.health.failed_refreshes,
    );
    out
}

fn render_no_data(out: &mut String) {
    let _ = writeln!(out, "{}", "  No data available yet.".yellow());
    let _ = writeln!(out, "  Make sure the device is powered and publishing to the store.");
}

fn render_ready(out: &mut String, ready: &ReadyFrame, ctx: &FrameContext) {
    let snapshot = &ready.snapshot;
    let window = snapshot.window();

    let freshness = match snapshot.freshness {
        Freshness::Fresh => "fresh".green().to_string(),
        Freshness::Stale => "cached".to_string(),
        Freshness::LastKnownGood => "last known good (refresh failing)".red().to_string(),
    };
    let updated = window
        .newest_timestamp()
        .map_or_else(|| "n/a".to_string(), format_timestamp);
    let _ = writeln!(out, "  Last updated: {}   [{}]", updated, freshness);
    let _ = writeln!(out);

    if !ready.alerts.is_empty() {
        let _ = writeln!(out, "{}", "[TILT WARNING]".red().bold());
        for alert in &ready.alerts {
            let Alert::TiltWarning { axis, value } = alert;
            let _ = writeln!(
                out,
                "  {} {:.1}° (safe range: -{:.0}° to +{:.0}°)",
                axis.to_string().to_uppercase().red(),
                value,
                ctx.threshold,
                ctx.threshold
            );
        }
        let _ = writeln!(out);
    }

    let Some(latest) = window.latest() else {
        let _ = writeln!(out, "  Window is empty for this range.");
        return;
    };

    render_current(out, latest, ready);
    render_calibration(out, latest);
    render_series(out, ready);
    render_stats(out, ready);
}

fn render_current(out: &mut String, latest: &Sample, ready: &ReadyFrame) {
    let _ = writeln!(out, "{}", "[CURRENT]".cyan());
    let delta = ready
        .stats
        .as_ref()
        .and_then(|s| s.temperature_delta)
        .map_or_else(String::new, |d| format!(" ({:+.1}°C)", d));
    let _ = writeln!(out, "  Temperature:     {:.1}°C{}", latest.temperature, delta);
    let _ = writeln!(out, "  Heading:         {:.1}°", latest.orientation.yaw);
    let _ = writeln!(out, "  Roll:            {:.1}°", latest.roll());
    let _ = writeln!(out, "  Pitch:           {:.1}°", latest.pitch());
    let _ = writeln!(out, "  Accel magnitude: {:.2} m/s²", latest.acceleration.magnitude());
    let _ = writeln!(out);
}

fn render_calibration(out: &mut String, latest: &Sample) {
    let _ = writeln!(out, "{}", "[CALIBRATION]".cyan());
    let cal = latest.calibration;
    for (name, value) in [
        ("System", cal.system),
        ("Gyroscope", cal.gyro),
        ("Accelerometer", cal.accel),
        ("Magnetometer", cal.mag),
    ] {
        let _ = writeln!(out, "  {:<15} {}", name, calibration_badge(value));
    }
    let _ = writeln!(out);
}

fn calibration_badge(value: u8) -> String {
    let text = format!("{}/3", value);
    match CalibrationLevel::from_ordinal(value) {
        CalibrationLevel::Good => text.green().to_string(),
        CalibrationLevel::Fair => text.yellow().to_string(),
        CalibrationLevel::Poor => text.bright_red().to_string(),
        CalibrationLevel::None => text.red().to_string(),
    }
}

fn render_series(out: &mut String, ready: &ReadyFrame) {
    let window = ready.snapshot.window();
    for family in AxisFamily::ALL {
        let [a, b, c] = series(window, family);
        let last = |s: &orient_common::presentation::ChartSeries| {
            s.last_value().map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
        };
        let _ = writeln!(
            out,
            "  {:<13} {} {}  {} {}  {} {}  ({}, {} pts)",
            family.title(),
            a.label,
            last(&a),
            b.label,
            last(&b),
            c.label,
            last(&c),
            family.unit(),
            a.points.len()
        );
    }
    let _ = writeln!(out);
}

fn render_stats(out: &mut String, ready: &ReadyFrame) {
    let Some(stats) = &ready.stats else {
        return;
    };
    let _ = writeln!(out, "{}", "[STATISTICS]".cyan());
    let _ = writeln!(
        out,
        "  Temperature:   mean {:.2}  min {:.2}  max {:.2}  std {:.2}",
        stats.temperature.mean, stats.temperature.min, stats.temperature.max, stats.temperature_std_dev
    );
    let _ = writeln!(
        out,
        "  Accel |a|:     mean {:.2}  min {:.2}  max {:.2}",
        stats.accel_magnitude.mean, stats.accel_magnitude.min, stats.accel_magnitude.max
    );
    let _ = writeln!(
        out,
        "  Readings: {}   Span: {}s   Avg calibration: {:.1}/3",
        stats.readings,
        stats.time_span.num_seconds(),
        stats.avg_calibration
    );
    let _ = writeln!(
        out,
        "  Tilt warnings in window: roll {}  pitch {}",
        ready.violations.roll, ready.violations.pitch
    );
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use orient_common::sample::{CalibrationStatus, Orientation, SensorReading, Vec3};
    use orient_common::store::MemoryStore;

    fn sample(secs: i64, roll: f64) -> Sample {
        Sample::from_reading(
            "ESP32_001",
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            SensorReading {
                orientation: Orientation::new(roll, 2.0, 180.0),
                acceleration: Vec3::new(0.0, 0.0, 9.81),
                gyroscope: Vec3::default(),
                magnetometer: Vec3::default(),
                temperature: 21.0 + secs as f64,
                calibration: CalibrationStatus::new(3, 2, 1, 0),
            },
        )
    }

    fn dashboard(samples: Vec<Sample>) -> Dashboard {
        let store = Arc::new(MemoryStore::with_samples(samples));
        Dashboard::new(store, &DashboardConfig::default(), WindowQuery::Latest(25))
    }

    #[tokio::test]
    async fn test_empty_store_renders_empty_window() {
        let frame = dashboard(Vec::new()).poll().await;
        // an empty store is a successful fetch of an empty window
        let Frame::Ready(ready) = &frame else {
            panic!("expected a ready frame");
        };
        assert!(ready.snapshot.window().is_empty());
        let text = render(&frame, &FrameContext::default());
        assert!(text.contains("Window is empty"));
    }

    #[tokio::test]
    async fn test_frame_carries_alerts_and_stats() {
        let frame = dashboard(vec![sample(0, 10.0), sample(1, 60.0)]).poll().await;
        let Frame::Ready(ready) = &frame else {
            panic!("expected a ready frame");
        };
        assert_eq!(ready.alerts.len(), 1);
        assert_eq!(ready.violations.roll, 1);
        assert_eq!(ready.stats.as_ref().unwrap().readings, 2);

        let ctx = FrameContext {
            total_records: Some(2),
            threshold: 45.0,
            range: "last 25 readings".into(),
            ..Default::default()
        };
        let text = render(&frame, &ctx);
        assert!(text.contains("ROLL"));
        assert!(text.contains("60.0°"));
        assert!(text.contains("Records: 2"));
        assert!(text.contains("(+1.0°C)"));
    }

    #[test]
    fn test_no_data_frame() {
        let text = render(&Frame::NoData, &FrameContext::default());
        assert!(text.contains("No data available yet."));
    }
}
