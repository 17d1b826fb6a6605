//! Print window statistics without the live view.

use anyhow::Result;
use orient_common::stats::WindowStats;
use orient_common::{OrientConfig, TiltViolations};
use owo_colors::OwoColorize;

use super::THIN_SEP;
use crate::dashboard::{Dashboard, Frame};
use crate::range::TimeRange;

pub async fn run(config: &OrientConfig, range: TimeRange) -> Result<()> {
    let store = super::connect(config).await?;
    let query = range.to_query(config.dashboard.window_size);
    let dashboard = Dashboard::new(store, &config.dashboard, query);

    println!();
    println!("{}", format!("  Statistics: {}", query.describe()).bold());
    println!("{}", THIN_SEP);

    let ready = match dashboard.poll().await {
        Frame::Ready(ready) => ready,
        Frame::NoData => {
            println!("  {}", "No data available yet.".yellow());
            return Ok(());
        }
    };
    let Some(stats) = &ready.stats else {
        println!("  No readings in this range.");
        return Ok(());
    };

    print_stats(stats, dashboard.threshold(), ready.violations);
    Ok(())
}

fn print_stats(stats: &WindowStats, threshold: f64, violations: TiltViolations) {
    println!("{}", "[TEMPERATURE]".cyan());
    println!("  Mean:      {:.2}°C", stats.temperature.mean);
    println!("  Min / Max: {:.2}°C / {:.2}°C", stats.temperature.min, stats.temperature.max);
    println!("  Std dev:   {:.2}°C", stats.temperature_std_dev);
    println!();

    println!("{}", "[ACCELERATION]".cyan());
    println!("  Mean |a|:  {:.2} m/s²", stats.accel_magnitude.mean);
    println!(
        "  Min / Max: {:.2} / {:.2} m/s²",
        stats.accel_magnitude.min, stats.accel_magnitude.max
    );
    println!();

    println!("{}", "[WINDOW]".cyan());
    println!("  Readings:        {}", stats.readings);
    println!("  Time span:       {}s", stats.time_span.num_seconds());
    println!("  Avg calibration: {:.1}/3", stats.avg_calibration);
    println!(
        "  Tilt > {:.0}°:     roll {}  pitch {}",
        threshold,
        violations.roll,
        violations.pitch
    );
    println!("{}", THIN_SEP);
}
