//! Live dashboard: redraw the window at the configured refresh interval.
//!
//! Pressing Enter forces a refresh from the store without waiting for the
//! interval.

use anyhow::Result;
use orient_common::{OrientConfig, SampleStore};
use std::io::{BufRead, Write};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::dashboard::{render, Dashboard, FrameContext};
use crate::range::TimeRange;

/// Total record count is polled far less often than the window
const COUNT_REFRESH: Duration = Duration::from_secs(30);

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Record count, refetched at most every `COUNT_REFRESH`
#[derive(Default)]
struct RecordCount {
    total: Option<u64>,
    counted_at: Option<Instant>,
}

impl RecordCount {
    async fn refresh(&mut self, store: &dyn SampleStore, force: bool) -> Option<u64> {
        let due = force || self.counted_at.map_or(true, |t| t.elapsed() >= COUNT_REFRESH);
        if due {
            match store.count().await {
                Ok(n) => self.total = Some(n),
                Err(e) => warn!("Record count unavailable: {}", e),
            }
            self.counted_at = Some(Instant::now());
        }
        self.total
    }
}

/// Lines typed on stdin, forwarded from a plain thread so a pending read
/// never holds the runtime open at exit
fn spawn_enter_listener() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            if line.is_err() || tx.blocking_send(()).is_err() {
                break;
            }
        }
    });
    rx
}

pub async fn run(config: &OrientConfig, range: TimeRange, once: bool) -> Result<()> {
    let store = super::connect(config).await?;
    let query = range.to_query(config.dashboard.window_size);
    let dashboard = Dashboard::new(store.clone(), &config.dashboard, query);
    let mut count = RecordCount::default();

    if once {
        let total_records = count.refresh(store.as_ref(), true).await;
        let frame = dashboard.poll().await;
        let ctx = FrameContext {
            total_records,
            health: dashboard.cache().health(),
            threshold: dashboard.threshold(),
            range: query.describe(),
        };
        print!("{}", render(&frame, &ctx));
        return Ok(());
    }

    let mut ticker = interval(config.dashboard.min_refresh_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut enter = spawn_enter_listener();
    let mut stdin_open = true;
    let mut stdout = std::io::stdout();

    loop {
        let forced = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => false,
            line = enter.recv(), if stdin_open => match line {
                Some(()) => true,
                None => {
                    stdin_open = false;
                    continue;
                }
            },
        };

        if forced {
            debug!("Manual refresh requested");
            dashboard.refresh_now().await;
        }
        let total_records = count.refresh(store.as_ref(), forced).await;
        let frame = dashboard.poll().await;
        let ctx = FrameContext {
            total_records,
            health: dashboard.cache().health(),
            threshold: dashboard.threshold(),
            range: query.describe(),
        };

        print!("{}{}", CLEAR_SCREEN, render(&frame, &ctx));
        println!("  Enter: refresh now   Ctrl-C: quit");
        if let Err(e) = stdout.flush() {
            debug!("stdout flush failed: {}", e);
        }
    }
    Ok(())
}
