use super::{NotificationBackend, Signal, WatchError};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Signals on a fixed tick, whether or not anything changed.
///
/// Correct even when the OS delivers no change notifications at all. The
/// tailer compares sizes on every tick, so an idle tick costs one stat.
pub struct PollWatcher {
    interval: Duration,
    ticker: Option<Interval>,
}

impl PollWatcher {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            ticker: None,
        }
    }
}

#[async_trait]
impl NotificationBackend for PollWatcher {
    fn start(&mut self, _path: &Path) -> Result<(), WatchError> {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        Ok(())
    }

    fn stop(&mut self, _path: &Path) -> Result<(), WatchError> {
        self.ticker = None;
        Ok(())
    }

    async fn next_signal(&mut self) -> Option<Signal> {
        let ticker = self.ticker.as_mut()?;
        ticker.tick().await;
        Some(Signal::Changed)
    }

    /// Producers on this path may replace the file between ticks.
    fn reopen_each_cycle(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "poll"
    }
}
