use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

/// Drives the scheduling loop and tracks elapsed run time.
pub(crate) struct Timer {
    interval: Interval,
    start: Instant,
    interval_dur: Duration,
}

impl Timer {
    pub fn new(interval_dur: Duration) -> Self {
        let mut interval = interval(interval_dur);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            start: Instant::now(),
            interval_dur,
        }
    }

    /// Wait for the next tick and return the time elapsed since the timer was created.
    ///
    /// NOTE: The first tick completes instantly.
    pub async fn tick(&mut self) -> Duration {
        self.interval.tick().await;
        self.start.elapsed()
    }

    pub fn start(&self) -> Instant {
        self.start
    }
}

impl std::fmt::Display for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", humantime::format_duration(self.interval_dur))
    }
}
