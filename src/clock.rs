//! One-second ticker shared by both game clocks.
//!
//! The ticker does not own a thread or a timer handle. The event loop hands
//! it the current [`Instant`] and it reports how many whole seconds passed
//! since the last report, so a stopped ticker can never mutate anything.

use std::time::{Duration, Instant};

pub const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Default, Clone)]
pub struct Ticker {
    anchor: Option<Instant>,
}

impl Ticker {
    pub fn start(&mut self, now: Instant) {
        self.anchor = Some(now);
    }

    pub fn stop(&mut self) {
        self.anchor = None;
    }

    pub fn is_running(&self) -> bool {
        self.anchor.is_some()
    }

    /// Whole ticks elapsed since the previous call. The remainder carries
    /// over, so polling often never loses a fraction of a second.
    pub fn due(&mut self, now: Instant) -> u32 {
        let Some(anchor) = self.anchor else {
            return 0;
        };
        let elapsed = now.saturating_duration_since(anchor);
        let ticks = (elapsed.as_millis() / TICK.as_millis()) as u32;
        if ticks > 0 {
            self.anchor = Some(anchor + TICK * ticks);
        }
        ticks
    }
}

/// `MM:SS`, minutes unbounded.
pub fn format_time(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_ticker_reports_nothing() {
        let mut ticker = Ticker::default();
        let now = Instant::now();
        assert_eq!(ticker.due(now + Duration::from_secs(5)), 0);
    }

    #[test]
    fn remainder_carries_between_polls() {
        let mut ticker = Ticker::default();
        let start = Instant::now();
        ticker.start(start);

        assert_eq!(ticker.due(start + Duration::from_millis(900)), 0);
        assert_eq!(ticker.due(start + Duration::from_millis(1_500)), 1);
        assert_eq!(ticker.due(start + Duration::from_millis(1_999)), 0);
        assert_eq!(ticker.due(start + Duration::from_millis(4_000)), 3);
    }

    #[test]
    fn stop_cancels_pending_ticks() {
        let mut ticker = Ticker::default();
        let start = Instant::now();
        ticker.start(start);
        ticker.stop();
        assert!(!ticker.is_running());
        assert_eq!(ticker.due(start + Duration::from_secs(10)), 0);
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(75), "01:15");
        assert_eq!(format_time(3600), "60:00");
    }
}
