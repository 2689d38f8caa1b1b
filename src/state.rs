/// Mutable monitor state, owned by the poll loop.
use crate::tailer::LogCursor;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct MonitorState {
    last_activity: Instant,
    /// Position in the content log.
    pub log_cursor: LogCursor,
    /// Last reported idle classification.
    pub was_idle: bool,
    /// When the last state report was emitted (None before the first).
    pub last_report: Option<Instant>,
}

impl MonitorState {
    /// Fresh state. The daemon assumes activity at boot.
    pub fn new(now: Instant) -> Self {
        Self {
            last_activity: now,
            log_cursor: LogCursor::default(),
            was_idle: false,
            last_report: None,
        }
    }

    #[allow(dead_code)]
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Record activity observed at `now`. Never moves the timestamp backwards.
    pub fn record_activity(&mut self, now: Instant) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    /// Time elapsed since the last recorded activity.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }
}
