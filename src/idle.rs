/// Idle/active classification, report debouncing, and the quiet-period check.
use crate::state::MonitorState;
use std::time::{Duration, Instant};

/// Default spacing of heartbeat reports while the state is stable.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleState {
    Active,
    Idle,
}

/// Why a state report is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportReason {
    /// The state flipped since the previous tick.
    Changed,
    /// Periodic re-announcement of a stable state.
    Heartbeat,
}

/// The verdict for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub state: IdleState,
    pub idle_for: Duration,
    /// Set when a state report should be logged this tick.
    pub report: Option<ReportReason>,
    /// Idle for at least the quiet period: fire the shutdown action.
    pub quiet_period_exceeded: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct IdlePolicy {
    quiet_period: Duration,
    heartbeat: Duration,
}

impl IdlePolicy {
    pub fn new(quiet_period: Duration, heartbeat: Duration) -> Self {
        Self {
            quiet_period,
            heartbeat,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Evaluate the state at `now` and update the debounce bookkeeping.
    ///
    /// Any elapsed time since the last activity counts as idle; the quiet
    /// period is the actual shutdown gate.
    pub fn evaluate(&self, state: &mut MonitorState, now: Instant) -> Evaluation {
        let idle_for = state.idle_for(now);
        let is_idle = idle_for > Duration::ZERO;

        let changed = is_idle != state.was_idle;
        let heartbeat_due = match state.last_report {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= self.heartbeat,
        };

        let report = if changed {
            Some(ReportReason::Changed)
        } else if heartbeat_due {
            Some(ReportReason::Heartbeat)
        } else {
            None
        };
        if report.is_some() {
            state.last_report = Some(now);
        }
        state.was_idle = is_idle;

        Evaluation {
            state: if is_idle {
                IdleState::Idle
            } else {
                IdleState::Active
            },
            idle_for,
            report,
            quiet_period_exceeded: idle_for >= self.quiet_period,
        }
    }
}

impl Default for IdlePolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), DEFAULT_HEARTBEAT)
    }
}
