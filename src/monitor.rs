/// The poll loop: sample every source, fold the readings, evaluate idleness,
/// and fire the shutdown action once the quiet period has elapsed.
///
/// Everything runs sequentially on one task; [`MonitorState`] is only touched
/// from here.
use crate::activity::{Markers, SourceReading, TickAggregator};
use crate::idle::{IdlePolicy, IdleState, ReportReason};
use crate::shutdown::{self, ShutdownCommand, ShutdownError};
use crate::state::MonitorState;
use crate::status::{MonitorPhase, StatusTracker};
use crate::steam::Targets;
use crate::{sampler, tailer};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

/// How a tick or the whole loop ended.
#[derive(Debug)]
pub enum Outcome {
    /// Keep polling.
    Continue,
    /// Stopped by an external signal before the action fired.
    Cancelled,
    /// The shutdown action fired (or was logged in dry-run mode).
    Triggered,
    /// The shutdown action fired but failed.
    Fatal(ShutdownError),
}

impl Outcome {
    /// Whether the process should exit cleanly.
    pub fn is_clean(&self) -> bool {
        !matches!(self, Outcome::Fatal(_))
    }
}

/// Monitor settings resolved at startup.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub quiet_period: Duration,
    pub check_period: Duration,
    pub heartbeat: Duration,
    pub dry_run: bool,
}

pub struct Monitor {
    targets: Targets,
    markers: Markers,
    policy: IdlePolicy,
    check_period: Duration,
    command: ShutdownCommand,
    dry_run: bool,
    state: MonitorState,
    status: Option<StatusTracker>,
}

impl Monitor {
    pub fn new(
        targets: Targets,
        markers: Markers,
        settings: MonitorSettings,
        command: ShutdownCommand,
        status: Option<StatusTracker>,
    ) -> Self {
        Self::with_state(
            targets,
            markers,
            settings,
            command,
            status,
            MonitorState::new(Instant::now()),
        )
    }

    pub fn with_state(
        targets: Targets,
        markers: Markers,
        settings: MonitorSettings,
        command: ShutdownCommand,
        status: Option<StatusTracker>,
        state: MonitorState,
    ) -> Self {
        Self {
            targets,
            markers,
            policy: IdlePolicy::new(settings.quiet_period, settings.heartbeat),
            check_period: settings.check_period,
            command,
            dry_run: settings.dry_run,
            state,
            status,
        }
    }

    #[allow(dead_code)]
    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Poll until the action fires or `cancel` resolves.
    ///
    /// The first tick runs immediately. A pending cancellation always wins
    /// over the next tick.
    pub async fn run<F>(&mut self, cancel: F) -> Outcome
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);
        let mut ticker = tokio::time::interval(self.check_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut cancel => {
                    tracing::info!("cancelled, exiting");
                    if let Some(status) = &self.status {
                        status.remove();
                    }
                    return Outcome::Cancelled;
                }
                _ = ticker.tick() => {}
            }

            match self.tick(Instant::now()).await {
                Outcome::Continue => {}
                terminal => return terminal,
            }
        }
    }

    /// One evaluation at `now`.
    pub async fn tick(&mut self, now: Instant) -> Outcome {
        let aggregator = self.sample_sources();
        aggregator.apply(&mut self.state, now);

        let eval = self.policy.evaluate(&mut self.state, now);
        if let Some(reason) = eval.report {
            self.report(eval.state, eval.idle_for, reason);
        }

        if !eval.quiet_period_exceeded {
            return Outcome::Continue;
        }

        tracing::info!(
            idle_secs = eval.idle_for.as_secs(),
            quiet_secs = self.policy.quiet_period().as_secs(),
            "quiet period elapsed"
        );
        if let Some(status) = &self.status {
            status.update(
                MonitorPhase::ShuttingDown,
                eval.idle_for,
                self.state.log_cursor.offset,
            );
        }
        shutdown::trigger(&self.command, self.dry_run).await
    }

    /// Read every source once. No short-circuiting: the log cursor must
    /// advance even when a directory already showed activity.
    fn sample_sources(&mut self) -> TickAggregator {
        let mut aggregator = TickAggregator::new();

        let log = &self.targets.content_log;
        let reading = match tailer::scan(log, self.state.log_cursor, &self.markers) {
            Ok(outcome) => {
                if outcome.lines > 0 || outcome.rewound {
                    tracing::debug!(
                        lines = outcome.lines,
                        rewound = outcome.rewound,
                        offset = outcome.cursor.offset,
                        "content log scanned"
                    );
                }
                self.state.log_cursor = outcome.cursor;
                if outcome.active {
                    SourceReading::Active
                } else {
                    SourceReading::Quiet
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "content log scan failed");
                SourceReading::Failed
            }
        };
        aggregator.observe(reading);

        for (kind, dir) in self.targets.directories() {
            let reading = match sampler::has_entries(dir) {
                Ok(true) => SourceReading::Active,
                Ok(false) => SourceReading::Quiet,
                Err(e) if e.is_not_found() => SourceReading::Absent,
                Err(e) => {
                    tracing::warn!(kind, error = %e, "directory sample failed");
                    SourceReading::Failed
                }
            };
            aggregator.observe(reading);
        }

        aggregator
    }

    fn report(&self, state: IdleState, idle_for: Duration, reason: ReportReason) {
        let changed = reason == ReportReason::Changed;
        match state {
            IdleState::Idle => tracing::info!(
                idle_secs = idle_for.as_secs(),
                changed,
                "Steam idle for {}s",
                idle_for.as_secs()
            ),
            IdleState::Active => tracing::info!(changed, "Steam active (downloading)"),
        }

        if let Some(status) = &self.status {
            let phase = match state {
                IdleState::Idle => MonitorPhase::Idle,
                IdleState::Active => MonitorPhase::Active,
            };
            status.update(phase, idle_for, self.state.log_cursor.offset);
        }
    }
}
