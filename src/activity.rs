/// Activity classification and per-tick aggregation.
///
/// A log line counts as activity when it contains one of the configured
/// markers (case-insensitive substring). Every source sampled during a tick
/// produces a [`SourceReading`]; the [`TickAggregator`] ORs them together and
/// advances `last_activity` when any source was active.
use crate::state::MonitorState;
use std::time::Instant;

/// Built-in activity markers, matched against lowercased log lines.
pub const DEFAULT_MARKERS: &[&str] = &[
    "downloading",
    "download started",
    "download complete",
    "download finished",
    "appupdate",
    "depot download",
    "staging",
    "validating",
    "preallocating",
    "patching",
    "installing",
    "update required",
    "update queued",
    "update started",
    "update running",
];

/// The marker table used by the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    patterns: Vec<String>,
}

impl Markers {
    /// Build a marker table. Patterns are lowercased and blanks are dropped.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Does this log line denote download/update activity?
    pub fn classify(&self, line: &str) -> bool {
        if line.is_empty() {
            return false;
        }
        let lower = line.to_lowercase();
        self.patterns.iter().any(|p| lower.contains(p.as_str()))
    }
}

impl Default for Markers {
    fn default() -> Self {
        Self::new(DEFAULT_MARKERS)
    }
}

/// What a single source reported for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceReading {
    /// The source shows activity.
    Active,
    /// The source was read and shows nothing.
    Quiet,
    /// The source does not exist yet.
    Absent,
    /// The source could not be read this tick.
    Failed,
}

/// Folds every source reading of one tick into a single verdict.
#[derive(Debug, Default)]
pub struct TickAggregator {
    active: usize,
    failed: usize,
    total: usize,
}

impl TickAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, reading: SourceReading) {
        self.total += 1;
        match reading {
            SourceReading::Active => self.active += 1,
            SourceReading::Failed => self.failed += 1,
            SourceReading::Quiet | SourceReading::Absent => {}
        }
    }

    /// True if any source was active this tick.
    pub fn any_active(&self) -> bool {
        self.active > 0
    }

    /// Apply the verdict to the monitor state. Returns whether activity was recorded.
    pub fn apply(self, state: &mut MonitorState, now: Instant) -> bool {
        tracing::debug!(
            sources = self.total,
            active = self.active,
            failed = self.failed,
            "tick sampled"
        );
        if self.any_active() {
            state.record_activity(now);
            true
        } else {
            false
        }
    }
}
