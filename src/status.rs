/// JSON snapshot of the monitor, rewritten on every state report and never
/// read back. Readers only ever see a complete file.
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Monitor phases written to the status file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorPhase {
    Active,
    Idle,
    ShuttingDown,
}

/// The JSON payload written to the status file.
#[derive(Debug, Clone, Serialize)]
pub struct StatusData {
    pub pid: u32,
    pub state: MonitorPhase,
    pub idle_secs: u64,
    pub quiet_secs: u64,
    pub last_activity: DateTime<Utc>,
    pub log_offset: u64,
    pub last_update: DateTime<Utc>,
}

/// Writes [`StatusData`] snapshots to one path, replacing the file whole.
pub struct StatusTracker {
    path: PathBuf,
    pid: u32,
    quiet_secs: u64,
}

impl StatusTracker {
    pub fn new(path: PathBuf, quiet_period: Duration) -> Self {
        Self {
            path,
            pid: std::process::id(),
            quiet_secs: quiet_period.as_secs(),
        }
    }

    /// Write the current phase. Failures are logged, never propagated.
    pub fn update(&self, state: MonitorPhase, idle_for: Duration, log_offset: u64) {
        let now = Utc::now();
        let idle =
            chrono::Duration::from_std(idle_for).unwrap_or_else(|_| chrono::Duration::zero());
        let data = StatusData {
            pid: self.pid,
            state,
            idle_secs: idle_for.as_secs(),
            quiet_secs: self.quiet_secs,
            last_activity: now - idle,
            log_offset,
            last_update: now,
        };

        if let Err(e) = self.write(&data) {
            tracing::warn!(error = %e, "status file not updated");
        }
    }

    fn write(&self, data: &StatusData) -> Result<(), StatusError> {
        let json = serde_json::to_vec_pretty(data).map_err(StatusError::Encode)?;
        let staged = self
            .path
            .with_file_name(format!(".bankfire.status.{}", self.pid));
        std::fs::write(&staged, json)
            .and_then(|()| std::fs::rename(&staged, &self.path))
            .map_err(|source| StatusError::Io {
                path: self.path.clone(),
                source,
            })
    }

    /// Best effort; a missing file is fine.
    pub fn remove(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[derive(Debug)]
pub enum StatusError {
    Encode(serde_json::Error),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusError::Encode(e) => write!(f, "cannot encode status: {e}"),
            StatusError::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl std::error::Error for StatusError {}
