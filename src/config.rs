use crate::activity::DEFAULT_MARKERS;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from bankfire.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct BankfireConfig {
    pub monitor: MonitorConfig,
    pub steam: SteamConfig,
    pub shutdown: ShutdownConfig,
    pub markers: MarkersConfig,
    pub status: StatusConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// How long Steam must be idle before shutting down.
    pub quiet_secs: u64,
    /// How often to poll Steam activity.
    pub check_secs: u64,
    /// Re-announce a stable state this often.
    pub heartbeat_secs: u64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SteamConfig {
    /// Install root; discovered from common locations when unset.
    pub path: Option<PathBuf>,
    /// Content log; defaults to `<root>/logs/content_log.txt`.
    pub content_log: Option<PathBuf>,
    /// Additional directories whose entries count as activity.
    pub extra_dirs: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    pub command: String,
    pub dry_run: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MarkersConfig {
    pub patterns: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct StatusConfig {
    pub file: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            quiet_secs: 60,
            check_secs: 5,
            heartbeat_secs: 30,
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            command: "systemctl poweroff --no-wall".to_string(),
            dry_run: false,
        }
    }
}

impl Default for MarkersConfig {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Errors from loading or validating the config.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Invalid {
        field: &'static str,
        reason: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {}", path.display(), source)
            }
            ConfigError::Invalid { field, reason } => {
                write!(f, "invalid config value for {}: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid { .. } => None,
        }
    }
}

impl BankfireConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        Self::parse(&contents, path)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Reject values the monitor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.check_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "monitor.check_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.shutdown.command.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "shutdown.command",
                reason: "shutdown command is empty".to_string(),
            });
        }
        if self.markers.patterns.iter().all(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "markers.patterns",
                reason: "at least one activity marker is required".to_string(),
            });
        }
        Ok(())
    }
}
