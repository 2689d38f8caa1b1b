//! Incremental tailing of the client's content log.
//!
//! Tracks a byte offset into an append-only text file, reads only what was
//! appended since the previous scan, and restarts from the beginning when the
//! file was truncated or replaced. A trailing line without a terminator is
//! left unread until a later write completes it.

use crate::activity::Markers;
use std::fs::{File, Metadata};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Longest accepted log line, excluding the terminator.
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// How far into the log the previous scans got.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogCursor {
    /// Byte position just past the last fully consumed line.
    pub offset: u64,
    /// Inode of the file the offset refers to (Unix only).
    pub inode: Option<u64>,
}

/// Result of one successful scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub cursor: LogCursor,
    /// At least one new line classified as activity.
    pub active: bool,
    /// Number of complete lines consumed.
    pub lines: usize,
    /// The scan restarted from offset 0.
    pub rewound: bool,
}

/// Errors that can occur while scanning the log.
#[derive(Debug)]
pub enum ScanError {
    /// The file exists but could not be opened.
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Could not stat the opened file.
    Metadata {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Could not seek to the resume offset.
    Seek {
        path: PathBuf,
        offset: u64,
        source: std::io::Error,
    },
    /// Read failure mid-scan.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A line longer than the buffer limit.
    LineTooLong {
        path: PathBuf,
        offset: u64,
        limit: usize,
    },
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanError::Open { path, source } => {
                write!(f, "failed to open {}: {}", path.display(), source)
            }
            ScanError::Metadata { path, source } => {
                write!(f, "failed to stat {}: {}", path.display(), source)
            }
            ScanError::Seek {
                path,
                offset,
                source,
            } => write!(
                f,
                "failed to seek {} to offset {}: {}",
                path.display(),
                offset,
                source
            ),
            ScanError::Read { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            ScanError::LineTooLong {
                path,
                offset,
                limit,
            } => write!(
                f,
                "line at offset {} in {} exceeds {} bytes",
                offset,
                path.display(),
                limit
            ),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScanError::Open { source, .. }
            | ScanError::Metadata { source, .. }
            | ScanError::Seek { source, .. }
            | ScanError::Read { source, .. } => Some(source),
            ScanError::LineTooLong { .. } => None,
        }
    }
}

/// Scan `path` for new activity since `prior`.
///
/// A missing file is not an error: the prior cursor is returned untouched.
/// On error nothing is consumed, so the caller keeps its cursor and the same
/// region is retried on the next poll.
pub fn scan(path: &Path, prior: LogCursor, markers: &Markers) -> Result<ScanOutcome, ScanError> {
    scan_with_limit(path, prior, markers, MAX_LINE_BYTES)
}

pub(crate) fn scan_with_limit(
    path: &Path,
    prior: LogCursor,
    markers: &Markers,
    limit: usize,
) -> Result<ScanOutcome, ScanError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ScanOutcome {
                cursor: prior,
                active: false,
                lines: 0,
                rewound: false,
            });
        }
        Err(e) => {
            return Err(ScanError::Open {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let metadata = file.metadata().map_err(|e| ScanError::Metadata {
        path: path.to_path_buf(),
        source: e,
    })?;
    let size = metadata.len();
    let inode = file_inode(&metadata);

    let replaced = matches!((prior.inode, inode), (Some(old), Some(new)) if old != new);
    let truncated = size < prior.offset;
    let start = if replaced || truncated {
        tracing::info!(
            path = %path.display(),
            prior_offset = prior.offset,
            size,
            replaced,
            "content log rotated, rescanning from start"
        );
        0
    } else {
        prior.offset
    };

    let mut reader = BufReader::new(file);
    reader
        .seek(SeekFrom::Start(start))
        .map_err(|e| ScanError::Seek {
            path: path.to_path_buf(),
            offset: start,
            source: e,
        })?;

    let mut consumed = start;
    let mut active = false;
    let mut lines = 0;
    let mut buf = Vec::with_capacity(8 * 1024);

    loop {
        buf.clear();
        let n = reader
            .by_ref()
            .take(limit as u64 + 2)
            .read_until(b'\n', &mut buf)
            .map_err(|e| ScanError::Read {
                path: path.to_path_buf(),
                source: e,
            })?;
        if n == 0 {
            break;
        }
        if buf.last() != Some(&b'\n') {
            if buf.len() > limit + 1 {
                return Err(ScanError::LineTooLong {
                    path: path.to_path_buf(),
                    offset: consumed,
                    limit,
                });
            }
            // Unterminated tail: still being written.
            break;
        }

        let content = &buf[..n - 1];
        let content = content.strip_suffix(b"\r").unwrap_or(content);
        if content.len() > limit {
            return Err(ScanError::LineTooLong {
                path: path.to_path_buf(),
                offset: consumed,
                limit,
            });
        }

        consumed += n as u64;
        lines += 1;

        let line = String::from_utf8_lossy(content);
        if markers.classify(&line) {
            tracing::debug!(line = %line, "activity line in content log");
            active = true;
        }
    }

    Ok(ScanOutcome {
        cursor: LogCursor {
            offset: consumed,
            inode,
        },
        active,
        lines,
        rewound: start != prior.offset,
    })
}

#[cfg(unix)]
fn file_inode(metadata: &Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn file_inode(_metadata: &Metadata) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use tempfile::tempdir;

    fn append(path: &Path, text: &str) {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn test_missing_file_keeps_cursor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content_log.txt");
        let prior = LogCursor {
            offset: 42,
            inode: None,
        };

        let out = scan(&path, prior, &Markers::default()).unwrap();
        assert_eq!(out.cursor, prior);
        assert!(!out.active);
        assert_eq!(out.lines, 0);
    }

    #[test]
    fn test_scan_advances_to_eof_and_detects_activity() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content_log.txt");
        let text = "Steam client started\nDownloading depot 123\nUser logged in\n";
        append(&path, text);

        let out = scan(&path, LogCursor::default(), &Markers::default()).unwrap();
        assert!(out.active);
        assert_eq!(out.lines, 3);
        assert_eq!(out.cursor.offset, text.len() as u64);
    }

    #[test]
    fn test_scan_without_markers_is_quiet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content_log.txt");
        append(&path, "Steam client started\nCloud sync complete\n");

        let out = scan(&path, LogCursor::default(), &Markers::default()).unwrap();
        assert!(!out.active);
        assert_eq!(out.lines, 2);
    }

    #[test]
    fn test_second_scan_without_writes_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content_log.txt");
        append(&path, "Download started for app 1\n");

        let first = scan(&path, LogCursor::default(), &Markers::default()).unwrap();
        assert!(first.active);

        let second = scan(&path, first.cursor, &Markers::default()).unwrap();
        assert!(!second.active);
        assert_eq!(second.lines, 0);
        assert_eq!(second.cursor, first.cursor);
        assert!(!second.rewound);
    }

    #[test]
    fn test_only_new_lines_are_classified() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content_log.txt");
        append(&path, "Downloading depot 1\n");
        let first = scan(&path, LogCursor::default(), &Markers::default()).unwrap();

        append(&path, "User logged in\n");
        let second = scan(&path, first.cursor, &Markers::default()).unwrap();
        assert!(!second.active);
        assert_eq!(second.lines, 1);

        append(&path, "Update queued\n");
        let third = scan(&path, second.cursor, &Markers::default()).unwrap();
        assert!(third.active);
    }

    #[test]
    fn test_truncation_rescans_from_start() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content_log.txt");
        append(&path, "line one that is fairly long\nline two that is fairly long\n");
        let first = scan(&path, LogCursor::default(), &Markers::default()).unwrap();

        // Truncate in place (same inode) to something shorter than the offset.
        fs::write(&path, "Patching content\n").unwrap();
        let second = scan(&path, first.cursor, &Markers::default()).unwrap();
        assert!(second.rewound);
        assert!(second.active);
        assert_eq!(second.cursor.offset, "Patching content\n".len() as u64);
    }

    #[cfg(unix)]
    #[test]
    fn test_replaced_file_rescans_even_when_larger() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content_log.txt");
        append(&path, "short\n");
        let first = scan(&path, LogCursor::default(), &Markers::default()).unwrap();

        let rotated = dir.path().join("content_log.previous.txt");
        fs::rename(&path, &rotated).unwrap();
        append(&path, "Validating installation of a much longer line\n");

        let second = scan(&path, first.cursor, &Markers::default()).unwrap();
        assert!(second.rewound);
        assert!(second.active);
        assert_ne!(second.cursor.inode, first.cursor.inode);
    }

    #[test]
    fn test_partial_line_is_not_consumed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content_log.txt");
        append(&path, "User logged in\nDownload");

        let first = scan(&path, LogCursor::default(), &Markers::default()).unwrap();
        assert!(!first.active, "partial line must not be classified");
        assert_eq!(first.lines, 1);
        assert_eq!(first.cursor.offset, "User logged in\n".len() as u64);

        append(&path, "ing depot 7\n");
        let second = scan(&path, first.cursor, &Markers::default()).unwrap();
        assert!(second.active);
        assert_eq!(second.lines, 1);
        assert_eq!(
            second.cursor.offset,
            "User logged in\nDownloading depot 7\n".len() as u64
        );
    }

    #[test]
    fn test_crlf_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content_log.txt");
        append(&path, "Staging files\r\n");

        let out = scan(&path, LogCursor::default(), &Markers::default()).unwrap();
        assert!(out.active);
        assert_eq!(out.cursor.offset, 15);
    }

    #[test]
    fn test_invalid_utf8_is_tolerated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content_log.txt");
        fs::write(&path, b"\xff\xfe downloading \xc3\n").unwrap();

        let out = scan(&path, LogCursor::default(), &Markers::default()).unwrap();
        assert!(out.active);
    }

    #[test]
    fn test_line_too_long_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content_log.txt");
        append(&path, "ok\n");
        append(&path, &format!("{}\n", "x".repeat(64)));

        let err = scan_with_limit(&path, LogCursor::default(), &Markers::default(), 16)
            .unwrap_err();
        match err {
            ScanError::LineTooLong { offset, limit, .. } => {
                assert_eq!(offset, 3);
                assert_eq!(limit, 16);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_line_exactly_at_limit_is_accepted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content_log.txt");
        append(&path, &format!("{}\n", "y".repeat(16)));

        let out = scan_with_limit(&path, LogCursor::default(), &Markers::default(), 16).unwrap();
        assert_eq!(out.lines, 1);
        assert_eq!(out.cursor.offset, 17);
    }

    #[test]
    fn test_crlf_line_at_limit_is_accepted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content_log.txt");
        append(&path, &format!("{}\r\n", "y".repeat(16)));

        let out = scan_with_limit(&path, LogCursor::default(), &Markers::default(), 16).unwrap();
        assert_eq!(out.lines, 1);
        assert_eq!(out.cursor.offset, 18);
    }

    #[test]
    fn test_line_one_over_limit_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content_log.txt");
        append(&path, &format!("{}\r\n", "y".repeat(17)));

        let err = scan_with_limit(&path, LogCursor::default(), &Markers::default(), 16)
            .unwrap_err();
        assert!(matches!(err, ScanError::LineTooLong { offset: 0, .. }));
    }

    #[test]
    fn test_open_error_on_directory_path() {
        let dir = tempdir().unwrap();
        // Opening a directory succeeds on Unix but reading fails.
        let result = scan(dir.path(), LogCursor::default(), &Markers::default());
        assert!(result.is_err());
    }
}
