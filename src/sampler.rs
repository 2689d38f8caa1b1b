/// Point-in-time sampling of download/temp directories.
///
/// A directory with at least one entry means a download is staged or in
/// progress. Only the first entry is read.
use std::path::{Path, PathBuf};

/// Errors that can occur while sampling a directory.
#[derive(Debug)]
pub enum SampleError {
    /// The directory does not exist (yet).
    NotFound { path: PathBuf },
    /// Any other failure to open or read the directory.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SampleError {
    /// Benign absence rather than a real failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SampleError::NotFound { .. })
    }
}

impl std::fmt::Display for SampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleError::NotFound { path } => {
                write!(f, "directory {} does not exist", path.display())
            }
            SampleError::Io { path, source } => {
                write!(f, "failed to read directory {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for SampleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SampleError::NotFound { .. } => None,
            SampleError::Io { source, .. } => Some(source),
        }
    }
}

fn classify_io(path: &Path, e: std::io::Error) -> SampleError {
    if e.kind() == std::io::ErrorKind::NotFound {
        SampleError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        SampleError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    }
}

/// Does `path` currently contain at least one entry?
pub fn has_entries(path: &Path) -> Result<bool, SampleError> {
    let mut entries = std::fs::read_dir(path).map_err(|e| classify_io(path, e))?;
    match entries.next() {
        None => Ok(false),
        Some(Ok(_)) => Ok(true),
        Some(Err(e)) => Err(classify_io(path, e)),
    }
}
