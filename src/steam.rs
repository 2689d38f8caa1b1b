//! Locating the Steam install and the directories worth watching.
//!
//! Stateless filesystem discovery: the install root, every library listed in
//! `libraryfolders.vdf`, and the `downloading`/`temp` staging directories of
//! each library.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

const FLATPAK_APP: &str = ".var/app/com.valvesoftware.Steam";

/// Could not locate a Steam install.
#[derive(Debug)]
pub enum DiscoveryError {
    NotFound { tried: Vec<PathBuf> },
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryError::NotFound { tried } => {
                let tried: Vec<String> = tried.iter().map(|p| p.display().to_string()).collect();
                write!(f, "could not locate Steam install (tried {})", tried.join(", "))
            }
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// Everything the monitor samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targets {
    pub root: PathBuf,
    pub content_log: PathBuf,
    pub download_dirs: Vec<PathBuf>,
    pub temp_dirs: Vec<PathBuf>,
    pub extra_dirs: Vec<PathBuf>,
}

impl Targets {
    /// Discover targets under `root`.
    pub fn discover(root: PathBuf, content_log: Option<PathBuf>, extra_dirs: Vec<PathBuf>) -> Self {
        let libraries = discover_libraries(&root);
        let content_log = content_log.unwrap_or_else(|| root.join("logs").join("content_log.txt"));
        Self {
            download_dirs: collect_subdirs(&libraries, "downloading"),
            temp_dirs: collect_subdirs(&libraries, "temp"),
            extra_dirs,
            content_log,
            root,
        }
    }

    /// All sampled directories, labelled by kind.
    pub fn directories(&self) -> impl Iterator<Item = (&'static str, &Path)> {
        let downloads = self.download_dirs.iter().map(|d| ("downloading", d.as_path()));
        let temps = self.temp_dirs.iter().map(|d| ("temp", d.as_path()));
        let extras = self.extra_dirs.iter().map(|d| ("extra", d.as_path()));
        downloads.chain(temps).chain(extras)
    }
}

/// Default install locations, in lookup order.
pub fn candidate_roots(home: &Path, data_home: &Path) -> Vec<PathBuf> {
    let flatpak = home.join(FLATPAK_APP);
    vec![
        home.join(".steam").join("steam"),
        data_home.join("Steam"),
        flatpak.join(".steam").join("steam"),
        flatpak.join(".local").join("share").join("Steam"),
    ]
}

/// Resolve the install root: the override if given, else the first existing candidate.
pub fn resolve_root(override_path: Option<&Path>) -> Result<PathBuf, DiscoveryError> {
    if let Some(path) = override_path {
        return Ok(path.to_path_buf());
    }

    let home = dirs::home_dir().unwrap_or_default();
    let data_home = dirs::data_dir().unwrap_or_else(|| home.join(".local").join("share"));
    first_existing_dir(candidate_roots(&home, &data_home))
}

fn first_existing_dir(candidates: Vec<PathBuf>) -> Result<PathBuf, DiscoveryError> {
    match candidates.iter().find(|p| p.is_dir()) {
        Some(found) => Ok(found.clone()),
        None => Err(DiscoveryError::NotFound { tried: candidates }),
    }
}

/// The root `steamapps` plus every extra library listed in `libraryfolders.vdf`.
pub fn discover_libraries(root: &Path) -> Vec<PathBuf> {
    let steamapps = root.join("steamapps");
    let mut libs = vec![steamapps.clone()];

    let vdf_path = steamapps.join("libraryfolders.vdf");
    let contents = match std::fs::read_to_string(&vdf_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(path = %vdf_path.display(), error = %e, "no library folders file");
            return libs;
        }
    };

    let mut seen: HashSet<PathBuf> = HashSet::from([steamapps]);
    for line in contents.lines() {
        let parts: Vec<&str> = line.trim().split('"').collect();
        if parts.len() < 4 {
            continue;
        }
        let key = parts[1].trim();
        let value = parts[3].trim();
        if key != "path" && !is_numeric(key) {
            continue;
        }
        if value.is_empty() {
            continue;
        }
        let lib = Path::new(value).join("steamapps");
        if seen.contains(&lib) {
            continue;
        }
        if lib.is_dir() {
            seen.insert(lib.clone());
            libs.push(lib);
        }
    }

    libs
}

/// Join `leaf` under every library.
pub fn collect_subdirs(libraries: &[PathBuf], leaf: &str) -> Vec<PathBuf> {
    libraries.iter().map(|lib| lib.join(leaf)).collect()
}

/// Non-empty and all ASCII digits.
pub fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
