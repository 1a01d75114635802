use std::{
    fs, io,
    path::{Path, PathBuf},
};

use parking_lot::RwLock;

use crate::error::{ProfileError, Result};

/// Name of the sub-directory searched inside each data location.
pub const PROFILES_DIR: &str = "profiles";

/// A file that may hold a profile, and the key it will be cached under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileCandidate {
    pub key: String,
    pub path: PathBuf,
}

/// Produces the ordered list of candidate profile files.
///
/// Earlier candidates win key collisions, so implementations list built-in
/// profiles before user ones.
pub trait ProfileDiscovery: Send + Sync {
    fn discover(&self) -> Vec<ProfileCandidate>;

    /// Existing directories whose changes should trigger a refresh.
    fn watch_roots(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Where profiles are looked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPaths {
    /// Directory of built-in MLT profiles. Files here are keyed by file name.
    pub system_dir: Option<PathBuf>,
    /// Per-application data locations. Files in each `<location>/profiles/`
    /// are keyed by absolute path.
    pub data_locations: Vec<PathBuf>,
}

impl SearchPaths {
    pub fn new(system_dir: Option<PathBuf>, data_locations: Vec<PathBuf>) -> Self {
        Self {
            system_dir,
            data_locations,
        }
    }

    /// `profiles/` directories that currently exist, in search order.
    pub fn user_profile_dirs(&self) -> Vec<PathBuf> {
        self.data_locations
            .iter()
            .map(|location| location.join(PROFILES_DIR))
            .filter(|dir| dir.is_dir())
            .collect()
    }
}

/// Filesystem discovery over a reconfigurable set of [`SearchPaths`].
#[derive(Debug, Default)]
pub struct FsDiscovery {
    paths: RwLock<SearchPaths>,
}

impl FsDiscovery {
    pub fn new(paths: SearchPaths) -> Self {
        Self {
            paths: RwLock::new(paths),
        }
    }

    pub fn search_paths(&self) -> SearchPaths {
        self.paths.read().clone()
    }

    /// Replace the scanned locations. Takes effect on the next refresh.
    pub fn set_search_paths(&self, paths: SearchPaths) {
        *self.paths.write() = paths;
    }
}

impl ProfileDiscovery for FsDiscovery {
    fn discover(&self) -> Vec<ProfileCandidate> {
        let paths = self.search_paths();
        let mut candidates = Vec::new();

        if let Some(system_dir) = &paths.system_dir {
            for path in list_or_skip(system_dir) {
                let Some(name) = path.file_name() else {
                    continue;
                };
                candidates.push(ProfileCandidate {
                    key: name.to_string_lossy().into_owned(),
                    path,
                });
            }
        }

        for dir in paths.user_profile_dirs() {
            for path in list_or_skip(&dir) {
                let path = std::path::absolute(&path).unwrap_or(path);
                candidates.push(ProfileCandidate {
                    key: path.to_string_lossy().into_owned(),
                    path,
                });
            }
        }

        tracing::debug!("Discovered {} profile candidates", candidates.len());
        candidates
    }

    fn watch_roots(&self) -> Vec<PathBuf> {
        let paths = self.search_paths();
        let mut roots: Vec<PathBuf> = paths
            .system_dir
            .iter()
            .filter(|dir| dir.is_dir())
            .cloned()
            .collect();
        roots.extend(paths.user_profile_dirs());
        roots
    }
}

/// Regular, non-hidden files directly inside `dir`, sorted by file name.
///
/// Symlinks are followed, so a link to a file counts as a file. Dotfiles
/// (`.directory`, editor swap files) are skipped.
pub fn list_profile_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| ProfileError::io(dir, e))?;

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn list_or_skip(dir: &Path) -> Vec<PathBuf> {
    match list_profile_files(dir) {
        Ok(files) => files,
        Err(ProfileError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("Profile directory {:?} does not exist", dir);
            Vec::new()
        }
        Err(e) => {
            tracing::warn!("Skipping profile directory: {}", e);
            Vec::new()
        }
    }
}

/// Standard per-application data locations, most specific first.
///
/// Mirrors the XDG lookup order on Unix: the user data directories followed
/// by every entry of `XDG_DATA_DIRS`, each suffixed with
/// `[organization/]app_name`.
pub fn standard_data_locations(app_name: &str, organization: Option<&str>) -> Vec<PathBuf> {
    let mut bases: Vec<PathBuf> = [dirs::data_dir(), dirs::data_local_dir()]
        .into_iter()
        .flatten()
        .collect();

    #[cfg(unix)]
    {
        let system = std::env::var("XDG_DATA_DIRS")
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());
        bases.extend(
            system
                .split(':')
                .filter(|entry| !entry.is_empty())
                .map(PathBuf::from),
        );
    }

    let mut locations: Vec<PathBuf> = Vec::new();
    for base in bases {
        let location = match organization {
            Some(org) => base.join(org).join(app_name),
            None => base.join(app_name),
        };
        if !locations.contains(&location) {
            locations.push(location);
        }
    }
    locations
}
