use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    discovery::{PROFILES_DIR, SearchPaths, standard_data_locations},
    error::{ProfileError, Result},
};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CUTLINE_PROFILES_CONFIG";
/// Environment variable MLT itself honours for its profile directory.
pub const MLT_PROFILES_ENV: &str = "MLT_PROFILES_PATH";
/// Environment variable pointing at the MLT data root.
pub const MLT_DATA_ENV: &str = "MLT_DATA";

const CONFIG_FILE: &str = "profiles.json";

const KNOWN_MLT_DIRS: &[&str] = &[
    "/usr/share/mlt-7/profiles",
    "/usr/share/mlt/profiles",
    "/usr/local/share/mlt-7/profiles",
    "/usr/local/share/mlt/profiles",
];

fn default_app_name() -> String {
    "cutline".to_string()
}

/// Settings that decide where the profile repository looks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Directory of built-in MLT profiles. Resolved from the environment and
    /// well-known install locations when unset.
    #[serde(default)]
    pub mlt_profiles_path: Option<PathBuf>,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default)]
    pub organization: Option<String>,
    /// Searched after the standard data locations.
    #[serde(default)]
    pub extra_data_dirs: Vec<PathBuf>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            mlt_profiles_path: None,
            app_name: default_app_name(),
            organization: None,
            extra_data_dirs: Vec::new(),
        }
    }
}

impl RepositoryConfig {
    /// Load from `$CUTLINE_PROFILES_CONFIG`, else from the user config
    /// directory, else defaults.
    ///
    /// A config file that exists but cannot be parsed is reported and
    /// replaced with defaults.
    pub fn load() -> Self {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(Self::default_path);

        let Some(path) = path else {
            return Self::default();
        };
        if !path.exists() {
            tracing::debug!("No profile config at {:?}, using defaults", path);
            return Self::default();
        }

        match Self::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Ignoring profile config: {}", e);
                Self::default()
            }
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| ProfileError::io(path, e))?;
        serde_json::from_str(&raw).map_err(|source| ProfileError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ProfileError::io(parent, e))?;
        }
        let raw = serde_json::to_string_pretty(self).map_err(|source| ProfileError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, raw).map_err(|e| ProfileError::io(path, e))
    }

    /// `<config dir>/<app name>/profiles.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(default_app_name()).join(CONFIG_FILE))
    }

    /// The built-in profile directory: configured value, then
    /// `$MLT_PROFILES_PATH`, then `$MLT_DATA/profiles`, then the first
    /// well-known MLT install directory that exists.
    pub fn system_profiles_dir(&self) -> Option<PathBuf> {
        if let Some(path) = &self.mlt_profiles_path {
            return Some(path.clone());
        }
        if let Some(path) = std::env::var_os(MLT_PROFILES_ENV).filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(path));
        }
        if let Some(data) = std::env::var_os(MLT_DATA_ENV).filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(data).join(PROFILES_DIR));
        }
        KNOWN_MLT_DIRS
            .iter()
            .map(PathBuf::from)
            .find(|dir| dir.is_dir())
    }

    pub fn search_paths(&self) -> SearchPaths {
        let mut data_locations =
            standard_data_locations(&self.app_name, self.organization.as_deref());
        data_locations.extend(self.extra_data_dirs.iter().cloned());
        SearchPaths::new(self.system_profiles_dir(), data_locations)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{ "mlt_profiles_path": "/opt/mlt/profiles" }"#).unwrap();

        let config = RepositoryConfig::load_from_file(&path).unwrap();

        assert_eq!(
            config.mlt_profiles_path,
            Some(PathBuf::from("/opt/mlt/profiles"))
        );
        assert_eq!(config.app_name, "cutline");
        assert!(config.extra_data_dirs.is_empty());
    }

    #[test]
    fn test_save_then_load_preserves_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = RepositoryConfig {
            organization: Some("cutline-video".to_string()),
            extra_data_dirs: vec![PathBuf::from("/srv/profiles")],
            ..Default::default()
        };

        config.save_to_file(&path).unwrap();

        assert_eq!(RepositoryConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_malformed_file_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{ not json").unwrap();

        let err = RepositoryConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ProfileError::Config { .. }));
    }

    #[test]
    fn test_explicit_mlt_path_wins() {
        let config = RepositoryConfig {
            mlt_profiles_path: Some(PathBuf::from("/opt/mlt/profiles")),
            ..Default::default()
        };

        assert_eq!(
            config.system_profiles_dir(),
            Some(PathBuf::from("/opt/mlt/profiles"))
        );
    }

    #[test]
    fn test_extra_data_dirs_are_searched_last() {
        let config = RepositoryConfig {
            mlt_profiles_path: Some(PathBuf::from("/opt/mlt/profiles")),
            extra_data_dirs: vec![PathBuf::from("/srv/cutline")],
            ..Default::default()
        };

        let paths = config.search_paths();
        assert_eq!(paths.data_locations.last(), Some(&PathBuf::from("/srv/cutline")));
    }
}
