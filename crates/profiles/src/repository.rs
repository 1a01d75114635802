use std::{collections::BTreeMap, sync::Arc};

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::{
    config::RepositoryConfig,
    discovery::{FsDiscovery, ProfileDiscovery},
    profile::{MltProfileParser, ProfileParams, ProfileParser, VideoProfile},
};

static GLOBAL: OnceCell<Arc<ProfileRepository>> = OnceCell::new();

/// Validated video profiles keyed by the location they were discovered at.
///
/// All queries share a read lock. [`ProfileRepository::refresh`] holds the
/// write lock for the whole rescan, file I/O included, so a reader sees either
/// the previous set or the new one and never a partial rebuild.
pub struct ProfileRepository {
    discovery: Arc<dyn ProfileDiscovery>,
    parser: Arc<dyn ProfileParser>,
    profiles: RwLock<BTreeMap<String, VideoProfile>>,
}

impl ProfileRepository {
    /// Build a repository and run the initial scan.
    pub fn new(discovery: Arc<dyn ProfileDiscovery>, parser: Arc<dyn ProfileParser>) -> Self {
        let repository = Self {
            discovery,
            parser,
            profiles: RwLock::new(BTreeMap::new()),
        };
        repository.refresh();
        repository
    }

    /// Repository over the filesystem locations named by `config`.
    pub fn from_config(config: &RepositoryConfig) -> Self {
        let discovery = FsDiscovery::new(config.search_paths());
        Self::new(Arc::new(discovery), Arc::new(MltProfileParser))
    }

    /// The process-wide repository, built from [`RepositoryConfig::load`] on
    /// first use.
    ///
    /// Concurrent first callers block until the single initial scan is done;
    /// later calls return the same instance without rescanning.
    pub fn global() -> Arc<Self> {
        Self::get_or_create(&GLOBAL, || Self::from_config(&RepositoryConfig::load()))
    }

    /// Like [`ProfileRepository::global`] but with an explicit config.
    ///
    /// Has no effect on the configuration if the global instance already
    /// exists.
    pub fn init_global(config: &RepositoryConfig) -> Arc<Self> {
        if GLOBAL.get().is_some() {
            tracing::debug!("Profile repository already initialized, ignoring config");
        }
        Self::get_or_create(&GLOBAL, || Self::from_config(config))
    }

    fn get_or_create(cell: &OnceCell<Arc<Self>>, init: impl FnOnce() -> Self) -> Arc<Self> {
        cell.get_or_init(|| {
            tracing::debug!("Creating profile repository");
            Arc::new(init())
        })
        .clone()
    }

    pub fn discovery(&self) -> &Arc<dyn ProfileDiscovery> {
        &self.discovery
    }

    /// Discard every profile and rescan all locations.
    ///
    /// Unreadable directories and bad files are logged and skipped; the
    /// first candidate seen for a key wins.
    pub fn refresh(&self) {
        let mut profiles = self.profiles.write();
        profiles.clear();

        let candidates = self.discovery.discover();
        let total = candidates.len();
        let mut duplicates = 0usize;
        let mut invalid = 0usize;

        for candidate in candidates {
            let profile = self.parser.parse(&candidate.path);

            if profiles.contains_key(&candidate.key) {
                tracing::warn!("Duplicate profile found: {}. Ignoring.", candidate.key);
                duplicates += 1;
                continue;
            }
            if !profile.is_valid() {
                tracing::warn!("Invalid profile found: {}. Ignoring.", candidate.key);
                invalid += 1;
                continue;
            }

            tracing::debug!(
                "Loaded profile {} ({})",
                candidate.key,
                profile.description()
            );
            profiles.insert(candidate.key, profile);
        }

        tracing::info!(
            "Profile repository refreshed: {} loaded, {} duplicate, {} invalid (of {} files)",
            profiles.len(),
            duplicates,
            invalid,
            total
        );
    }

    /// `(description, key)` for every profile, sorted by description then key.
    pub fn all_profiles(&self) -> Vec<(String, String)> {
        let profiles = self.profiles.read();
        let mut list: Vec<(String, String)> = profiles
            .iter()
            .map(|(key, profile)| (profile.description().to_string(), key.clone()))
            .collect();
        list.sort();
        list
    }

    pub fn profile(&self, key: &str) -> Option<VideoProfile> {
        self.profiles.read().get(key).cloned()
    }

    pub fn profile_exists(&self, key: &str) -> bool {
        self.profiles.read().contains_key(key)
    }

    /// Key of the first profile, in key order, matching `params`.
    pub fn find_matching_profile(&self, params: &ProfileParams) -> Option<String> {
        self.profiles
            .read()
            .iter()
            .find(|(_, profile)| profile.matches(params))
            .map(|(key, _)| key.clone())
    }

    /// Distinct frame rates across all profiles, ascending.
    pub fn all_frame_rates(&self) -> Vec<f64> {
        let mut rates: Vec<f64> = self
            .profiles
            .read()
            .values()
            .map(VideoProfile::fps)
            .collect();
        rates.sort_by(f64::total_cmp);
        rates.dedup();
        rates
    }

    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }
}

impl std::fmt::Debug for ProfileRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileRepository")
            .field("profiles", &self.len())
            .finish_non_exhaustive()
    }
}
