//! Cutline video profile repository
//!
//! Discovers MLT profile files in the built-in MLT directory and in the
//! `profiles/` directory of each application data location, keeps the valid
//! ones in a read/write-locked cache and serves sorted listings of them.

pub mod config;
pub mod discovery;
pub mod error;
pub mod profile;
pub mod repository;
pub mod watcher;

pub use config::RepositoryConfig;
pub use discovery::{FsDiscovery, ProfileCandidate, ProfileDiscovery, SearchPaths};
pub use error::ProfileError;
pub use profile::{
    MltProfileParser, ProfileParams, ProfileParser, VideoProfile, display_aspect_for,
};
pub use repository::ProfileRepository;
pub use watcher::ProfileWatcher;
