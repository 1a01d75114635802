use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading profile files or repository configuration.
///
/// None of these escape the repository's public cache operations: a profile
/// that fails to load is kept out of the cache and reported through `tracing`.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value {value:?} for `{key}` on line {line}")]
    InvalidValue {
        key: String,
        value: String,
        line: usize,
    },

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("failed to parse config {path:?}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Watch(#[from] notify::Error),
}

impl ProfileError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ProfileError> = std::result::Result<T, E>;
