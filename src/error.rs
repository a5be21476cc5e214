use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

use crate::version::semver::SemanticVersion;

/// Malformed caller input, detected before any network activity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid version '{input}': {reason}")]
    Version { input: String, reason: String },

    #[error("Invalid compatibility spec '{input}': {reason}")]
    Spec { input: String, reason: String },

    #[error("Invalid repository identity '{0}'")]
    Repository(String),

    #[error("Invalid asset pattern '{pattern}': {reason}")]
    AssetPattern { pattern: String, reason: String },

    #[error("Invalid API base URL '{0}'")]
    BaseUrl(String),

    #[error("Authorization token contains characters not allowed in an HTTP header")]
    Token,
}

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Rate limited: retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Unexpected status: {0}")]
    UnexpectedStatus(StatusCode),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to write cache file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize cache record: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Download of '{asset}' failed with status: {status}")]
    UnexpectedStatus { asset: String, status: StatusCode },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Block size must be greater than zero")]
    InvalidBlockSize,

    #[error("Asset name '{0}' is not a plain file name")]
    InvalidAssetName(String),
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Could not check releases: {0}")]
    Release(#[from] ReleaseError),

    #[error("Could not download assets: {0}")]
    Download(#[from] DownloadError),

    /// The assets are on disk but the installed version could not be persisted
    #[error("Downloaded {version} but could not record it as installed: {source}")]
    Unrecorded {
        version: SemanticVersion,
        source: CacheError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}
