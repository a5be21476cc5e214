use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

// =============================================================================
// Remote API constants
// =============================================================================

/// GitHub REST API base URL
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Releases requested per listing page (the API maximum)
pub const RELEASES_PAGE_SIZE: usize = 100;

/// Environment variable consulted when no token is passed explicitly
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// GitHub rejects requests without a user agent
pub const USER_AGENT: &str = concat!("release-downloader/", env!("CARGO_PKG_VERSION"));

/// Connect timeout of the binary's HTTP client (10 seconds)
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Update constants
// =============================================================================

/// Default download block size (1 MiB)
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

/// Number of newest compatible versions kept as update candidates
pub const MAX_CANDIDATES: usize = 10;

/// Settings file structure; command-line flags take precedence over it
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub api_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub block_size: Option<usize>,
    /// Asset name pattern
    pub mask: Option<String>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Returns the directory holding the installed-version cache files.
/// Uses $XDG_CACHE_HOME/release-downloader if XDG_CACHE_HOME is set,
/// otherwise falls back to ~/.cache/release-downloader,
/// or ./release-downloader if neither is available.
pub fn cache_dir() -> PathBuf {
    cache_dir_with_env(std::env::var("XDG_CACHE_HOME").ok(), dirs::home_dir())
}

fn cache_dir_with_env(xdg_cache_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let cache_dir = xdg_cache_home
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".cache")))
        .unwrap_or_else(|| PathBuf::from("."));

    cache_dir.join("release-downloader")
}

/// HTTP client shared by the release source and the downloader
pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()
}
