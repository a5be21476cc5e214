use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Deserialize;
use tracing::debug;

use crate::error::ParseError;
use crate::version::semver::{SemanticVersion, parse_version};

/// A remote repository: owner, name and an optional access token.
///
/// Equality and hashing only consider owner and name.
#[derive(Clone)]
pub struct RepositoryIdentity {
    owner: String,
    name: String,
    token: Option<String>,
}

impl RepositoryIdentity {
    pub fn new(owner: &str, name: &str) -> Result<Self, ParseError> {
        if !is_valid_component(owner) || !is_valid_component(name) {
            return Err(ParseError::Repository(format!("{}/{}", owner, name)));
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            token: None,
        })
    }

    /// Attach an access token; a blank token means anonymous access
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.trim().is_empty()).then(|| token.trim().to_string());
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// File name of this repository's installed-version cache.
    ///
    /// `@` never appears in a valid owner or name, so distinct repositories
    /// never share a file.
    pub fn cache_file_name(&self) -> String {
        format!("repo-{}@{}.json", self.owner, self.name)
    }
}

/// Owner and repository names: ASCII alphanumerics, `-`, `_` and `.`
fn is_valid_component(component: &str) -> bool {
    !component.is_empty()
        && component != "."
        && component != ".."
        && component
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl PartialEq for RepositoryIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.name == other.name
    }
}

impl Eq for RepositoryIdentity {}

impl Hash for RepositoryIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Debug for RepositoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryIdentity")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl fmt::Display for RepositoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A downloadable file attached to a release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub name: String,
    pub url: String,
    /// Declared size in bytes
    pub size: u64,
}

impl ReleaseAsset {
    pub fn new(name: impl Into<String>, url: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            size,
        }
    }

    /// Assets with a blank name or url, or no content, are never downloaded
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.url.trim().is_empty() && self.size > 0
    }
}

/// Asset entry as returned by the API, where any field may be missing
#[derive(Debug, Deserialize)]
pub(crate) struct RawAsset {
    name: Option<String>,
    browser_download_url: Option<String>,
    size: Option<i64>,
}

impl From<RawAsset> for ReleaseAsset {
    fn from(raw: RawAsset) -> Self {
        Self {
            name: raw.name.unwrap_or_default(),
            url: raw.browser_download_url.unwrap_or_default(),
            size: raw.size.and_then(|size| u64::try_from(size).ok()).unwrap_or(0),
        }
    }
}

/// A single release looked up by tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub tag_name: String,
    /// Assets in listing order, not yet validated
    pub assets: Vec<ReleaseAsset>,
}

/// One entry of the release listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseSummary {
    #[serde(default)]
    pub tag_name: Option<String>,
}

/// One page of the release listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleasePage {
    /// Releases in the order the remote listed them
    Releases(Vec<ReleaseSummary>),
    /// Error-shaped payload (e.g. `{"message": "Not Found"}`); ends the listing
    Unavailable { message: Option<String> },
}

impl ReleasePage {
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Releases(
            tags.into_iter()
                .map(|tag| ReleaseSummary {
                    tag_name: Some(tag.into()),
                })
                .collect(),
        )
    }

    /// Number of releases on the page, parseable or not
    pub fn len(&self) -> usize {
        match self {
            ReleasePage::Releases(releases) => releases.len(),
            ReleasePage::Unavailable { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Versions of all releases whose tag parses; other releases are skipped
    pub fn into_versions(self) -> Vec<SemanticVersion> {
        let ReleasePage::Releases(releases) = self else {
            return Vec::new();
        };

        releases
            .into_iter()
            .filter_map(|release| release.tag_name)
            .filter_map(|tag| {
                parse_version(&tag)
                    .inspect_err(|e| debug!("Skipping release: {}", e))
                    .ok()
            })
            .collect()
    }
}
