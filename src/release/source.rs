//! Release source trait and the queries built on top of it

use futures::stream::{self, Stream, TryStreamExt};
#[cfg(test)]
use mockall::automock;
use regex::Regex;
use tracing::{debug, info};

use crate::config::RELEASES_PAGE_SIZE;
use crate::error::{ParseError, ReleaseError};
use crate::release::auth::AuthHeaders;
use crate::release::types::{Release, ReleaseAsset, ReleasePage, RepositoryIdentity};
use crate::version::semver::SemanticVersion;

/// Trait for fetching release metadata from a remote repository host
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Fetches one page of the release listing
    ///
    /// # Arguments
    /// * `page` - 1-based page number
    /// * `per_page` - Number of releases requested per page
    ///
    /// # Returns
    /// * `Ok(ReleasePage::Releases)` - Releases in the remote's listing order
    /// * `Ok(ReleasePage::Unavailable)` - The remote answered with an error-shaped payload
    /// * `Err(ReleaseError)` - If the request or decoding fails
    async fn fetch_release_page(
        &self,
        repo: &RepositoryIdentity,
        auth: &AuthHeaders,
        page: u32,
        per_page: usize,
    ) -> Result<ReleasePage, ReleaseError>;

    /// Fetches a single release by its tag, `None` if there is no such release
    async fn fetch_release_by_tag(
        &self,
        repo: &RepositoryIdentity,
        auth: &AuthHeaders,
        tag: &str,
    ) -> Result<Option<Release>, ReleaseError>;
}

/// Whether pagination stops after `page`: an error-shaped payload or a short page
pub fn is_last_page(page: &ReleasePage, per_page: usize) -> bool {
    match page {
        ReleasePage::Releases(releases) => releases.len() < per_page,
        ReleasePage::Unavailable { .. } => true,
    }
}

/// Lazily list the versions of every release whose tag parses.
///
/// Pages are requested one at a time, starting at 1, until [`is_last_page`]
/// holds. Versions come out in the remote's order. A failed request is
/// yielded as an error and ends the stream.
pub fn list_versions<'a, S>(
    source: &'a S,
    repo: &'a RepositoryIdentity,
    auth: &'a AuthHeaders,
) -> impl Stream<Item = Result<SemanticVersion, ReleaseError>> + 'a
where
    S: ReleaseSource + ?Sized,
{
    info!("Searching for releases in '{}'", repo);

    stream::try_unfold(Some(1u32), move |next_page| async move {
        let Some(page_number) = next_page else {
            return Ok::<_, ReleaseError>(None);
        };

        let page = source
            .fetch_release_page(repo, auth, page_number, RELEASES_PAGE_SIZE)
            .await?;
        debug!("Release page #{} loaded ({} releases)", page_number, page.len());

        let next_page = if is_last_page(&page, RELEASES_PAGE_SIZE) {
            debug!("No more release pages");
            None
        } else {
            Some(page_number + 1)
        };

        Ok(Some((page.into_versions(), next_page)))
    })
    .map_ok(|versions| stream::iter(versions.into_iter().map(Ok)))
    .try_flatten()
}

/// Regular expression selecting assets by name; the whole name must match
#[derive(Debug, Clone)]
pub struct AssetPattern {
    pattern: String,
    regex: Regex,
}

impl AssetPattern {
    pub fn new(pattern: &str) -> Result<Self, ParseError> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            ParseError::AssetPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Pattern accepting every asset
    pub fn any() -> Self {
        Self::new(".*").expect("match-all pattern is a valid regex")
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

impl Default for AssetPattern {
    fn default() -> Self {
        Self::any()
    }
}

/// Valid assets of the release tagged `tag` whose names match `pattern`.
///
/// A missing release, or one without assets, yields an empty list.
pub async fn assets_for_tag<S>(
    source: &S,
    repo: &RepositoryIdentity,
    auth: &AuthHeaders,
    tag: &str,
    pattern: &AssetPattern,
) -> Result<Vec<ReleaseAsset>, ReleaseError>
where
    S: ReleaseSource + ?Sized,
{
    info!(
        "Searching for assets by tag '{}' and mask '{}'",
        tag,
        pattern.as_str()
    );

    let Some(release) = source.fetch_release_by_tag(repo, auth, tag).await? else {
        debug!("Release '{}' not found", tag);
        return Ok(Vec::new());
    };
    debug!(
        "Release '{}' lists {} assets",
        release.tag_name,
        release.assets.len()
    );

    Ok(release
        .assets
        .into_iter()
        .filter(|asset| {
            if !asset.is_valid() {
                debug!("Skipping invalid asset {:?}", asset);
                return false;
            }
            pattern.is_match(&asset.name)
        })
        .collect())
}
