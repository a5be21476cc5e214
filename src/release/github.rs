//! GitHub Releases API release source

use reqwest::{Response, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ParseError, ReleaseError};
use crate::release::auth::AuthHeaders;
use crate::release::source::ReleaseSource;
use crate::release::types::{RawAsset, Release, ReleasePage, ReleaseSummary, RepositoryIdentity};

/// Error payload returned by the GitHub API.
///
/// `message` is required so that an object which is neither a release nor
/// an error fails to decode instead of passing for an error.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Response from the release listing endpoint
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListingBody {
    Releases(Vec<ReleaseSummary>),
    Error(ErrorBody),
}

#[derive(Debug, Deserialize)]
struct RawRelease {
    tag_name: String,
    #[serde(default)]
    assets: Option<Vec<RawAsset>>,
}

/// Response from the release-by-tag endpoint
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReleaseBody {
    Release(RawRelease),
    Error(ErrorBody),
}

/// Release source backed by the GitHub Releases API
pub struct GitHubReleaseSource {
    client: reqwest::Client,
    base_url: Url,
}

impl GitHubReleaseSource {
    /// Creates a source talking to the API at `base_url` (e.g. "https://api.github.com")
    pub fn new(base_url: &str, client: reqwest::Client) -> Result<Self, ParseError> {
        let base_url = Url::parse(base_url).map_err(|_| ParseError::BaseUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ParseError::BaseUrl(base_url.to_string()));
        }

        Ok(Self { client, base_url })
    }

    /// `{base}/repos/{owner}/{name}/{segments...}`, each segment percent-encoded
    fn endpoint(&self, repo: &RepositoryIdentity, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(["repos", repo.owner(), repo.name()])
                .extend(segments);
        }
        url
    }

    async fn get(&self, url: Url, auth: &AuthHeaders) -> Result<Response, ReleaseError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .headers(auth.header_map().clone())
            .send()
            .await?;
        Ok(response)
    }
}

/// Reject rate-limited and otherwise unsuccessful responses
fn ensure_success(response: &Response) -> Result<(), ReleaseError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let quota_exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        == Some("0");

    if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && quota_exhausted)
    {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(ReleaseError::RateLimited {
            retry_after_secs: retry_after,
        });
    }

    warn!("GitHub API returned status {}: {}", status, response.url());
    Err(ReleaseError::UnexpectedStatus(status))
}

async fn error_message(response: Response) -> Option<String> {
    response
        .json::<ErrorBody>()
        .await
        .ok()
        .map(|body| body.message)
}

#[async_trait::async_trait]
impl ReleaseSource for GitHubReleaseSource {
    async fn fetch_release_page(
        &self,
        repo: &RepositoryIdentity,
        auth: &AuthHeaders,
        page: u32,
        per_page: usize,
    ) -> Result<ReleasePage, ReleaseError> {
        let mut url = self.endpoint(repo, &["releases"]);
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());

        let response = self.get(url, auth).await?;

        if response.status() == StatusCode::NOT_FOUND {
            let message = error_message(response).await;
            warn!("Releases of '{}' not found: {:?}", repo, message);
            return Ok(ReleasePage::Unavailable { message });
        }

        ensure_success(&response)?;

        let body: ListingBody = response.json().await.map_err(|e| {
            warn!("Failed to parse GitHub releases response: {}", e);
            ReleaseError::InvalidResponse(e.to_string())
        })?;

        Ok(match body {
            ListingBody::Releases(releases) => ReleasePage::Releases(releases),
            ListingBody::Error(error) => {
                warn!("GitHub API answered with an error: {}", error.message);
                ReleasePage::Unavailable {
                    message: Some(error.message),
                }
            }
        })
    }

    async fn fetch_release_by_tag(
        &self,
        repo: &RepositoryIdentity,
        auth: &AuthHeaders,
        tag: &str,
    ) -> Result<Option<Release>, ReleaseError> {
        let url = self.endpoint(repo, &["releases", "tags", tag]);

        let response = self.get(url, auth).await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Release '{}' of '{}' not found", tag, repo);
            return Ok(None);
        }

        ensure_success(&response)?;

        let body: ReleaseBody = response.json().await.map_err(|e| {
            warn!("Failed to parse GitHub release response: {}", e);
            ReleaseError::InvalidResponse(e.to_string())
        })?;

        Ok(match body {
            ReleaseBody::Release(release) => Some(Release {
                tag_name: release.tag_name,
                assets: release
                    .assets
                    .unwrap_or_default()
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            }),
            ReleaseBody::Error(error) => {
                warn!("GitHub API answered with an error: {}", error.message);
                None
            }
        })
    }
}
