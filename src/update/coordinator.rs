//! One update run for one repository
//!
//! The coordinator resolves the current version, picks the newest release
//! matching the compatibility spec and, when it is newer, downloads the
//! matching assets before recording the new version in the cache.

use std::path::PathBuf;

use futures::TryStreamExt;
use tracing::{debug, error, info, warn};

use crate::config::{DEFAULT_BLOCK_SIZE, MAX_CANDIDATES};
use crate::error::{ParseError, UpdateError};
use crate::release::auth::AuthHeaders;
use crate::release::download::AssetDownloader;
use crate::release::source::{AssetPattern, ReleaseSource, assets_for_tag, list_versions};
use crate::release::types::{ReleaseAsset, RepositoryIdentity};
use crate::version::cache::InstalledVersionStore;
use crate::version::semver::SemanticVersion;
use crate::version::spec::CompatibilitySpec;

/// What to look for and where to put it
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub spec: CompatibilitySpec,
    /// Overrides the cached installed version when set
    pub current_version: Option<SemanticVersion>,
    pub asset_pattern: AssetPattern,
    pub output_dir: PathBuf,
    pub block_size: usize,
}

impl UpdateRequest {
    pub fn new(spec: CompatibilitySpec) -> Self {
        Self {
            spec,
            current_version: None,
            asset_pattern: AssetPattern::any(),
            output_dir: PathBuf::from("."),
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    pub fn with_current_version(mut self, version: Option<SemanticVersion>) -> Self {
        self.current_version = version;
        self
    }

    pub fn with_asset_pattern(mut self, pattern: AssetPattern) -> Self {
        self.asset_pattern = pattern;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }
}

/// How a run ended when nothing went wrong
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No release satisfies the compatibility spec
    NoCompatibleVersion,
    /// The current version is at least the newest compatible one
    UpToDate {
        current: SemanticVersion,
        latest: SemanticVersion,
        /// Whether the current version itself satisfies the compatibility spec
        current_compatible: bool,
    },
    /// The newest compatible release has no asset matching the pattern
    NoAssetsFound { version: SemanticVersion },
    /// Assets downloaded and the version recorded as installed
    Updated {
        version: SemanticVersion,
        /// Paths of the downloaded files, in download order
        assets: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateState {
    ResolvingCurrentVersion,
    ListingReleases,
    SelectingCandidate,
    UpToDate,
    NoCompatibleVersion,
    FetchingAssets,
    NoAssetsFound,
    Downloading,
    Recording,
    Done,
}

/// Drives one repository from "what is installed" to "newest compatible installed"
pub struct UpdateCoordinator<S, C> {
    repo: RepositoryIdentity,
    auth: AuthHeaders,
    source: S,
    cache: C,
    downloader: AssetDownloader,
}

impl<S, C> UpdateCoordinator<S, C>
where
    S: ReleaseSource,
    C: InstalledVersionStore,
{
    /// Fails when the repository's token cannot be sent as a header
    pub fn new(
        repo: RepositoryIdentity,
        source: S,
        cache: C,
        downloader: AssetDownloader,
    ) -> Result<Self, ParseError> {
        let auth = AuthHeaders::for_repository(&repo)?;

        Ok(Self {
            repo,
            auth,
            source,
            cache,
            downloader,
        })
    }

    pub fn repository(&self) -> &RepositoryIdentity {
        &self.repo
    }

    /// Run the update once.
    ///
    /// `on_asset_progress(asset, done)` receives the download progress of
    /// each asset. The cache is only written after every asset downloaded.
    pub async fn run<F>(
        &mut self,
        request: &UpdateRequest,
        on_asset_progress: F,
    ) -> Result<UpdateOutcome, UpdateError>
    where
        F: FnMut(&ReleaseAsset, u64),
    {
        self.enter(UpdateState::ResolvingCurrentVersion);
        let current = match &request.current_version {
            Some(version) => version.clone(),
            None => self
                .cache
                .installed_version()
                .unwrap_or_else(|| SemanticVersion::new(0, 0, 0)),
        };
        info!("Current version of '{}': {}", self.repo, current);

        self.enter(UpdateState::ListingReleases);
        let versions: Vec<SemanticVersion> = list_versions(&self.source, &self.repo, &self.auth)
            .try_collect()
            .await?;

        self.enter(UpdateState::SelectingCandidate);
        let candidates = top_candidates(versions, &request.spec, MAX_CANDIDATES);
        let Some(latest) = candidates.last().cloned() else {
            warn!("No release of '{}' matches '{}'", self.repo, request.spec);
            self.enter(UpdateState::NoCompatibleVersion);
            return Ok(UpdateOutcome::NoCompatibleVersion);
        };
        debug!(
            "Compatible candidates: {:?}",
            candidates.iter().map(ToString::to_string).collect::<Vec<_>>()
        );
        info!("Latest compatible version: {}", latest);

        if is_already_installed(&latest, &current, &request.spec) {
            info!("'{}' is up to date", self.repo);
            self.enter(UpdateState::UpToDate);
            return Ok(UpdateOutcome::UpToDate {
                current_compatible: request.spec.matches(&current),
                current,
                latest,
            });
        }

        self.enter(UpdateState::FetchingAssets);
        let assets = assets_for_tag(
            &self.source,
            &self.repo,
            &self.auth,
            latest.origin_tag(),
            &request.asset_pattern,
        )
        .await?;
        if assets.is_empty() {
            error!(
                "No assets of {} match '{}'",
                latest.origin_tag(),
                request.asset_pattern.as_str()
            );
            self.enter(UpdateState::NoAssetsFound);
            return Ok(UpdateOutcome::NoAssetsFound { version: latest });
        }

        self.enter(UpdateState::Downloading);
        let paths = self
            .downloader
            .download_all(
                &assets,
                &self.auth,
                &request.output_dir,
                request.block_size,
                on_asset_progress,
            )
            .await?;

        self.enter(UpdateState::Recording);
        self.cache
            .record_installed(&latest)
            .map_err(|source| UpdateError::Unrecorded {
                version: latest.clone(),
                source,
            })?;

        self.enter(UpdateState::Done);
        info!("Updated '{}' to {}", self.repo, latest);
        Ok(UpdateOutcome::Updated {
            version: latest,
            assets: paths,
        })
    }

    fn enter(&self, state: UpdateState) {
        debug!("Update of '{}': {:?}", self.repo, state);
    }
}

/// The `limit` highest versions matching `spec`, ascending
pub fn top_candidates<I>(versions: I, spec: &CompatibilitySpec, limit: usize) -> Vec<SemanticVersion>
where
    I: IntoIterator<Item = SemanticVersion>,
{
    let mut matching = spec.filter(versions);
    matching.sort();
    matching.dedup();

    let skip = matching.len().saturating_sub(limit);
    matching.split_off(skip)
}

/// Whether `current` makes an update to `latest` pointless.
///
/// A current version newer than every compatible release is kept as is,
/// with a warning saying whether it still satisfies `spec`.
pub fn is_already_installed(
    latest: &SemanticVersion,
    current: &SemanticVersion,
    spec: &CompatibilitySpec,
) -> bool {
    if current > latest {
        if spec.matches(current) {
            warn!(
                "Current version {} is newer than the latest compatible release {}",
                current, latest
            );
        } else {
            warn!(
                "Current version {} is newer than the latest compatible release {} and does not satisfy '{}'",
                current, latest, spec
            );
        }
    }

    current >= latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CacheError, DownloadError, ReleaseError};
    use crate::release::source::MockReleaseSource;
    use crate::release::types::{Release, ReleasePage};
    use crate::version::cache::MockInstalledVersionStore;
    use crate::version::semver::parse_version;
    use mockito::Server;
    use rstest::rstest;
    use tempfile::TempDir;

    fn repo() -> RepositoryIdentity {
        RepositoryIdentity::new("owner", "repo").unwrap()
    }

    fn spec(expression: &str) -> CompatibilitySpec {
        CompatibilitySpec::parse(expression).unwrap()
    }

    fn version(tag: &str) -> SemanticVersion {
        parse_version(tag).unwrap()
    }

    fn source_listing(tags: &'static [&'static str]) -> MockReleaseSource {
        let mut source = MockReleaseSource::new();
        source
            .expect_fetch_release_page()
            .returning(move |_, _, _, _| Ok(ReleasePage::from_tags(tags.iter().copied())));
        source
    }

    fn cache_with(installed: Option<&'static str>) -> MockInstalledVersionStore {
        let mut cache = MockInstalledVersionStore::new();
        cache
            .expect_installed_version()
            .returning(move || installed.map(version));
        cache
    }

    fn coordinator(
        source: MockReleaseSource,
        cache: MockInstalledVersionStore,
    ) -> UpdateCoordinator<MockReleaseSource, MockInstalledVersionStore> {
        UpdateCoordinator::new(repo(), source, cache, AssetDownloader::new(reqwest::Client::new()))
            .unwrap()
    }

    #[rstest]
    #[case(&["v1.0.0", "v1.2.0", "v2.0.0"], "~1.0", 10, &["1.0.0"])]
    #[case(&["v2.0.0", "v1.0.0", "v1.2.0"], ">=1.0", 10, &["1.0.0", "1.2.0", "2.0.0"])]
    #[case(&["v2.0.0", "v1.0.0", "v1.2.0"], ">=1.0", 2, &["1.2.0", "2.0.0"])]
    #[case(&["v1.0.0", "1.0.0"], "*", 10, &["1.0.0"])]
    #[case(&["v3.0.0"], "<2", 10, &[])]
    fn top_candidates_keeps_highest_matching_ascending(
        #[case] tags: &[&str],
        #[case] expression: &str,
        #[case] limit: usize,
        #[case] expected: &[&str],
    ) {
        let versions = tags.iter().map(|tag| version(tag));

        let candidates: Vec<String> = top_candidates(versions, &spec(expression), limit)
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(candidates, expected);
    }

    #[rstest]
    #[case("1.0.0", "0.0.0", false)]
    #[case("1.0.0", "0.9.9", false)]
    #[case("1.2.0", "1.2.0", true)]
    #[case("1.0.0", "2.0.0", true)]
    #[case("1.0.0", "1.0.0-rc.1", false)]
    fn is_already_installed_compares_precedence(
        #[case] latest: &str,
        #[case] current: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(
            is_already_installed(&version(latest), &version(current), &spec("*")),
            expected
        );
    }

    #[tokio::test]
    async fn update_proceeds_to_highest_compatible_release() {
        let mut server = Server::new_async().await;
        let asset_mock = server
            .mock("GET", "/download/app.zip")
            .with_body("payload")
            .create_async()
            .await;
        let asset_url = format!("{}/download/app.zip", server.url());
        let temp_dir = TempDir::new().unwrap();

        let mut source = source_listing(&["v1.0.0", "v1.2.0", "v2.0.0"]);
        source
            .expect_fetch_release_by_tag()
            .withf(|_, _, tag| tag == "v1.0.0")
            .times(1)
            .returning(move |_, _, tag| {
                Ok(Some(Release {
                    tag_name: tag.to_string(),
                    assets: vec![
                        ReleaseAsset::new("app.zip", asset_url.clone(), 7),
                        ReleaseAsset::new("app.tar.gz", "https://example.com/app.tar.gz", 7),
                    ],
                }))
            });
        let mut cache = cache_with(None);
        cache
            .expect_record_installed()
            .withf(|v| *v == SemanticVersion::new(1, 0, 0))
            .times(1)
            .returning(|_| Ok(()));

        let request = UpdateRequest::new(spec("~1.0"))
            .with_asset_pattern(AssetPattern::new(r".*\.zip").unwrap())
            .with_output_dir(temp_dir.path());
        let mut progress = Vec::new();
        let outcome = coordinator(source, cache)
            .run(&request, |asset, done| progress.push((asset.name.clone(), done)))
            .await
            .unwrap();

        asset_mock.assert_async().await;
        assert_eq!(
            outcome,
            UpdateOutcome::Updated {
                version: SemanticVersion::new(1, 0, 0),
                assets: vec![temp_dir.path().join("app.zip")],
            }
        );
        assert_eq!(progress, vec![("app.zip".to_string(), 7)]);
    }

    #[tokio::test]
    async fn cached_version_equal_to_latest_is_up_to_date() {
        let mut source = source_listing(&["v1.0.0", "v1.2.0", "v2.0.0"]);
        source.expect_fetch_release_by_tag().times(0);
        let mut cache = cache_with(Some("1.2.0"));
        cache.expect_record_installed().times(0);

        let outcome = coordinator(source, cache)
            .run(&UpdateRequest::new(spec(">=1.0, <2.0")), |_, _| {})
            .await
            .unwrap();

        assert_eq!(
            outcome,
            UpdateOutcome::UpToDate {
                current: SemanticVersion::new(1, 2, 0),
                latest: SemanticVersion::new(1, 2, 0),
                current_compatible: true,
            }
        );
    }

    #[tokio::test]
    async fn current_newer_than_compatible_is_up_to_date_but_incompatible() {
        let mut source = source_listing(&["v1.0.0", "v1.2.0", "v2.0.0"]);
        source.expect_fetch_release_by_tag().times(0);
        let mut cache = cache_with(Some("2.0.0"));
        cache.expect_record_installed().times(0);

        let outcome = coordinator(source, cache)
            .run(&UpdateRequest::new(spec("~1.0")), |_, _| {})
            .await
            .unwrap();

        assert_eq!(
            outcome,
            UpdateOutcome::UpToDate {
                current: SemanticVersion::new(2, 0, 0),
                latest: SemanticVersion::new(1, 0, 0),
                current_compatible: false,
            }
        );
    }

    #[tokio::test]
    async fn explicit_current_version_overrides_cache() {
        let mut source = source_listing(&["v1.0.0", "v1.2.0"]);
        source.expect_fetch_release_by_tag().times(0);
        let mut cache = MockInstalledVersionStore::new();
        cache.expect_installed_version().times(0);
        cache.expect_record_installed().times(0);

        let request =
            UpdateRequest::new(spec("^1")).with_current_version(Some(SemanticVersion::new(1, 2, 0)));
        let outcome = coordinator(source, cache).run(&request, |_, _| {}).await.unwrap();

        assert!(matches!(outcome, UpdateOutcome::UpToDate { .. }));
    }

    #[tokio::test]
    async fn no_matching_assets_leaves_cache_untouched() {
        let mut source = source_listing(&["v1.0.0"]);
        source
            .expect_fetch_release_by_tag()
            .times(1)
            .returning(|_, _, tag| {
                Ok(Some(Release {
                    tag_name: tag.to_string(),
                    assets: vec![ReleaseAsset::new(
                        "app.tar.gz",
                        "https://example.com/app.tar.gz",
                        10,
                    )],
                }))
            });
        let mut cache = cache_with(None);
        cache.expect_record_installed().times(0);

        let request = UpdateRequest::new(spec("*"))
            .with_asset_pattern(AssetPattern::new(r".*\.zip").unwrap());
        let outcome = coordinator(source, cache).run(&request, |_, _| {}).await.unwrap();

        assert_eq!(
            outcome,
            UpdateOutcome::NoAssetsFound {
                version: SemanticVersion::new(1, 0, 0)
            }
        );
    }

    #[tokio::test]
    async fn missing_release_counts_as_no_assets() {
        let mut source = source_listing(&["v1.0.0"]);
        source
            .expect_fetch_release_by_tag()
            .returning(|_, _, _| Ok(None));
        let mut cache = cache_with(None);
        cache.expect_record_installed().times(0);

        let outcome = coordinator(source, cache)
            .run(&UpdateRequest::new(spec("*")), |_, _| {})
            .await
            .unwrap();

        assert!(matches!(outcome, UpdateOutcome::NoAssetsFound { .. }));
    }

    #[tokio::test]
    async fn no_compatible_release() {
        let mut source = source_listing(&["v1.0.0", "nightly"]);
        source.expect_fetch_release_by_tag().times(0);
        let mut cache = cache_with(None);
        cache.expect_record_installed().times(0);

        let outcome = coordinator(source, cache)
            .run(&UpdateRequest::new(spec(">=2")), |_, _| {})
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::NoCompatibleVersion);
    }

    #[tokio::test]
    async fn listing_failure_is_a_release_error() {
        let mut source = MockReleaseSource::new();
        source
            .expect_fetch_release_page()
            .returning(|_, _, _, _| Err(ReleaseError::RateLimited { retry_after_secs: Some(30) }));
        let mut cache = cache_with(None);
        cache.expect_record_installed().times(0);

        let result = coordinator(source, cache)
            .run(&UpdateRequest::new(spec("*")), |_, _| {})
            .await;

        assert!(matches!(
            result,
            Err(UpdateError::Release(ReleaseError::RateLimited { retry_after_secs: Some(30) }))
        ));
    }

    #[tokio::test]
    async fn download_failure_leaves_cache_untouched() {
        let mut server = Server::new_async().await;
        let _asset_mock = server
            .mock("GET", "/download/app.zip")
            .with_status(500)
            .create_async()
            .await;
        let asset_url = format!("{}/download/app.zip", server.url());
        let temp_dir = TempDir::new().unwrap();

        let mut source = source_listing(&["v1.0.0"]);
        source
            .expect_fetch_release_by_tag()
            .returning(move |_, _, tag| {
                Ok(Some(Release {
                    tag_name: tag.to_string(),
                    assets: vec![ReleaseAsset::new("app.zip", asset_url.clone(), 10)],
                }))
            });
        let mut cache = cache_with(None);
        cache.expect_record_installed().times(0);

        let request = UpdateRequest::new(spec("*")).with_output_dir(temp_dir.path());
        let result = coordinator(source, cache).run(&request, |_, _| {}).await;

        assert!(matches!(
            result,
            Err(UpdateError::Download(DownloadError::UnexpectedStatus { .. }))
        ));
    }

    #[tokio::test]
    async fn cache_write_failure_after_download_is_unrecorded() {
        let mut server = Server::new_async().await;
        let _asset_mock = server
            .mock("GET", "/download/app.zip")
            .with_body("payload")
            .create_async()
            .await;
        let asset_url = format!("{}/download/app.zip", server.url());
        let temp_dir = TempDir::new().unwrap();

        let mut source = source_listing(&["v1.0.0"]);
        source
            .expect_fetch_release_by_tag()
            .returning(move |_, _, tag| {
                Ok(Some(Release {
                    tag_name: tag.to_string(),
                    assets: vec![ReleaseAsset::new("app.zip", asset_url.clone(), 7)],
                }))
            });
        let mut cache = cache_with(None);
        cache.expect_record_installed().times(1).returning(|_| {
            Err(CacheError::Io {
                path: PathBuf::from("/read-only/repo-owner@repo.json"),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        });

        let request = UpdateRequest::new(spec("*")).with_output_dir(temp_dir.path());
        let result = coordinator(source, cache).run(&request, |_, _| {}).await;

        assert!(matches!(
            result,
            Err(UpdateError::Unrecorded { version, .. }) if version == SemanticVersion::new(1, 0, 0)
        ));
        assert!(temp_dir.path().join("app.zip").exists());
    }

    #[test]
    fn token_that_is_not_a_header_value_is_rejected() {
        let repo = repo().with_token("bad\ntoken");

        let result = UpdateCoordinator::new(
            repo,
            MockReleaseSource::new(),
            MockInstalledVersionStore::new(),
            AssetDownloader::new(reqwest::Client::new()),
        );

        assert!(matches!(result, Err(ParseError::Token)));
    }
}
