use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{info, warn};

use release_downloader::config::{
    self, DEFAULT_API_URL, DEFAULT_BLOCK_SIZE, Settings, TOKEN_ENV_VAR, build_http_client,
};
use release_downloader::logging;
use release_downloader::release::download::{AssetDownloader, log_progress};
use release_downloader::release::github::GitHubReleaseSource;
use release_downloader::release::source::AssetPattern;
use release_downloader::release::types::RepositoryIdentity;
use release_downloader::update::coordinator::{UpdateCoordinator, UpdateOutcome, UpdateRequest};
use release_downloader::version::cache::VersionCache;
use release_downloader::version::semver::parse_version;
use release_downloader::version::spec::CompatibilitySpec;

#[derive(Parser)]
#[command(name = "release-downloader")]
#[command(version, about = "Download assets of the newest compatible GitHub release")]
struct Cli {
    /// Repository owner
    #[arg(short = 'u', long)]
    user: String,

    /// Repository name
    #[arg(short = 'n', long)]
    repo_name: String,

    /// Regular expression the whole asset name must match
    #[arg(short = 'm', long)]
    mask: Option<String>,

    /// Installed version, overriding the cached one
    #[arg(short = 'c', long)]
    current_version: Option<String>,

    /// Access token sent as a bearer token
    #[arg(short = 't', long, env = TOKEN_ENV_VAR, hide_env_values = true)]
    token: Option<String>,

    /// Compatibility spec, e.g. "~1.2" or ">=1.0, <2.0"
    #[arg(short = 'r', long)]
    require: String,

    /// Directory the assets are downloaded to
    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,

    /// Directory holding the installed-version cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Download block size in bytes
    #[arg(short = 'b', long)]
    block_size: Option<usize>,

    /// GitHub API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write JSON logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Enable debug logging (`-V` prints the version)
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init(cli.verbose, cli.log_file.as_deref())
        .context("Failed to initialize logging")?;

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let spec = CompatibilitySpec::parse(&cli.require)?;
    let current_version = cli
        .current_version
        .as_deref()
        .map(parse_version)
        .transpose()?;
    let asset_pattern = match cli.mask.or(settings.mask) {
        Some(mask) => AssetPattern::new(&mask)?,
        None => AssetPattern::any(),
    };
    let block_size = cli
        .block_size
        .or(settings.block_size)
        .unwrap_or(DEFAULT_BLOCK_SIZE);
    if block_size == 0 {
        bail!("Block size must be greater than zero");
    }

    let mut repo = RepositoryIdentity::new(&cli.user, &cli.repo_name)?;
    if let Some(token) = cli.token {
        repo = repo.with_token(token);
    }

    let api_url = cli
        .api_url
        .or(settings.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let client = build_http_client().context("Failed to build HTTP client")?;
    let source = GitHubReleaseSource::new(&api_url, client.clone())?;

    let cache_dir = cli
        .cache_dir
        .or(settings.cache_dir)
        .unwrap_or_else(config::cache_dir);
    let cache = VersionCache::for_repository(&cache_dir, &repo);

    let request = UpdateRequest::new(spec)
        .with_current_version(current_version)
        .with_asset_pattern(asset_pattern)
        .with_output_dir(
            cli.output_dir
                .or(settings.output_dir)
                .unwrap_or_else(|| PathBuf::from(".")),
        )
        .with_block_size(block_size);

    let mut coordinator =
        UpdateCoordinator::new(repo, source, cache, AssetDownloader::new(client))?;

    let outcome = coordinator.run(&request, log_progress).await?;
    let repo = coordinator.repository();
    match outcome {
        UpdateOutcome::NoCompatibleVersion => {
            warn!("No release of '{}' satisfies '{}'", repo, request.spec);
        }
        UpdateOutcome::UpToDate {
            current, latest, ..
        } => {
            info!(
                "'{}' is up to date: installed {}, latest compatible {}",
                repo, current, latest
            );
        }
        UpdateOutcome::NoAssetsFound { version } => {
            warn!("Release {} of '{}' has no matching assets", version, repo);
        }
        UpdateOutcome::Updated { version, assets } => {
            info!("Installed '{}' {} ({} assets)", repo, version, assets.len());
        }
    }

    Ok(())
}
