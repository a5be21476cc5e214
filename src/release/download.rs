//! Chunked asset download with progress reporting
//!
//! Asset bodies are streamed straight into `<target_dir>/<asset name>`, in
//! blocks of a fixed size, calling a progress callback after every block.
//! A failed download leaves the partial file behind; the next attempt
//! overwrites it from scratch.

use std::path::{Path, PathBuf};

use bytes::BytesMut;
use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::error::DownloadError;
use crate::release::auth::AuthHeaders;
use crate::release::types::ReleaseAsset;

/// Downloads release assets over HTTP
pub struct AssetDownloader {
    client: reqwest::Client,
}

impl AssetDownloader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Download one asset into `target_dir`, returning the written file's path.
    ///
    /// `on_progress(done, total)` is called after every block of at most
    /// `block_size` bytes with the cumulative byte count and the asset's
    /// declared size, capped at that size. Reported values strictly increase
    /// and always end with `(total, total)` on success.
    pub async fn download<F>(
        &self,
        asset: &ReleaseAsset,
        auth: &AuthHeaders,
        target_dir: &Path,
        block_size: usize,
        mut on_progress: F,
    ) -> Result<PathBuf, DownloadError>
    where
        F: FnMut(u64, u64),
    {
        if block_size == 0 {
            return Err(DownloadError::InvalidBlockSize);
        }
        let file_name = plain_file_name(&asset.name)?;

        let target_dir = resolve_target_dir(target_dir).await;
        fs::create_dir_all(&target_dir).await?;
        let file_path = target_dir.join(file_name);

        info!("Start downloading asset '{}'", asset.name);

        let response = self
            .client
            .get(&asset.url)
            .headers(auth.header_map().clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::UnexpectedStatus {
                asset: asset.name.clone(),
                status,
            });
        }

        let mut file = File::create(&file_path).await?;
        let mut buffer = BytesMut::with_capacity(block_size);
        let mut downloaded: u64 = 0;
        let mut last_reported = None;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);

            while buffer.len() >= block_size {
                let block = buffer.split_to(block_size);
                file.write_all(&block).await?;
                downloaded += block.len() as u64;
                report_progress(&mut on_progress, &mut last_reported, downloaded, asset.size);
            }
        }

        if !buffer.is_empty() {
            file.write_all(&buffer).await?;
            downloaded += buffer.len() as u64;
            report_progress(&mut on_progress, &mut last_reported, downloaded, asset.size);
        }
        file.flush().await?;

        if downloaded != asset.size {
            warn!(
                "'{}' declared {} bytes but {} were downloaded",
                asset.name, asset.size, downloaded
            );
        }
        report_progress(&mut on_progress, &mut last_reported, asset.size, asset.size);

        info!("Downloaded '{}' to {:?}", asset.name, file_path);
        Ok(file_path)
    }

    /// Download `assets` one after another, in order.
    ///
    /// The first failure aborts the remaining downloads; files written
    /// before it stay on disk.
    pub async fn download_all<F>(
        &self,
        assets: &[ReleaseAsset],
        auth: &AuthHeaders,
        target_dir: &Path,
        block_size: usize,
        mut on_asset_progress: F,
    ) -> Result<Vec<PathBuf>, DownloadError>
    where
        F: FnMut(&ReleaseAsset, u64),
    {
        let names: Vec<&str> = assets.iter().map(|asset| asset.name.as_str()).collect();
        info!("Start downloading assets: {:?}", names);

        let mut paths = Vec::with_capacity(assets.len());
        for asset in assets {
            let path = self
                .download(asset, auth, target_dir, block_size, |done, _| {
                    on_asset_progress(asset, done)
                })
                .await?;
            paths.push(path);
        }

        Ok(paths)
    }
}

/// Default progress reporter: logs KiB done and percentage
pub fn log_progress(asset: &ReleaseAsset, downloaded: u64) {
    let percent = if asset.size > 0 {
        100.0 * downloaded as f64 / asset.size as f64
    } else {
        100.0
    };
    info!(
        "'{}' downloading progress: {}/{}KiB ({:.2}%)",
        asset.name,
        downloaded / 1024,
        asset.size / 1024,
        percent
    );
}

/// Report `done`, capped at `total`, unless it does not advance past the last report
fn report_progress<F>(on_progress: &mut F, last_reported: &mut Option<u64>, done: u64, total: u64)
where
    F: FnMut(u64, u64),
{
    let done = done.min(total);
    if last_reported.is_some_and(|last| last >= done) {
        return;
    }
    on_progress(done, total);
    *last_reported = Some(done);
}

/// An existing file given as target means "next to this file"
async fn resolve_target_dir(target_dir: &Path) -> PathBuf {
    match fs::metadata(target_dir).await {
        Ok(metadata) if metadata.is_file() => target_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
        _ => target_dir.to_path_buf(),
    }
}

/// Asset names come from the remote; never let them escape the target directory
fn plain_file_name(name: &str) -> Result<&str, DownloadError> {
    let is_plain = Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
        && !name.contains(['/', '\\']);
    if is_plain {
        Ok(name)
    } else {
        Err(DownloadError::InvalidAssetName(name.to_string()))
    }
}
