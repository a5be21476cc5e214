//! Shared fixtures for the integration tests

#![allow(dead_code)]

use mockito::{Matcher, Mock, Server};
use serde_json::json;

use release_downloader::release::download::AssetDownloader;
use release_downloader::release::github::GitHubReleaseSource;
use release_downloader::release::types::RepositoryIdentity;
use release_downloader::update::coordinator::UpdateCoordinator;
use release_downloader::version::cache::VersionCache;

pub const OWNER: &str = "owner";
pub const REPO: &str = "repo";

pub fn repo() -> RepositoryIdentity {
    RepositoryIdentity::new(OWNER, REPO).unwrap()
}

pub fn page_query(page: u32) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("page".into(), page.to_string()),
        Matcher::UrlEncoded("per_page".into(), "100".into()),
    ])
}

/// Release listing page containing `tags` in the given order, requested `hits` times
pub async fn mock_release_page(server: &mut Server, page: u32, tags: &[&str], hits: usize) -> Mock {
    let body: Vec<_> = tags.iter().map(|tag| json!({ "tag_name": tag })).collect();

    server
        .mock("GET", format!("/repos/{}/{}/releases", OWNER, REPO).as_str())
        .match_query(page_query(page))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(serde_json::Value::Array(body).to_string())
        .expect(hits)
        .create_async()
        .await
}

/// Release `tag`, looked up exactly once, whose assets are served by `server` under `/download/<name>`
pub async fn mock_release_by_tag(server: &mut Server, tag: &str, assets: &[(&str, usize)]) -> Mock {
    let url = server.url();
    let assets: Vec<_> = assets
        .iter()
        .map(|(name, size)| {
            json!({
                "name": name,
                "browser_download_url": format!("{}/download/{}", url, name),
                "size": size,
            })
        })
        .collect();

    server
        .mock(
            "GET",
            format!("/repos/{}/{}/releases/tags/{}", OWNER, REPO, tag).as_str(),
        )
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "tag_name": tag, "assets": assets }).to_string())
        .expect(1)
        .create_async()
        .await
}

/// Asset body, downloaded exactly once
pub async fn mock_asset(server: &mut Server, name: &str, body: &[u8]) -> Mock {
    server
        .mock("GET", format!("/download/{}", name).as_str())
        .with_status(200)
        .with_body(body)
        .expect(1)
        .create_async()
        .await
}

/// Coordinator wired to the mock server with a file cache under `cache_dir`
pub fn create_coordinator(
    server: &Server,
    repo: RepositoryIdentity,
    cache_dir: &std::path::Path,
) -> UpdateCoordinator<GitHubReleaseSource, VersionCache> {
    let client = reqwest::Client::new();
    let source = GitHubReleaseSource::new(&server.url(), client.clone()).unwrap();
    let cache = VersionCache::for_repository(cache_dir, &repo);

    UpdateCoordinator::new(repo, source, cache, AssetDownloader::new(client)).unwrap()
}
