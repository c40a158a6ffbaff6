//! GitHub provider implementation.

use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use crate::http::HttpClient;

use super::{Provider, RawRelease, RawTag, ReleaseQuery, ReleaseWindow, RepoId, RepoMetadata};

/// Pages are capped so a misbehaving API cannot keep us looping.
const MAX_PAGES: usize = 10;
const PAGE_SIZE: usize = 100;

/// GitHub API response types (internal).
mod api {
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct RepoInfo {
        #[serde(default)]
        pub stargazers_count: u64,
    }

    #[derive(Deserialize, Debug)]
    pub struct Commit {
        pub commit: CommitDetail,
    }

    #[derive(Deserialize, Debug)]
    pub struct CommitDetail {
        pub author: Option<Signature>,
        pub committer: Option<Signature>,
    }

    #[derive(Deserialize, Debug)]
    pub struct Signature {
        pub date: Option<String>,
    }
}

/// GitHub provider implementation.
pub struct GitHubProvider {
    http_client: HttpClient,
    api_url: String,
}

impl GitHubProvider {
    /// Create from an existing HttpClient.
    pub fn from_http_client(http_client: HttpClient, api_url: &str) -> Self {
        Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    fn repo_url(&self, repo: &RepoId) -> String {
        format!("{}/repos/{}/{}", self.api_url, repo.owner, repo.repo)
    }
}

#[async_trait]
impl Provider for GitHubProvider {
    async fn get_repo_metadata(&self, repo: &RepoId) -> Result<RepoMetadata> {
        let url = self.repo_url(repo);
        debug!("Fetching repo info from {}...", url);
        let info: api::RepoInfo = self.http_client.get_json(&url).await?;
        Ok(RepoMetadata {
            stars: info.stargazers_count,
        })
    }

    async fn get_releases(&self, repo: &RepoId, query: &ReleaseQuery) -> Result<Vec<RawRelease>> {
        let url = format!("{}/releases", self.repo_url(repo));
        let per_page = PAGE_SIZE.to_string();
        let mut window = ReleaseWindow::new(query);

        for page in 1..=MAX_PAGES {
            if window.is_complete() {
                break;
            }
            debug!("Fetching releases page {} from {}...", page, url);

            let page = page.to_string();
            let parsed: Vec<RawRelease> = self
                .http_client
                .get_json_with_query(&url, &[("per_page", per_page.as_str()), ("page", page.as_str())])
                .await?;

            let len = parsed.len();
            for release in parsed {
                if !window.push(release) {
                    break;
                }
            }

            if len < PAGE_SIZE {
                break;
            }
        }

        Ok(window.into_releases())
    }

    async fn get_tags(&self, repo: &RepoId, limit: usize) -> Result<Vec<RawTag>> {
        let url = format!("{}/tags", self.repo_url(repo));
        let per_page = limit.clamp(1, PAGE_SIZE);
        let per_page_param = per_page.to_string();
        let mut tags = Vec::new();

        for page in 1..=MAX_PAGES {
            if tags.len() >= limit {
                break;
            }
            debug!("Fetching tags page {} from {}...", page, url);

            let page = page.to_string();
            let parsed: Vec<RawTag> = self
                .http_client
                .get_json_with_query(
                    &url,
                    &[("per_page", per_page_param.as_str()), ("page", page.as_str())],
                )
                .await?;

            let len = parsed.len();
            tags.extend(parsed);

            if len < per_page {
                break;
            }
        }

        tags.truncate(limit);
        Ok(tags)
    }

    async fn get_commit_date(&self, commit_url: &str) -> Result<Option<String>> {
        debug!("Fetching commit from {}...", commit_url);
        let commit: api::Commit = self.http_client.get_json(commit_url).await?;
        let date = commit
            .commit
            .author
            .and_then(|s| s.date)
            .or_else(|| commit.commit.committer.and_then(|s| s.date));
        Ok(date)
    }
}
