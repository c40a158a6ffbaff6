//! Provider abstraction for the source-hosting API.
//!
//! Commands talk to the hosting service only through [`Provider`], so the
//! reconciliation logic can be exercised against a mock.

mod github;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

pub use github::GitHubProvider;

/// Repository identifier (owner/repo format).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepoId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            anyhow::bail!("Invalid repository format. Expected 'owner/repo'.")
        } else {
            Ok(RepoId {
                owner: parts[0].to_string(),
                repo: parts[1].to_string(),
            })
        }
    }
}

/// A repository together with the web host it was referenced on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub host: String,
    pub id: RepoId,
}

impl Project {
    /// Parse a project page URL such as `https://github.com/owner/repo`.
    ///
    /// Extra path segments (`/tree/master`, ...) and a `.git` suffix are ignored.
    pub fn from_url(project_url: &str) -> Result<Self> {
        let url = Url::parse(project_url.trim())
            .with_context(|| format!("Invalid project URL '{}'", project_url))?;
        let host = url
            .host_str()
            .with_context(|| format!("Project URL '{}' has no host", project_url))?
            .to_string();

        let mut segments = url
            .path_segments()
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty());
        let (Some(owner), Some(repo)) = (segments.next(), segments.next()) else {
            anyhow::bail!("Project URL '{}' does not name owner/repo", project_url);
        };
        let repo = repo.strip_suffix(".git").unwrap_or(repo);

        Ok(Project {
            host,
            id: RepoId {
                owner: owner.to_string(),
                repo: repo.to_string(),
            },
        })
    }

    /// Source archive URL of a tag on the web host.
    pub fn archive_url(&self, tag: &str) -> String {
        format!(
            "https://{}/{}/{}/archive/refs/tags/{}.zip",
            self.host, self.id.owner, self.id.repo, tag
        )
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.id)
    }
}

/// Repository metadata from the source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoMetadata {
    pub stars: u64,
}

/// A file attached to a release.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct RawAsset {
    pub name: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub browser_download_url: String,
}

/// A release as listed by the hosting API.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct RawRelease {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub zipball_url: Option<String>,
    #[serde(default)]
    pub assets: Vec<RawAsset>,
}

/// A git tag as listed by the hosting API.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct RawTag {
    pub name: String,
    pub commit: TagCommit,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct TagCommit {
    #[serde(default)]
    pub url: String,
}

/// Which slice of the upstream release list to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseQuery {
    /// Newest tag already on record; fetching stops once it is reached.
    pub stop_at_tag: Option<String>,
    pub limit: usize,
    pub include_prereleases: bool,
}

/// Accumulates the release window from newest-first upstream pages.
#[derive(Debug)]
pub struct ReleaseWindow<'q> {
    query: &'q ReleaseQuery,
    releases: Vec<RawRelease>,
    complete: bool,
}

impl<'q> ReleaseWindow<'q> {
    pub fn new(query: &'q ReleaseQuery) -> Self {
        Self {
            query,
            releases: Vec::new(),
            complete: query.limit == 0,
        }
    }

    /// Offer the next upstream release. Returns false once the window is complete.
    pub fn push(&mut self, release: RawRelease) -> bool {
        if self.complete {
            return false;
        }
        let reached_known = self.query.stop_at_tag.as_deref() == Some(release.tag_name.as_str());
        let skipped = release.draft || (release.prerelease && !self.query.include_prereleases);
        if skipped {
            // a filtered release can still be the known newest one
            self.complete = reached_known;
            return !self.complete;
        }

        self.releases.push(release);
        self.complete = reached_known || self.releases.len() >= self.query.limit;
        !self.complete
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn into_releases(self) -> Vec<RawRelease> {
        self.releases
    }
}

/// Trait for source-hosting providers.
///
/// This trait abstracts the operations the maintenance commands need from
/// the hosting service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Fetch repository metadata.
    async fn get_repo_metadata(&self, repo: &RepoId) -> Result<RepoMetadata>;

    /// Fetch the newest-first release window described by `query`.
    async fn get_releases(&self, repo: &RepoId, query: &ReleaseQuery) -> Result<Vec<RawRelease>>;

    /// Fetch up to `limit` tags, newest first.
    async fn get_tags(&self, repo: &RepoId, limit: usize) -> Result<Vec<RawTag>>;

    /// Fetch the author date (falling back to committer date) of a commit by API URL.
    async fn get_commit_date(&self, commit_url: &str) -> Result<Option<String>>;
}
