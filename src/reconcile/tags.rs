//! Tag list reconciliation.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::asset::{ReleaseEntry, TagEntry};
use crate::provider::{Project, Provider, RawTag};

/// Builds [`TagEntry`] lists for one asset.
///
/// Commit lookups are memoized per commit URL for the lifetime of the
/// reconciler, failures included, so each commit is fetched at most once.
pub struct TagReconciler<'a> {
    provider: &'a dyn Provider,
    project: &'a Project,
    commit_dates: HashMap<String, String>,
}

impl<'a> TagReconciler<'a> {
    pub fn new(provider: &'a dyn Provider, project: &'a Project) -> Self {
        Self {
            provider,
            project,
            commit_dates: HashMap::new(),
        }
    }

    /// Turn the upstream tag listing into stored entries.
    ///
    /// Tags that name a release resolved in this run reuse its zip and date.
    /// Other tags point at the tag archive and take their date from the
    /// stored entry when it has one, else from the tagged commit.
    pub async fn reconcile(
        &mut self,
        tags: &[RawTag],
        releases: &[ReleaseEntry],
        previous: &[TagEntry],
        limit: usize,
    ) -> Vec<TagEntry> {
        let by_tag: HashMap<&str, &ReleaseEntry> =
            releases.iter().map(|r| (r.tag.as_str(), r)).collect();
        let stored: HashMap<&str, &TagEntry> =
            previous.iter().map(|t| (t.version.as_str(), t)).collect();

        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for tag in tags {
            if entries.len() >= limit {
                break;
            }
            if !seen.insert(tag.name.as_str()) {
                continue;
            }

            let entry = if let Some(release) = by_tag.get(tag.name.as_str()) {
                TagEntry {
                    version: tag.name.clone(),
                    published_at: release.published_at.clone(),
                    zip: release.zip.clone(),
                }
            } else {
                let published_at = match stored.get(tag.name.as_str()) {
                    Some(known) if !known.published_at.is_empty() => known.published_at.clone(),
                    _ => self.commit_date(&tag.commit.url).await,
                };
                TagEntry {
                    version: tag.name.clone(),
                    published_at,
                    zip: self.project.archive_url(&tag.name),
                }
            };
            entries.push(entry);
        }

        entries
    }

    async fn commit_date(&mut self, commit_url: &str) -> String {
        if commit_url.is_empty() {
            return String::new();
        }
        if let Some(date) = self.commit_dates.get(commit_url) {
            debug!("Commit date for {} already known", commit_url);
            return date.clone();
        }

        let date = match self.provider.get_commit_date(commit_url).await {
            Ok(date) => date.unwrap_or_default(),
            Err(e) => {
                warn!("Failed to fetch commit {}: {:#}", commit_url, e);
                String::new()
            }
        };
        self.commit_dates
            .insert(commit_url.to_string(), date.clone());
        date
    }
}
