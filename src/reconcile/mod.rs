//! Release history reconciliation.
//!
//! Upstream releases are fetched as a short newest-first window that ends at
//! the newest tag already on record. The window is mapped to
//! [`ReleaseEntry`] values and laid over the stored history so that nothing
//! is duplicated, older history survives, and the list stays capped.

pub mod message;
mod tags;

use std::collections::HashSet;

use crate::asset::ReleaseEntry;
use crate::provider::{Project, RawAsset, RawRelease};

pub use message::ReleaseNotes;
pub use tags::TagReconciler;

/// Default cap on stored releases and tags.
pub const DEFAULT_RELEASE_LIMIT: usize = 50;

/// Convert one upstream release into its stored form.
pub fn map_release(project: &Project, raw: &RawRelease) -> ReleaseEntry {
    let notes = ReleaseNotes::parse(raw.body.as_deref().unwrap_or_default());
    ReleaseEntry {
        zip: select_zip(project, raw),
        tag: raw.tag_name.clone(),
        message: notes.message,
        published_at: raw
            .published_at
            .clone()
            .or_else(|| raw.created_at.clone())
            .unwrap_or_default(),
        min_defold_version: notes.min_defold_version,
    }
}

/// Pick the download for a release: an attached zip, else the tag archive,
/// else whatever archive URL the API offered.
pub fn select_zip(project: &Project, raw: &RawRelease) -> String {
    if let Some(asset) = raw.assets.iter().find(|a| is_zip_asset(a)) {
        return asset.browser_download_url.clone();
    }
    if !raw.tag_name.is_empty() {
        return project.archive_url(&raw.tag_name);
    }
    raw.zipball_url.clone().unwrap_or_default()
}

fn is_zip_asset(asset: &RawAsset) -> bool {
    asset.name.to_lowercase().ends_with(".zip") || asset.content_type.contains("zip")
}

/// Lay freshly mapped releases over the stored history.
///
/// `new_items` come first in upstream order. Stored entries follow unless
/// their tag was fetched again. The previous newest entry is normally part of
/// the window (fetching stops on it inclusively); if it was not re-fetched it
/// is kept rather than lost.
pub fn merge_releases(
    previous: &[ReleaseEntry],
    new_items: Vec<ReleaseEntry>,
    limit: usize,
) -> Vec<ReleaseEntry> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(limit.min(new_items.len() + previous.len()));

    let tail = previous.iter().cloned();
    for entry in new_items.into_iter().chain(tail) {
        if merged.len() >= limit {
            break;
        }
        if seen.insert(entry.tag.clone()) {
            merged.push(entry);
        }
    }

    merged
}

/// Map the fetched window and merge it over `previous`.
pub fn reconcile_releases(
    project: &Project,
    previous: &[ReleaseEntry],
    fetched_window: &[RawRelease],
    limit: usize,
) -> Vec<ReleaseEntry> {
    let new_items = fetched_window
        .iter()
        .map(|raw| map_release(project, raw))
        .collect();
    merge_releases(previous, new_items, limit)
}
