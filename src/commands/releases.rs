use anyhow::{Context as _, Result, bail};
use log::{debug, info, warn};

use crate::asset::AssetRecord;
use crate::provider::{Project, Provider, ReleaseQuery};
use crate::reconcile::{TagReconciler, reconcile_releases};
use crate::runtime::Runtime;

use super::{Config, Context};

/// Refresh release and tag history of every GitHub asset.
///
/// Returns the number of records rewritten.
#[tracing::instrument(skip(ctx))]
pub async fn run<R: Runtime>(ctx: &Context<'_, R>) -> Result<usize> {
    let store = ctx.store();
    let mut updated = 0;

    for (path, mut record) in store.load_all(ctx.config.asset_id.as_deref())? {
        if !record.is_github_project() {
            continue;
        }
        info!("Updating releases for {}", record.name);

        match update_releases(ctx.provider, ctx.config, &mut record).await {
            Ok(true) => match store.save(&path, &record) {
                Ok(()) => updated += 1,
                Err(e) => warn!("{:#}", e),
            },
            Ok(false) => debug!("No release changes for {}", record.name),
            Err(e) => warn!("Skipping releases for {}: {:#}", record.name, e),
        }
    }

    info!("Updated releases for {} assets", updated);
    Ok(updated)
}

/// Reconcile one record against upstream.
///
/// The record is only touched once both listings were fetched, so a failure
/// leaves it exactly as it was. Returns true if anything changed.
pub async fn update_releases(
    provider: &dyn Provider,
    config: &Config,
    record: &mut AssetRecord,
) -> Result<bool> {
    let limit = config.release_limit;
    if limit == 0 {
        bail!("Release limit must be at least 1");
    }
    let project = Project::from_url(&record.project_url)?;

    let query = ReleaseQuery {
        stop_at_tag: record.releases.first().map(|r| r.tag.clone()),
        limit,
        include_prereleases: config.include_prereleases,
    };
    let window = provider
        .get_releases(&project.id, &query)
        .await
        .context("Failed to fetch releases")?;
    let tags = provider
        .get_tags(&project.id, limit)
        .await
        .context("Failed to fetch tags")?;
    debug!(
        "{}: {} new releases, {} tags",
        project,
        window.len(),
        tags.len()
    );

    let releases = reconcile_releases(&project, &record.releases, &window, limit);
    let release_tags = TagReconciler::new(provider, &project)
        .reconcile(&tags, &releases, &record.release_tags, limit)
        .await;

    let changed = releases != record.releases || release_tags != record.release_tags;
    record.releases = releases;
    record.release_tags = release_tags;
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{ReleaseEntry, TagEntry};
    use crate::commands::test_support::{config_for, context};
    use crate::provider::{MockProvider, RawRelease, RawTag, TagCommit};
    use crate::runtime::RealRuntime;
    use crate::vcs::MockVersionControl;
    use mockall::predicate::function;
    use tempfile::tempdir;

    fn record(releases: &[&str]) -> AssetRecord {
        AssetRecord {
            name: "Monarch".into(),
            project_url: "https://github.com/britzl/monarch".into(),
            releases: releases
                .iter()
                .map(|t| ReleaseEntry {
                    tag: t.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn raw(tag: &str, body: &str) -> RawRelease {
        RawRelease {
            tag_name: tag.into(),
            body: Some(body.into()),
            published_at: Some(format!("{}-date", tag)),
            ..Default::default()
        }
    }

    fn raw_tag(name: &str) -> RawTag {
        RawTag {
            name: name.into(),
            commit: TagCommit {
                url: format!("https://api.github.com/commits/{}", name),
            },
        }
    }

    #[tokio::test]
    async fn test_update_releases_merges_window() {
        let mut provider = MockProvider::new();
        provider
            .expect_get_releases()
            .with(
                function(|repo: &crate::provider::RepoId| repo.to_string() == "britzl/monarch"),
                function(|q: &ReleaseQuery| {
                    q.stop_at_tag.as_deref() == Some("v2") && q.limit == 50 && !q.include_prereleases
                }),
            )
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    raw("v3", "![](https://img.shields.io/badge/Defold-1.4.0-blue)\nNew"),
                    raw("v2", "Old"),
                ])
            });
        provider
            .expect_get_tags()
            .returning(|_, _| Ok(vec![raw_tag("v3"), raw_tag("v2-hotfix")]));
        provider
            .expect_get_commit_date()
            .times(1)
            .returning(|_| Ok(Some("2024-06-06T00:00:00Z".into())));

        let config = Config::default();
        let mut asset = record(&["v2", "v1"]);

        assert!(update_releases(&provider, &config, &mut asset).await.unwrap());

        let tags: Vec<_> = asset.releases.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["v3", "v2", "v1"]);
        assert_eq!(asset.releases[0].message, "New");
        assert_eq!(asset.releases[0].min_defold_version.as_deref(), Some("1.4.0"));

        assert_eq!(
            asset.release_tags,
            vec![
                TagEntry {
                    version: "v3".into(),
                    published_at: "v3-date".into(),
                    zip: "https://github.com/britzl/monarch/archive/refs/tags/v3.zip".into(),
                },
                TagEntry {
                    version: "v2-hotfix".into(),
                    published_at: "2024-06-06T00:00:00Z".into(),
                    zip: "https://github.com/britzl/monarch/archive/refs/tags/v2-hotfix.zip"
                        .into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_listing_leaves_record_untouched() {
        let mut provider = MockProvider::new();
        provider
            .expect_get_releases()
            .returning(|_, _| Ok(vec![raw("v3", "")]));
        provider
            .expect_get_tags()
            .returning(|_, _| Err(anyhow::anyhow!("Unexpected response shape")));

        let config = Config::default();
        let mut asset = record(&["v2", "v1"]);
        let before = asset.clone();

        assert!(update_releases(&provider, &config, &mut asset).await.is_err());
        assert_eq!(asset, before);
    }

    #[tokio::test]
    async fn test_zero_limit_keeps_history() {
        // no expectations: nothing may be fetched
        let provider = MockProvider::new();
        let config = Config {
            release_limit: 0,
            ..Default::default()
        };
        let mut asset = record(&["v2", "v1"]);
        let before = asset.clone();

        assert!(update_releases(&provider, &config, &mut asset).await.is_err());
        assert_eq!(asset, before);
    }

    #[tokio::test]
    async fn test_no_changes_reported() {
        let mut provider = MockProvider::new();
        provider.expect_get_releases().returning(|_, _| Ok(vec![]));
        provider.expect_get_tags().returning(|_, _| Ok(vec![]));

        let config = Config::default();
        let mut asset = record(&["v1"]);

        assert!(!update_releases(&provider, &config, &mut asset).await.unwrap());
        assert_eq!(asset.releases.len(), 1);
    }

    #[tokio::test]
    async fn test_run_skips_failing_asset_and_saves_others() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("broken.json"),
            r#"{"name": "Broken", "project_url": "https://github.com/o/broken"}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("good.json"),
            r#"{"name": "Good", "project_url": "https://github.com/o/good", "stars": 4}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("local.json"),
            r#"{"name": "Local", "project_url": "https://example.com/local"}"#,
        )
        .unwrap();

        let mut provider = MockProvider::new();
        provider.expect_get_releases().returning(|repo, _| {
            if repo.repo == "broken" {
                Err(anyhow::anyhow!("Not found"))
            } else {
                Ok(vec![raw("v1", "First")])
            }
        });
        provider.expect_get_tags().returning(|_, _| Ok(vec![]));

        let runtime = RealRuntime;
        let vcs = MockVersionControl::new();
        let mut config = config_for(dir.path());
        config.include_prereleases = true;
        let ctx = context(&runtime, &provider, &vcs, &config);

        assert_eq!(run(&ctx).await.unwrap(), 1);

        let good: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("good.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(good["releases"][0]["tag"], "v1");
        assert_eq!(good["releases"][0]["message"], "First");
        assert!(good["releases"][0].get("min_defold_version").is_none());
        assert_eq!(good["stars"], 4);
        assert!(good.get("release_tags").is_none());

        assert_eq!(
            std::fs::read_to_string(dir.path().join("broken.json")).unwrap(),
            r#"{"name": "Broken", "project_url": "https://github.com/o/broken"}"#
        );
    }
}
