use std::path::Path;

use anyhow::{Context as _, Result};
use chrono::DateTime;
use log::{info, warn};

use crate::asset::{AssetRecord, AssetStore};
use crate::runtime::Runtime;
use crate::vcs::VersionControl;

use super::Context;

/// Backfill `timestamp` from the commit that added each asset file.
///
/// Returns the number of records rewritten.
#[tracing::instrument(skip(ctx))]
pub async fn run<R: Runtime>(ctx: &Context<'_, R>) -> Result<usize> {
    let store = ctx.store();
    let mut updated = 0;

    for (path, mut record) in store.load_all(ctx.config.asset_id.as_deref())? {
        if record.timestamp.is_some() {
            continue;
        }

        match update_asset(&store, ctx.vcs, &path, &mut record).await {
            Ok(true) => updated += 1,
            Ok(false) => {}
            Err(e) => warn!("Failed to add creation date to {:?}: {:#}", path, e),
        }
    }

    info!("Added creation date to {} assets", updated);
    Ok(updated)
}

async fn update_asset<R: Runtime>(
    store: &AssetStore<'_, R>,
    vcs: &dyn VersionControl,
    path: &Path,
    record: &mut AssetRecord,
) -> Result<bool> {
    let Some(date) = vcs.creation_date(path).await? else {
        warn!("{:?} has no commit history yet", path);
        return Ok(false);
    };

    record.timestamp = Some(parse_git_date(&date)?);
    store.save(path, record)?;
    Ok(true)
}

/// Seconds since the epoch for a git `%aD` date ("Fri, 30 Aug 2019 13:11:58 +0200").
pub fn parse_git_date(date: &str) -> Result<f64> {
    let parsed = DateTime::parse_from_rfc2822(date.trim())
        .with_context(|| format!("Unparseable commit date '{}'", date.trim()))?;
    Ok(parsed.timestamp() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{config_for, context};
    use crate::provider::MockProvider;
    use crate::runtime::RealRuntime;
    use crate::vcs::MockVersionControl;
    use tempfile::tempdir;

    #[test]
    fn test_parse_git_date() {
        assert_eq!(
            parse_git_date("Fri, 30 Aug 2019 13:11:58 +0200\n").unwrap(),
            1567163518.0
        );
        assert_eq!(
            parse_git_date("Thu, 1 Jan 1970 00:00:10 +0000").unwrap(),
            10.0
        );
        assert!(parse_git_date("yesterday").is_err());
    }

    #[tokio::test]
    async fn test_missing_timestamps_backfilled() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("new.json"), r#"{"name": "New"}"#).unwrap();
        std::fs::write(
            dir.path().join("old.json"),
            r#"{"name": "Old", "timestamp": 42.0}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("fresh.json"), r#"{"name": "Fresh"}"#).unwrap();

        let mut vcs = MockVersionControl::new();
        vcs.expect_creation_date().times(2).returning(|path| {
            if path.ends_with("new.json") {
                Ok(Some("Thu, 1 Jan 1970 00:01:00 +0000".into()))
            } else {
                Ok(None)
            }
        });

        let runtime = RealRuntime;
        let provider = MockProvider::new();
        let config = config_for(dir.path());
        let ctx = context(&runtime, &provider, &vcs, &config);

        assert_eq!(run(&ctx).await.unwrap(), 1);

        let new: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("new.json")).unwrap())
                .unwrap();
        assert_eq!(new["timestamp"], 60.0);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("fresh.json")).unwrap(),
            r#"{"name": "Fresh"}"#
        );
    }

    #[tokio::test]
    async fn test_bad_date_skips_asset() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), r#"{"name": "A"}"#).unwrap();

        let mut vcs = MockVersionControl::new();
        vcs.expect_creation_date()
            .returning(|_| Ok(Some("not a date".into())));

        let runtime = RealRuntime;
        let provider = MockProvider::new();
        let config = config_for(dir.path());
        let ctx = context(&runtime, &provider, &vcs, &config);

        assert_eq!(run(&ctx).await.unwrap(), 0);
    }
}
