use std::path::Path;

use anyhow::{Context as _, Result};
use log::{info, warn};

use crate::asset::{AssetRecord, AssetStore};
use crate::provider::{Project, Provider};
use crate::runtime::Runtime;

use super::Context;

/// Refresh the star count of every GitHub asset.
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

        match update_asset(&store, ctx.provider, &path, &mut record).await {
            Ok(true) => updated += 1,
            Ok(false) => {}
            Err(e) => warn!("Failed to update star count for {}: {:#}", record.name, e),
        }
    }

    info!("Updated star count for {} assets", updated);
    Ok(updated)
}

async fn update_asset<R: Runtime>(
    store: &AssetStore<'_, R>,
    provider: &dyn Provider,
    path: &Path,
    record: &mut AssetRecord,
) -> Result<bool> {
    let project = Project::from_url(&record.project_url)?;
    info!("Getting star count for {}", record.name);

    let metadata = provider
        .get_repo_metadata(&project.id)
        .await
        .context("Failed to fetch repository metadata")?;
    info!("...{}", metadata.stars);

    if record.stars == Some(metadata.stars) {
        return Ok(false);
    }
    record.stars = Some(metadata.stars);
    store.save(path, record)?;
    Ok(true)
}
