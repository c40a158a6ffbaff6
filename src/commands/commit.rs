use anyhow::Result;
use log::info;

use crate::runtime::Runtime;

use super::{Command, Context};

/// Commit everything that changed and push it.
#[tracing::instrument(skip(ctx))]
pub async fn run<R: Runtime>(ctx: &Context<'_, R>) -> Result<bool> {
    let token = ctx.config.require_token(Command::Commit)?;
    let committed = ctx.vcs.commit_and_push(token).await?;
    if !committed {
        info!("Nothing to commit");
    }
    Ok(committed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Config;
    use crate::commands::test_support::{config_for, context};
    use crate::provider::MockProvider;
    use crate::runtime::RealRuntime;
    use crate::vcs::MockVersionControl;
    use mockall::predicate::eq;
    use std::path::Path;

    #[tokio::test]
    async fn test_commit_passes_token() {
        let runtime = RealRuntime;
        let provider = MockProvider::new();
        let mut vcs = MockVersionControl::new();
        vcs.expect_commit_and_push()
            .with(eq("token"))
            .times(1)
            .returning(|_| Ok(false));
        let config = config_for(Path::new("assets"));
        let ctx = context(&runtime, &provider, &vcs, &config);

        assert!(!run(&ctx).await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_without_token_fails() {
        let runtime = RealRuntime;
        let provider = MockProvider::new();
        let vcs = MockVersionControl::new();
        let config = Config::default();
        let ctx = context(&runtime, &provider, &vcs, &config);

        assert!(run(&ctx).await.is_err());
    }
}
