//! Version control access.
//!
//! Everything goes through the `git` executable via [`Runtime::run`], each
//! invocation retried a fixed number of times with a fixed delay.

use std::path::Path;
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use log::{debug, info, warn};

use crate::http::redact;
use crate::runtime::{CommandOutput, Runtime};

/// Retries after the first failed attempt.
pub const SHELL_RETRIES: usize = 3;

/// Delay between shell retries.
pub const SHELL_RETRY_DELAY: Duration = Duration::from_secs(5);

pub const COMMIT_MESSAGE: &str = "Site changes [skip-ci]";

/// Who commits and where the result is pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSettings {
    pub user_name: String,
    pub user_email: String,
    /// `owner/repo` on github.com.
    pub remote: String,
    pub branch: String,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            user_name: "services@defold.se".to_string(),
            user_email: "services@defold.se".to_string(),
            remote: "defold/awesome-defold".to_string(),
            branch: "master".to_string(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Author date (RFC 2822) of the commit that added `path`, if any.
    async fn creation_date(&self, path: &Path) -> Result<Option<String>>;

    /// Stage everything, commit if anything changed, push.
    ///
    /// Returns true if a commit was created.
    async fn commit_and_push(&self, token: &str) -> Result<bool>;
}

/// [`VersionControl`] backed by the git command line.
pub struct Git<'a, R: Runtime> {
    runtime: &'a R,
    settings: GitSettings,
    retry_delay: Duration,
}

impl<'a, R: Runtime> Git<'a, R> {
    pub fn new(runtime: &'a R, settings: GitSettings) -> Self {
        Self {
            runtime,
            settings,
            retry_delay: SHELL_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Run git, retrying failures when `fail_on_error` is set.
    ///
    /// `shown` is what gets logged in place of the arguments.
    async fn git(&self, args: &[String], shown: &str, fail_on_error: bool) -> Result<CommandOutput> {
        let mut retries = SHELL_RETRIES;
        loop {
            info!("git {}", shown);
            let out = self.runtime.run("git", args)?;
            for line in out.output.lines() {
                debug!("{}", line);
            }

            if out.success || !fail_on_error {
                return Ok(out);
            }
            if retries == 0 {
                bail!("git {} failed: {}", shown, out.output.trim());
            }

            warn!("git {} failed, retrying in {:?}...", shown, self.retry_delay);
            retries -= 1;
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    async fn git_plain(&self, args: &[&str], fail_on_error: bool) -> Result<CommandOutput> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.git(&args, &args.join(" "), fail_on_error).await
    }
}

#[async_trait]
impl<'a, R: Runtime> VersionControl for Git<'a, R> {
    async fn creation_date(&self, path: &Path) -> Result<Option<String>> {
        let path = path.to_string_lossy();
        let out = self
            .git_plain(
                &[
                    "log",
                    "--diff-filter=A",
                    "--follow",
                    "--format=%aD",
                    "-1",
                    "--",
                    path.as_ref(),
                ],
                true,
            )
            .await?;

        let date = out.output.trim();
        Ok((!date.is_empty()).then(|| date.to_string()))
    }

    async fn commit_and_push(&self, token: &str) -> Result<bool> {
        let settings = &self.settings;
        self.git_plain(&["config", "--global", "user.name", settings.user_name.as_str()], true)
            .await?;
        self.git_plain(&["config", "--global", "user.email", settings.user_email.as_str()], true)
            .await?;
        self.git_plain(&["add", "-A"], true).await?;

        let unchanged = self
            .git_plain(&["diff-index", "--quiet", "HEAD"], false)
            .await?
            .success;
        if unchanged {
            info!("Nothing to commit");
        } else {
            self.git_plain(&["commit", "-m", COMMIT_MESSAGE], true).await?;
        }

        let refspec = format!("HEAD:{}", settings.branch);
        let remote_url = |secret: &str| {
            format!("https://{}@github.com/{}.git", secret, settings.remote)
        };
        let args = vec!["push".to_string(), remote_url(token), refspec.clone()];
        let shown = format!("push {} {}", remote_url(&redact(token)), refspec);
        self.git(&args, &shown, true).await?;

        Ok(!unchanged)
    }
}
