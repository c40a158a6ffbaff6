use anyhow::Result;
use assetbot::commands::{self, COMMAND_HELP, Config, Context};
use assetbot::http::HttpClient;
use assetbot::provider::GitHubProvider;
use assetbot::reconcile::DEFAULT_RELEASE_LIMIT;
use assetbot::vcs::{Git, GitSettings};
use clap::Parser;
use clap::builder::RangedU64ValueParser;
use std::path::PathBuf;

const DEFAULT_API_URL: &str = "https://api.github.com";

/// assetbot - asset catalog maintenance
///
/// Enriches the JSON asset records of the catalog with data from GitHub
/// (star counts, releases and tags), normalizes images, backfills creation
/// dates from git history and commits the result.
///
/// Examples:
///   assetbot --githubtoken TOKEN starcount releases commit
///   assetbot --assetid monarch releases
#[derive(Parser, Debug)]
#[command(author, version = env!("ASSETBOT_VERSION"), about, after_help = COMMAND_HELP)]
struct Cli {
    /// Commands to run, in order
    #[arg(value_name = "COMMAND", required = true, num_args = 1..)]
    pub commands: Vec<String>,

    /// GitHub access token
    #[arg(long = "githubtoken", env = "GITHUB_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Only process the asset with this id
    #[arg(long = "assetid", value_name = "ID")]
    pub asset_id: Option<String>,

    /// Maximum number of releases and tags kept per asset
    #[arg(
        long = "limit",
        value_name = "N",
        default_value_t = DEFAULT_RELEASE_LIMIT,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub limit: usize,

    /// Also collect releases marked as prerelease
    #[arg(long = "include-prereleases")]
    pub include_prereleases: bool,

    /// Asset catalog directory
    #[arg(long = "assets", value_name = "DIR", default_value = "assets")]
    pub assets: PathBuf,

    /// GitHub API URL (defaults to https://api.github.com)
    #[arg(long = "api-url", value_name = "URL")]
    pub api_url: Option<String>,

    /// Repository the commit command pushes to
    #[arg(long = "remote", value_name = "OWNER/REPO", default_value = "defold/awesome-defold")]
    pub remote: String,

    /// Branch the commit command pushes to
    #[arg(long = "branch", value_name = "BRANCH", default_value = "master")]
    pub branch: String,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            assets_dir: self.assets.clone(),
            github_token: self.github_token.clone(),
            asset_id: self.asset_id.clone(),
            release_limit: self.limit,
            include_prereleases: self.include_prereleases,
            git: GitSettings {
                remote: self.remote.clone(),
                branch: self.branch.clone(),
                ..Default::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = cli.config();

    let http_client = HttpClient::with_token(config.github_token.as_deref())?;
    let provider = GitHubProvider::from_http_client(
        http_client,
        cli.api_url.as_deref().unwrap_or(DEFAULT_API_URL),
    );
    let runtime = assetbot::runtime::RealRuntime;
    let git = Git::new(&runtime, config.git.clone());

    let ctx = Context {
        runtime: &runtime,
        provider: &provider,
        vcs: &git,
        config: &config,
    };
    commands::run(&ctx, &cli.commands).await
}
