//! Command dispatch.
//!
//! Command words from the command line are parsed into [`Command`] and run in
//! order against a shared [`Context`]. Each command works asset by asset; a
//! failing asset is logged and skipped.

pub mod commit;
pub mod dates;
pub mod images;
pub mod releases;
pub mod starcount;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Result, bail};
use log::{error, info};

use crate::asset::AssetStore;
use crate::provider::Provider;
use crate::reconcile::DEFAULT_RELEASE_LIMIT;
use crate::runtime::Runtime;
use crate::vcs::{GitSettings, VersionControl};

pub const COMMAND_HELP: &str = "\
COMMANDS:
starcount = Add GitHub star count to all assets that have a GitHub project (requires --githubtoken)
dates = Add creation date to all assets
releases = Update release and tag history of all GitHub assets (requires --githubtoken)
images = Convert PNG images without transparency to JPEG
commit = Commit changed files (requires --githubtoken)
help = Show this help";

/// Settings shared by every command of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Root of the asset catalog.
    pub assets_dir: PathBuf,
    pub github_token: Option<String>,
    /// Restrict processing to a single asset (file stem or `id`).
    pub asset_id: Option<String>,
    pub release_limit: usize,
    pub include_prereleases: bool,
    pub git: GitSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            github_token: None,
            asset_id: None,
            release_limit: DEFAULT_RELEASE_LIMIT,
            include_prereleases: false,
            git: GitSettings::default(),
        }
    }
}

impl Config {
    pub fn images_dir(&self) -> PathBuf {
        self.assets_dir.join("images")
    }

    /// The GitHub token, or an error naming the command that needs it.
    pub fn require_token(&self, command: Command) -> Result<&str> {
        match self.github_token.as_deref() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => bail!("The '{}' command requires a GitHub token (--githubtoken)", command),
        }
    }
}

/// One command word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StarCount,
    Dates,
    Releases,
    Images,
    Commit,
    Help,
}

impl Command {
    pub fn requires_token(self) -> bool {
        matches!(self, Command::StarCount | Command::Releases | Command::Commit)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            Command::StarCount => "starcount",
            Command::Dates => "dates",
            Command::Releases => "releases",
            Command::Images => "images",
            Command::Commit => "commit",
            Command::Help => "help",
        };
        f.write_str(word)
    }
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starcount" => Ok(Command::StarCount),
            "dates" => Ok(Command::Dates),
            "releases" => Ok(Command::Releases),
            "images" => Ok(Command::Images),
            "commit" => Ok(Command::Commit),
            "help" => Ok(Command::Help),
            _ => bail!("Unknown command {}", s),
        }
    }
}

/// Collaborators the commands run against.
pub struct Context<'a, R: Runtime> {
    pub runtime: &'a R,
    pub provider: &'a dyn Provider,
    pub vcs: &'a dyn VersionControl,
    pub config: &'a Config,
}

impl<'a, R: Runtime> Context<'a, R> {
    pub fn store(&self) -> AssetStore<'a, R> {
        AssetStore::new(self.runtime, self.config.assets_dir.clone())
    }
}

/// Parse command words. Unknown words are reported and dropped.
pub fn parse_commands(words: &[String]) -> Vec<Command> {
    words
        .iter()
        .filter_map(|word| match word.parse::<Command>() {
            Ok(command) => Some(command),
            Err(e) => {
                error!("{}", e);
                None
            }
        })
        .collect()
}

/// Fail before doing any work if a command needs a token that was not given.
pub fn check_credentials(commands: &[Command], config: &Config) -> Result<()> {
    for command in commands.iter().filter(|c| c.requires_token()) {
        config.require_token(*command)?;
    }
    Ok(())
}

/// Run the given command words in order.
pub async fn run<R: Runtime>(ctx: &Context<'_, R>, words: &[String]) -> Result<()> {
    let commands = parse_commands(words);
    let stops_at_help = commands.iter().position(|c| *c == Command::Help);
    let commands = &commands[..stops_at_help.map_or(commands.len(), |i| i + 1)];

    check_credentials(commands, ctx.config)?;

    for command in commands {
        info!("Running {}", command);
        match command {
            Command::StarCount => {
                starcount::run(ctx).await?;
            }
            Command::Dates => {
                dates::run(ctx).await?;
            }
            Command::Releases => {
                releases::run(ctx).await?;
            }
            Command::Images => {
                images::run(ctx)?;
            }
            Command::Commit => {
                commit::run(ctx).await?;
            }
            Command::Help => {
                println!("{}", COMMAND_HELP);
                break;
            }
        }
    }

    Ok(())
}
