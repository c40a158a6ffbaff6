//! Running external programs.

use anyhow::{Context, Result};
use log::debug;
use std::process::Command;

use super::{CommandOutput, RealRuntime};

impl RealRuntime {
    #[tracing::instrument(skip(self, args))]
    pub(crate) fn run_impl(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("Failed to execute {}", program))?;

        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        debug!("{} exited with {}", program, output.status);

        Ok(CommandOutput {
            success: output.status.success(),
            output: text,
        })
    }
}
