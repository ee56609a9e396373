//! Platform probes resolved through the executor.
//!
//! The process host is the executor, not this library, so anything that
//! depends on the host platform has to be probed over the boundary rather
//! than read from `cfg!` or local environment variables.

use crate::error::Result;
use crate::executor::ExecutorClient;

impl ExecutorClient {
    /// Best-effort guess whether the executor host runs Windows, made by
    /// asking powershell to echo its OS variable. Any failure along the
    /// way, transport included, counts as "not Windows".
    pub async fn likely_on_windows(&self) -> bool {
        let probe = self
            .command("powershell.exe")
            .args(["-Command", "echo $env:OS"]);
        match probe.execute().await {
            Ok(output) => output.success() && output.stdout.to_lowercase().contains("windows"),
            Err(_) => false,
        }
    }

    /// Whether `command` resolves on the executor host's PATH. Only the
    /// first space-separated token is looked up, so passing a full
    /// invocation like `"git status"` checks for `git`.
    pub async fn has_command(&self, command: &str) -> Result<bool> {
        let name = command.split(' ').next().unwrap_or(command);
        let finder = if self.likely_on_windows().await {
            "where"
        } else {
            "which"
        };
        let output = self.command(finder).arg(name).execute().await?;
        Ok(output.success())
    }
}
