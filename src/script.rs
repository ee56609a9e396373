//! Shell-script conveniences over the specification builder.

use crate::command::Command;
use crate::error::Result;
use crate::executor::ExecutorClient;
use crate::protocol::CollectedOutput;

impl ExecutorClient {
    /// `script` run through `bash -c`.
    pub fn bash_script(&self, script: &str) -> Command<String> {
        self.command("bash").arg("-c").arg(script)
    }

    /// `script` run through `powershell -Command`.
    pub fn powershell_script(&self, script: &str) -> Command<String> {
        self.command("powershell").arg("-Command").arg(script)
    }

    /// `script` run through `osascript -e`.
    pub fn apple_script(&self, script: &str) -> Command<String> {
        self.command("osascript").arg("-e").arg(script)
    }

    pub async fn execute_bash_script(&self, script: &str) -> Result<CollectedOutput<String>> {
        self.bash_script(script).execute().await
    }

    pub async fn execute_powershell_script(&self, script: &str) -> Result<CollectedOutput<String>> {
        self.powershell_script(script).execute().await
    }

    pub async fn execute_apple_script(&self, script: &str) -> Result<CollectedOutput<String>> {
        self.apple_script(script).execute().await
    }
}
