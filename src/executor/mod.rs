pub mod mock;

pub use mock::{ExecutorCall, MockExecuteConfig, MockExecutor};

use std::sync::Arc;

use async_trait::async_trait;

use crate::command::Command;
use crate::error::Result;
use crate::protocol::{EventFeed, OutputChunk, RawOutput, SpawnRequest};

/// The message-passing boundary to the privileged executor that owns all
/// actual process creation, stdio plumbing, and signal delivery.
///
/// Every method is a single boundary round-trip. An `Err` means the call
/// itself could not be completed; process-level outcomes such as nonzero
/// exit codes are carried in the returned values and events instead.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Starts a process and streams its events into `feed`. Resolves with
    /// the executor-assigned pid once the process exists.
    async fn spawn(&self, request: SpawnRequest, feed: EventFeed) -> Result<u32>;

    /// Runs a process to completion and returns everything it produced.
    async fn execute(&self, request: SpawnRequest) -> Result<RawOutput>;

    /// Injects `data` into the stdin of a spawned process.
    async fn stdin_write(&self, pid: u32, data: OutputChunk) -> Result<()>;

    /// Requests termination of a spawned process. Actual exit is observed
    /// through the originating specification's close event, not here.
    async fn kill(&self, pid: u32) -> Result<()>;

    /// Kills by pid alone, whether or not a handle for it is held locally.
    async fn kill_pid(&self, pid: u32) -> Result<()>;

    /// Resolves a program name to a full path, if the executor finds one.
    async fn where_is_command(&self, command: &str) -> Result<Option<String>>;

    /// Opens a path or URL with the system default handler, or with the
    /// given opener program.
    async fn open(&self, path: &str, with: Option<&str>) -> Result<()>;

    /// Asks the executor to repair the PATH seen by GUI-launched hosts.
    async fn fix_path_env(&self) -> Result<()>;
}

/// Entry point tying specifications and helper calls to one executor.
#[derive(Clone)]
pub struct ExecutorClient {
    executor: Arc<dyn Executor>,
}

impl ExecutorClient {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    #[cfg(test)]
    pub fn mock() -> (Self, MockExecutor) {
        let mock = MockExecutor::new();
        let executor = Arc::new(mock.clone()) as Arc<dyn Executor>;
        (Self::new(executor), mock)
    }

    pub fn executor(&self) -> Arc<dyn Executor> {
        Arc::clone(&self.executor)
    }

    /// Starts a specification for `program` with text output.
    pub fn command(&self, program: impl Into<String>) -> Command<String> {
        Command::new(self.executor(), program)
    }

    /// Starts a specification for an executor-resolved sidecar program.
    pub fn sidecar(&self, program: impl Into<String>) -> Command<String> {
        Command::sidecar(self.executor(), program)
    }

    pub async fn where_is_command(&self, command: &str) -> Result<Option<String>> {
        self.executor.where_is_command(command).await
    }

    pub async fn open(&self, path: &str, with: Option<&str>) -> Result<()> {
        self.executor.open(path, with).await
    }

    pub async fn fix_path_env(&self) -> Result<()> {
        self.executor.fix_path_env().await
    }

    pub async fn kill_pid(&self, pid: u32) -> Result<()> {
        self.executor.kill_pid(pid).await
    }
}
