use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::executor::Executor;
use crate::protocol::OutputChunk;

/// Caller-held reference to a process the executor has actually created.
///
/// The handle carries no liveness state. The executor is the only source
/// of truth for whether the pid still runs, and requests against an
/// already-terminated process are its to accept or reject.
#[derive(Clone)]
pub struct Child {
    pid: u32,
    executor: Arc<dyn Executor>,
}

impl Child {
    pub(crate) fn new(pid: u32, executor: Arc<dyn Executor>) -> Self {
        Self { pid, executor }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Injects `data` into the process stdin. Fire-and-forget beyond the
    /// transport acknowledgment; buffering is the executor's problem.
    pub async fn write(&self, data: impl Into<OutputChunk>) -> Result<()> {
        self.executor.stdin_write(self.pid, data.into()).await
    }

    /// Requests termination. Returns once the request is accepted; the
    /// actual exit arrives later as the specification's close event.
    pub async fn kill(&self) -> Result<()> {
        self.executor.kill(self.pid).await
    }
}

impl fmt::Debug for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Child").field("pid", &self.pid).finish()
    }
}
