use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::Executor;
use crate::error::{RelayError, Result};
use crate::protocol::{EventFeed, OutputChunk, RawOutput, SpawnRequest, WireEvent};

/// One boundary call observed by [`MockExecutor`], in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorCall {
    Spawn(SpawnRequest),
    Execute(SpawnRequest),
    StdinWrite { pid: u32, data: OutputChunk },
    Kill { pid: u32 },
    KillPid { pid: u32 },
    WhereIsCommand { command: String },
    Open { path: String, with: Option<String> },
    FixPathEnv,
}

/// Recording stand-in for the privileged executor. Clones share state, so
/// tests keep one handle for assertions while the client drives the other.
/// Spawned feeds are captured per pid and events are pushed through
/// [`MockExecutor::push_event`] as if the executor had emitted them.
#[derive(Clone)]
pub struct MockExecutor {
    expectations: Arc<Mutex<Vec<ExecuteExpectation>>>,
    call_history: Arc<Mutex<Vec<ExecutorCall>>>,
    feeds: Arc<Mutex<HashMap<u32, EventFeed>>>,
    lookups: Arc<Mutex<HashMap<String, String>>>,
    failures: Arc<Mutex<HashMap<String, String>>>,
    next_pid: Arc<AtomicU32>,
}

struct ExecuteExpectation {
    program: String,
    #[allow(clippy::type_complexity)]
    args_matcher: Option<Box<dyn Fn(&[String]) -> bool + Send + Sync>>,
    response: RawOutput,
    times_called: usize,
    expected_times: Option<usize>,
}

pub struct MockExecuteConfig {
    executor: MockExecutor,
    expectation: ExecuteExpectation,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self {
            expectations: Arc::new(Mutex::new(Vec::new())),
            call_history: Arc::new(Mutex::new(Vec::new())),
            feeds: Arc::new(Mutex::new(HashMap::new())),
            lookups: Arc::new(Mutex::new(HashMap::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            next_pid: Arc::new(AtomicU32::new(1000)),
        }
    }

    pub fn expect_execute(&mut self, program: &str) -> MockExecuteConfig {
        MockExecuteConfig {
            executor: self.clone(),
            expectation: ExecuteExpectation {
                program: program.to_string(),
                args_matcher: None,
                response: RawOutput {
                    code: Some(0),
                    signal: None,
                    stdout: OutputChunk::Text(String::new()),
                    stderr: OutputChunk::Text(String::new()),
                },
                times_called: 0,
                expected_times: None,
            },
        }
    }

    /// Makes the next call to `operation` fail at the transport level.
    pub fn fail_next(&mut self, operation: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation.to_string(), message.to_string());
    }

    /// Canned answer for `where_is_command` lookups; unset commands
    /// resolve to `None`.
    pub fn set_command_path(&mut self, command: &str, path: &str) {
        self.lookups
            .lock()
            .unwrap()
            .insert(command.to_string(), path.to_string());
    }

    /// Serializes `event` the way the transport would and pushes it onto
    /// the feed captured for `pid`. Returns whether a live feed took it.
    pub fn push_event(&self, pid: u32, event: &WireEvent) -> bool {
        let value = serde_json::to_value(event).expect("wire events serialize");
        self.push_raw(pid, value)
    }

    /// Pushes an arbitrary feed message, for exercising protocol
    /// violations the typed surface cannot produce.
    pub fn push_raw(&self, pid: u32, value: serde_json::Value) -> bool {
        let feeds = self.feeds.lock().unwrap();
        match feeds.get(&pid) {
            Some(feed) => feed.send(value).is_ok(),
            None => false,
        }
    }

    /// Whether `program` was dispatched (spawn or execute) exactly `times`
    /// times.
    pub fn verify_called(&self, program: &str, times: usize) -> bool {
        let history = self.call_history.lock().unwrap();
        let count = history
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    ExecutorCall::Spawn(request) | ExecutorCall::Execute(request)
                        if request.program == program
                )
            })
            .count();
        count == times
    }

    pub fn call_history(&self) -> Vec<ExecutorCall> {
        self.call_history.lock().unwrap().clone()
    }

    pub fn reset(&mut self) {
        self.expectations.lock().unwrap().clear();
        self.call_history.lock().unwrap().clear();
        self.feeds.lock().unwrap().clear();
        self.lookups.lock().unwrap().clear();
        self.failures.lock().unwrap().clear();
    }

    fn record(&self, call: ExecutorCall) {
        self.call_history.lock().unwrap().push(call);
    }

    fn take_failure(&self, operation: &str) -> Result<()> {
        match self.failures.lock().unwrap().remove(operation) {
            Some(message) => Err(RelayError::transport(operation, message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn spawn(&self, request: SpawnRequest, feed: EventFeed) -> Result<u32> {
        self.record(ExecutorCall::Spawn(request));
        self.take_failure("spawn")?;

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.feeds.lock().unwrap().insert(pid, feed);
        Ok(pid)
    }

    async fn execute(&self, request: SpawnRequest) -> Result<RawOutput> {
        self.record(ExecutorCall::Execute(request.clone()));
        self.take_failure("execute")?;

        let mut expectations = self.expectations.lock().unwrap();
        for expectation in expectations.iter_mut() {
            if expectation.program != request.program {
                continue;
            }

            if let Some(ref args_matcher) = expectation.args_matcher {
                if !(args_matcher)(&request.args) {
                    continue;
                }
            }

            expectation.times_called += 1;

            if let Some(expected) = expectation.expected_times {
                if expectation.times_called > expected {
                    return Err(RelayError::MockExpectation(format!(
                        "Program '{}' executed {} times, expected {}",
                        request.program, expectation.times_called, expected
                    )));
                }
            }

            return Ok(expectation.response.clone());
        }

        Err(RelayError::MockExpectation(format!(
            "No expectation found for execute: {} {:?}",
            request.program, request.args
        )))
    }

    async fn stdin_write(&self, pid: u32, data: OutputChunk) -> Result<()> {
        self.record(ExecutorCall::StdinWrite { pid, data });
        self.take_failure("stdin_write")
    }

    async fn kill(&self, pid: u32) -> Result<()> {
        self.record(ExecutorCall::Kill { pid });
        self.take_failure("kill")
    }

    async fn kill_pid(&self, pid: u32) -> Result<()> {
        self.record(ExecutorCall::KillPid { pid });
        self.take_failure("kill_pid")
    }

    async fn where_is_command(&self, command: &str) -> Result<Option<String>> {
        self.record(ExecutorCall::WhereIsCommand {
            command: command.to_string(),
        });
        self.take_failure("where_is_command")?;
        Ok(self.lookups.lock().unwrap().get(command).cloned())
    }

    async fn open(&self, path: &str, with: Option<&str>) -> Result<()> {
        self.record(ExecutorCall::Open {
            path: path.to_string(),
            with: with.map(str::to_string),
        });
        self.take_failure("open")
    }

    async fn fix_path_env(&self) -> Result<()> {
        self.record(ExecutorCall::FixPathEnv);
        self.take_failure("fix_path_env")
    }
}

impl MockExecuteConfig {
    pub fn with_args<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.expectation.args_matcher = Some(Box::new(matcher));
        self
    }

    pub fn returns_stdout(mut self, stdout: &str) -> Self {
        self.expectation.response.stdout = OutputChunk::Text(stdout.to_string());
        self
    }

    pub fn returns_stderr(mut self, stderr: &str) -> Self {
        self.expectation.response.stderr = OutputChunk::Text(stderr.to_string());
        self
    }

    pub fn returns_raw_stdout(mut self, stdout: Vec<u8>) -> Self {
        self.expectation.response.stdout = OutputChunk::Bytes(stdout);
        self
    }

    pub fn returns_raw_stderr(mut self, stderr: Vec<u8>) -> Self {
        self.expectation.response.stderr = OutputChunk::Bytes(stderr);
        self
    }

    pub fn returns_code(mut self, code: i32) -> Self {
        self.expectation.response.code = Some(code);
        self
    }

    pub fn returns_signal(mut self, signal: i32) -> Self {
        self.expectation.response.code = None;
        self.expectation.response.signal = Some(signal);
        self
    }

    pub fn returns_success(mut self) -> Self {
        self.expectation.response.code = Some(0);
        self.expectation.response.signal = None;
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.expectation.expected_times = Some(n);
        self
    }

    pub fn finish(self) {
        self.executor
            .expectations
            .lock()
            .unwrap()
            .push(self.expectation);
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}
