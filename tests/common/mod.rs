//! Common test utilities shared by the integration suites.
#![allow(dead_code)]

use procrelay::executor::{ExecutorClient, MockExecutor};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Build a client wired to a fresh scripted executor, keeping a handle to
/// the mock for scripting expectations and pushing events.
pub fn executor_pair() -> (ExecutorClient, MockExecutor) {
    let mock = MockExecutor::new();
    let client = ExecutorClient::new(Arc::new(mock.clone()));
    (client, mock)
}

/// Install the test tracing subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Shared, listener-friendly log of observed events.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn record(log: &EventLog, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

pub fn snapshot(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Poll `condition` until it holds. Feed routing happens on a spawned
/// task, so observations need to yield to the runtime.
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached within the polling window");
}
