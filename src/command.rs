//! Process specifications and their two dispatch modes.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::child::Child;
use crate::error::{RelayError, Result};
use crate::events::{CloseEvent, CommandEvents, DataEvent, ErrorEvent, EventHub, OutputEvents};
use crate::executor::Executor;
use crate::protocol::{
    CollectedOutput, OutputChunk, OutputPayload, PayloadKind, SpawnOptions, SpawnRequest,
    WireEvent, RAW_ENCODING,
};

/// A process specification: program, arguments, options, and the three
/// event hubs fed by its streaming dispatches.
///
/// The output type parameter fixes how stream payloads decode: `String`
/// for text (the default) or `Vec<u8>` for raw bytes. Both dispatch modes
/// snapshot the specification first, so nothing already sent to the
/// executor can be mutated afterwards.
pub struct Command<O: OutputPayload = String> {
    executor: Arc<dyn Executor>,
    program: String,
    args: Vec<String>,
    options: SpawnOptions,
    events: Arc<EventHub<CommandEvents>>,
    stdout: Arc<EventHub<OutputEvents<O>>>,
    stderr: Arc<EventHub<OutputEvents<O>>>,
}

impl<O: OutputPayload> Command<O> {
    pub fn new(executor: Arc<dyn Executor>, program: impl Into<String>) -> Self {
        Self {
            executor,
            program: program.into(),
            args: Vec::new(),
            options: SpawnOptions::default(),
            events: Arc::new(EventHub::new()),
            stdout: Arc::new(EventHub::new()),
            stderr: Arc::new(EventHub::new()),
        }
    }

    /// A specification for an executor-resolved sidecar program. What
    /// "sidecar" maps to is decided entirely on the executor's side.
    pub fn sidecar(executor: Arc<dyn Executor>, program: impl Into<String>) -> Self {
        let mut command = Self::new(executor, program);
        command.options.sidecar = true;
        command
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_string()));
        self
    }

    pub fn current_dir(mut self, dir: &str) -> Self {
        self.options.cwd = Some(dir.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.options
            .env
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let env = self.options.env.get_or_insert_with(HashMap::new);
        for (key, value) in vars {
            env.insert(key.as_ref().to_string(), value.as_ref().to_string());
        }
        self
    }

    /// Runs the process with exactly the environment built so far instead
    /// of the inherited one; on its own it requests an empty environment.
    pub fn clear_env(mut self) -> Self {
        self.options.env = Some(HashMap::new());
        self
    }

    /// How the executor decodes output before sending it back. Must agree
    /// with the output type parameter; dispatch rejects contradictions.
    pub fn encoding(mut self, encoding: &str) -> Self {
        self.options.encoding = Some(encoding.to_string());
        self
    }

    /// Lifecycle hub carrying this specification's close and error events.
    pub fn events(&self) -> &EventHub<CommandEvents> {
        &self.events
    }

    /// Data hub for the stdout stream.
    pub fn stdout(&self) -> &EventHub<OutputEvents<O>> {
        &self.stdout
    }

    /// Data hub for the stderr stream.
    pub fn stderr(&self) -> &EventHub<OutputEvents<O>> {
        &self.stderr
    }

    /// Streaming dispatch. Opens a fresh inbound feed, wires the routing
    /// task, sends the frozen specification, and resolves with the handle
    /// once the executor acknowledges the pid. The feed keeps delivering
    /// into the hubs regardless of what happens to the returned handle.
    pub async fn spawn(&self) -> Result<Child> {
        let request = self.request()?;
        tracing::debug!(
            "Spawning through executor: {} {}",
            request.program,
            request.args.join(" ")
        );

        let (feed, mut messages) = mpsc::unbounded_channel::<Value>();
        let events = Arc::clone(&self.events);
        let stdout = Arc::clone(&self.stdout);
        let stderr = Arc::clone(&self.stderr);
        tokio::spawn(async move {
            while let Some(message) = messages.recv().await {
                route_message::<O>(message, &events, &stdout, &stderr);
            }
        });

        let pid = self.executor.spawn(request, feed).await?;
        Ok(Child::new(pid, Arc::clone(&self.executor)))
    }

    /// One-shot dispatch. Suspends until the executor reports completion
    /// and returns the full collected output. A nonzero exit code is a
    /// normal outcome here, not an error.
    pub async fn execute(&self) -> Result<CollectedOutput<O>> {
        let request = self.request()?;
        tracing::debug!(
            "Executing through executor: {} {}",
            request.program,
            request.args.join(" ")
        );

        let raw = self.executor.execute(request).await?;
        raw.decode::<O>()
    }

    pub(crate) fn request(&self) -> Result<SpawnRequest> {
        let mut options = self.options.clone();
        options.encoding = self.resolved_encoding()?;
        Ok(SpawnRequest {
            program: self.program.clone(),
            args: self.args.clone(),
            options,
        })
    }

    // The type parameter is the source of truth for the wire encoding; a
    // declared option may only restate or refine it.
    fn resolved_encoding(&self) -> Result<Option<String>> {
        let declared = self.options.encoding.as_deref();
        match O::KIND {
            PayloadKind::Raw => match declared {
                None | Some(RAW_ENCODING) => Ok(Some(RAW_ENCODING.to_string())),
                Some(other) => Err(RelayError::EncodingConflict {
                    encoding: other.to_string(),
                    expected: PayloadKind::Raw,
                }),
            },
            PayloadKind::Text => match declared {
                Some(RAW_ENCODING) => Err(RelayError::EncodingConflict {
                    encoding: RAW_ENCODING.to_string(),
                    expected: PayloadKind::Text,
                }),
                declared => Ok(declared.map(str::to_string)),
            },
        }
    }
}

/// Routes one feed message to the hub its tag names, and nowhere else.
/// Malformed messages and unrecognized tags are boundary violations: they
/// are logged and dropped without disturbing the rest of the stream.
fn route_message<O: OutputPayload>(
    message: Value,
    events: &EventHub<CommandEvents>,
    stdout: &EventHub<OutputEvents<O>>,
    stderr: &EventHub<OutputEvents<O>>,
) {
    let tag = message
        .get("event")
        .and_then(Value::as_str)
        .map(str::to_string);

    let event = match serde_json::from_value::<WireEvent>(message) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!("Discarding malformed feed message: {}", err);
            return;
        }
    };

    match event {
        WireEvent::Stdout(chunk) => deliver::<O>(chunk, stdout, "stdout", events),
        WireEvent::Stderr(chunk) => deliver::<O>(chunk, stderr, "stderr", events),
        WireEvent::Terminated(status) => {
            events.emit::<CloseEvent>(&status);
        }
        WireEvent::Error(reason) => {
            events.emit::<ErrorEvent>(&reason);
        }
        WireEvent::Unknown => {
            tracing::warn!(
                "Discarding feed event with unrecognized tag {:?}",
                tag.as_deref().unwrap_or("<missing>")
            );
        }
    }
}

fn deliver<O: OutputPayload>(
    chunk: OutputChunk,
    stream_hub: &EventHub<OutputEvents<O>>,
    stream: &str,
    events: &EventHub<CommandEvents>,
) {
    match O::from_chunk(chunk) {
        Ok(payload) => {
            stream_hub.emit::<DataEvent<O>>(&payload);
        }
        Err(err) => {
            tracing::error!("Dropping {} payload: {}", stream, err);
            events.emit::<ErrorEvent>(&err.to_string());
        }
    }
}
