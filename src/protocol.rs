//! Wire-level shapes crossing the executor boundary.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{RelayError, Result};

/// Encoding value that switches a specification's output to raw bytes.
pub const RAW_ENCODING: &str = "raw";

/// Sender half of the inbound event feed handed to the executor at spawn
/// time. Events arrive in wire form; the routing task decodes them.
pub type EventFeed = mpsc::UnboundedSender<serde_json::Value>;

/// The two shapes an output payload can take on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Text,
    Raw,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::Text => f.write_str("text"),
            PayloadKind::Raw => f.write_str("raw"),
        }
    }
}

/// One chunk of process output, decoded text or raw bytes depending on the
/// encoding the specification was dispatched with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputChunk {
    Text(String),
    Bytes(Vec<u8>),
}

impl OutputChunk {
    pub fn kind(&self) -> PayloadKind {
        match self {
            OutputChunk::Text(_) => PayloadKind::Text,
            OutputChunk::Bytes(_) => PayloadKind::Raw,
        }
    }
}

impl From<String> for OutputChunk {
    fn from(text: String) -> Self {
        OutputChunk::Text(text)
    }
}

impl From<&str> for OutputChunk {
    fn from(text: &str) -> Self {
        OutputChunk::Text(text.to_string())
    }
}

impl From<Vec<u8>> for OutputChunk {
    fn from(bytes: Vec<u8>) -> Self {
        OutputChunk::Bytes(bytes)
    }
}

impl From<&[u8]> for OutputChunk {
    fn from(bytes: &[u8]) -> Self {
        OutputChunk::Bytes(bytes.to_vec())
    }
}

/// How a process left the system. Exactly one of `code` and `signal` is
/// populated on typical platforms, but the executor owns that detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Discriminated event delivered on a streaming feed.
///
/// The tag set is closed by contract with the executor; anything else
/// decodes as [`WireEvent::Unknown`] and is dropped by the router after
/// logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum WireEvent {
    Stdout(OutputChunk),
    Stderr(OutputChunk),
    Terminated(ExitStatus),
    Error(String),
    #[serde(other)]
    Unknown,
}

/// Everything a one-shot dispatch brings back, never partial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedOutput<O> {
    pub code: Option<i32>,
    pub signal: Option<i32>,
    pub stdout: O,
    pub stderr: O,
}

impl<O> CollectedOutput<O> {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Collected output as it crosses the boundary, before chunk validation.
pub type RawOutput = CollectedOutput<OutputChunk>;

impl RawOutput {
    /// Validates both chunks against the expected payload type.
    pub fn decode<O: OutputPayload>(self) -> Result<CollectedOutput<O>> {
        Ok(CollectedOutput {
            code: self.code,
            signal: self.signal,
            stdout: O::from_chunk(self.stdout)?,
            stderr: O::from_chunk(self.stderr)?,
        })
    }
}

/// Options attached to a specification. `env: None` inherits the parent
/// environment; `Some(map)` replaces it wholesale, so an empty map runs the
/// process with a cleared environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    pub sidecar: bool,
}

/// Frozen snapshot of a specification, exactly what the executor receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub program: String,
    pub args: Vec<String>,
    pub options: SpawnOptions,
}

/// Client-side shape of a stream payload, tied to the wire encoding.
pub trait OutputPayload: Sized + Send + Sync + 'static {
    /// Wire shape this payload type expects every chunk to have.
    const KIND: PayloadKind;

    fn from_chunk(chunk: OutputChunk) -> Result<Self>;
}

impl OutputPayload for String {
    const KIND: PayloadKind = PayloadKind::Text;

    fn from_chunk(chunk: OutputChunk) -> Result<Self> {
        match chunk {
            OutputChunk::Text(text) => Ok(text),
            other => Err(RelayError::PayloadMismatch {
                expected: PayloadKind::Text,
                actual: other.kind(),
            }),
        }
    }
}

impl OutputPayload for Vec<u8> {
    const KIND: PayloadKind = PayloadKind::Raw;

    fn from_chunk(chunk: OutputChunk) -> Result<Self> {
        match chunk {
            OutputChunk::Bytes(bytes) => Ok(bytes),
            other => Err(RelayError::PayloadMismatch {
                expected: PayloadKind::Raw,
                actual: other.kind(),
            }),
        }
    }
}
