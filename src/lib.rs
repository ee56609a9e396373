//! # procrelay
//!
//! Typed client for running external processes through a privileged,
//! out-of-process executor. The executor owns process creation, stdio
//! plumbing, and signal delivery; this crate owns the ergonomic surface:
//! build a process specification, dispatch it, and fan the executor's
//! single event feed out into independently subscribable hubs.
//!
//! ## Modules
//!
//! - `events` - Generic typed publish/subscribe hub plus the event vocabulary
//! - `protocol` - Shapes that cross the executor boundary
//! - `executor` - The boundary seam, the client entry point, and the mock
//! - `command` - Process specifications and their two dispatch modes
//! - `child` - Handles to live processes (write / kill)
//! - `script` - Shell-script conveniences
//! - `platform` - Platform probes resolved through the executor
//! - `error` - Crate error taxonomy

pub mod child;
pub mod command;
pub mod error;
pub mod events;
pub mod executor;
pub mod platform;
pub mod protocol;
pub mod script;

pub use child::Child;
pub use command::Command;
pub use error::{RelayError, Result};
pub use events::{
    CloseEvent, CommandEvents, DataEvent, ErrorEvent, Event, EventHub, EventOf, EventSet,
    Listener, OutputEvents,
};
pub use executor::{Executor, ExecutorClient, MockExecutor};
pub use protocol::{
    CollectedOutput, EventFeed, ExitStatus, OutputChunk, OutputPayload, PayloadKind, RawOutput,
    SpawnOptions, SpawnRequest, WireEvent, RAW_ENCODING,
};
