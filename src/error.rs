use thiserror::Error;

use crate::protocol::PayloadKind;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Executor transport failed during {operation}: {message}")]
    Transport { operation: String, message: String },

    #[error("Encoding {encoding:?} conflicts with {expected} output")]
    EncodingConflict {
        encoding: String,
        expected: PayloadKind,
    },

    #[error("Expected {expected} payload, executor delivered {actual}")]
    PayloadMismatch {
        expected: PayloadKind,
        actual: PayloadKind,
    },

    #[error("Mock expectation not met: {0}")]
    MockExpectation(String),
}

impl RelayError {
    /// Shorthand for transport implementations reporting a failed boundary
    /// call.
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        RelayError::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
