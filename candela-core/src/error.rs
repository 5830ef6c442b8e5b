//! Error taxonomy for the engine.
//!
//! `InvalidInput` fails fast before any computation. `InsufficientData` is a
//! typed failure where a silent wrong answer would otherwise be possible.
//! Collaborator failures are wrapped in `External`, identifying the
//! collaborator and the operation that failed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("insufficient data: have {have} bars, need at least {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("{collaborator} failed during {op}: {message}")]
    External {
        collaborator: &'static str,
        op: &'static str,
        message: String,
    },
}

impl CoreError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn external(collaborator: &'static str, op: &'static str, e: impl std::fmt::Display) -> Self {
        Self::External {
            collaborator,
            op,
            message: e.to_string(),
        }
    }
}
