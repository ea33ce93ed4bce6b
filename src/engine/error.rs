use std::fmt;

use crate::limits::{MAX_DURATION_MINUTES, MAX_INFO_LEN, MIN_DURATION_MINUTES};

/// A booking request that fails its preconditions. Nothing is mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    DurationOutOfRange(i64),
    EmptyInfo,
    InfoTooLong(usize),
    /// The booking would end past the last representable store timestamp.
    EndOutOfRange,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DurationOutOfRange(_) => write!(
                f,
                "Please reserve for at least {MIN_DURATION_MINUTES} minutes, and no more than {MAX_DURATION_MINUTES} minutes (24 hours)."
            ),
            ValidationError::EmptyInfo => f.write_str("Please provide your name or email alias."),
            ValidationError::InfoTooLong(len) => write!(
                f,
                "Your name or email alias is too long ({len} bytes, at most {MAX_INFO_LEN})."
            ),
            ValidationError::EndOutOfRange => {
                f.write_str("This resource is booked too far ahead to add another reservation.")
            }
        }
    }
}

#[derive(Debug)]
pub enum EngineError {
    NotFound(String),
    Validation(ValidationError),
    Storage(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "resource not found: {id}"),
            EngineError::Validation(e) => write!(f, "{e}"),
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ValidationError> for EngineError {
    fn from(e: ValidationError) -> Self {
        EngineError::Validation(e)
    }
}

impl From<crate::store::StoreError> for EngineError {
    fn from(e: crate::store::StoreError) -> Self {
        EngineError::Storage(e.to_string())
    }
}
