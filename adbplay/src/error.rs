//! Error types for adbplay
//!
//! Every variant is fatal for a playback run: errors propagate up to `main`,
//! which logs nothing further and exits with a failure status.

use crate::subsystem::{Permille, PrefetchStatus, ResultCode};
use thiserror::Error;

/// Main error type for adbplay
#[derive(Error, Debug)]
pub enum Error {
    /// A subsystem call returned a non-success status
    #[error("Failure in {operation}(). Error code: {code}")]
    SubsystemCall {
        operation: String,
        code: ResultCode,
    },

    /// Prefetch ran dry before the content was fully read
    #[error("Unrecoverable buffering condition: fillLevel={fill_level}, status={status}")]
    Underflow {
        fill_level: Permille,
        status: PrefetchStatus,
    },

    /// Interface identifier and required-flag lists differ in length
    #[error("Interface request mismatch: {ids} identifiers but {required} required flags")]
    InterfaceRequestMismatch { ids: usize, required: usize },

    /// Resource used outside its lifecycle (not realized, already destroyed, ...)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The subsystem status behind this error, if it came from a call
    pub fn result_code(&self) -> Option<ResultCode> {
        match self {
            Error::SubsystemCall { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Convenience Result type using adbplay Error
pub type Result<T> = std::result::Result<T, Error>;
