//! Structured error kinds for the core state manager.
//!
//! The bus layer maps these onto its own error names (spec §7); the core itself never emits
//! anything richer than a kind plus a `String` context.

use thiserror::Error;

/// Error returned by registry, inhibitor, and orchestration operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Allocation failure — the only way an `add_*` upsert can fail.
    #[error("out of resources: {0}")]
    OutOfResources(String),

    /// A caller-supplied argument failed validation (e.g. a malformed seat id).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Lookup by key found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller lacks the privilege for the requested operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The operation is refused because something else currently holds the resource
    /// (a blocking inhibitor, a busy VT).
    #[error("busy: {0}")]
    Busy(String),

    /// A syscall against sysfs/evdev/udev failed.
    #[error("i/o error: {0}")]
    IOError(String),

    /// The requested operation has no implementation on this host (e.g. hibernate unavailable).
    #[error("unsupported: {0}")]
    Unsupported(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::IOError(e.to_string())
    }
}
