//! Error handling for remote calls and configuration.
//!
//! Provides a unified error type based on gRPC status codes. Remote
//! substrates report their failures through it, and the conversions below
//! map common underlying errors onto the same categories.
//!
//! # Error Categories
//!
//! * Connectivity (`Unavailable`, `DeadlineExceeded`)
//! * Authentication/authorization failures (`Unauthenticated`, `PermissionDenied`)
//! * Resource state (`NotFound`, `FailedPrecondition`)
//! * Caller errors (`InvalidArgument`, `Unimplemented`)
//! * Everything else (`Internal`, `Unknown`, `Cancelled`)
//!
//! # Example
//!
//! ```rust
//! use spotifice::error::{Error, ErrorKind, Result};
//!
//! fn ping(listening: bool) -> Result<()> {
//!     if !listening {
//!         return Err(Error::connection_refused("mediaserver1"));
//!     }
//!     Ok(())
//! }
//!
//! let err = ping(false).unwrap_err();
//! assert_eq!(err.kind, ErrorKind::Unavailable);
//! assert!(err.is_connection_refused());
//! ```

use std::{fmt, io};
use thiserror::Error;

/// Boxed underlying error carried by [`Error`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a remote call or of loading configuration.
#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,

    /// What actually went wrong.
    pub error: BoxError,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error categories, numbered after the gRPC status codes.
#[expect(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, Eq, Error, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u32)]
pub enum ErrorKind {
    #[error("operation was cancelled")]
    Cancelled = 1,

    #[error("unknown error")]
    Unknown = 2,

    #[error("invalid argument specified")]
    InvalidArgument = 3,

    #[error("operation timed out")]
    DeadlineExceeded = 4,

    #[error("not found")]
    NotFound = 5,

    #[error("permission denied")]
    PermissionDenied = 7,

    #[error("invalid state")]
    FailedPrecondition = 9,

    #[error("not implemented")]
    Unimplemented = 12,

    #[error("internal error")]
    Internal = 13,

    #[error("service unavailable")]
    Unavailable = 14,

    #[error("no valid authentication credentials")]
    Unauthenticated = 16,
}

impl Error {
    pub fn new(kind: ErrorKind, error: impl Into<BoxError>) -> Self {
        Self {
            kind,
            error: error.into(),
        }
    }

    /// Creates an error for a remote endpoint that refused the connection.
    ///
    /// This is the only failure the liveness probe retries on. It is an
    /// [`ErrorKind::Unavailable`] wrapping an [`io::Error`] of kind
    /// [`io::ErrorKind::ConnectionRefused`], so it stays distinguishable from
    /// other unavailability.
    pub fn connection_refused(endpoint: impl fmt::Display) -> Self {
        Self::unavailable(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!("connection refused by {endpoint}"),
        ))
    }

    /// Returns `true` if this error reports a refused connection.
    #[must_use]
    pub fn is_connection_refused(&self) -> bool {
        self.kind == ErrorKind::Unavailable
            && self
                .downcast::<io::Error>()
                .is_some_and(|e| e.kind() == io::ErrorKind::ConnectionRefused)
    }

    #[must_use]
    pub fn downcast<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.error.downcast_ref()
    }

    pub fn cancelled(error: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Cancelled, error)
    }

    pub fn deadline_exceeded(error: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::DeadlineExceeded, error)
    }

    /// Creates an error for an operation that cannot proceed in the current
    /// state, such as a renderer command before the renderer is bound.
    pub fn failed_precondition(error: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::FailedPrecondition, error)
    }

    pub fn internal(error: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Internal, error)
    }

    /// Creates an error for malformed arguments, configuration properties
    /// or remote parameters.
    pub fn invalid_argument(error: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::InvalidArgument, error)
    }

    pub fn not_found(error: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::NotFound, error)
    }

    pub fn permission_denied(error: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::PermissionDenied, error)
    }

    /// Creates an error for rejected or missing credentials.
    pub fn unauthenticated(error: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Unauthenticated, error)
    }

    pub fn unavailable(error: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Unavailable, error)
    }

    /// Creates an error for an operation a remote object does not implement.
    pub fn unimplemented(error: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Unimplemented, error)
    }

    pub fn unknown(error: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Unknown, error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.error)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::NotConnected => ErrorKind::Unavailable,
            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => ErrorKind::Cancelled,
            io::ErrorKind::TimedOut => ErrorKind::DeadlineExceeded,
            io::ErrorKind::InvalidData
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::UnexpectedEof => ErrorKind::InvalidArgument,
            _ => ErrorKind::Unknown,
        };

        Self::new(kind, err)
    }
}

/// Malformed parameters or results of a remote call.
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_argument(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::invalid_argument(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_connection_is_detected() {
        let err = Error::connection_refused("mediaserver1");
        assert_eq!(err.kind, ErrorKind::Unavailable);
        assert!(err.is_connection_refused());
        assert_eq!(
            err.to_string(),
            "service unavailable: connection refused by mediaserver1"
        );
    }

    #[test]
    fn other_unavailability_is_not_a_refusal() {
        let err = Error::unavailable("endpoint went away");
        assert!(!err.is_connection_refused());

        let err = Error::from(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert_eq!(err.kind, ErrorKind::Unavailable);
        assert!(!err.is_connection_refused());
    }

    #[test]
    fn io_refusal_converts_to_refusal() {
        let err = Error::from(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(err.is_connection_refused());
    }

    #[test]
    fn json_errors_are_invalid_arguments() {
        let err = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
        assert_eq!(Error::from(err).kind, ErrorKind::InvalidArgument);
    }
}
