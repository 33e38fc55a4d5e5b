//! Status codes and call-level errors.
//!
//! - [`Code`]: Status codes reported by a call
//! - [`CallError`]: The error a call resolves to when it does not succeed

use std::fmt;
use std::str::FromStr;

/// RPC status codes, matching the canonical gRPC code set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Code {
    Ok = 0,
    Canceled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Code {
    /// Get the string representation of this code.
    ///
    /// This is the value used for the `code` label of client metrics and
    /// the `code` field of access logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::Ok => "ok",
            Code::Canceled => "canceled",
            Code::Unknown => "unknown",
            Code::InvalidArgument => "invalid_argument",
            Code::DeadlineExceeded => "deadline_exceeded",
            Code::NotFound => "not_found",
            Code::AlreadyExists => "already_exists",
            Code::PermissionDenied => "permission_denied",
            Code::ResourceExhausted => "resource_exhausted",
            Code::FailedPrecondition => "failed_precondition",
            Code::Aborted => "aborted",
            Code::OutOfRange => "out_of_range",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal",
            Code::Unavailable => "unavailable",
            Code::DataLoss => "data_loss",
            Code::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a [`Code`] from a string fails.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown status code: {0}")]
pub struct ParseCodeError(String);

impl FromStr for Code {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Code::Ok),
            "canceled" | "cancelled" => Ok(Code::Canceled),
            "unknown" => Ok(Code::Unknown),
            "invalid_argument" => Ok(Code::InvalidArgument),
            "deadline_exceeded" => Ok(Code::DeadlineExceeded),
            "not_found" => Ok(Code::NotFound),
            "already_exists" => Ok(Code::AlreadyExists),
            "permission_denied" => Ok(Code::PermissionDenied),
            "resource_exhausted" => Ok(Code::ResourceExhausted),
            "failed_precondition" => Ok(Code::FailedPrecondition),
            "aborted" => Ok(Code::Aborted),
            "out_of_range" => Ok(Code::OutOfRange),
            "unimplemented" => Ok(Code::Unimplemented),
            "internal" => Ok(Code::Internal),
            "unavailable" => Ok(Code::Unavailable),
            "data_loss" => Ok(Code::DataLoss),
            "unauthenticated" => Ok(Code::Unauthenticated),
            other => Err(ParseCodeError(other.to_string())),
        }
    }
}

/// The outcome of a call that did not succeed.
///
/// Interceptors observe these values and hand them back to the caller
/// unchanged. The only error produced inside the pipeline itself is
/// [`Code::DeadlineExceeded`], when the call deadline elapses.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// A status returned by the remote side (or by deadline enforcement).
    #[error("{code}: {}", .message.as_deref().unwrap_or("<no message>"))]
    Status { code: Code, message: Option<String> },

    /// The transport could not deliver the call.
    #[error("transport error: {0}")]
    Transport(String),
}

impl CallError {
    /// Create a new status error with a code and message.
    pub fn new<S: Into<String>>(code: Code, message: S) -> Self {
        CallError::Status {
            code,
            message: Some(message.into()),
        }
    }

    /// Create a new status error with just a code.
    pub fn from_code(code: Code) -> Self {
        CallError::Status {
            code,
            message: None,
        }
    }

    /// The error produced when a call outlives its deadline.
    pub fn deadline_exceeded() -> Self {
        Self::new(Code::DeadlineExceeded, "deadline exceeded")
    }

    /// Create an unavailable error.
    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::new(Code::Unavailable, message)
    }

    /// The error produced when the caller cancels a call in flight.
    pub fn canceled() -> Self {
        Self::new(Code::Canceled, "call canceled")
    }

    /// Get the status code.
    ///
    /// Transport failures map to [`Code::Unavailable`].
    pub fn code(&self) -> Code {
        match self {
            CallError::Status { code, .. } => *code,
            CallError::Transport(_) => Code::Unavailable,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> Option<&str> {
        match self {
            CallError::Status { message, .. } => message.as_deref(),
            CallError::Transport(msg) => Some(msg),
        }
    }
}

/// Status code of a finished call, `Code::Ok` for successes.
pub fn outcome_code<T>(result: &Result<T, CallError>) -> Code {
    match result {
        Ok(_) => Code::Ok,
        Err(err) => err.code(),
    }
}
