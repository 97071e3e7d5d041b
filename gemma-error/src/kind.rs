//! Error kinds for gemma-agent operations

use std::fmt;

/// The kind of error that occurred.
///
/// Callers match on `ErrorKind` to decide how to report a failure. The CLI
/// prints a hint for missing configuration and for connection failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// Invalid argument passed to function
    InvalidArgument,

    // =========================================================================
    // Configuration errors
    // =========================================================================
    /// One or more required settings are not present
    ConfigMissing,

    /// A setting is present but cannot be used (bad port, non-numeric value)
    ConfigInvalid,

    // =========================================================================
    // Transport errors
    // =========================================================================
    /// TCP/HTTP connection to the inference server failed
    ConnectionFailed,

    /// The server did not answer within the configured timeout
    Timeout,

    /// The server answered with a non-success HTTP status
    HttpStatus,

    // =========================================================================
    // Response errors
    // =========================================================================
    /// The response body does not have the expected shape
    InvalidResponse,

    /// A streaming response broke off or could not be decoded
    StreamFailed,

    /// Serialization/deserialization failed
    SerializationFailed,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::InvalidArgument => "InvalidArgument",

            // Configuration
            ErrorKind::ConfigMissing => "ConfigMissing",
            ErrorKind::ConfigInvalid => "ConfigInvalid",

            // Transport
            ErrorKind::ConnectionFailed => "ConnectionFailed",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::HttpStatus => "HttpStatus",

            // Response
            ErrorKind::InvalidResponse => "InvalidResponse",
            ErrorKind::StreamFailed => "StreamFailed",
            ErrorKind::SerializationFailed => "SerializationFailed",

            // IO
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
        }
    }

    /// Check if this error kind is retryable by default
    ///
    /// `HttpStatus` is not retryable by default; whether a given status code
    /// is worth retrying is decided where the status is known.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::ConnectionFailed | ErrorKind::Timeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
