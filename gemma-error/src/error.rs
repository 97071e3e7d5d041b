//! The main Error type for gemma-agent

use crate::{ErrorKind, ErrorStatus};
use std::fmt;

/// The unified error type for all gemma-agent operations.
///
/// This error type provides:
/// - `kind`: What type of error occurred
/// - `message`: Human-readable description
/// - `status`: Whether the error is retryable
/// - `operation`: What operation caused the error
/// - `context`: Key-value pairs for debugging
/// - `source`: The underlying error (if any)
///
/// # Example
///
/// ```rust
/// use gemma_error::{Error, ErrorKind, ErrorStatus};
///
/// let err = Error::new(ErrorKind::HttpStatus, "HTTP 503 - model is loading")
///     .with_operation("client::complete")
///     .with_status(ErrorStatus::Temporary)
///     .with_context("model", "gemma-3-4b-it")
///     .with_context("status", "503");
///
/// assert_eq!(err.kind(), ErrorKind::HttpStatus);
/// assert!(err.status().is_retryable());
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: ErrorStatus,
    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Create a new error with the given kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let status = if kind.is_retryable() {
            ErrorStatus::Temporary
        } else {
            ErrorStatus::Permanent
        };

        Self {
            kind,
            message: message.into(),
            status,
            operation: "",
            context: Vec::new(),
            source: None,
        }
    }

    // =========================================================================
    // Getters
    // =========================================================================

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the error status
    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    /// Get the operation that caused this error
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Get the context key-value pairs
    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    /// Look up a single context value by key (first match wins)
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Get the source error (if any)
    pub fn source_ref(&self) -> Option<&anyhow::Error> {
        self.source.as_ref()
    }

    // =========================================================================
    // Builders (chainable)
    // =========================================================================

    /// Set the error status
    pub fn with_status(mut self, status: ErrorStatus) -> Self {
        self.status = status;
        self
    }

    /// Mark as temporary (retryable)
    pub fn temporary(mut self) -> Self {
        self.status = ErrorStatus::Temporary;
        self
    }

    /// Set the operation that caused this error.
    ///
    /// If an operation was already set, the previous one is moved to context
    /// as "called" to preserve the call chain.
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        if !self.operation.is_empty() {
            self.context.push(("called", self.operation.to_string()));
        }
        self.operation = operation;
        self
    }

    /// Add context to the error
    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Set the source error.
    ///
    /// # Panics (debug only)
    /// Panics in debug mode if source was already set.
    pub fn set_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "source error already set");
        self.source = Some(source.into());
        self
    }

    // =========================================================================
    // Status mutations
    // =========================================================================

    /// Mark as persistent after failed retries
    pub fn persist(mut self) -> Self {
        self.status = self.status.persist();
        self
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        self.status.is_retryable()
    }
}

// =============================================================================
// Display - compact, single-line format for logs
// =============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) at {}", self.kind, self.status, self.operation)?;

        if !self.context.is_empty() {
            write!(f, ", context {{ ")?;
            for (i, (key, value)) in self.context.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: {}", key, value)?;
            }
            write!(f, " }}")?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        Ok(())
    }
}

// =============================================================================
// Debug - verbose, multi-line format for debugging
// =============================================================================

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({}) at {}", self.kind, self.status, self.operation)?;

        if !self.message.is_empty() {
            writeln!(f)?;
            writeln!(f, "    Message: {}", self.message)?;
        }

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "    Context:")?;
            for (key, value) in &self.context {
                writeln!(f, "        {}: {}", key, value)?;
            }
        }

        if let Some(source) = &self.source {
            writeln!(f)?;
            writeln!(f, "    Source: {:?}", source)?;
        }

        Ok(())
    }
}

// =============================================================================
// std::error::Error implementation
// =============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// =============================================================================
// Convenient From implementations (be careful not to leak raw errors!)
// =============================================================================

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IoFailed,
        };
        Error::new(kind, err.to_string())
            .with_operation("io")
            .set_source(err)
    }
}

// =============================================================================
// Convenience constructors
// =============================================================================

impl Error {
    /// Create an Unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }

    /// Create an InvalidArgument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// Create a ConfigMissing error listing every missing variable
    pub fn config_missing(names: &[&str]) -> Self {
        let joined = names.join(", ");
        Self::new(
            ErrorKind::ConfigMissing,
            format!("Missing required environment variables: {}", joined),
        )
        .with_context("missing", joined)
    }

    /// Create a ConfigInvalid error for a single variable
    pub fn config_invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::ConfigInvalid,
            format!("Invalid {} - {}", name, reason.into()),
        )
        .with_context("variable", name)
    }

    /// Create a ConnectionFailed error
    pub fn connection_failed(url: impl Into<String>) -> Self {
        let url = url.into();
        Self::new(
            ErrorKind::ConnectionFailed,
            format!("Could not connect to LM Studio at {}", url),
        )
        .with_context("url", url)
    }

    /// Create a Timeout error
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, "Request timed out").with_context("url", url)
    }

    /// Create an HttpStatus error.
    ///
    /// 429 and 5xx are marked temporary; everything else is permanent.
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        let err = Self::new(
            ErrorKind::HttpStatus,
            format!("HTTP {} - {}", status, body.into()),
        )
        .with_context("status", status.to_string());

        if status == 429 || (500..600).contains(&status) {
            err.temporary()
        } else {
            err
        }
    }

    /// Create an InvalidResponse error
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidResponse, message)
    }

    /// Create a StreamFailed error
    pub fn stream_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StreamFailed, message)
    }

    /// Create a SerializationFailed error
    pub fn serialization_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SerializationFailed, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::new(ErrorKind::InvalidResponse, "no choices in response");
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
        assert_eq!(err.message(), "no choices in response");
        assert_eq!(err.status(), ErrorStatus::Permanent);
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::new(ErrorKind::Timeout, "Request timed out")
            .with_operation("client::complete")
            .with_context("model", "gemma-3-4b-it")
            .with_context("timeout_secs", "30");

        assert_eq!(err.operation(), "client::complete");
        assert_eq!(err.context().len(), 2);
        assert_eq!(err.context()[0], ("model", "gemma-3-4b-it".to_string()));
        assert_eq!(err.context_value("timeout_secs"), Some("30"));
        assert_eq!(err.context_value("absent"), None);
    }

    #[test]
    fn test_operation_chaining() {
        let err = Error::new(ErrorKind::ConnectionFailed, "refused")
            .with_operation("client::send")
            .with_operation("client::complete");

        assert_eq!(err.operation(), "client::complete");
        assert_eq!(err.context().len(), 1);
        assert_eq!(err.context()[0], ("called", "client::send".to_string()));
    }

    #[test]
    fn test_temporary_status() {
        let err = Error::new(ErrorKind::ConnectionFailed, "connection refused");
        assert!(err.is_retryable());

        let err = Error::new(ErrorKind::ConfigMissing, "missing");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_persist() {
        let err = Error::new(ErrorKind::Timeout, "slow").temporary();
        assert!(err.is_retryable());

        let err = err.persist();
        assert!(!err.is_retryable());
        assert_eq!(err.status(), ErrorStatus::Persistent);
    }

    #[test]
    fn test_display() {
        let err = Error::connection_failed("http://localhost:1234/v1/models")
            .with_operation("client::list_models");

        let display = format!("{}", err);
        assert!(display.contains("ConnectionFailed"));
        assert!(display.contains("temporary"));
        assert!(display.contains("client::list_models"));
        assert!(display.contains("url: http://localhost:1234/v1/models"));
    }

    #[test]
    fn test_config_missing_lists_all_names() {
        let err = Error::config_missing(&["LM_STUDIO_HOST", "LM_STUDIO_MODEL"]);
        assert_eq!(err.kind(), ErrorKind::ConfigMissing);
        assert_eq!(
            err.message(),
            "Missing required environment variables: LM_STUDIO_HOST, LM_STUDIO_MODEL"
        );
    }

    #[test]
    fn test_config_invalid_message() {
        let err = Error::config_invalid("LM_STUDIO_PORT", "Port must be between 1 and 65535");
        assert_eq!(
            err.message(),
            "Invalid LM_STUDIO_PORT - Port must be between 1 and 65535"
        );
        assert_eq!(err.context_value("variable"), Some("LM_STUDIO_PORT"));
    }

    #[test]
    fn test_http_status_retryability() {
        assert!(Error::http_status(503, "loading").is_retryable());
        assert!(Error::http_status(429, "slow down").is_retryable());
        assert!(!Error::http_status(404, "no such model").is_retryable());

        let err = Error::http_status(500, "boom");
        assert_eq!(err.message(), "HTTP 500 - boom");
        assert_eq!(err.context_value("status"), Some("500"));
    }

    #[test]
    fn test_set_source() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = Error::invalid_response("body is not JSON").set_source(json_err);

        assert!(err.source_ref().is_some());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no .env");
        let err: Error = io_err.into();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert_eq!(err.operation(), "io");
    }
}
