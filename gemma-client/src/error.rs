//! Client error types
//!
//! Re-exports gemma-error and maps transport errors onto it.

pub use gemma_error::{Error, ErrorKind, ErrorStatus, Result};
use serde_json::error::Category;

// =============================================================================
// Transport error mapping
// =============================================================================

/// Map a reqwest failure onto the unified error, keeping the original as source.
///
/// A connect that times out is a connection failure, not a request timeout.
pub fn from_reqwest(err: reqwest::Error, url: &str) -> Error {
    if err.is_connect() {
        Error::connection_failed(url).set_source(err)
    } else if err.is_timeout() {
        Error::timeout(url).set_source(err)
    } else if err.is_request() {
        Error::connection_failed(url).set_source(err)
    } else if err.is_decode() || err.is_body() {
        Error::invalid_response(format!("failed to read response body: {}", err))
            .with_context("url", url)
            .set_source(err)
    } else if let Some(status) = err.status() {
        Error::http_status(status.as_u16(), err.to_string()).with_context("url", url)
    } else {
        Error::unexpected(err.to_string())
            .with_context("url", url)
            .set_source(err)
    }
}

/// A response body that is not the JSON we expected.
///
/// Well-formed JSON of the wrong shape is reported like a missing `choices`.
pub fn from_json(err: serde_json::Error, url: &str) -> Error {
    let base = match err.classify() {
        Category::Data => unexpected_format(),
        _ => Error::invalid_response(format!("response is not valid JSON: {}", err)),
    };
    base.with_context("url", url).set_source(err)
}

/// The server answered, but without any completion choices
pub fn unexpected_format() -> Error {
    Error::invalid_response("Unexpected response format from API")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_wrong_shape() {
        let err = serde_json::from_str::<Vec<String>>(r#"{"choices": "x"}"#).unwrap_err();
        let err = from_json(err, "http://localhost:1234/api/v0/completions");
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
        assert_eq!(err.message(), "Unexpected response format from API");
        assert_eq!(
            err.context_value("url"),
            Some("http://localhost:1234/api/v0/completions")
        );
    }

    #[test]
    fn test_from_json_malformed() {
        let err = serde_json::from_str::<Vec<String>>("<html>").unwrap_err();
        let err = from_json(err, "http://localhost:1234/v1/models");
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
        assert!(err.message().starts_with("response is not valid JSON"));
        assert!(err.source_ref().is_some());
    }
}
