//! # gemma-error
//!
//! Unified error handling for the gemma-agent workspace.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what error occurred (e.g., ConfigMissing, ConnectionFailed)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary, Persistent)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use gemma_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::ConnectionFailed, "could not reach LM Studio")
//!         .with_operation("client::complete")
//!         .with_context("url", "http://localhost:1234/api/v0/completions"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All library functions return `Result<T, gemma_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - Don't abuse `From<OtherError>` to prevent raw error leakage

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using the gemma Error
pub type Result<T> = std::result::Result<T, Error>;
