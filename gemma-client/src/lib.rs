//! # gemma-client
//!
//! Client for a locally hosted LM Studio inference server.
//!
//! ## Core Concepts
//! - **Settings**: host, port and model, read from the environment or `.env`
//! - **LmStudioClient**: model listing and text completion over HTTP/JSON
//! - **StreamReceiver**: completions streamed as Server-Sent Events
//! - **UsageTracker**: token accounting across calls
//!
//! ```no_run
//! use gemma_client::{CompletionRequest, LmStudioClient, Settings};
//!
//! # async fn run() -> gemma_client::Result<()> {
//! let client = LmStudioClient::new(Settings::from_env()?)?;
//! let completion = client
//!     .complete(&CompletionRequest::new("The capital of France is"))
//!     .await?;
//! println!("{}", completion.text);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod stream;
pub mod types;
pub mod usage;

pub use client::LmStudioClient;
pub use config::Settings;
pub use error::{Error, ErrorKind, ErrorStatus, Result};
pub use stream::{CompletionEvents, SseEvent, SseParser, StreamReceiver};
pub use types::{
    Completion, CompletionRequest, FinishReason, GenerationStats, ModelInfo, StreamChunk, Usage,
    DEFAULT_TEMPERATURE,
};
pub use usage::UsageTracker;
