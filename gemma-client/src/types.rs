//! Request and response types for the LM Studio API
//!
//! Public types are what callers build and receive. The `*Body` types mirror
//! the JSON on the wire and stay crate-private; every field the server may
//! omit is optional so that a sparse response still decodes.

use crate::error::{self, Result};
use serde::{Deserialize, Serialize};

/// Sampling temperature used when a request does not set one
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

// ============================================================================
// Requests
// ============================================================================

/// A text completion request (`POST /api/v0/completions`)
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    /// Overrides the configured model
    pub model: Option<String>,
    pub temperature: f32,
    /// Overrides the configured default length
    pub max_tokens: Option<usize>,
    pub stop: Option<Vec<String>>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            stop: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }
}

// ============================================================================
// Responses
// ============================================================================

/// A finished completion
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub id: Option<String>,
    pub model: Option<String>,
    pub text: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    /// Generation statistics, reported by the `/api/v0` endpoints only
    pub stats: Option<GenerationStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Unknown,
}

impl FinishReason {
    pub fn from_wire(reason: Option<&str>) -> Self {
        match reason {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            _ => FinishReason::Unknown,
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Timing information LM Studio attaches to `/api/v0` responses
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GenerationStats {
    #[serde(default)]
    pub tokens_per_second: Option<f64>,
    #[serde(default)]
    pub time_to_first_token: Option<f64>,
    #[serde(default)]
    pub generation_time: Option<f64>,
}

/// An entry of `GET /v1/models`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub owned_by: Option<String>,
}

/// A streaming chunk from the server
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Text content delta
    Text(String),
    /// Stream finished
    Done {
        finish_reason: FinishReason,
        usage: Option<Usage>,
    },
    /// Error occurred
    Error(String),
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct CompletionPayload<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub temperature: f32,
    pub max_tokens: usize,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<&'a [String]>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionBody {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Option<Vec<ChoiceBody>>,
    #[serde(default)]
    usage: Option<UsageBody>,
    #[serde(default)]
    stats: Option<GenerationStats>,
}

#[derive(Debug, Deserialize)]
struct ChoiceBody {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UsageBody {
    #[serde(default)]
    prompt_tokens: Option<usize>,
    #[serde(default)]
    completion_tokens: Option<usize>,
    #[serde(default)]
    total_tokens: Option<usize>,
}

impl From<UsageBody> for Usage {
    fn from(body: UsageBody) -> Self {
        Self {
            prompt_tokens: body.prompt_tokens.unwrap_or(0),
            completion_tokens: body.completion_tokens.unwrap_or(0),
            total_tokens: body.total_tokens.unwrap_or(0),
        }
    }
}

impl CompletionBody {
    /// Only the first choice is used. No choices at all is an error.
    pub(crate) fn into_completion(self) -> Result<Completion> {
        let choice = self
            .choices
            .and_then(|choices| choices.into_iter().next())
            .ok_or_else(error::unexpected_format)?;

        Ok(Completion {
            id: self.id,
            model: self.model,
            text: choice.text.unwrap_or_default(),
            finish_reason: FinishReason::from_wire(choice.finish_reason.as_deref()),
            usage: self.usage.map(Usage::from).unwrap_or_default(),
            stats: self.stats,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelListBody {
    #[serde(default)]
    pub data: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamEventBody {
    #[serde(default)]
    choices: Vec<ChoiceBody>,
    #[serde(default)]
    usage: Option<UsageBody>,
}

/// What one streamed event contributes to the completion
#[derive(Debug, Default, PartialEq)]
pub(crate) struct StreamDelta {
    pub text: Option<String>,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<Usage>,
}

impl StreamEventBody {
    /// Usage may arrive on its own in an event with no choices.
    pub(crate) fn into_delta(self) -> StreamDelta {
        let usage = self.usage.map(Usage::from);
        match self.choices.into_iter().next() {
            Some(choice) => StreamDelta {
                text: choice.text.filter(|t| !t.is_empty()),
                finish_reason: choice
                    .finish_reason
                    .map(|reason| FinishReason::from_wire(Some(&reason))),
                usage,
            },
            None => StreamDelta {
                usage,
                ..StreamDelta::default()
            },
        }
    }
}
