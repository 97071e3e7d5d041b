//! HTTP client for a running LM Studio server
//!
//! Talks to two endpoints:
//! - `GET  /v1/models`          (OpenAI-compatible model listing)
//! - `POST /api/v0/completions` (LM Studio's native text completion)

use crate::config::Settings;
use crate::error::{self, Error, Result};
use crate::stream::{CompletionEvents, SseEvent, SseParser, StreamReceiver};
use crate::types::{
    Completion, CompletionBody, CompletionPayload, CompletionRequest, ModelInfo, ModelListBody,
    StreamChunk, Usage,
};
use crate::usage::UsageTracker;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect limit for a request timeout. Kept below the request timeout so an
/// unreachable server fails as a connection error first.
fn connect_timeout(request_timeout: Duration) -> Duration {
    CONNECT_TIMEOUT.min(request_timeout / 2)
}

/// Whole-request limit for streaming calls; a long generation easily
/// outlives the normal request timeout.
const STREAM_TIMEOUT: Duration = Duration::from_secs(300);

/// Delay before retry `n` is `n * RETRY_BACKOFF`
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Client for one LM Studio server and model
pub struct LmStudioClient {
    client: Client,
    settings: Settings,
    usage: Arc<Mutex<UsageTracker>>,
}

impl LmStudioClient {
    pub fn new(settings: Settings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout(settings.timeout))
            .build()
            .map_err(|e| {
                Error::unexpected(format!("failed to create HTTP client: {}", e))
                    .with_operation("client::new")
                    .set_source(e)
            })?;

        Ok(Self {
            client,
            settings,
            usage: Arc::default(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn models_url(&self) -> String {
        format!("{}/v1/models", self.settings.base_url())
    }

    pub fn completions_url(&self) -> String {
        format!("{}/api/v0/completions", self.settings.base_url())
    }

    /// Snapshot of the tokens used through this client so far
    pub fn usage(&self) -> UsageTracker {
        self.usage
            .lock()
            .map(|tracker| tracker.clone())
            .unwrap_or_default()
    }

    /// Check if the server answers on `/v1/models`
    pub async fn health_check(&self) -> Result<bool> {
        let url = self.models_url();
        let response = self
            .client
            .get(&url)
            .timeout(self.settings.timeout)
            .send()
            .await
            .map_err(|e| error::from_reqwest(e, &url).with_operation("client::health_check"))?;

        Ok(response.status().is_success())
    }

    /// Get the models the server currently exposes
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.models_url();
        debug!(url = %url, "listing models");

        let body: ModelListBody = self
            .with_retries("client::list_models", || self.get_json(&url))
            .await?;

        debug!(count = body.data.len(), "listed models");
        Ok(body.data)
    }

    /// Send a completion request and wait for the full response
    pub async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        validate(request).map_err(|e| e.with_operation("client::complete"))?;

        let url = self.completions_url();
        let payload = self.payload(request, false);
        debug!(
            url = %url,
            model = payload.model,
            temperature = payload.temperature,
            max_tokens = payload.max_tokens,
            "sending completion request"
        );

        let body: CompletionBody = self
            .with_retries("client::complete", || self.post_json(&url, &payload))
            .await?;

        let completion = body.into_completion().map_err(|e| {
            e.with_operation("client::complete")
                .with_context("url", url.as_str())
        })?;

        debug!(
            total_tokens = completion.usage.total_tokens,
            finish_reason = ?completion.finish_reason,
            "completion received"
        );
        record_usage(&self.usage, payload.model, &completion.usage);
        Ok(completion)
    }

    /// Send a completion request and stream the response
    ///
    /// Text arrives as it is generated, followed by exactly one
    /// [`StreamChunk::Done`] with the finish reason and usage. Retries only
    /// cover establishing the stream. Failures after the first byte arrive as
    /// [`StreamChunk::Error`].
    pub async fn stream(&self, request: &CompletionRequest) -> Result<StreamReceiver> {
        validate(request).map_err(|e| e.with_operation("client::stream"))?;

        let url = self.completions_url();
        let payload = self.payload(request, true);
        debug!(url = %url, model = payload.model, "opening completion stream");

        let response = self
            .with_retries("client::stream", || {
                let request = self
                    .client
                    .post(&url)
                    .json(&payload)
                    .timeout(STREAM_TIMEOUT);
                self.send(request, &url)
            })
            .await?;

        let model = payload.model.to_string();
        let usage = Arc::clone(&self.usage);

        let stream = async_stream::stream! {
            let mut byte_stream = response.bytes_stream();
            let mut parser = SseParser::new();
            let mut events = CompletionEvents::new();
            let mut saw_done = false;

            'read: while let Some(chunk_result) = byte_stream.next().await {
                match chunk_result {
                    Ok(bytes) => {
                        for event in parser.push_bytes(&bytes) {
                            match event {
                                SseEvent::Data(data) => {
                                    if let Some(chunk) = events.push_data(&data) {
                                        yield chunk;
                                    }
                                }
                                SseEvent::Done => {
                                    saw_done = true;
                                    break 'read;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let err = error::from_reqwest(e, &url);
                        warn!(error = %err, "completion stream interrupted");
                        yield StreamChunk::Error(err.message().to_string());
                        return;
                    }
                }
            }

            // server closed the connection without a final blank line
            if !saw_done {
                for event in parser.finish() {
                    match event {
                        SseEvent::Data(data) => {
                            if let Some(chunk) = events.push_data(&data) {
                                yield chunk;
                            }
                        }
                        SseEvent::Done => saw_done = true,
                    }
                }
            }

            record_usage(&usage, &model, &events.usage().unwrap_or_default());
            yield events.finish(saw_done);
        };

        Ok(StreamReceiver::new(stream))
    }

    fn payload<'a>(&'a self, request: &'a CompletionRequest, stream: bool) -> CompletionPayload<'a> {
        CompletionPayload {
            model: request.model.as_deref().unwrap_or(&self.settings.model),
            prompt: &request.prompt,
            temperature: request.temperature,
            max_tokens: request.max_tokens.unwrap_or(self.settings.max_tokens),
            stream,
            stop: request.stop.as_deref(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let request = self.client.get(url).timeout(self.settings.timeout);
        let response = self.send(request, url).await?;
        decode_json(response, url).await
    }

    async fn post_json<T, B>(&self, url: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.client.post(url).json(body).timeout(self.settings.timeout);
        let response = self.send(request, url).await?;
        decode_json(response, url).await
    }

    /// Send and turn any non-2xx answer into an `HttpStatus` error
    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response> {
        let response = request.send().await.map_err(|e| error::from_reqwest(e, url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::http_status(status.as_u16(), body).with_context("url", url));
        }
        Ok(response)
    }

    async fn with_retries<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_retries = self.settings.max_retries;
        let mut retries = 0u32;

        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && retries < max_retries => {
                    retries += 1;
                    warn!(operation, retry = retries, max_retries, error = %err, "retrying LM Studio request");
                    tokio::time::sleep(RETRY_BACKOFF * retries).await;
                }
                Err(err) => {
                    let err = if retries > 0 {
                        err.persist().with_context("retries", retries.to_string())
                    } else {
                        err
                    };
                    return Err(err.with_operation(operation));
                }
            }
        }
    }
}

fn validate(request: &CompletionRequest) -> Result<()> {
    if !request.temperature.is_finite() || request.temperature < 0.0 {
        return Err(Error::invalid_argument(format!(
            "temperature must be a non-negative number, got {}",
            request.temperature
        )));
    }
    Ok(())
}

async fn decode_json<T: DeserializeOwned>(response: Response, url: &str) -> Result<T> {
    let bytes = response.bytes().await.map_err(|e| error::from_reqwest(e, url))?;
    serde_json::from_slice(&bytes).map_err(|e| error::from_json(e, url))
}

fn record_usage(tracker: &Mutex<UsageTracker>, model: &str, usage: &Usage) {
    if let Ok(mut tracker) = tracker.lock() {
        tracker.track(model, usage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn client() -> LmStudioClient {
        LmStudioClient::new(Settings::new("192.168.0.204", 1234, "gemma-3-4b-it").with_max_tokens(64))
            .unwrap()
    }

    #[test]
    fn test_urls() {
        let client = client();
        assert_eq!(client.models_url(), "http://192.168.0.204:1234/v1/models");
        assert_eq!(
            client.completions_url(),
            "http://192.168.0.204:1234/api/v0/completions"
        );
    }

    #[test]
    fn test_payload_defaults_from_settings() {
        let client = client();
        let request = CompletionRequest::new("Write a haiku about programming");
        let payload = client.payload(&request, false);

        assert_eq!(payload.model, "gemma-3-4b-it");
        assert_eq!(payload.max_tokens, 64);
        assert_eq!(payload.temperature, 0.7);
        assert!(!payload.stream);
    }

    #[test]
    fn test_payload_request_overrides() {
        let client = client();
        let request = CompletionRequest::new("hi")
            .with_model("gemma-3-12b-it")
            .with_max_tokens(200)
            .with_stop(vec!["\n".into()]);
        let payload = client.payload(&request, true);

        assert_eq!(payload.model, "gemma-3-12b-it");
        assert_eq!(payload.max_tokens, 200);
        assert!(payload.stream);
        assert_eq!(payload.stop, Some(&["\n".to_string()][..]));
    }

    #[test]
    fn test_connect_timeout_below_request_timeout() {
        assert_eq!(connect_timeout(Duration::from_secs(30)), CONNECT_TIMEOUT);
        assert_eq!(connect_timeout(Duration::from_secs(1)), Duration::from_millis(500));
    }

    #[test]
    fn test_validate_rejects_bad_temperature() {
        for temperature in [-0.1, f32::NAN, f32::INFINITY] {
            let request = CompletionRequest::new("hi").with_temperature(temperature);
            let err = validate(&request).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
        assert!(validate(&CompletionRequest::new("hi").with_temperature(0.0)).is_ok());
    }
}
