//! Streaming completions
//!
//! LM Studio streams completions as Server-Sent Events: `data: {json}` lines
//! separated by blank lines, closed by `data: [DONE]`. [`SseParser`] turns raw
//! body bytes into events; [`StreamReceiver`] hands the decoded
//! [`StreamChunk`]s to the caller.

use crate::error::{Error, Result};
use crate::types::{FinishReason, StreamChunk, StreamEventBody, Usage};
use futures_core::Stream;
use futures_util::StreamExt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;

/// Receiver for streaming responses
pub struct StreamReceiver {
    inner: Pin<Box<dyn Stream<Item = StreamChunk> + Send>>,
}

impl StreamReceiver {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = StreamChunk> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Next chunk, or `None` once the server closed the stream
    pub async fn next_chunk(&mut self) -> Option<StreamChunk> {
        self.inner.next().await
    }

    /// Collect all text chunks into a single string
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(chunk) = self.next_chunk().await {
            match chunk {
                StreamChunk::Text(t) => text.push_str(&t),
                StreamChunk::Done { .. } => break,
                StreamChunk::Error(e) => {
                    return Err(Error::stream_failed(e).with_operation("stream::collect_text"))
                }
            }
        }
        Ok(text)
    }
}

impl Stream for StreamReceiver {
    type Item = StreamChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// One complete SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    Done,
}

/// Incremental Server-Sent Events parser.
///
/// Network chunks may split an event, a line, or even a UTF-8 sequence; the
/// parser buffers until an event is complete.
#[derive(Debug, Default)]
pub struct SseParser {
    pending: Vec<u8>,
    buffer: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw body bytes, returning every event completed by them
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(bytes);

        let valid = match std::str::from_utf8(&self.pending) {
            Ok(s) => s.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => {
                // Invalid, not merely truncated. Decode lossily and move on.
                let text = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                return self.push_str(&text);
            }
        };

        let tail = self.pending.split_off(valid);
        let head = std::mem::replace(&mut self.pending, tail);
        // `head` is valid UTF-8 up to `valid` by construction
        let text = String::from_utf8_lossy(&head).into_owned();
        self.push_str(&text)
    }

    /// Feed already-decoded text
    pub fn push_str(&mut self, text: &str) -> Vec<SseEvent> {
        self.buffer.push_str(text);
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let raw: String = self.buffer.drain(..pos + 2).collect();
            if let Some(event) = parse_event(&raw) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing event the server did not terminate with a blank line
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let raw = std::mem::take(&mut self.buffer);
        self.pending.clear();
        parse_event(&raw).into_iter().collect()
    }
}

fn parse_event(raw: &str) -> Option<SseEvent> {
    let data: Vec<&str> = raw
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();

    if data.is_empty() {
        return None;
    }

    let data = data.join("\n");
    if data.trim() == "[DONE]" {
        Some(SseEvent::Done)
    } else {
        Some(SseEvent::Data(data))
    }
}

/// Folds the `data:` payloads of one completion stream into chunks.
///
/// Text passes straight through. The finish reason and usage are held until
/// the stream ends, because servers may send the usage in a separate event
/// after the finish reason.
#[derive(Debug, Default)]
pub struct CompletionEvents {
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
}

impl CompletionEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text carried by one payload. Payloads that are not completion JSON
    /// are skipped.
    pub fn push_data(&mut self, data: &str) -> Option<StreamChunk> {
        let delta = match serde_json::from_str::<StreamEventBody>(data) {
            Ok(body) => body.into_delta(),
            Err(e) => {
                debug!(error = %e, "skipping undecodable stream event");
                return None;
            }
        };

        if delta.finish_reason.is_some() {
            self.finish_reason = delta.finish_reason;
        }
        if delta.usage.is_some() {
            self.usage = delta.usage;
        }
        delta.text.map(StreamChunk::Text)
    }

    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    /// The closing chunk. `[DONE]` without a finish reason counts as a stop.
    pub fn finish(&self, saw_done: bool) -> StreamChunk {
        let fallback = if saw_done {
            FinishReason::Stop
        } else {
            FinishReason::Unknown
        };
        StreamChunk::Done {
            finish_reason: self.finish_reason.unwrap_or(fallback),
            usage: self.usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FinishReason;

    #[test]
    fn test_parser_splits_events() {
        let mut parser = SseParser::new();
        let events = parser.push_str("data: {\"a\":1}\n\ndata: {\"a\":2}\n\n");
        assert_eq!(
            events,
            vec![
                SseEvent::Data("{\"a\":1}".into()),
                SseEvent::Data("{\"a\":2}".into())
            ]
        );
    }

    #[test]
    fn test_parser_buffers_partial_event() {
        let mut parser = SseParser::new();
        assert!(parser.push_str("data: {\"te").is_empty());
        assert!(parser.push_str("xt\":1}\n").is_empty());
        assert_eq!(
            parser.push_str("\ndata: [DONE]\n\n"),
            vec![SseEvent::Data("{\"text\":1}".into()), SseEvent::Done]
        );
    }

    #[test]
    fn test_parser_crlf_and_comments() {
        let mut parser = SseParser::new();
        let events = parser.push_str(": keep-alive\r\n\r\ndata:{\"x\":true}\r");
        assert!(events.is_empty());
        let events = parser.push_str("\n\r\n");
        assert_eq!(events, vec![SseEvent::Data("{\"x\":true}".into())]);
    }

    #[test]
    fn test_parser_utf8_split_across_chunks() {
        let mut parser = SseParser::new();
        let bytes = "data: héllo\n\n".as_bytes();
        // split inside the two-byte 'é'
        let split = "data: h".len() + 1;
        assert!(parser.push_bytes(&bytes[..split]).is_empty());
        assert_eq!(
            parser.push_bytes(&bytes[split..]),
            vec![SseEvent::Data("héllo".into())]
        );
    }

    #[test]
    fn test_parser_finish_flushes_tail() {
        let mut parser = SseParser::new();
        assert!(parser.push_str("data: [DONE]").is_empty());
        assert_eq!(parser.finish(), vec![SseEvent::Done]);
        assert!(parser.finish().is_empty());
    }

    #[test]
    fn test_completion_events_text_and_finish() {
        let mut events = CompletionEvents::new();
        assert_eq!(
            events.push_data(r#"{"choices":[{"text":"Hi","finish_reason":"length"}]}"#),
            Some(StreamChunk::Text("Hi".into()))
        );
        assert_eq!(events.push_data("not json"), None);
        assert_eq!(
            events.finish(true),
            StreamChunk::Done {
                finish_reason: FinishReason::Length,
                usage: None
            }
        );
    }

    #[test]
    fn test_completion_events_keep_trailing_usage() {
        let mut events = CompletionEvents::new();
        events.push_data(r#"{"choices":[{"text":"Hi"}]}"#);
        events.push_data(r#"{"choices":[{"text":"","finish_reason":"stop"}]}"#);
        assert_eq!(
            events.push_data(r#"{"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":1,"total_tokens":4}}"#),
            None
        );

        let usage = Usage {
            prompt_tokens: 3,
            completion_tokens: 1,
            total_tokens: 4,
        };
        assert_eq!(events.usage(), Some(usage));
        assert_eq!(
            events.finish(true),
            StreamChunk::Done {
                finish_reason: FinishReason::Stop,
                usage: Some(usage)
            }
        );
    }

    #[test]
    fn test_completion_events_cut_short() {
        let mut events = CompletionEvents::new();
        events.push_data(r#"{"choices":[{"text":"Hel"}]}"#);
        assert_eq!(
            events.finish(false),
            StreamChunk::Done {
                finish_reason: FinishReason::Unknown,
                usage: None
            }
        );
    }

    #[test]
    fn test_collect_text_stops_at_done() {
        let receiver = StreamReceiver::new(futures_util::stream::iter(vec![
            StreamChunk::Text("The capital ".into()),
            StreamChunk::Text("is Paris".into()),
            StreamChunk::Done {
                finish_reason: FinishReason::Stop,
                usage: None,
            },
            StreamChunk::Text("ignored".into()),
        ]));
        let text = tokio_test::block_on(receiver.collect_text()).unwrap();
        assert_eq!(text, "The capital is Paris");
    }

    #[test]
    fn test_collect_text_surfaces_error() {
        let receiver = StreamReceiver::new(futures_util::stream::iter(vec![
            StreamChunk::Text("partial".into()),
            StreamChunk::Error("connection reset".into()),
        ]));
        let err = tokio_test::block_on(receiver.collect_text()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::StreamFailed);
        assert_eq!(err.message(), "connection reset");
    }
}
