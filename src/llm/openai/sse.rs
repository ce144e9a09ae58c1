//! Server-Sent Events (SSE) parser for chat-completion streams

use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;

use crate::llm::core::error::BackendError;

use super::types::{ChatCompletionChunk, ErrorEnvelope};

/// A parsed event from the stream
#[derive(Debug, Clone)]
pub enum SseEvent {
    /// Incremental completion payload
    Chunk(ChatCompletionChunk),
    /// The `[DONE]` sentinel
    Done,
}

/// Parse a stream of bytes as chat-completion SSE events
///
/// The wire format is:
/// ```text
/// data: {"id":"chatcmpl-1","choices":[{"index":0,"delta":{"content":"Hel"}}]}
///
/// data: [DONE]
/// ```
///
/// Bytes are buffered until a blank line closes an event, so payloads and
/// multi-byte characters split across network chunks are reassembled.
/// Comment lines (`: keep-alive`) are skipped. An event left in the buffer
/// when the body ends without a closing blank line is still emitted.
pub fn parse_sse_stream(
    byte_stream: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
) -> Pin<Box<dyn Stream<Item = Result<SseEvent, BackendError>> + Send>> {
    let mut buffer: Vec<u8> = Vec::new();

    // `None` marks the end of the body
    let event_stream = byte_stream
        .map(Some)
        .chain(futures::stream::once(async { None }))
        .flat_map(move |item| {
            let chunk = match item {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => {
                    return futures::stream::iter(vec![Err(BackendError::StreamError(
                        e.to_string(),
                    ))]);
                }
                None => {
                    let rest = std::mem::take(&mut buffer);
                    let tail: Vec<_> = decode_event(&rest).into_iter().collect();
                    return futures::stream::iter(tail);
                }
            };

            buffer.extend(chunk.iter().filter(|b| **b != b'\r'));

            let mut events = Vec::new();
            while let Some(event_end) = find_boundary(&buffer) {
                let raw: Vec<u8> = buffer.drain(..event_end + 2).collect();
                if let Some(parsed) = decode_event(&raw[..event_end]) {
                    events.push(parsed);
                }
            }

            futures::stream::iter(events)
        });

    Box::pin(event_stream)
}

fn decode_event(raw: &[u8]) -> Option<Result<SseEvent, BackendError>> {
    match std::str::from_utf8(raw) {
        Ok(text) => parse_event(text),
        Err(e) => Some(Err(BackendError::StreamError(format!(
            "Invalid UTF-8 in stream: {}",
            e
        )))),
    }
}

fn find_boundary(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Parse a single SSE event from its text representation
fn parse_event(event_text: &str) -> Option<Result<SseEvent, BackendError>> {
    let data_lines: Vec<&str> = event_text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .collect();

    if data_lines.is_empty() {
        return None;
    }
    let data = data_lines.join("\n");
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(Ok(SseEvent::Done));
    }

    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&data) {
        return Some(Err(BackendError::ProviderError {
            code: envelope
                .error
                .error_type
                .unwrap_or_else(|| "stream_error".to_string()),
            message: envelope.error.message,
        }));
    }

    match serde_json::from_str::<ChatCompletionChunk>(&data) {
        Ok(chunk) => Some(Ok(SseEvent::Chunk(chunk))),
        Err(e) => Some(Err(BackendError::SerializationError(format!(
            "Failed to parse SSE event: {}. Data: {}",
            e, data
        )))),
    }
}
