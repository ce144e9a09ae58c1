//! OpenAI chat-completions request and response types
//!
//! OpenAI, Cerebras and Groq all accept this schema.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request body for `POST /chat/completions`
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    /// Model identifier
    pub model: String,
    /// Conversation so far
    pub messages: Vec<OpenAiMessage>,
    /// Whether to answer with server-sent events
    pub stream: bool,
    /// Sampling options and any other pass-through parameters
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

/// A single message in the request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiMessage {
    /// "system", "user" or "assistant"
    pub role: String,
    pub content: String,
}

/// Non-streaming response body
///
/// Only the fields the mapper reads are modeled; the rest are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletion {
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionChoice {
    pub index: usize,
    pub message: CompletionMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionMessage {
    /// Absent for refusals and tool-only replies
    #[serde(default)]
    pub content: Option<String>,
}

/// One server-sent event payload of a streaming response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    pub index: usize,
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// Error body returned with non-2xx statuses and occasionally mid-stream
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_flattens_options() {
        let mut options = Map::new();
        options.insert("temperature".to_string(), json!(0.2));
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![OpenAiMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            stream: false,
            options,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "gpt-4o-mini",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": false,
                "temperature": 0.2
            })
        );
    }

    #[test]
    fn test_completion_deserialization() {
        let body = r#"{"id":"chatcmpl-1","object":"chat.completion","created":1,"model":"m","choices":[{"index":0,"message":{"role":"assistant","content":"Hello"},"finish_reason":"stop"}],"usage":{"prompt_tokens":5,"completion_tokens":1,"total_tokens":6}}"#;
        let completion: ChatCompletion = serde_json::from_str(body).unwrap();
        assert_eq!(completion.choices[0].message.content.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_chunk_deserialization() {
        let body = r#"{"id":"c","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        let chunk: ChatCompletionChunk = serde_json::from_str(body).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hel"));

        let usage_only = r#"{"id":"c","choices":[],"usage":{"prompt_tokens":1,"completion_tokens":1,"total_tokens":2}}"#;
        let chunk: ChatCompletionChunk = serde_json::from_str(usage_only).unwrap();
        assert!(chunk.choices.is_empty());
    }

    #[test]
    fn test_error_envelope() {
        let body = r#"{"error":{"message":"Invalid API key","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.error.message, "Invalid API key");
        assert_eq!(envelope.error.error_type.as_deref(), Some("invalid_request_error"));
    }
}
