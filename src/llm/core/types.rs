//! Core types for the wrapper layer

use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use super::error::{BackendError, WrapperError};

/// A single message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,
    /// Text content of the message
    pub content: String,
}

impl Message {
    /// Create a new system message
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: text.into(),
        }
    }

    /// Create a new user message
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: text.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: text.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions framing the conversation
    System,
    /// Human input
    User,
    /// Model output
    Assistant,
}

/// Ordered message history sent to a backend
pub type ChatHistory = Vec<Message>;

/// Lazy sequence of text chunks produced by a wrapper
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, WrapperError>> + Send>>;

/// Lazy sequence of text chunks produced by a backend adapter
pub type BackendStream = Pin<Box<dyn Stream<Item = Result<String, BackendError>> + Send>>;

/// A stream yielding exactly one chunk
pub fn single_chunk(text: String) -> ChunkStream {
    Box::pin(futures::stream::once(async move { Ok(text) }))
}
