//! Mapping between wrapper types and chat-completion wire types

use serde_json::{Map, Value};

use crate::llm::core::{
    arguments::ApiArgs,
    config::GenerationConfig,
    error::BackendError,
    types::{Message, MessageRole},
};

use super::types::{ChatCompletion, ChatCompletionChunk, ChatCompletionRequest, OpenAiMessage};

/// Body fields the adapter owns; API arguments cannot override them
const RESERVED: [&str; 3] = ["model", "messages", "stream"];

/// Build the request body
///
/// `defaults` supply sampling options the caller left out; API arguments are
/// layered on top. A string `model` API argument replaces the configured model.
pub fn to_openai_request(
    model: &str,
    messages: Vec<Message>,
    stream: bool,
    defaults: &GenerationConfig,
    api: &ApiArgs,
) -> Result<ChatCompletionRequest, BackendError> {
    let mut options: Map<String, Value> = match serde_json::to_value(defaults)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (key, value) in api.iter() {
        if !RESERVED.contains(&key.as_str()) {
            options.insert(key.clone(), value.clone());
        }
    }

    let model = match api.get("model") {
        Some(Value::String(name)) => name.clone(),
        Some(other) => {
            return Err(BackendError::InvalidRequest(format!(
                "model must be a string, got {}",
                other
            )))
        }
        None => model.to_string(),
    };

    Ok(ChatCompletionRequest {
        model,
        messages: messages.into_iter().map(to_openai_message).collect(),
        stream,
        options,
    })
}

fn to_openai_message(message: Message) -> OpenAiMessage {
    let role = match message.role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    };
    OpenAiMessage {
        role: role.to_string(),
        content: message.content,
    }
}

/// Text carried by one streamed chunk, if any
pub fn from_openai_chunk(chunk: ChatCompletionChunk) -> Option<String> {
    chunk
        .choices
        .into_iter()
        .find(|choice| choice.index == 0)
        .and_then(|choice| choice.delta.content)
        .filter(|text| !text.is_empty())
}

/// Full text of a non-streaming completion
pub fn from_openai_completion(completion: ChatCompletion) -> Result<String, BackendError> {
    let choice = completion
        .choices
        .into_iter()
        .find(|choice| choice.index == 0)
        .ok_or_else(|| BackendError::ProviderError {
            code: "empty_response".to_string(),
            message: "completion contained no choices".to_string(),
        })?;
    Ok(choice.message.content.unwrap_or_default())
}
