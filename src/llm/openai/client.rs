//! OpenAI-compatible chat-completions client

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header, Client, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::llm::core::{
    arguments::ApiArgs,
    backend::{BackendSettings, ChatBackend},
    error::BackendError,
    types::{BackendStream, Message},
};

use super::mapper::{from_openai_chunk, from_openai_completion, to_openai_request};
use super::sse::{parse_sse_stream, SseEvent};
use super::types::ChatCompletion;

/// Client for OpenAI, Cerebras, Groq and other compatible endpoints
pub struct OpenAiCompatibleClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Provider, model, credentials and defaults
    settings: BackendSettings,
}

impl OpenAiCompatibleClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or the HTTP client cannot be built.
    pub fn new(settings: BackendSettings) -> Result<Self, BackendError> {
        if settings.api_key.trim().is_empty() {
            return Err(BackendError::AuthenticationError(format!(
                "empty API key for {}",
                settings.provider
            )));
        }

        let http_client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|e| BackendError::HttpError {
                status: 0,
                body: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            settings,
        })
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    /// Build the endpoint URL
    fn build_endpoint_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    async fn post(
        &self,
        messages: Vec<Message>,
        stream: bool,
        api: &ApiArgs,
    ) -> Result<Response, BackendError> {
        let request = to_openai_request(
            &self.settings.model,
            messages,
            stream,
            &self.settings.generation,
            api,
        )?;

        let url = self.build_endpoint_url();
        debug!(
            provider = %self.settings.provider,
            model = %request.model,
            messages = request.messages.len(),
            stream,
            "sending chat completion request"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await?;

        check_status(response).await
    }
}

/// Map non-success statuses to errors
async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_else(|_| String::new());

    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimitExceeded { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::AuthenticationError(body),
        _ => BackendError::HttpError {
            status: status.as_u16(),
            body,
        },
    })
}

#[async_trait]
impl ChatBackend for OpenAiCompatibleClient {
    async fn send(
        &self,
        messages: Vec<Message>,
        stream: bool,
        api: &ApiArgs,
    ) -> Result<BackendStream, BackendError> {
        let response = self.post(messages, stream, api).await?;

        if !stream {
            let completion: ChatCompletion = response.json().await?;
            let text = from_openai_completion(completion)?;
            return Ok(Box::pin(futures::stream::once(async move { Ok(text) })));
        }

        // The response body is owned by the stream; dropping it closes the connection
        let events = parse_sse_stream(Box::pin(response.bytes_stream()));
        let chunks = events
            .take_while(|event| futures::future::ready(!matches!(event, Ok(SseEvent::Done))))
            .filter_map(|event| {
                futures::future::ready(match event {
                    Ok(SseEvent::Chunk(chunk)) => from_openai_chunk(chunk).map(Ok),
                    Ok(SseEvent::Done) => None,
                    Err(e) => Some(Err(e)),
                })
            });

        Ok(Box::pin(chunks))
    }
}
