//! Use any wrapper where a raw chat backend is expected

use async_trait::async_trait;
use futures::StreamExt;

use super::chat::HISTORY_ARG;
use super::LlmWrapper;
use crate::llm::core::{
    arguments::{ApiArgs, Arguments, PromptArgs},
    backend::ChatBackend,
    error::{BackendError, WrapperError},
    types::{BackendStream, Message},
};

/// A [`ChatBackend`] answering through a wrapper chain
///
/// The message history travels in the reserved `messages` API argument, so
/// a chat-based leaf at the end of the chain sends it on unchanged while
/// decorators in between still get to rewrite arguments and observe replies.
pub struct WrapperBackend<W> {
    wrapper: W,
}

impl<W: LlmWrapper> WrapperBackend<W> {
    pub fn new(wrapper: W) -> Self {
        Self { wrapper }
    }

    pub fn into_inner(self) -> W {
        self.wrapper
    }
}

/// Backend failures come back out unchanged; anything else is reported as a provider error
fn to_backend_error(err: WrapperError) -> BackendError {
    match err {
        WrapperError::Backend(inner) => inner,
        other => BackendError::ProviderError {
            code: "wrapper".to_string(),
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl<W: LlmWrapper> ChatBackend for WrapperBackend<W> {
    async fn send(
        &self,
        messages: Vec<Message>,
        stream: bool,
        api: &ApiArgs,
    ) -> Result<BackendStream, BackendError> {
        let mut api = api.clone();
        api.insert(HISTORY_ARG, serde_json::to_value(&messages)?);
        let args = Arguments::new(PromptArgs::new(), api);

        if stream {
            let chunks = self.wrapper.stream(args).await.map_err(to_backend_error)?;
            Ok(Box::pin(chunks.map(|chunk| chunk.map_err(to_backend_error))))
        } else {
            let text = self.wrapper.response(args).await.map_err(to_backend_error)?;
            Ok(Box::pin(futures::stream::once(async move { Ok(text) })))
        }
    }
}
