//! Shared fakes for wrapper integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, Stream};
use llm_wrappers::llm::{ApiArgs, BackendError, BackendStream, ChatBackend, Message};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

/// One recorded `send` call
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub messages: Vec<Message>,
    pub stream: bool,
    pub api: ApiArgs,
}

/// Backend replaying scripted replies, each split into the given chunks
pub struct ScriptedBackend {
    replies: Mutex<Vec<Vec<String>>>,
    sent: Arc<Mutex<Vec<SentRequest>>>,
    /// Set once the stream handed out by the latest call is dropped
    closed: Arc<AtomicBool>,
    /// Number of chunks pulled from backend streams
    polled: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    /// Each reply is given as its chunks
    pub fn new(replies: Vec<Vec<&str>>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .rev()
                    .map(|chunks| chunks.into_iter().map(String::from).collect())
                    .collect(),
            ),
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            polled: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Single-chunk replies
    pub fn texts(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| vec![*r]).collect())
    }

    pub fn sent(&self) -> Arc<Mutex<Vec<SentRequest>>> {
        Arc::clone(&self.sent)
    }

    pub fn closed(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    pub fn polled(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.polled)
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn send(
        &self,
        messages: Vec<Message>,
        stream: bool,
        api: &ApiArgs,
    ) -> Result<BackendStream, BackendError> {
        self.sent.lock().unwrap().push(SentRequest {
            messages,
            stream,
            api: api.clone(),
        });
        let chunks = self.replies.lock().unwrap().pop().ok_or_else(|| BackendError::ProviderError {
            code: "exhausted".to_string(),
            message: "no scripted reply left".to_string(),
        })?;
        let chunks = if stream { chunks } else { vec![chunks.concat()] };

        self.closed.store(false, Ordering::SeqCst);
        let guarded = Guarded {
            inner: stream::iter(chunks.into_iter().map(Ok::<String, BackendError>)),
            closed: Arc::clone(&self.closed),
            polled: Arc::clone(&self.polled),
        };
        Ok(Box::pin(guarded))
    }
}

/// Stream wrapper that records how far it was read and when it was dropped
struct Guarded<S> {
    inner: S,
    closed: Arc<AtomicBool>,
    polled: Arc<AtomicUsize>,
}

impl<S: Stream + Unpin> Stream for Guarded<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = Arc::clone(&self.polled);
        let next = Pin::new(&mut self.inner).poll_next(cx);
        if let Poll::Ready(Some(_)) = &next {
            polled.fetch_add(1, Ordering::SeqCst);
        }
        next
    }
}

impl<S> Drop for Guarded<S> {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Backend that always fails
pub struct FailingBackend;

#[async_trait]
impl ChatBackend for FailingBackend {
    async fn send(
        &self,
        _messages: Vec<Message>,
        _stream: bool,
        _api: &ApiArgs,
    ) -> Result<BackendStream, BackendError> {
        Err(BackendError::HttpError {
            status: 503,
            body: "unavailable".to_string(),
        })
    }
}
