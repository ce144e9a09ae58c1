//! Decorator wrappers
//!
//! A [`Decorator`] owns one underlying wrapper and a [`QueryHook`]. Every
//! query runs in two phases around the delegated call:
//!
//! 1. `before` may rewrite the arguments (rename, inject, merge, or run its
//!    own sub-queries against the underlying wrapper).
//! 2. The matching operation of the underlying wrapper runs with the result.
//! 3. `after` receives the outcome and may observe it, replace it, or turn a
//!    failure into a fallback value.
//!
//! The hook does not know which operation it decorates until `after`. For
//! streams the chunks reach the caller live; `after` sees their
//! concatenation once the stream is drained.

use async_stream::stream;
use async_trait::async_trait;
use futures::stream::Stream;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::chat::render_value;
use super::{LlmWrapper, ObjectSchema};
use crate::llm::core::{
    arguments::Arguments,
    error::WrapperError,
    types::{single_chunk, ChunkStream},
};
use crate::llm::extract::extract_object;

/// Which of the four queries a decorator is serving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Response,
    Stream,
    Object,
    Block,
}

/// Result of a delegated query as seen by a hook
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Value(Value),
}

impl Reply {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reply::Text(text) => Some(text),
            Reply::Value(_) => None,
        }
    }

    /// Text form; JSON values are rendered the way prompts render them
    pub fn into_text(self) -> String {
        match self {
            Reply::Text(text) => text,
            Reply::Value(value) => render_value(&value),
        }
    }
}

/// Pre/post processing around a delegated query
///
/// `State` is call-local: whatever `before` returns is handed to the
/// matching `after`, so one hook instance can serve concurrent queries.
#[async_trait]
pub trait QueryHook: Send + Sync + 'static {
    type State: Send + 'static;

    /// Transform the arguments before delegation
    ///
    /// Returning an error aborts the query; the underlying wrapper is not called.
    async fn before(
        &self,
        underlying: &dyn LlmWrapper,
        args: Arguments,
    ) -> Result<(Arguments, Self::State), WrapperError>;

    /// Observe or replace the delegated outcome
    ///
    /// For a stream that completed, the chunks have already reached the
    /// caller, so a replacement reply is ignored. Only a failed stream lets
    /// the returned reply through, as its final chunk.
    async fn after(
        &self,
        _state: Self::State,
        _op: Operation,
        result: Result<Reply, WrapperError>,
    ) -> Result<Reply, WrapperError> {
        result
    }
}

/// Hook from a pure argument transform
pub struct MapArgs<F>(pub F);

#[async_trait]
impl<F> QueryHook for MapArgs<F>
where
    F: Fn(Arguments) -> Arguments + Send + Sync + 'static,
{
    type State = ();

    async fn before(
        &self,
        _underlying: &dyn LlmWrapper,
        args: Arguments,
    ) -> Result<(Arguments, ()), WrapperError> {
        Ok(((self.0)(args), ()))
    }
}

/// Hook that only watches outcomes
pub struct Inspect<F>(pub F);

#[async_trait]
impl<F> QueryHook for Inspect<F>
where
    F: Fn(Operation, &Result<Reply, WrapperError>) + Send + Sync + 'static,
{
    type State = ();

    async fn before(
        &self,
        _underlying: &dyn LlmWrapper,
        args: Arguments,
    ) -> Result<(Arguments, ()), WrapperError> {
        Ok((args, ()))
    }

    async fn after(
        &self,
        _state: (),
        op: Operation,
        result: Result<Reply, WrapperError>,
    ) -> Result<Reply, WrapperError> {
        (self.0)(op, &result);
        result
    }
}

/// Wrapper delegating to exactly one underlying wrapper through a hook
pub struct Decorator<H> {
    underlying: Arc<dyn LlmWrapper>,
    hook: Arc<H>,
}

impl<H: QueryHook> Decorator<H> {
    pub fn new<W: LlmWrapper + 'static>(underlying: W, hook: H) -> Self {
        Self::from_shared(Arc::new(underlying), hook)
    }

    pub fn from_shared(underlying: Arc<dyn LlmWrapper>, hook: H) -> Self {
        Self {
            underlying,
            hook: Arc::new(hook),
        }
    }

    pub fn underlying(&self) -> &dyn LlmWrapper {
        self.underlying.as_ref()
    }

    pub fn hook(&self) -> &H {
        &self.hook
    }

    async fn prepare(&self, op: Operation, args: Arguments) -> Result<(Arguments, H::State), WrapperError> {
        debug!(?op, "decorator delegating");
        self.hook.before(self.underlying.as_ref(), args).await
    }
}

#[async_trait]
impl<H: QueryHook> LlmWrapper for Decorator<H> {
    async fn response(&self, args: Arguments) -> Result<String, WrapperError> {
        let (args, state) = self.prepare(Operation::Response, args).await?;
        let result = self.underlying.response(args).await.map(Reply::Text);
        let reply = self.hook.after(state, Operation::Response, result).await?;
        Ok(reply.into_text())
    }

    async fn stream(&self, args: Arguments) -> Result<ChunkStream, WrapperError> {
        let (args, state) = self.prepare(Operation::Stream, args).await?;
        match self.underlying.stream(args).await {
            Ok(inner) => Ok(Box::pin(observe_stream(inner, Arc::clone(&self.hook), state))),
            Err(error) => {
                let reply = self.hook.after(state, Operation::Stream, Err(error)).await?;
                Ok(single_chunk(reply.into_text()))
            }
        }
    }

    async fn object(&self, schema: &ObjectSchema, args: Arguments) -> Result<Value, WrapperError> {
        let (args, state) = self.prepare(Operation::Object, args).await?;
        let result = self.underlying.object(schema, args).await.map(Reply::Value);
        let rejected = |reason: String| WrapperError::SchemaValidation {
            schema: schema.name().to_string(),
            attempts: 1,
            reason,
        };
        match self.hook.after(state, Operation::Object, result).await? {
            Reply::Value(value) => {
                schema.validate(&value).map_err(rejected)?;
                Ok(value)
            }
            Reply::Text(text) => extract_object(&text, schema).map_err(|e| rejected(e.reason)),
        }
    }

    async fn block(&self, label: &str, args: Arguments) -> Result<String, WrapperError> {
        let (args, state) = self.prepare(Operation::Block, args).await?;
        let result = self.underlying.block(label, args).await.map(Reply::Text);
        let reply = self.hook.after(state, Operation::Block, result).await?;
        Ok(reply.into_text())
    }
}

/// Forward chunks live, then hand the concatenation to the hook
///
/// If the caller drops the stream early the inner stream is dropped with it
/// and `after` never runs.
fn observe_stream<H: QueryHook>(
    mut inner: ChunkStream,
    hook: Arc<H>,
    state: H::State,
) -> impl Stream<Item = Result<String, WrapperError>> + Send {
    stream! {
        let mut full = String::new();
        let mut failure = None;
        while let Some(item) = inner.next().await {
            match item {
                Ok(chunk) => {
                    full.push_str(&chunk);
                    yield Ok(chunk);
                }
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }
        drop(inner);

        let failed = failure.is_some();
        let result = match failure {
            Some(error) => Err(error),
            None => Ok(Reply::Text(full.clone())),
        };
        match hook.after(state, Operation::Stream, result).await {
            // a fallback for a failed stream is emitted as its remainder
            Ok(reply) if failed => {
                let text = reply.into_text();
                if !text.is_empty() {
                    yield Ok(text);
                }
            }
            Ok(reply) => {
                if reply.into_text() != full {
                    debug!("ignoring replacement reply for a completed stream");
                }
            }
            Err(error) => yield Err(error),
        }
    }
}
