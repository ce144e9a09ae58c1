//! The four-operation wrapper protocol
//!
//! Every wrapper, whether a leaf talking to a chat backend or a decorator
//! around another wrapper, answers the same four queries:
//!
//! - `response`: the full text of one completion
//! - `stream`: the same completion as incremental chunks
//! - `object`: a JSON value conforming to a caller-supplied schema
//! - `block`: the inner text of a fenced block with a given label
//!
//! [`LlmWrapper`] is the object-safe core, operating on already partitioned
//! [`Arguments`]. [`LlmWrapperExt`] is the caller-facing layer: each method
//! takes a single keyword mapping and splits it before dispatch.

pub mod adapter;
pub mod chat;
pub mod decorator;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::llm::core::{
    arguments::{Arguments, QueryArgs},
    error::WrapperError,
    types::ChunkStream,
};
pub use crate::llm::extract::ObjectSchema;

/// Contract shared by every node of a wrapper chain
#[async_trait]
pub trait LlmWrapper: Send + Sync {
    /// Full accumulated text of one completion
    async fn response(&self, args: Arguments) -> Result<String, WrapperError>;

    /// Completion delivered chunk by chunk, in emission order
    ///
    /// Dropping the returned stream stops consumption and releases the
    /// underlying backend connection.
    async fn stream(&self, args: Arguments) -> Result<ChunkStream, WrapperError>;

    /// A JSON value that passes `schema`'s validator
    async fn object(&self, schema: &ObjectSchema, args: Arguments) -> Result<Value, WrapperError>;

    /// Inner text of the first fenced block labeled `label`
    async fn block(&self, label: &str, args: Arguments) -> Result<String, WrapperError>;
}

#[async_trait]
impl<W: LlmWrapper + ?Sized> LlmWrapper for Arc<W> {
    async fn response(&self, args: Arguments) -> Result<String, WrapperError> {
        (**self).response(args).await
    }

    async fn stream(&self, args: Arguments) -> Result<ChunkStream, WrapperError> {
        (**self).stream(args).await
    }

    async fn object(&self, schema: &ObjectSchema, args: Arguments) -> Result<Value, WrapperError> {
        (**self).object(schema, args).await
    }

    async fn block(&self, label: &str, args: Arguments) -> Result<String, WrapperError> {
        (**self).block(label, args).await
    }
}

/// Keyword-argument entry points, available on every wrapper
///
/// # Example
///
/// ```rust,no_run
/// use llm_wrappers::llm::{create_backend, wrapper_from_backend, LlmWrapperExt, Provider, QueryArgs};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let llm = wrapper_from_backend(create_backend(Provider::OpenAi, None)?);
/// let code = llm
///     .query_block(
///         "python",
///         QueryArgs::new()
///             .arg("TASK", "Print the first ten primes")
///             .arg("temperature", 0.0),
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait LlmWrapperExt: LlmWrapper {
    async fn query_response(&self, kwargs: QueryArgs) -> Result<String, WrapperError> {
        self.response(Arguments::partition(kwargs)?).await
    }

    async fn query_stream(&self, kwargs: QueryArgs) -> Result<ChunkStream, WrapperError> {
        self.stream(Arguments::partition(kwargs)?).await
    }

    /// Query for a value of type `T`, described to the model by its JSON Schema
    async fn query_object<T>(&self, kwargs: QueryArgs) -> Result<T, WrapperError>
    where
        T: JsonSchema + DeserializeOwned + Send + 'static,
    {
        let args = Arguments::partition(kwargs)?;
        let schema = ObjectSchema::of::<T>();
        let value = self.object(&schema, args).await?;
        serde_json::from_value(value).map_err(|e| WrapperError::SchemaValidation {
            schema: schema.name().to_string(),
            attempts: 1,
            reason: e.to_string(),
        })
    }

    async fn query_block(&self, label: &str, kwargs: QueryArgs) -> Result<String, WrapperError> {
        self.block(label, Arguments::partition(kwargs)?).await
    }
}

impl<W: LlmWrapper + ?Sized> LlmWrapperExt for W {}
