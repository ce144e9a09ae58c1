//! LLM wrapper layer
//!
//! Composable wrappers around chat models. Every wrapper answers four
//! queries (full response, stream, JSON object, fenced block) over named
//! arguments. UPPERCASE names become prompt sections; everything else is
//! passed to the backend call. Wrappers are stacked with [`Decorator`],
//! and the whole chain can be handed back to chat-driven code through
//! [`WrapperBackend`].

pub mod core;
pub mod extract;
pub mod openai;
pub mod wrapper;

// Re-export commonly used types
pub use self::core::{
    arguments::{classify, ApiArgs, ArgumentKind, Arguments, PromptArgs, QueryArgs},
    backend::{create_backend, BackendSettings, ChatBackend, Provider},
    config::{ChatOptions, GenerationConfig},
    error::{BackendError, WrapperError},
    types::{BackendStream, ChatHistory, ChunkStream, Message, MessageRole},
};

pub use self::extract::{extract_block, extract_object};

pub use self::wrapper::{
    adapter::WrapperBackend,
    chat::{wrapper_from_backend, BackendChat, ChatWrapper, HISTORY_ARG},
    decorator::{Decorator, Inspect, MapArgs, Operation, QueryHook, Reply},
    LlmWrapper, LlmWrapperExt, ObjectSchema,
};
