//! Composable wrappers around chat-completion models
//!
//! See [`llm`] for the query protocol, decorators and backends.

pub mod llm;
