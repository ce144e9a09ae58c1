//! Chat backend for OpenAI-compatible chat-completions endpoints

pub mod client;
pub mod mapper;
pub mod sse;
pub mod types;

pub use client::OpenAiCompatibleClient;
