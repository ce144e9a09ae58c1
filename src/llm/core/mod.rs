//! Core abstractions for the wrapper layer

pub mod arguments;
pub mod backend;
pub mod config;
pub mod error;
pub mod types;
