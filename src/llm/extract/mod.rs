//! Best-effort extraction of structured payloads from model text
//!
//! Neither extractor assumes the response consists solely of the payload;
//! both scan for it anywhere in the text.

pub mod block;
pub mod object;

pub use block::extract_block;
pub use object::{extract_object, extract_typed, ObjectSchema, ParseError};
