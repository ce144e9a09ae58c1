//! Keyword arguments and their split into prompt and API arguments
//!
//! Callers hand every query a single open-ended keyword mapping. Keys written
//! in upper case (`TASK`, `USER_ARGS`) become prompt arguments and are
//! rendered into the conversation; everything else (`temperature`,
//! `max_tokens`) is an API argument forwarded to the backend untouched.

use serde::Serialize;
use serde_json::{Map, Value};

use super::error::WrapperError;

/// Which side of the split a keyword argument belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentKind {
    /// Rendered into the message history
    Prompt,
    /// Passed through to the backend call
    Api,
}

/// Classify a keyword argument name
///
/// A name is a prompt argument when it has at least one alphabetic character
/// and no lowercase characters. The empty name cannot be classified.
pub fn classify(name: &str) -> Result<ArgumentKind, WrapperError> {
    if name.is_empty() {
        return Err(WrapperError::InvalidArgumentName(name.to_string()));
    }
    let has_alpha = name.chars().any(char::is_alphabetic);
    let has_lower = name.chars().any(char::is_lowercase);
    if has_alpha && !has_lower {
        Ok(ArgumentKind::Prompt)
    } else {
        Ok(ArgumentKind::Api)
    }
}

macro_rules! arg_map {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize)]
        #[serde(transparent)]
        pub struct $name(Map<String, Value>);

        impl $name {
            pub fn new() -> Self {
                Self(Map::new())
            }

            /// Insert or replace a value, keeping the original position of an existing key
            pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
                self.0.insert(key.into(), value.into());
            }

            pub fn get(&self, key: &str) -> Option<&Value> {
                self.0.get(key)
            }

            pub fn remove(&mut self, key: &str) -> Option<Value> {
                self.0.shift_remove(key)
            }

            pub fn contains_key(&self, key: &str) -> bool {
                self.0.contains_key(key)
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Entries in insertion order
            pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
                self.0.iter()
            }

            pub fn as_map(&self) -> &Map<String, Value> {
                &self.0
            }
        }

        impl IntoIterator for $name {
            type Item = (String, Value);
            type IntoIter = serde_json::map::IntoIter;

            fn into_iter(self) -> Self::IntoIter {
                self.0.into_iter()
            }
        }
    };
}

arg_map!(
    /// The caller's keyword mapping before partitioning
    QueryArgs
);
arg_map!(
    /// Named values rendered into the prompt
    PromptArgs
);
arg_map!(
    /// Backend call options (temperature, max tokens, ...)
    ApiArgs
);

impl QueryArgs {
    /// Builder-style insert
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Builder-style insert of any serializable value
    pub fn try_arg<T: Serialize>(
        mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        self.insert(key, serde_json::to_value(value)?);
        Ok(self)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for QueryArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = QueryArgs::new();
        for (k, v) in iter {
            args.insert(k, v);
        }
        args
    }
}

/// Partitioned arguments for a single query
///
/// Built once by the caller-facing layer; everything below it (wrappers,
/// hooks, renderers) works on the two typed mappings only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    pub prompt: PromptArgs,
    pub api: ApiArgs,
}

impl Arguments {
    pub fn new(prompt: PromptArgs, api: ApiArgs) -> Self {
        Self { prompt, api }
    }

    /// Split a keyword mapping by naming convention
    ///
    /// Total and disjoint: every key lands in exactly one of the two outputs.
    pub fn partition(args: QueryArgs) -> Result<Self, WrapperError> {
        let mut out = Arguments::default();
        for (key, value) in args {
            match classify(&key)? {
                ArgumentKind::Prompt => out.prompt.insert(key, value),
                ArgumentKind::Api => out.api.insert(key, value),
            }
        }
        Ok(out)
    }

    /// Recombine into a single keyword mapping, prompt arguments first
    pub fn into_query_args(self) -> QueryArgs {
        self.prompt.into_iter().chain(self.api).collect()
    }

    /// Overlay another set of arguments; keys in `other` win
    pub fn merge(mut self, other: Arguments) -> Self {
        for (k, v) in other.prompt {
            self.prompt.insert(k, v);
        }
        for (k, v) in other.api {
            self.api.insert(k, v);
        }
        self
    }
}

impl TryFrom<QueryArgs> for Arguments {
    type Error = WrapperError;

    fn try_from(args: QueryArgs) -> Result<Self, Self::Error> {
        Arguments::partition(args)
    }
}
