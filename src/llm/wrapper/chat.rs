//! Chat-based wrappers
//!
//! A [`ChatWrapper`] supplies a single capability, `chat`, which turns a
//! message history into a stream of text chunks. The four query operations
//! are derived from it by the free functions in this module, and every
//! `ChatWrapper` is an [`LlmWrapper`] through them.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::LlmWrapper;
use crate::llm::core::{
    arguments::{ApiArgs, Arguments, PromptArgs},
    backend::ChatBackend,
    config::ChatOptions,
    error::WrapperError,
    types::{ChatHistory, ChunkStream, Message},
};
use crate::llm::extract::{extract_block, extract_object, ObjectSchema};

/// API argument carrying prior messages to prepend to the rendered history
pub const HISTORY_ARG: &str = "messages";

static DEFAULT_OPTIONS: ChatOptions = ChatOptions::DEFAULT;

/// A wrapper that operates on chat histories
#[async_trait]
pub trait ChatWrapper: Send + Sync {
    /// Produce the completion for `messages`
    ///
    /// Always yields a sequence; with `stream` false it holds a single chunk
    /// containing the entire response.
    async fn chat(
        &self,
        stream: bool,
        messages: ChatHistory,
        api: ApiArgs,
    ) -> Result<ChunkStream, WrapperError>;

    /// Rendering and retry settings
    fn options(&self) -> &ChatOptions {
        &DEFAULT_OPTIONS
    }
}

/// Render a prompt value: strings verbatim, anything else as JSON
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Turn prompt arguments into a message history
///
/// Each argument becomes a `## KEY` section of one user message, in the order
/// supplied. A configured system template is sent first with its `{KEY}`
/// placeholders filled; arguments consumed there are not repeated. Prior
/// messages passed under [`HISTORY_ARG`] are taken out of `api` and placed
/// before the user message.
pub fn render_history(
    options: &ChatOptions,
    prompt: &PromptArgs,
    api: &mut ApiArgs,
    instruction: Option<&str>,
) -> Result<ChatHistory, WrapperError> {
    let mut history = ChatHistory::new();
    let mut consumed = HashSet::new();

    if let Some(template) = &options.system {
        history.push(Message::system(fill_template(template, prompt, &mut consumed)));
    }

    if let Some(prior) = api.remove(HISTORY_ARG) {
        let prior: Vec<Message> =
            serde_json::from_value(prior).map_err(|e| WrapperError::InvalidArgumentValue {
                name: HISTORY_ARG.to_string(),
                reason: e.to_string(),
            })?;
        history.extend(prior);
    }

    let mut sections: Vec<String> = prompt
        .iter()
        .filter(|(key, _)| !consumed.contains(key.as_str()))
        .map(|(key, value)| format!("## {key}\n{}", render_value(value)))
        .collect();
    if let Some(instruction) = instruction {
        sections.push(format!("## INSTRUCTIONS\n{instruction}"));
    }
    if !sections.is_empty() {
        history.push(Message::user(sections.join("\n\n")));
    }

    Ok(history)
}

/// Substitute `{KEY}` placeholders of `template` in a single pass
///
/// Only placeholders written in the template itself are filled; braces that
/// arrive inside substituted values are left alone. Unknown keys stay as
/// literal text. Keys that were filled are recorded in `consumed`.
fn fill_template<'a>(
    template: &str,
    prompt: &'a PromptArgs,
    consumed: &mut HashSet<&'a str>,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let filled = after.find('}').and_then(|close| {
            let key = &after[..close];
            prompt
                .iter()
                .find(|(name, _)| name.as_str() == key)
                .map(|(name, value)| (close, name, value))
        });
        match filled {
            Some((close, name, value)) => {
                out.push_str(&render_value(value));
                consumed.insert(name.as_str());
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Drain a chunk stream into one string
pub async fn collect_text(mut chunks: ChunkStream) -> Result<String, WrapperError> {
    let mut text = String::new();
    while let Some(chunk) = chunks.next().await {
        text.push_str(&chunk?);
    }
    Ok(text)
}

async fn complete<C: ChatWrapper + ?Sized>(
    chat: &C,
    history: ChatHistory,
    api: ApiArgs,
) -> Result<String, WrapperError> {
    debug!(messages = history.len(), "requesting completion");
    collect_text(chat.chat(false, history, api).await?).await
}

pub async fn query_response<C: ChatWrapper + ?Sized>(
    chat: &C,
    args: Arguments,
) -> Result<String, WrapperError> {
    let Arguments { prompt, mut api } = args;
    let history = render_history(chat.options(), &prompt, &mut api, None)?;
    complete(chat, history, api).await
}

/// Chunks are re-yielded as they arrive; nothing is buffered
pub async fn query_stream<C: ChatWrapper + ?Sized>(
    chat: &C,
    args: Arguments,
) -> Result<ChunkStream, WrapperError> {
    let Arguments { prompt, mut api } = args;
    let history = render_history(chat.options(), &prompt, &mut api, None)?;
    debug!(messages = history.len(), "requesting stream");
    chat.chat(true, history, api).await
}

/// Ask for JSON matching `schema`, re-asking up to `object_retries` times
///
/// Each rejected reply stays in the history followed by a corrective message
/// quoting the parse error.
pub async fn query_object<C: ChatWrapper + ?Sized>(
    chat: &C,
    schema: &ObjectSchema,
    args: Arguments,
) -> Result<Value, WrapperError> {
    let Arguments { prompt, mut api } = args;
    let retries = chat.options().object_retries;
    let mut history = render_history(
        chat.options(),
        &prompt,
        &mut api,
        Some(&schema.instruction()),
    )?;

    let mut attempt = 0;
    loop {
        attempt += 1;
        let text = complete(chat, history.clone(), api.clone()).await?;
        let error = match extract_object(&text, schema) {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if attempt > retries {
            return Err(WrapperError::SchemaValidation {
                schema: schema.name().to_string(),
                attempts: attempt,
                reason: error.reason,
            });
        }
        warn!(
            schema = schema.name(),
            attempt,
            reason = %error.reason,
            "structured response rejected, asking again"
        );
        history.push(Message::assistant(text));
        history.push(Message::user(format!(
            "Your previous response could not be used: {}. Respond again with only a JSON value of type {} that conforms to the schema.",
            error.reason,
            schema.name()
        )));
    }
}

pub async fn query_block<C: ChatWrapper + ?Sized>(
    chat: &C,
    label: &str,
    args: Arguments,
) -> Result<String, WrapperError> {
    let Arguments { prompt, mut api } = args;
    let instruction = format!(
        "Wrap the relevant content of your response in a fenced markdown block labeled `{label}`: a line ```{label}, then the content, then a line ```."
    );
    let history = render_history(chat.options(), &prompt, &mut api, Some(&instruction))?;
    let text = complete(chat, history, api).await?;
    extract_block(&text, label).ok_or_else(|| WrapperError::BlockNotFound {
        label: label.to_string(),
    })
}

#[async_trait]
impl<C: ChatWrapper + ?Sized> LlmWrapper for C {
    async fn response(&self, args: Arguments) -> Result<String, WrapperError> {
        query_response(self, args).await
    }

    async fn stream(&self, args: Arguments) -> Result<ChunkStream, WrapperError> {
        query_stream(self, args).await
    }

    async fn object(&self, schema: &ObjectSchema, args: Arguments) -> Result<Value, WrapperError> {
        query_object(self, schema, args).await
    }

    async fn block(&self, label: &str, args: Arguments) -> Result<String, WrapperError> {
        query_block(self, label, args).await
    }
}

/// Leaf wrapper forwarding rendered histories to a [`ChatBackend`]
pub struct BackendChat<B> {
    backend: B,
    options: ChatOptions,
}

impl<B: ChatBackend> BackendChat<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            options: ChatOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: ChatBackend> ChatWrapper for BackendChat<B> {
    async fn chat(
        &self,
        stream: bool,
        messages: ChatHistory,
        api: ApiArgs,
    ) -> Result<ChunkStream, WrapperError> {
        let chunks = self.backend.send(messages, stream, &api).await?;
        Ok(Box::pin(chunks.map(|chunk| chunk.map_err(WrapperError::from))))
    }

    fn options(&self) -> &ChatOptions {
        &self.options
    }
}

/// Wrap a chat backend so it answers the four query operations
pub fn wrapper_from_backend<B: ChatBackend>(backend: B) -> BackendChat<B> {
    BackendChat::new(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::core::arguments::QueryArgs;
    use crate::llm::core::types::single_chunk;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replies with scripted texts in order and records every history it sees
    struct Scripted {
        replies: Mutex<Vec<String>>,
        seen: Mutex<Vec<(bool, ChatHistory, ApiArgs)>>,
        options: ChatOptions,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
                seen: Mutex::new(Vec::new()),
                options: ChatOptions::default(),
            }
        }
    }

    #[async_trait]
    impl ChatWrapper for Scripted {
        async fn chat(
            &self,
            stream: bool,
            messages: ChatHistory,
            api: ApiArgs,
        ) -> Result<ChunkStream, WrapperError> {
            self.seen.lock().unwrap().push((stream, messages, api));
            let reply = self.replies.lock().unwrap().pop().unwrap_or_default();
            if stream {
                let chunks: Vec<Result<String, WrapperError>> =
                    reply.split_inclusive(' ').map(|s| Ok(s.to_string())).collect();
                Ok(Box::pin(futures::stream::iter(chunks)))
            } else {
                Ok(single_chunk(reply))
            }
        }

        fn options(&self) -> &ChatOptions {
            &self.options
        }
    }

    fn args(kwargs: QueryArgs) -> Arguments {
        Arguments::partition(kwargs).unwrap()
    }

    #[test]
    fn test_render_sections_in_order() {
        let prompt = args(
            QueryArgs::new()
                .arg("CONTENT", json!({"a": [1, 2]}))
                .arg("TASK", "Summarize the CONTENT"),
        )
        .prompt;
        let history =
            render_history(&ChatOptions::default(), &prompt, &mut ApiArgs::new(), None).unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0],
            Message::user("## CONTENT\n{\n  \"a\": [\n    1,\n    2\n  ]\n}\n\n## TASK\nSummarize the CONTENT")
        );
    }

    #[test]
    fn test_render_system_template_consumes_placeholders() {
        let options = ChatOptions::new().with_system("You speak like a {PERSONA}.");
        let prompt = args(QueryArgs::new().arg("PERSONA", "pirate").arg("TASK", "Greet me")).prompt;
        let history = render_history(&options, &prompt, &mut ApiArgs::new(), Some("Be brief.")).unwrap();

        assert_eq!(history[0], Message::system("You speak like a pirate."));
        assert_eq!(history[1], Message::user("## TASK\nGreet me\n\n## INSTRUCTIONS\nBe brief."));
    }

    #[test]
    fn test_render_braces_in_values_are_not_placeholders() {
        let options = ChatOptions::new().with_system("Answer as a {PERSONA}. Keep {STYLE}.");
        let prompt = args(
            QueryArgs::new()
                .arg("PERSONA", "user who says {TASK}")
                .arg("TASK", "Say hi"),
        )
        .prompt;
        let history = render_history(&options, &prompt, &mut ApiArgs::new(), None).unwrap();

        assert_eq!(
            history,
            vec![
                Message::system("Answer as a user who says {TASK}. Keep {STYLE}."),
                Message::user("## TASK\nSay hi"),
            ]
        );
    }

    #[test]
    fn test_render_takes_prior_messages_out_of_api_args() {
        let mut api = ApiArgs::new();
        api.insert(HISTORY_ARG, json!([{"role": "user", "content": "hi"}, {"role": "assistant", "content": "hello"}]));
        api.insert("temperature", 0.3);

        let history =
            render_history(&ChatOptions::default(), &PromptArgs::new(), &mut api, None).unwrap();
        assert_eq!(history, vec![Message::user("hi"), Message::assistant("hello")]);
        assert!(!api.contains_key(HISTORY_ARG));
        assert!(api.contains_key("temperature"));
    }

    #[test]
    fn test_render_rejects_malformed_history() {
        let mut api = ApiArgs::new();
        api.insert(HISTORY_ARG, "not a list");
        let err = render_history(&ChatOptions::default(), &PromptArgs::new(), &mut api, None)
            .unwrap_err();
        assert!(matches!(err, WrapperError::InvalidArgumentValue { name, .. } if name == HISTORY_ARG));
    }

    #[tokio::test]
    async fn test_response_passes_api_args_through() {
        let chat = Scripted::new(&["four"]);
        let text = chat
            .response(args(QueryArgs::new().arg("TASK", "2+2?").arg("temperature", 0.0)))
            .await
            .unwrap();
        assert_eq!(text, "four");

        let seen = chat.seen.lock().unwrap();
        let (stream, _, api) = &seen[0];
        assert!(!stream);
        assert_eq!(api.get("temperature"), Some(&json!(0.0)));
    }

    #[tokio::test]
    async fn test_stream_yields_chunks_in_order() {
        let chat = Scripted::new(&["one two three"]);
        let chunks: Vec<String> = chat
            .stream(args(QueryArgs::new().arg("TASK", "count")))
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["one ", "two ", "three"]);
        assert!(chat.seen.lock().unwrap()[0].0);
    }

    #[tokio::test]
    async fn test_object_retries_once_then_succeeds() {
        let chat = Scripted::new(&["no idea", "Steps: [\"a\",\"b\"]"]);
        let schema = ObjectSchema::of::<Vec<String>>();
        let value = chat
            .object(&schema, args(QueryArgs::new().arg("TASK", "list steps")))
            .await
            .unwrap();
        assert_eq!(value, json!(["a", "b"]));

        let seen = chat.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        let retry_history = &seen[1].1;
        assert_eq!(retry_history.len(), 3);
        assert_eq!(retry_history[1], Message::assistant("no idea"));
        assert!(retry_history[2].content.contains("could not be used"));
    }

    #[tokio::test]
    async fn test_object_gives_up_after_budget() {
        let chat = Scripted::new(&["prose", "more prose", "never reached"]);
        let schema = ObjectSchema::of::<Vec<String>>();
        let err = chat
            .object(&schema, args(QueryArgs::new().arg("TASK", "list steps")))
            .await
            .unwrap_err();
        assert!(matches!(err, WrapperError::SchemaValidation { attempts: 2, .. }));
        assert_eq!(chat.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_object_retry_budget_is_configurable() {
        let mut chat = Scripted::new(&["prose", "[\"late\"]"]);
        chat.options = ChatOptions::new().with_object_retries(0);
        let schema = ObjectSchema::of::<Vec<String>>();
        let err = chat
            .object(&schema, args(QueryArgs::new().arg("TASK", "list")))
            .await
            .unwrap_err();
        assert!(matches!(err, WrapperError::SchemaValidation { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_block_found_and_missing() {
        let chat = Scripted::new(&["```python\nprint(1)\n```", "no code here"]);
        let code = chat
            .block("python", args(QueryArgs::new().arg("TASK", "print one")))
            .await
            .unwrap();
        assert_eq!(code, "print(1)\n");

        let instruction = chat.seen.lock().unwrap()[0].1[0].content.clone();
        assert!(instruction.contains("```python"));

        let err = chat
            .block("python", args(QueryArgs::new().arg("TASK", "print one")))
            .await
            .unwrap_err();
        assert!(matches!(err, WrapperError::BlockNotFound { label } if label == "python"));
    }
}
