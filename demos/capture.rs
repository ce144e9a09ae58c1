//! Recording every input and output passing through a wrapper chain
//!
//! `Capturing` is a chat-level pass-through: it sees each rendered message
//! history, forwards it to the wrapper below, and keeps a copy of the
//! streamed output. Stacked under the workflow decorator it shows every
//! sub-query the workflow makes.
//!
//! Run: `cargo run --example capture -- --provider cerebras`

mod common;

use async_trait::async_trait;
use clap::Parser;
use common::{ProviderArgs, WorkflowQa};
use futures::StreamExt;
use llm_wrappers::llm::{
    ApiArgs, Arguments, ChatHistory, ChatWrapper, ChunkStream, Decorator, LlmWrapper,
    LlmWrapperExt, PromptArgs, QueryArgs, WrapperError, HISTORY_ARG,
};
use std::sync::{Arc, Mutex};

/// One chat exchange
struct Record {
    input: ChatHistory,
    api: ApiArgs,
    output: Vec<String>,
}

struct Capturing<W> {
    underlying: W,
    history: Arc<Mutex<Vec<Record>>>,
}

impl<W> Capturing<W> {
    fn new(underlying: W) -> Self {
        Self {
            underlying,
            history: Arc::default(),
        }
    }
}

#[async_trait]
impl<W: LlmWrapper> ChatWrapper for Capturing<W> {
    async fn chat(
        &self,
        _stream: bool,
        messages: ChatHistory,
        api: ApiArgs,
    ) -> Result<ChunkStream, WrapperError> {
        let mut forwarded = api.clone();
        let history = serde_json::to_value(&messages).map_err(|e| {
            WrapperError::InvalidArgumentValue {
                name: HISTORY_ARG.to_string(),
                reason: e.to_string(),
            }
        })?;
        forwarded.insert(HISTORY_ARG, history);

        let mut chunks = self
            .underlying
            .stream(Arguments::new(PromptArgs::new(), forwarded))
            .await?;
        let mut output = Vec::new();
        while let Some(chunk) = chunks.next().await {
            output.push(chunk?);
        }

        let text = output.concat();
        if let Ok(mut log) = self.history.lock() {
            log.push(Record {
                input: messages,
                api,
                output,
            });
        }
        Ok(llm_wrappers::llm::core::types::single_chunk(text))
    }
}

#[derive(Parser)]
#[command(about = "Capture every exchange of a multi-step workflow")]
struct Cli {
    #[command(flatten)]
    provider: ProviderArgs,

    #[arg(long, default_value = "How are computer chips made?")]
    question: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let cli = Cli::parse();

    let capturing = Arc::new(Capturing::new(cli.provider.wrapper()?));
    let qa = Decorator::new(Arc::clone(&capturing), WorkflowQa);

    qa.query_block("md", QueryArgs::new().arg("QUESTION", cli.question))
        .await?;

    let history = capturing
        .history
        .lock()
        .map_err(|_| "capture log poisoned")?;
    for record in history.iter() {
        println!("{}", "-".repeat(80));
        for message in &record.input {
            println!("[{:?}]\n{}\n", message.role, message.content);
        }
        if !record.api.is_empty() {
            println!("API arguments: {:?}", record.api.as_map());
        }
        println!("Output: {}", record.output.concat());
    }
    Ok(())
}
