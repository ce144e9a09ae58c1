//! A consistent "explain like I'm five" style on top of any wrapper
//!
//! Every query first gets a normal answer from the underlying wrapper, then
//! asks for it to be rephrased for a young audience. Works the same for
//! streamed, structured and block queries.
//!
//! Run: `cargo run --example personality -- --question "What is a transistor?"`

mod common;

use async_trait::async_trait;
use clap::Parser;
use common::ProviderArgs;
use futures::StreamExt;
use llm_wrappers::llm::{
    Arguments, Decorator, LlmWrapper, LlmWrapperExt, PromptArgs, QueryArgs, QueryHook,
    WrapperError,
};
use std::io::Write;

const ELI5_TASK: &str = "ELI5 the CONTENT. In other words, rephrase the CONTENT in a way that is easy to understand for a 5 year old.";

struct Eli5;

#[async_trait]
impl QueryHook for Eli5 {
    type State = ();

    async fn before(
        &self,
        underlying: &dyn LlmWrapper,
        args: Arguments,
    ) -> Result<(Arguments, ()), WrapperError> {
        let initial = underlying.response(args.clone()).await?;

        let mut prompt = PromptArgs::new();
        prompt.insert("CONTENT", initial);
        prompt.insert("TASK", ELI5_TASK);
        Ok((Arguments::new(prompt, args.api), ()))
    }
}

#[derive(Parser)]
#[command(about = "Explain anything like you're five")]
struct Cli {
    #[command(flatten)]
    provider: ProviderArgs,

    /// The question to ask and simplify
    #[arg(long, default_value = "How does modern photolithography exposure work?")]
    question: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let cli = Cli::parse();

    let eli5 = Decorator::new(cli.provider.wrapper()?, Eli5);
    let mut stream = eli5
        .query_stream(QueryArgs::new().arg("QUESTION", cli.question))
        .await?;

    let mut stdout = std::io::stdout();
    while let Some(chunk) = stream.next().await {
        write!(stdout, "{}", chunk?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}
