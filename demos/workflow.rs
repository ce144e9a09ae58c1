//! Multi-step question answering with parallel sub-queries
//!
//! Run: `cargo run --example workflow -- --provider groq --question "How do batteries work?"`

mod common;

use clap::Parser;
use common::{ProviderArgs, WorkflowQa};
use llm_wrappers::llm::{Decorator, LlmWrapperExt, QueryArgs};

#[derive(Parser)]
#[command(about = "Answer a question through a multi-step workflow")]
struct Cli {
    #[command(flatten)]
    provider: ProviderArgs,

    /// The question to answer
    #[arg(long, default_value = "How are computer chips made?")]
    question: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let cli = Cli::parse();

    let qa = Decorator::new(cli.provider.wrapper()?, WorkflowQa);
    let answer = qa
        .query_block("md", QueryArgs::new().arg("QUESTION", cli.question))
        .await?;

    println!("{answer}");
    Ok(())
}
