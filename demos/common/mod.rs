//! Pieces shared by the demo programs

#![allow(dead_code)]

use async_trait::async_trait;
use clap::Args;
use llm_wrappers::llm::{
    create_backend, wrapper_from_backend, Arguments, BackendChat, BackendError, ChatBackend,
    LlmWrapper, LlmWrapperExt, PromptArgs, Provider, QueryArgs, QueryHook, WrapperError,
};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

/// Which hosted model to talk to
#[derive(Args, Debug)]
pub struct ProviderArgs {
    /// openai, cerebras or groq
    #[arg(long, default_value = "openai")]
    pub provider: Provider,

    /// Model identifier (defaults to the provider's recommended model)
    #[arg(long)]
    pub model: Option<String>,
}

impl ProviderArgs {
    /// Leaf wrapper for the selected provider; the API key comes from the environment
    pub fn wrapper(&self) -> Result<BackendChat<Box<dyn ChatBackend>>, BackendError> {
        let backend = create_backend(self.provider, self.model.clone())?;
        Ok(wrapper_from_backend(backend))
    }
}

/// Load `.env` and install a log subscriber honoring `RUST_LOG`
pub fn init() {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).init();
}

const LEVEL_TASK: &str = "Analyze the question posed by the user in the USER_ARGS. \
Infer the user's knowledge level based on the request, and provide a statement of that level.";

const POINTS_TASK: &str = "Analyze the question posed by the user in the USER_ARGS. \
Identify the key points that need to be covered to answer the question, and provide a list of those key points.";

const ANSWER_TASK: &str = "Analyze the question posed by the user in the USER_ARGS. \
Provide a comprehensive response to the question posed by the user in USER_ARGS. \
The response should be tailored to the KNOWLEDGE_LEVEL of the user. \
The response should cover the KEY_POINTS that are relevant to the question.";

/// Question answering in three steps
///
/// The user's knowledge level and the key points to cover are worked out
/// concurrently, then both feed the final query.
pub struct WorkflowQa;

async fn analyze(
    underlying: &dyn LlmWrapper,
    user_args: &Value,
    task: &str,
) -> Result<String, WrapperError> {
    underlying
        .query_block(
            "text",
            QueryArgs::new()
                .arg("USER_ARGS", user_args.clone())
                .arg("TASK", task),
        )
        .await
}

#[async_trait]
impl QueryHook for WorkflowQa {
    type State = ();

    async fn before(
        &self,
        underlying: &dyn LlmWrapper,
        args: Arguments,
    ) -> Result<(Arguments, ()), WrapperError> {
        let user_args = Value::Object(args.prompt.as_map().clone());
        let (knowledge_level, key_points) = futures::join!(
            analyze(underlying, &user_args, LEVEL_TASK),
            analyze(underlying, &user_args, POINTS_TASK),
        );

        let mut prompt = PromptArgs::new();
        prompt.insert("KNOWLEDGE_LEVEL", knowledge_level?);
        prompt.insert("KEY_POINTS", key_points?);
        prompt.insert("USER_ARGS", user_args);
        prompt.insert("TASK", ANSWER_TASK);
        Ok((Arguments::new(prompt, args.api), ()))
    }
}
