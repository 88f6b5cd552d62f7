use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use skyquery_core::{Llm, ProgressManager, TracingProgressHandler};
use skyquery_llm::{AnthropicClient, OpenAiCompatibleClient, ProviderKind};
use skyquery_memory::WindowedSessionStore;
use skyquery_pipeline::{Assistant, FollowUpGenerator, LlmSqlGenerator, QueryPipeline};

use crate::cli::AssistantArgs;

pub(crate) fn build_llm(args: &AssistantArgs) -> anyhow::Result<Arc<dyn Llm>> {
    let provider: ProviderKind = args.provider.parse()?;
    let timeout = Duration::from_secs(args.llm_timeout_secs);

    let llm: Arc<dyn Llm> = match provider {
        ProviderKind::Anthropic => {
            let mut builder = AnthropicClient::builder()
                .api_key_from_env(provider.api_key_var())
                .timeout(timeout);
            if let Some(url) = &args.llm_base_url {
                builder = builder.base_url(url);
            }
            if let Some(model) = &args.model {
                builder = builder.default_model(model);
            }
            Arc::new(builder.build().with_context(|| {
                format!("set {} to use the {provider} provider", provider.api_key_var())
            })?)
        }
        ProviderKind::OpenAi => {
            let mut builder = OpenAiCompatibleClient::builder()
                .api_key_from_env(provider.api_key_var())
                .timeout(timeout);
            if let Some(url) = &args.llm_base_url {
                builder = builder.base_url(url);
            }
            if let Some(model) = &args.model {
                builder = builder.default_model(model);
            }
            Arc::new(builder.build().with_context(|| {
                format!("set {} or point --llm-base-url at a keyless server", provider.api_key_var())
            })?)
        }
    };
    tracing::info!(%provider, "language model client ready");
    Ok(llm)
}

/// Wires the LLM client, the executor and a windowed session store into an
/// [`Assistant`]. Progress events go to `progress` and to the log.
pub(crate) fn build_assistant(
    args: &AssistantArgs,
    database_url: &str,
    progress: ProgressManager,
) -> anyhow::Result<Assistant> {
    if args.history_window == 0 {
        bail!("--history-window must be at least 1");
    }

    let llm = build_llm(args)?;
    let executor = skyquery_sql::connect_executor(database_url, args.max_connections)
        .with_context(|| format!("cannot use database {database_url}"))?;

    let progress = progress.with_handler(Arc::new(TracingProgressHandler));
    let pipeline = QueryPipeline::builder()
        .generator(Arc::new(LlmSqlGenerator::new(llm.clone())))
        .executor(executor)
        .sessions(Arc::new(WindowedSessionStore::new(args.history_window)))
        .progress(progress)
        .row_cap(args.row_cap)
        .build()?;

    let assistant = Assistant::new(pipeline);
    Ok(if args.no_follow_ups {
        assistant
    } else {
        assistant.with_follow_ups(FollowUpGenerator::new(llm))
    })
}
