use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "skyquery", version)]
#[command(about = "Ask questions about NYC flights in plain English; answers come back as SQL and rows.")]
pub(crate) struct Cli {
    /// sqlite:<path> or postgres://... connection string.
    #[arg(
        long,
        global = true,
        env = "SKYQUERY_DATABASE_URL",
        default_value = "sqlite:nycflights13.db"
    )]
    pub(crate) database_url: String,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Run the HTTP API (POST /chat, POST /clear-session, GET /progress, GET /health).
    Serve {
        #[arg(long, env = "SKYQUERY_BIND_ADDR", default_value = "127.0.0.1:5001")]
        bind: SocketAddr,

        #[command(flatten)]
        assistant: AssistantArgs,
    },
    /// Answer one question and print the reply as JSON.
    Ask {
        question: String,

        #[arg(long)]
        session_id: Option<String>,

        #[command(flatten)]
        assistant: AssistantArgs,
    },
    /// Interactive session. `:clear` forgets the conversation, `:quit` exits.
    Chat {
        #[arg(long)]
        session_id: Option<String>,

        #[command(flatten)]
        assistant: AssistantArgs,
    },
    /// Recreate the flight tables from airlines.csv, airports.csv, planes.csv,
    /// weather.csv and flights.csv in DATA_DIR.
    Import { data_dir: PathBuf },
}

#[derive(Clone, Debug, Args)]
pub(crate) struct AssistantArgs {
    /// anthropic or openai. The key is read from ANTHROPIC_API_KEY or OPENAI_API_KEY.
    #[arg(long, env = "SKYQUERY_LLM_PROVIDER", default_value = "anthropic")]
    pub(crate) provider: String,

    /// Overrides the provider's API base URL (e.g. a local OpenAI-compatible server).
    #[arg(long, env = "SKYQUERY_LLM_BASE_URL")]
    pub(crate) llm_base_url: Option<String>,

    #[arg(long, env = "SKYQUERY_MODEL")]
    pub(crate) model: Option<String>,

    #[arg(long, env = "SKYQUERY_LLM_TIMEOUT_SECS", default_value_t = 60)]
    pub(crate) llm_timeout_secs: u64,

    /// Conversation turns kept per session.
    #[arg(long, env = "SKYQUERY_HISTORY_WINDOW", default_value_t = skyquery_memory::DEFAULT_HISTORY_WINDOW)]
    pub(crate) history_window: usize,

    /// Rows returned per answer; the full count is still reported.
    #[arg(long, env = "SKYQUERY_ROW_CAP", default_value_t = skyquery_sql::DEFAULT_ROW_CAP)]
    pub(crate) row_cap: usize,

    #[arg(long, env = "SKYQUERY_MAX_CONNECTIONS", default_value_t = 5)]
    pub(crate) max_connections: u32,

    /// Skip the extra model call that suggests follow-up questions.
    #[arg(long)]
    pub(crate) no_follow_ups: bool,
}
