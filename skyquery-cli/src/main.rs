//! `skyquery`: serve the chat API, ask one question, chat in a REPL, or load
//! the flight dataset.
//!
//! Configuration comes from flags, the environment and a `.env` file. Set
//! `RUST_LOG` to change verbosity (default `info,skyquery=debug`).

mod app;
mod cli;
mod repl;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use skyquery_core::ProgressManager;
use skyquery_server::{AppState, ProgressLog};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,skyquery=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match cli.command {
        Command::Serve { bind, assistant } => {
            let progress = ProgressLog::new();
            let handlers = ProgressManager::noop().with_handler(Arc::new(progress.clone()));
            let assistant = app::build_assistant(&assistant, &cli.database_url, handlers)?;
            skyquery_server::serve(bind, AppState::new(assistant, progress))
                .await
                .with_context(|| format!("server on {bind} failed"))
        }
        Command::Ask {
            question,
            session_id,
            assistant,
        } => {
            let assistant =
                app::build_assistant(&assistant, &cli.database_url, ProgressManager::noop())?;
            match assistant.ask(&question, session_id.as_deref()).await {
                Ok(reply) => {
                    println!("{}", serde_json::to_string_pretty(&reply)?);
                    Ok(())
                }
                Err(failure) => {
                    if let Some(sql) = &failure.sql_query {
                        eprintln!("last SQL attempted: {sql}");
                    }
                    Err(failure.into())
                }
            }
        }
        Command::Chat {
            session_id,
            assistant,
        } => {
            let assistant =
                app::build_assistant(&assistant, &cli.database_url, ProgressManager::noop())?;
            repl::run(assistant, session_id).await
        }
        Command::Import { data_dir } => {
            let report = skyquery_sql::import_dataset(&cli.database_url, &data_dir)
                .await
                .with_context(|| format!("import from {} failed", data_dir.display()))?;
            for table in &report.tables {
                println!("{:<10} {:>8} rows", table.table, table.rows);
            }
            println!("{:<10} {:>8} rows", "total", report.total_rows());
            Ok(())
        }
    }
}
