use std::fmt::Write as _;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;
use skyquery_pipeline::{Assistant, ChatReply};

/// Rows printed per answer in the interactive view.
const DISPLAY_ROWS: usize = 20;
const MAX_CELL_WIDTH: usize = 32;

pub(crate) async fn run(assistant: Assistant, session_id: Option<String>) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;
    let mut session_id = session_id;
    println!("Ask about NYC flights. :clear forgets the conversation, :quit exits.");

    loop {
        let line = match editor.readline("skyquery> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(input);

        match input {
            ":quit" | ":q" => break,
            ":clear" => {
                if let Some(id) = &session_id {
                    assistant.clear_session(id).await?;
                }
                println!("Conversation cleared.");
                continue;
            }
            _ => {}
        }

        match assistant.ask(input, session_id.as_deref()).await {
            Ok(reply) => {
                session_id = Some(reply.session_id.clone());
                print!("{}", render_reply(&reply));
            }
            Err(failure) => {
                session_id = Some(failure.session_id.clone());
                eprintln!("error: {}", failure.error);
                if let Some(sql) = &failure.sql_query {
                    eprintln!("last SQL attempted:\n  {sql}");
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn render_reply(reply: &ChatReply) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nSQL:\n  {}\n", reply.sql_query);

    if reply.rows.is_empty() {
        let _ = writeln!(out, "(no rows)");
    } else {
        let _ = writeln!(out, "{}", reply.column_names.join(" | "));
        for row in reply.rows.iter().take(DISPLAY_ROWS) {
            let cells: Vec<String> = reply
                .column_names
                .iter()
                .map(|name| render_cell(row.get(name).unwrap_or(&Value::Null)))
                .collect();
            let _ = writeln!(out, "{}", cells.join(" | "));
        }
        let shown = reply.rows.len().min(DISPLAY_ROWS);
        if reply.row_count > shown {
            let _ = writeln!(out, "... {shown} of {} rows shown", reply.row_count);
        }
    }

    if let Some(chart) = &reply.chart {
        let _ = writeln!(out, "\nSuggested chart: {:?} ({})", chart.kind, chart.title);
    }
    if !reply.follow_up_questions.is_empty() {
        let _ = writeln!(out, "\nYou could also ask:");
        for question in &reply.follow_up_questions {
            let _ = writeln!(out, "  - {question}");
        }
    }
    out.push('\n');
    out
}

fn render_cell(value: &Value) -> String {
    let text = match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match text.char_indices().nth(MAX_CELL_WIDTH) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text,
    }
}
