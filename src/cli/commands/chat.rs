//! Question commands: one-shot `ask` and the interactive `chat` loop.

use std::io::Write;

use anyhow::bail;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::Settings;
use crate::session::{DocumentSession, SessionError, SubmitOutcome};

use super::super::helpers::{open_session, print_interaction, print_thread, select_document, spinner};

/// Submit one question and print the outcome. Returns the error text on failure.
async fn ask_once(
    session: &DocumentSession,
    document_id: &str,
    question: &str,
) -> Result<(), String> {
    let pb = spinner("Waiting for the answer...");
    let result = session.submit_question(document_id, question).await;
    pb.finish_and_clear();

    match result {
        Ok(SubmitOutcome::Answered(interaction)) => {
            print_interaction(&interaction);
            Ok(())
        }
        Ok(SubmitOutcome::Ignored) | Ok(SubmitOutcome::Discarded) => Ok(()),
        Err(SessionError::Validation(message)) => Err(message),
        Err(e) => Err(session
            .snapshot()
            .thread()
            .and_then(|t| t.error().map(str::to_string))
            .unwrap_or_else(|| e.to_string())),
    }
}

/// Ask a single question about a document.
pub async fn cmd_ask(settings: &Settings, reference: &str, question: &str) -> anyhow::Result<()> {
    let session = open_session(settings).await?;
    let doc = select_document(&session, reference)?;

    // A failed history load does not prevent asking.
    if let Err(e) = session.toggle_expanded(&doc.id).await {
        tracing::debug!("Thread load failed: {}", e);
    }

    if let Err(message) = ask_once(&session, &doc.id, question).await {
        bail!("{}", message);
    }
    Ok(())
}

/// Ask questions about a document, one per line of input.
pub async fn cmd_chat(settings: &Settings, reference: &str) -> anyhow::Result<()> {
    let session = open_session(settings).await?;
    let doc = select_document(&session, reference)?;

    let pb = spinner("Loading questions...");
    let result = session.toggle_expanded(&doc.id).await;
    pb.finish_and_clear();
    if let Err(e) = result {
        tracing::debug!("Thread load failed: {}", e);
    }

    println!(
        "{} {}",
        style("Chatting about").bold(),
        style(&doc.file_name).cyan()
    );
    println!("{}", style("Type a question, /reload to refresh, /quit to exit").dim());
    println!("{}", "-".repeat(60));
    if let Some(thread) = session.snapshot().thread() {
        print_thread(thread);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", style(">").cyan());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "/quit" | "/exit" => break,
            "/reload" => {
                if let Err(e) = session.load_thread(&doc.id).await {
                    tracing::debug!("Reload failed: {}", e);
                }
                if let Some(thread) = session.snapshot().thread() {
                    print_thread(thread);
                }
            }
            "" => continue,
            question => {
                if let Err(message) = ask_once(&session, &doc.id, question).await {
                    println!("{} {}", style("✗").red(), message);
                }
            }
        }
    }

    session.end();
    Ok(())
}
