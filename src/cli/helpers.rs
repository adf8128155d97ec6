//! Shared helper functions for CLI commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::ApiClient;
use crate::config::Settings;
use crate::models::{DocumentRecord, DocumentStatus, InteractionRecord};
use crate::session::{DocumentSession, InteractionThread, ListStatus, SessionError};
use crate::utils::{short_id, truncate};

/// Result of looking a document up by a user-supplied reference.
#[derive(Debug)]
pub enum DocumentMatch {
    Found(DocumentRecord),
    NotFound,
    Ambiguous(Vec<DocumentRecord>),
}

/// Build an HTTP client from settings.
pub fn api_client(settings: &Settings) -> anyhow::Result<ApiClient> {
    Ok(ApiClient::new(
        &settings.api_url,
        settings.timeout(),
        &settings.user_agent,
    )?)
}

/// Stored bearer token, or an error telling the user to log in.
pub fn require_token(settings: &Settings) -> anyhow::Result<String> {
    settings
        .load_token()
        .ok_or_else(|| anyhow!("Not logged in. Run 'scandesk login' first."))
}

/// Spinner with a message, cleared by the caller.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}")
    {
        pb.set_style(spinner_style);
    }
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Start a session for the logged-in user and load their documents.
pub async fn open_session(settings: &Settings) -> anyhow::Result<DocumentSession> {
    let token = require_token(settings)?;
    let session = DocumentSession::new(Arc::new(api_client(settings)?), &token);

    let pb = spinner("Loading documents...");
    let result = session.load_documents().await;
    pb.finish_and_clear();

    if let Err(e) = result {
        let message = match session.snapshot().list_status() {
            ListStatus::Failed(message) => message.clone(),
            _ => e.to_string(),
        };
        if matches!(&e, SessionError::Api(api) if api.status() == Some(401)) {
            bail!("{} (run 'scandesk login' to refresh your session)", message);
        }
        bail!("{}", message);
    }

    Ok(session)
}

/// Find a document by exact id, id prefix, or file name fragment.
pub fn find_document(documents: &[DocumentRecord], reference: &str) -> DocumentMatch {
    if let Some(doc) = documents.iter().find(|d| d.id == reference) {
        return DocumentMatch::Found(doc.clone());
    }

    let mut matches: Vec<_> = documents
        .iter()
        .filter(|d| d.matches_reference(reference))
        .cloned()
        .collect();

    match matches.len() {
        0 => DocumentMatch::NotFound,
        1 => DocumentMatch::Found(matches.swap_remove(0)),
        _ => DocumentMatch::Ambiguous(matches),
    }
}

/// Resolve a reference against the session's documents, listing candidates
/// when it is ambiguous.
pub fn select_document(
    session: &DocumentSession,
    reference: &str,
) -> anyhow::Result<DocumentRecord> {
    match find_document(session.snapshot().documents(), reference) {
        DocumentMatch::Found(doc) => Ok(doc),
        DocumentMatch::NotFound => bail!("Document not found: {}", reference),
        DocumentMatch::Ambiguous(matches) => {
            println!("{} Multiple matches found:", style("!").yellow());
            for d in &matches {
                println!("  {} - {}", short_id(&d.id), truncate(&d.file_name, 50));
            }
            bail!("Be more specific: {} matches {} documents", reference, matches.len())
        }
    }
}

/// Colored status label.
pub fn status_label(status: DocumentStatus) -> String {
    match status {
        DocumentStatus::Processed => style(status.as_str()).green().to_string(),
        DocumentStatus::Pending => style(status.as_str()).yellow().to_string(),
        DocumentStatus::Failed => style(status.as_str()).red().to_string(),
        DocumentStatus::Unknown => style(status.as_str()).dim().to_string(),
    }
}

/// Lines for one question and its answer.
fn interaction_lines(interaction: &InteractionRecord) -> Vec<String> {
    vec![
        format!(
            "{} {}",
            style(interaction.created_at.format("%Y-%m-%d %H:%M")).dim(),
            style(&interaction.query).bold()
        ),
        format!("{}\n", interaction.response),
    ]
}

/// Print one question and its answer.
pub fn print_interaction(interaction: &InteractionRecord) {
    for line in interaction_lines(interaction) {
        println!("{}", line);
    }
}

/// Lines for a thread, oldest first so the latest answer ends up at the bottom.
///
/// An error is shown above whatever history is still available.
pub fn thread_lines(thread: &InteractionThread) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(error) = thread.error() {
        lines.push(format!("{} {}", style("✗").red(), error));
    }

    if thread.interactions().is_empty() {
        if lines.is_empty() {
            lines.push(style("No questions asked yet").dim().to_string());
        }
        return lines;
    }

    for interaction in thread.interactions().iter().rev() {
        lines.extend(interaction_lines(interaction));
    }
    lines
}

pub fn print_thread(thread: &InteractionThread) {
    for line in thread_lines(thread) {
        println!("{}", line);
    }
}
