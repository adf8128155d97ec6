//! Document commands: upload, history, show, export.

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use console::style;

use crate::config::Settings;
use crate::export::DirectorySink;
use crate::models::DocumentStatus;
use crate::upload::UploadFile;
use crate::utils::{format_size, truncate};

use super::super::helpers::{
    api_client, open_session, print_thread, require_token, select_document, spinner,
    status_label,
};

/// Upload an image and print the extracted text.
pub async fn cmd_upload(settings: &Settings, file: &Path) -> anyhow::Result<()> {
    let upload = UploadFile::from_path(file).await?;
    let token = require_token(settings)?;
    let client = api_client(settings)?;

    let pb = spinner(format!(
        "Uploading {} ({})...",
        upload.file_name,
        format_size(upload.bytes.len() as u64)
    ));
    let result = client.upload(&token, &upload).await;
    pb.finish_and_clear();

    let document = result.map_err(|e| anyhow!(e.user_message("could not upload the image")))?;

    println!(
        "{} Uploaded {} ({})",
        style("✓").green(),
        document.file_name,
        document.id
    );

    match document.extracted_text.as_deref().filter(|t| !t.is_empty()) {
        Some(text) => {
            println!("\n{}", style("Extracted Text").bold());
            println!("{}", "-".repeat(60));
            println!("{}", text);
        }
        None => println!(
            "{} No text extracted (status: {})",
            style("!").yellow(),
            status_label(document.status)
        ),
    }

    Ok(())
}

/// List documents.
pub async fn cmd_history(
    settings: &Settings,
    format: &str,
    limit: usize,
    status: Option<&str>,
) -> anyhow::Result<()> {
    let status_filter = status
        .map(|s| {
            DocumentStatus::from_str(s).ok_or_else(|| {
                anyhow!(
                    "Unknown status: {} (expected pending, processed or failed)",
                    s
                )
            })
        })
        .transpose()?;

    let session = open_session(settings).await?;
    let state = session.snapshot();
    let limit = if limit == 0 { usize::MAX } else { limit };

    let documents: Vec<_> = state
        .documents()
        .iter()
        .filter(|d| status_filter.map_or(true, |s| d.status == s))
        .take(limit)
        .collect();

    if documents.is_empty() {
        println!("{} No documents found", style("!").yellow());
        return Ok(());
    }

    match format {
        "json" => {
            // Images are left out; use `export` to fetch them
            let output: Vec<_> = documents
                .iter()
                .map(|doc| {
                    serde_json::json!({
                        "id": doc.id,
                        "fileName": doc.file_name,
                        "createdAt": doc.created_at.to_rfc3339(),
                        "status": doc.status.as_str(),
                        "hasImage": doc.has_image(),
                        "extractedText": doc.extracted_text,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        "ids" => {
            // Just IDs (for piping)
            for doc in &documents {
                println!("{}", doc.id);
            }
        }
        _ => {
            println!(
                "\n{:<36}  {:<30}  {:<16}  {:<10}  Status",
                "ID", "File", "Created", "Text"
            );
            println!("{}", "-".repeat(110));

            for doc in &documents {
                let text = doc
                    .extracted_text
                    .as_deref()
                    .filter(|t| !t.is_empty())
                    .map(|t| format!("{} chars", t.chars().count()))
                    .unwrap_or_else(|| "-".to_string());

                println!(
                    "{:<36}  {:<30}  {:<16}  {:<10}  {}",
                    truncate(&doc.id, 36),
                    truncate(&doc.file_name, 30),
                    doc.created_at.format("%Y-%m-%d %H:%M"),
                    text,
                    status_label(doc.status)
                );
            }

            println!("\n{} documents", documents.len());
        }
    }

    Ok(())
}

/// Show a document's details, text and thread.
pub async fn cmd_show(settings: &Settings, reference: &str) -> anyhow::Result<()> {
    let session = open_session(settings).await?;
    let doc = select_document(&session, reference)?;

    println!("\n{}", style("Document Info").bold());
    println!("{}", "=".repeat(60));
    println!("{:<18} {}", "ID:", doc.id);
    println!("{:<18} {}", "File:", doc.file_name);
    println!("{:<18} {}", "Status:", status_label(doc.status));
    println!(
        "{:<18} {}",
        "Created:",
        doc.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "{:<18} {}",
        "Image:",
        if doc.has_image() { "yes" } else { "no" }
    );

    if let Some(text) = doc.extracted_text.as_deref().filter(|t| !t.is_empty()) {
        println!("\n{}", style("Extracted Text").bold());
        println!("{}", "-".repeat(60));
        println!("{}", text);
    }

    let pb = spinner("Loading questions...");
    let result = session.toggle_expanded(&doc.id).await;
    pb.finish_and_clear();
    if let Err(e) = result {
        tracing::debug!("Thread load failed: {}", e);
    }

    println!("\n{}", style("Questions").bold());
    println!("{}", "-".repeat(60));
    if let Some(thread) = session.snapshot().thread() {
        print_thread(thread);
    }

    Ok(())
}

/// Write a document's archive to disk.
pub async fn cmd_export(
    settings: &Settings,
    reference: &str,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let session = open_session(settings).await?;
    let doc = select_document(&session, reference)?;

    if !doc.has_image() && !doc.has_text() {
        println!(
            "{} {} has no image or text yet; the archive will be empty",
            style("!").yellow(),
            doc.file_name
        );
    }

    let sink = DirectorySink::new(out.unwrap_or_else(|| settings.export_dir.clone()));
    let path = session
        .export_document(&doc.id, &sink)
        .map_err(|e| anyhow!("Export to {} failed: {}", sink.dir().display(), e))?;

    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    println!(
        "{} Exported {} to {} ({})",
        style("✓").green(),
        doc.file_name,
        path.display(),
        format_size(size)
    );

    Ok(())
}
