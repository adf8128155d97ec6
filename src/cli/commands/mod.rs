//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod auth;
mod chat;
mod documents;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "scandesk")]
#[command(about = "Upload scanned images, read their text and ask questions about them")]
#[command(version)]
pub struct Cli {
    /// Backend URL (overrides config file and SCANDESK_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory holding the stored session token
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "SCANDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Log in and store the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SCANDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session token
    Logout,

    /// Upload an image for text extraction
    Upload {
        /// Image file to upload
        file: PathBuf,
    },

    /// List your documents
    History {
        /// Output format: table, json, ids
        #[arg(short, long, default_value = "table")]
        format: String,
        /// Limit number of results (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        limit: usize,
        /// Only show documents with this status (pending, processed, failed)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show a document's text and its questions
    Show {
        /// Document ID, ID prefix, or part of the file name
        document: String,
    },

    /// Ask a single question about a document
    Ask {
        /// Document ID, ID prefix, or part of the file name
        document: String,
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Ask questions interactively (/reload refreshes, /quit exits)
    Chat {
        /// Document ID, ID prefix, or part of the file name
        document: String,
    },

    /// Download a document's image and text as a zip archive
    Export {
        /// Document ID, ID prefix, or part of the file name
        document: String,
        /// Output directory (default: export_dir from config, else current directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (settings, _config) = load_settings_with_options(LoadOptions {
        config_path: cli.config,
        api_url: cli.api_url,
        data_dir: cli.data_dir,
    })
    .await;

    match cli.command {
        Commands::Register {
            name,
            email,
            password,
        } => auth::cmd_register(&settings, &name, &email, &password).await,
        Commands::Login { email, password } => auth::cmd_login(&settings, &email, &password).await,
        Commands::Logout => auth::cmd_logout(&settings),
        Commands::Upload { file } => documents::cmd_upload(&settings, &file).await,
        Commands::History {
            format,
            limit,
            status,
        } => documents::cmd_history(&settings, &format, limit, status.as_deref()).await,
        Commands::Show { document } => documents::cmd_show(&settings, &document).await,
        Commands::Ask { document, question } => {
            chat::cmd_ask(&settings, &document, &question.join(" ")).await
        }
        Commands::Chat { document } => chat::cmd_chat(&settings, &document).await,
        Commands::Export { document, out } => {
            documents::cmd_export(&settings, &document, out).await
        }
    }
}
