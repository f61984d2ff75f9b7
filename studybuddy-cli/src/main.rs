//! StudyBuddy CLI: terminal front end for the research-note workbench.
//!
//! Each subcommand maps to one workbench action.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// StudyBuddy: summarize, structure, compare and survey research notes
#[derive(Parser, Debug)]
#[command(name = "studybuddy", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Model name on the local model server (enables the model)
    #[arg(short, long)]
    model: Option<String>,

    /// Never call a model; use the deterministic strategies only
    #[arg(long, conflicts_with = "model")]
    offline: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the input text comes from. With none of these set, stdin is read.
#[derive(clap::Args, Debug, Clone, Default)]
pub(crate) struct InputArgs {
    /// Text to process
    text: Option<String>,

    /// Read the text from a file
    #[arg(short, long, conflicts_with_all = ["text", "page"])]
    file: Option<PathBuf>,

    /// Read a page snapshot (JSON with selection, main, body, title, url)
    #[arg(short, long, conflicts_with = "text")]
    page: Option<PathBuf>,

    /// Provenance tag: textbox, selection, page, pdf
    #[arg(short, long, default_value = "textbox")]
    source: String,

    /// Title to store with the result
    #[arg(long)]
    title: Option<String>,

    /// URL to store with the result
    #[arg(long)]
    url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Summarize text and save the summary
    Summarize {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Extract Objective/Method/Dataset/Results/Conclusion and save the record
    Structure {
        #[command(flatten)]
        input: InputArgs,
    },
    /// List saved items, newest first
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one saved item
    Show {
        /// Item id
        id: String,
        /// Print JSON instead of markdown
        #[arg(long)]
        json: bool,
    },
    /// Compare two or more saved items
    Compare {
        /// Item ids
        #[arg(required = true, num_args = 2..)]
        ids: Vec<String>,
        /// Print JSON instead of markdown
        #[arg(long)]
        json: bool,
    },
    /// Synthesize a literature survey over two or more saved items
    Survey {
        /// Item ids
        #[arg(required = true, num_args = 2..)]
        ids: Vec<String>,
        /// Save the survey as a new item
        #[arg(long)]
        save: bool,
        /// Also write the markdown to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Remove every saved item
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show model readiness and store location
    Status,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Create a default configuration file in the workspace
    Init,
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    // Human-readable layer for stderr
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "studybuddy", "studybuddy")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from(".studybuddy").join("logs"));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "studybuddy.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    tracing::debug!(workspace = %workspace.display(), "Resolved workspace");

    let overrides = commands::Overrides {
        model: cli.model,
        offline: cli.offline,
    };
    commands::handle_command(cli.command, &overrides, &workspace).await
}
