//! # docpress CLI
//!
//! Command-line interface for the docpress blog publisher.

mod commands;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docpress")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "docpress.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Reference time for the publish filter (RFC 3339 or YYYY-MM-DD)
    #[arg(long, global = true, env = "DOCPRESS_NOW")]
    now: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new docpress project
    Init {
        /// Target directory (defaults to current directory)
        path: Option<PathBuf>,
    },

    /// Render published documents, the index page and report.json
    Build,

    /// Run the pipeline without writing output and print the report
    Check {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,

        /// Exit with an error when any document failed to load or parse
        #[arg(long)]
        strict: bool,
    },
}

fn parse_now(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    docpress_core::frontmatter::parse_date(raw)
        .with_context(|| format!("Invalid --now value '{}'", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let now = match cli.now.as_deref() {
        Some(raw) => parse_now(raw)?,
        None => Utc::now(),
    };

    match cli.command {
        Commands::Init { path } => commands::init_project(path.as_deref()),
        Commands::Build => commands::build_site(&cli.config, now).await,
        Commands::Check { json, strict } => {
            commands::check_site(&cli.config, now, json, strict).await
        }
    }
}
