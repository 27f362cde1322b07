//! ESI CLI - Command line tool for ESI edge assembly.
//!
//! Commands:
//! - `esi parse` - Parse an include tag and show the directive
//! - `esi check` - Validate a configuration and list its scopes
//! - `esi assemble` - Assemble a page file through the configured scopes

mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{AssembleArgs, ParseArgs};

/// ESI CLI - Inspect directives and assemble pages
#[derive(Parser)]
#[command(name = "esi")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an include tag
    Parse(ParseArgs),

    /// Validate the configuration and list its scopes
    Check,

    /// Assemble a page file
    Assemble(AssembleArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let output = output::Output::new(cli.verbose, cli.json);
    let ctx = context::Context::load(cli.config.as_deref(), output)?;

    let result = match cli.command {
        Commands::Parse(args) => commands::parse::run(args, &ctx).await,
        Commands::Check => commands::check::run(&ctx).await,
        Commands::Assemble(args) => commands::assemble::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
