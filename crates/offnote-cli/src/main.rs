//! Offnote CLI - offline-first notes with an encrypted local mirror
//!
//! Command-line front end for `offnote-core`: manages the encrypted note
//! mirror, drives the request cache and handles encrypted backups.

mod app;
mod cli;
mod commands;
mod config;
mod output;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use app::AppContext;
use cli::{Cli, Commands};
use commands::backup::handle_backup;
use commands::cache::handle_cache;
use commands::init::handle_init;
use commands::notes::handle_notes;

const DEFAULT_LOG_LEVEL: &str = "warn";

/// Log to stderr. `RUST_LOG` wins over `[logging] level` in the config.
fn init_tracing(ctx: &AppContext) {
    let configured = ctx
        .config()
        .ok()
        .and_then(|config| config.logging.level.clone())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&configured));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let ctx = AppContext::new(&cli);
    init_tracing(&ctx);

    match &cli.command {
        Some(Commands::Init(args)) => handle_init(&ctx, args),
        Some(Commands::Notes { command }) => handle_notes(&ctx, command),
        Some(Commands::Cache { command }) => handle_cache(&ctx, command),
        Some(Commands::Backup { command }) => handle_backup(&ctx, command),
        Some(Commands::Completions(args)) => {
            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "offnote", &mut std::io::stdout());
            Ok(())
        }
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}
