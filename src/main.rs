mod cli;
mod commands;
mod config;
mod engine;
mod manifest;
mod paths;
mod progress;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, StateCommand};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    /// Desired-state manifest
    pub manifest: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        quiet: cli.quiet,
        manifest: paths::expand(&cli.manifest.to_string_lossy()),
    };

    match cli.command {
        Command::Plan(args) => commands::plan::plan(&ctx, &args),
        Command::Apply(args) => commands::plan::apply(&ctx, &args),
        Command::Refresh(args) => commands::plan::refresh(&ctx, &args),
        Command::Import {
            address,
            cluster_id,
        } => commands::cluster::import(&ctx, &address, &cluster_id),
        Command::Lookup { cluster_id, json } => commands::cluster::lookup(&ctx, &cluster_id, json),
        Command::Destroy { address, yes } => commands::cluster::destroy(&ctx, &address, yes),
        Command::State(cmd) => match cmd {
            StateCommand::List => commands::state::list(&ctx),
            StateCommand::Show {
                address,
                show_secrets,
            } => commands::state::show(&address, show_secrets),
        },
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "tscloud", &mut io::stdout());
            Ok(())
        }
    }
}
