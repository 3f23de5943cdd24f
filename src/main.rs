mod cli;
mod commands;
mod config;
mod progress;
mod runner;
mod tree_view;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::Config;
use std::io;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub json: bool,
    pub config: Config,
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

    // Commands that must work without a readable config file
    let command = match cli.command {
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "shrnk", &mut io::stdout());
            return Ok(());
        }
        Command::Config(cmd) => {
            return commands::config::run(cmd, cli.api_base.as_deref(), cli.json);
        }
        command => command,
    };

    let ctx = Context {
        quiet: cli.quiet,
        json: cli.json,
        config: Config::load()?.with_base_url_override(cli.api_base.as_deref()),
    };

    match command {
        Command::Zip(args) => commands::archive::zip(&ctx, args),
        Command::Unzip(args) => commands::archive::unzip(&ctx, args),
        Command::Peek(args) => commands::archive::peek(&ctx, args),
        Command::Resize(args) => commands::image::resize(&ctx, args),
        Command::Strip(args) => commands::image::strip(&ctx, args),
        Command::Download(args) => commands::download::run(&ctx, args),
        Command::Config(_) | Command::Completions { .. } => Ok(()),
    }
}
