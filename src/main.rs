//! clipfx CLI - offline audio clip effects
//!
//! Command-line interface for the clipfx effects pipeline.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::debug;

use clipfx::cli::commands;
use clipfx::cli::{Cli, Commands};
use clipfx::ClipFxError;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    debug!("clipfx v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd).map_err(|err| {
            if let Some(clip_err) = err.downcast_ref::<ClipFxError>() {
                for suggestion in clip_err.recovery_suggestions() {
                    eprintln!("hint: {}", suggestion);
                }
            }
            err
        }),
        None => {
            println!("clipfx v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Info { input, json } => commands::show_info(&input, json)
            .with_context(|| format!("Failed to read {}", input.display())),
        Commands::Apply {
            input,
            output,
            format,
            recipe,
            effects,
        } => commands::apply(&input, &output, format, recipe.as_deref(), &effects)
            .with_context(|| format!("Failed to process {}", input.display())),
        Commands::Analyze {
            input,
            json,
            max_points,
        } => commands::analyze(&input, json, max_points)
            .with_context(|| format!("Failed to analyze {}", input.display())),
        Commands::Convert { input, output } => commands::convert(&input, &output)
            .with_context(|| format!("Failed to convert {}", input.display())),
        Commands::RecipeTemplate => commands::recipe_template().context("Failed to print recipe"),
    }
}
