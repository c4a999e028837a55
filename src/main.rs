use std::process::ExitCode;

use bondlake::adapter::inbound::cli::command::{Cli, ColorChoice, Commands};
use bondlake::adapter::inbound::cli::output::{self, OutputConfig};
use bondlake::adapter::inbound::cli::{check, run, state};
use clap::Parser;

/// Exit code when the run finished but some stages failed.
const EXIT_STAGE_FAILED: u8 = 1;
/// Exit code when the command could not run at all.
const EXIT_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    output::configure(OutputConfig::new(cli.json, cli.quiet));
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {}
    }

    let result = match &cli.command {
        Commands::Run(args) => run::execute(args).await,
        Commands::State(args) => state::execute(args).map(|()| true),
        Commands::Check(args) => check::execute(&args.config).map(|()| true),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_STAGE_FAILED),
        Err(e) => {
            output::error(&e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}
