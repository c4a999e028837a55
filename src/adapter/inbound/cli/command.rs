//! Command-line interface definitions.
//!
//! Defines the CLI structure for bondlake using `clap`: running the pipeline,
//! inspecting processing state and validating configuration.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::source::SourceKind;

/// Incremental ETL for bond reference, holdings, dealer runs and G-spreads
#[derive(Parser, Debug)]
#[command(name = "bondlake")]
#[command(version)]
pub struct Cli {
    /// Color output mode [auto, always, never]
    #[arg(
        long,
        global = true,
        default_value = "auto",
        hide_possible_values = true
    )]
    pub color: ColorChoice,

    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Color output mode for terminal rendering.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect automatically
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest new and modified files, then refresh the analytics tables
    Run(RunArgs),

    /// Show or reset the stored file fingerprints
    State(StateArgs),

    /// Validate a configuration file
    Check(ConfigPathArg),
}

/// Path to the configuration file.
#[derive(Args, Debug, Clone)]
pub struct ConfigPathArg {
    /// Configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}

fn parse_source(raw: &str) -> Result<SourceKind, String> {
    raw.parse()
}

/// Arguments for `bondlake run`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigPathArg,

    /// Only run these sources (comma separated)
    #[arg(long, value_delimiter = ',', value_parser = parse_source)]
    pub sources: Vec<SourceKind>,

    /// Reprocess every file and rebuild the tables from scratch
    #[arg(long)]
    pub force_full_refresh: bool,

    /// Parse files on the worker pool even if disabled in the configuration
    #[arg(long)]
    pub parallel: bool,

    /// Rows per load transaction, for every source
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: Option<u32>,

    /// Parse, merge and deduplicate without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for `bondlake state`.
#[derive(Args, Debug, Clone)]
pub struct StateArgs {
    #[command(flatten)]
    pub config: ConfigPathArg,

    /// Only this source
    #[arg(long, value_parser = parse_source)]
    pub source: Option<SourceKind>,

    /// Forget the stored fingerprints so the next run reprocesses every file
    #[arg(long, requires = "source")]
    pub reset: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "bondlake",
            "run",
            "--config",
            "etl.toml",
            "--sources",
            "runs,g-spread",
            "--force-full-refresh",
            "--batch-size",
            "500",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config.config, PathBuf::from("etl.toml"));
        assert_eq!(args.sources, vec![SourceKind::Runs, SourceKind::GSpread]);
        assert!(args.force_full_refresh);
        assert_eq!(args.batch_size, Some(500));
        assert!(!args.dry_run);
    }

    #[test]
    fn unknown_source_is_rejected() {
        assert!(Cli::try_parse_from(["bondlake", "run", "--sources", "trades"]).is_err());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(Cli::try_parse_from(["bondlake", "run", "--batch-size", "0"]).is_err());
    }

    #[test]
    fn reset_requires_source() {
        assert!(Cli::try_parse_from(["bondlake", "state", "--reset"]).is_err());
        assert!(Cli::try_parse_from(["bondlake", "state", "--reset", "--source", "runs"]).is_ok());
    }
}
