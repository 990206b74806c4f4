//! Mediasearch CLI - local perceptual fingerprinting and comparison.

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use mediasearch_core::fingerprint::DEFAULT_DIMENSIONS;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  3   Compared media are not alike (compare --check)
  64  Invalid input (unsupported URL scheme)
  65  Media could not be decoded or fingerprinted
  66  Input file missing or unreadable
  69  Remote media unavailable";

#[derive(Parser)]
#[command(name = "mediasearch")]
#[command(author, version, about = "Perceptual fingerprints for media files", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the dhash and phash fingerprints of an image
    Hash {
        /// Image path or file:/http:/https: URL
        #[arg(value_name = "SOURCE")]
        source: String,

        /// Bit dimensions to compute, comma-separated
        #[arg(short, long, value_delimiter = ',', default_values_t = DEFAULT_DIMENSIONS,
              value_parser = clap::value_parser!(u32).range(2..))]
        dims: Vec<u32>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Compare the fingerprints of two images
    Compare {
        /// First image path or URL
        #[arg(value_name = "A")]
        a: String,

        /// Second image path or URL
        #[arg(value_name = "B")]
        b: String,

        /// Bit dimensions to compare, comma-separated
        #[arg(short, long, value_delimiter = ',', default_values_t = DEFAULT_DIMENSIONS,
              value_parser = clap::value_parser!(u32).range(2..))]
        dims: Vec<u32>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Exit with code 3 when the images are not alike
        #[arg(long)]
        check: bool,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Hash { source, dims, json } => commands::hash::execute(source, dims, json).await,
        Commands::Compare {
            a,
            b,
            dims,
            json,
            check,
        } => commands::compare::execute(a, b, dims, json, check).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit = match run(cli).await {
        Ok(exit) => exit,
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {message}", "error:".red().bold());
    }
    std::process::exit(exit.code);
}
