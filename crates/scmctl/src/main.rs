use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd_check;
mod cmd_dump;
mod common;

#[derive(Parser, Debug)]
#[command(name = "scmctl", version, about = "Station configuration CLI")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Output JSON where applicable
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Verify a configuration file: sections, checksums, error counts
    Check { file: PathBuf },
    /// Print the parsed records and routing tables
    Dump {
        file: PathBuf,
        /// Limit output to the channel chain and dispatch tables
        #[arg(long)]
        routing: bool,
    },
}

fn main() -> Result<()> {
    let Cli { verbose, json, cmd } = Cli::parse();

    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| level.into()),
        ))
        .with_target(false)
        .init();

    match cmd {
        Cmd::Check { file } => cmd_check::run(&file, json)?,
        Cmd::Dump { file, routing } => cmd_dump::run(&file, routing, json)?,
    }
    Ok(())
}
