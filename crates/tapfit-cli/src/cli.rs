//! Command-line argument definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// TapFit Puck workout driver
#[derive(Debug, Parser)]
#[command(name = "tapfit", version, about)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a workout session against a real Puck over BLE
    Run(SessionArgs),
    /// Run a workout session against a simulated in-process Puck
    Simulate(SessionArgs),
}

#[derive(Debug, Args)]
pub struct SessionArgs {
    /// Sets per session
    #[arg(long, default_value_t = 4)]
    pub sets: u8,

    /// Rep target per set
    #[arg(long, default_value_t = 10)]
    pub reps: u8,

    /// Rest between sets, in seconds
    #[arg(long, default_value_t = 90)]
    pub rest: u32,

    /// Scan/connect timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub connect_timeout: u64,

    /// Record completed sets to this JSONL file
    #[arg(long)]
    pub out: Option<PathBuf>,
}
