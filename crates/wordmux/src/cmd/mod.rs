use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a loopback session through both engines and verify it.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Simulate(args) => simulate::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of logical channels.
    #[arg(long, default_value = "2")]
    pub channels: u8,
    /// Payload words sent per channel.
    #[arg(long, default_value = "256")]
    pub words: usize,
    /// Shared link capacity, in words.
    #[arg(long, default_value = "4")]
    pub link_capacity: usize,
    /// Per-channel queue capacity, in words.
    #[arg(long, default_value = "8")]
    pub queue_capacity: usize,
    /// Egress words drained per channel before rotating.
    #[arg(long, default_value = "32")]
    pub batch_size: usize,
    /// RNG seed for reproducible payloads.
    #[arg(long, default_value = "1")]
    pub seed: u64,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
