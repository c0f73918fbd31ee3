mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "wordmux", version, about = "Channel-multiplexed word link harness")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simulate_subcommand() {
        let cli = Cli::try_parse_from([
            "wordmux",
            "simulate",
            "--channels",
            "4",
            "--words",
            "128",
            "--seed",
            "7",
        ])
        .expect("simulate args should parse");

        assert!(matches!(cli.command, Command::Simulate(_)));
    }

    #[test]
    fn simulate_defaults_are_usable() {
        let cli = Cli::try_parse_from(["wordmux", "simulate"]).expect("defaults should parse");
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.channels, 2);
        assert!(args.words > 0);
        assert!(args.link_capacity > 0);
    }

    #[test]
    fn parses_version_subcommand() {
        let cli = Cli::try_parse_from(["wordmux", "version", "--extended"])
            .expect("version args should parse");
        assert!(matches!(cli.command, Command::Version(_)));
    }
}
