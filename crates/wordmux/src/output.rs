use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
pub struct ChannelReport {
    pub channel: u8,
    pub words: usize,
    pub escapes: usize,
}

#[derive(Serialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub channels: usize,
    pub words_per_channel: usize,
    pub link_capacity: usize,
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub iterations: usize,
    pub per_channel: Vec<ChannelReport>,
}

pub fn print_report(report: &SimulationReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "WORDS", "ESCAPES"]);
            for ch in &report.per_channel {
                table.add_row(vec![
                    ch.channel.to_string(),
                    ch.words.to_string(),
                    ch.escapes.to_string(),
                ]);
            }
            println!("{table}");
            println!(
                "seed={} link_capacity={} queue_capacity={} batch_size={} iterations={}",
                report.seed,
                report.link_capacity,
                report.queue_capacity,
                report.batch_size,
                report.iterations
            );
        }
        OutputFormat::Pretty => {
            for ch in &report.per_channel {
                println!(
                    "channel={} words={} escapes={}",
                    ch.channel, ch.words, ch.escapes
                );
            }
            println!(
                "seed={} iterations={} (link_capacity={}, queue_capacity={}, batch_size={})",
                report.seed,
                report.iterations,
                report.link_capacity,
                report.queue_capacity,
                report.batch_size
            );
        }
    }
}
