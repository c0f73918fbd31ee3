use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use wordmux_frame::{Demultiplexer, Multiplexer, MuxConfig, CONTROL_WORD};
use wordmux_link::{word_channel, Word, WordQueue, WordSink, WordSource};

use crate::cmd::SimulateArgs;
use crate::exit::{frame_error, CliError, CliResult, DATA_INVALID, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_report, ChannelReport, OutputFormat, SimulationReport};

/// Consecutive iterations without countable progress before the run is
/// declared stuck. Select frames and escape pairs move words across the
/// link without raising any per-channel counter, so a couple of quiet
/// iterations are normal.
const STALL_THRESHOLD: usize = 8;

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let config = MuxConfig {
        channel_count: args.channels as usize,
        batch_size: args.batch_size,
        ..MuxConfig::default()
    };
    config.validate().map_err(|e| frame_error("simulate", e))?;
    if args.link_capacity == 0 || args.queue_capacity == 0 {
        return Err(CliError::new(
            USAGE,
            "simulate: link and queue capacities must be at least 1",
        ));
    }

    let channel_count = args.channels as usize;
    let mut rng = StdRng::seed_from_u64(args.seed);
    let payloads: Vec<Vec<Word>> = (0..channel_count)
        .map(|_| {
            (0..args.words)
                .map(|_| rng.gen_range(0..=0xFFFFu32))
                .collect()
        })
        .collect();

    info!(
        channels = channel_count,
        words = args.words,
        link_capacity = args.link_capacity,
        seed = args.seed,
        "starting loopback session"
    );

    let (tx, rx) = word_channel(args.link_capacity);
    let mut mux =
        Multiplexer::with_config(tx, config).map_err(|e| frame_error("simulate", e))?;
    let mut demux =
        Demultiplexer::with_config(rx, config).map_err(|e| frame_error("simulate", e))?;

    let mut sources: Vec<WordQueue> = (0..channel_count)
        .map(|_| WordQueue::new(args.queue_capacity))
        .collect();
    let mut sinks: Vec<WordQueue> = (0..channel_count)
        .map(|_| WordQueue::new(args.queue_capacity))
        .collect();

    let total = channel_count * args.words;
    let mut produced = vec![0usize; channel_count];
    let mut verified = vec![0usize; channel_count];
    let mut verified_total = 0;
    let mut iterations = 0;
    let mut quiet_iterations = 0;

    while verified_total < total {
        let mut progress = false;

        // Producers: stage words into the bounded egress queues.
        for (ch, q) in sources.iter_mut().enumerate() {
            while produced[ch] < args.words && q.try_push(payloads[ch][produced[ch]]) {
                produced[ch] += 1;
                progress = true;
            }
        }

        let sent = mux.pump(&mut sources).map_err(|e| frame_error("egress", e))?;
        let routed = demux.pump(&mut sinks).map_err(|e| frame_error("ingress", e))?;
        progress |= sent > 0 || routed > 0;

        // Consumers: verify per-channel order and content.
        for (ch, q) in sinks.iter_mut().enumerate() {
            while let Some(word) = q.try_pop() {
                if verified[ch] >= args.words {
                    return Err(CliError::new(
                        DATA_INVALID,
                        format!("channel {ch}: unexpected extra word 0x{word:04x}"),
                    ));
                }
                let expected = payloads[ch][verified[ch]];
                if word != expected {
                    return Err(CliError::new(
                        DATA_INVALID,
                        format!(
                            "channel {ch}: expected 0x{expected:04x}, got 0x{word:04x} at word {}",
                            verified[ch]
                        ),
                    ));
                }
                verified[ch] += 1;
                verified_total += 1;
                progress = true;
            }
        }

        iterations += 1;
        if progress {
            quiet_iterations = 0;
        } else {
            quiet_iterations += 1;
            if quiet_iterations >= STALL_THRESHOLD {
                return Err(CliError::new(
                    INTERNAL,
                    format!("simulate: no progress after {verified_total}/{total} words"),
                ));
            }
        }
    }

    debug!(iterations, "loopback session complete");

    let per_channel = payloads
        .iter()
        .enumerate()
        .map(|(ch, words)| ChannelReport {
            channel: ch as u8,
            words: words.len(),
            escapes: words.iter().filter(|&&w| w == CONTROL_WORD).count(),
        })
        .collect();

    let report = SimulationReport {
        seed: args.seed,
        channels: channel_count,
        words_per_channel: args.words,
        link_capacity: args.link_capacity,
        queue_capacity: args.queue_capacity,
        batch_size: args.batch_size,
        iterations,
        per_channel,
    };
    print_report(&report, format);

    Ok(SUCCESS)
}
