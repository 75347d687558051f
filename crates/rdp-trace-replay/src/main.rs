#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rdp_trace::RdpCommand;
use rdp_trace_replay::{replay_file, CommandLog, CommandStats, ReplayConfig, ReplaySummary};

#[derive(Debug, Parser)]
#[command(about = "Replay an RDP trace offline and report per-frame RDRAM digests")]
struct Args {
    /// Trace file to replay.
    trace: PathBuf,

    /// Stop after this many VI snapshots (frames). Must be at least 1.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    max_frames: Option<u64>,

    /// Skip hashing RDRAM at each frame.
    #[arg(long)]
    no_hash: bool,

    /// Print a single JSON document instead of text.
    #[arg(long)]
    json: bool,

    /// Emit a `debug` log event for every command (enable with `RUST_LOG=debug`).
    #[arg(long)]
    log_commands: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ReplayConfig {
        max_frames: args.max_frames,
        hash_frames: !args.no_hash,
    };

    let mut stats = CommandStats::default();
    let mut log = CommandLog::default();
    let log_commands = args.log_commands;
    let summary = replay_file(
        &args.trace,
        |cmd: &RdpCommand| {
            stats.record(cmd);
            if log_commands {
                log.log(cmd);
            }
        },
        config,
    )
    .with_context(|| format!("failed to replay {}", args.trace.display()))?;

    if args.json {
        let doc = summary_json(&summary, &stats);
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        print_summary(&summary, &stats);
    }
    Ok(())
}

fn print_summary(summary: &ReplaySummary, stats: &CommandStats) {
    for frame in &summary.frame_digests {
        println!(
            "frame {}: origin=0x{:08x} width={} sha256={}",
            frame.frame_index,
            frame.origin,
            frame.width,
            frame.sha256_hex()
        );
    }
    println!(
        "rdram={} bytes commands={} patches={} words_patched={} frames={}{}",
        summary.rdram_size,
        summary.commands,
        summary.patches,
        summary.words_patched,
        summary.frames,
        if summary.stopped_early {
            " (stopped early)"
        } else {
            ""
        }
    );
    for (opcode, count) in stats.by_opcode() {
        println!(
            "  {:<20} 0x{opcode:02x} x{count}",
            rdp_trace_replay::opcode_name(opcode)
        );
    }
}

fn summary_json(summary: &ReplaySummary, stats: &CommandStats) -> serde_json::Value {
    let frames: Vec<_> = summary
        .frame_digests
        .iter()
        .map(|f| {
            serde_json::json!({
                "frame_index": f.frame_index,
                "origin": f.origin,
                "width": f.width,
                "sha256": f.sha256_hex(),
            })
        })
        .collect();
    let opcodes: serde_json::Map<String, serde_json::Value> = stats
        .by_opcode()
        .map(|(opcode, count)| {
            (
                rdp_trace_replay::opcode_name(opcode).to_string(),
                serde_json::Value::from(count),
            )
        })
        .collect();

    serde_json::json!({
        "rdram_size": summary.rdram_size,
        "commands": summary.commands,
        "patches": summary.patches,
        "words_patched": summary.words_patched,
        "frames": summary.frames,
        "stopped_early": summary.stopped_early,
        "frame_digests": frames,
        "opcodes": opcodes,
    })
}
