#![forbid(unsafe_code)]

//! Offline replay of RDP traces.
//!
//! [`replay`] is the dispatch loop: it reads the header, sizes an [`RdramImage`], then routes each
//! packet to the matching decoder until `Eof`. Commands go to a [`CommandSink`]; memory patches and
//! VI snapshots update the in-process RDRAM image and register bank.

mod rdram;
mod sink;
mod vi;

pub use rdram::{RdramAllocError, RdramImage, MAX_RDRAM_SIZE};
pub use sink::{opcode_name, CommandLog, CommandSink, CommandStats};
pub use vi::ViRegisters;

use rdp_trace::{PacketKind, TraceReadError, TraceReader};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

#[derive(Clone, Copy, Debug)]
pub struct ReplayConfig {
    /// Stop after this many VI snapshots. `Some(0)` stops at the first VI packet without
    /// applying it.
    pub max_frames: Option<u64>,
    /// Record a SHA-256 of RDRAM at every VI snapshot.
    pub hash_frames: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_frames: None,
            hash_frames: true,
        }
    }
}

/// RDRAM fingerprint taken when a VI snapshot completes a frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameDigest {
    pub frame_index: u64,
    pub origin: u32,
    pub width: u32,
    pub sha256: [u8; 32],
}

impl FrameDigest {
    pub fn sha256_hex(&self) -> String {
        self.sha256.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub rdram_size: u64,
    pub commands: u64,
    pub patches: u64,
    pub words_patched: u64,
    pub frames: u64,
    /// `max_frames` was reached before `Eof`.
    pub stopped_early: bool,
    pub frame_digests: Vec<FrameDigest>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error(transparent)]
    Trace(#[from] TraceReadError),

    #[error(transparent)]
    Rdram(#[from] RdramAllocError),
}

/// Final emulated state after a replay.
#[derive(Debug)]
pub struct ReplayState {
    pub rdram: RdramImage,
    pub vi: ViRegisters,
    pub summary: ReplaySummary,
}

/// Replay a trace from its first byte, closing the reader when done.
pub fn replay<R: Read, S: CommandSink>(
    reader: &mut TraceReader<R>,
    sink: &mut S,
    config: ReplayConfig,
) -> Result<ReplayState, ReplayError> {
    let header = reader.read_header()?;
    let mut rdram = RdramImage::new(header.rdram_size)?;
    let mut vi = ViRegisters::default();
    let mut summary = ReplaySummary {
        rdram_size: header.rdram_size,
        ..ReplaySummary::default()
    };

    let limit_reached = |frames: u64| config.max_frames.is_some_and(|max| frames >= max);
    loop {
        match reader.read_packet_kind()? {
            PacketKind::Eof => break,
            PacketKind::Command => {
                let cmd = reader.read_command()?;
                sink.process(&cmd);
                summary.commands += 1;
            }
            PacketKind::Rdram => {
                let patch = reader.read_memory_patch(&mut rdram)?;
                summary.patches += 1;
                summary.words_patched += patch.length;
            }
            PacketKind::Vi => {
                if limit_reached(summary.frames) {
                    stop_early(&mut summary, reader.offset());
                    break;
                }

                reader.read_video_registers(&mut vi)?;
                if config.hash_frames {
                    summary.frame_digests.push(FrameDigest {
                        frame_index: summary.frames,
                        origin: vi.origin(),
                        width: vi.width(),
                        sha256: hash_rdram(&rdram),
                    });
                }
                summary.frames += 1;

                if limit_reached(summary.frames) {
                    stop_early(&mut summary, reader.offset());
                    break;
                }
            }
        }
    }

    reader.close()?;

    tracing::debug!(
        commands = summary.commands,
        patches = summary.patches,
        frames = summary.frames,
        "replay finished"
    );
    Ok(ReplayState { rdram, vi, summary })
}

/// Open `path` and [`replay`] it.
pub fn replay_file<S: CommandSink>(
    path: impl AsRef<Path>,
    mut sink: S,
    config: ReplayConfig,
) -> Result<ReplaySummary, ReplayError> {
    let mut reader = TraceReader::open(path)?;
    Ok(replay(&mut reader, &mut sink, config)?.summary)
}

fn stop_early(summary: &mut ReplaySummary, offset: u64) {
    tracing::warn!(
        frames = summary.frames,
        offset,
        "frame limit reached, stopping replay before EOF"
    );
    summary.stopped_early = true;
}

fn hash_rdram(rdram: &RdramImage) -> [u8; 32] {
    let mut hasher = Sha256::new();
    rdram.for_each_be_chunk(|chunk| hasher.update(chunk));
    hasher.finalize().into()
}
