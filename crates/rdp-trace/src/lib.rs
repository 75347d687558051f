#![forbid(unsafe_code)]

//! RDP interaction trace container.
//!
//! A trace is a 12-byte header followed by a stream of tagged packets (display-list commands,
//! RDRAM patches and VI register snapshots) terminated by an `Eof` tag. See `format` for the
//! exact wire layout.

mod error;
mod format;
mod reader;
mod target;
mod writer;

pub use error::{ErrorClass, ReaderCall, TraceReadError, TraceWriteError};
pub use format::{
    PacketKind, RdpCommand, TraceHeader, TracePacket, ViRegister, CMD_MAX_INTS, TRACE_HEADER_SIZE,
    TRACE_MAGIC, VI_NUM_REG,
};
pub use reader::{try_open, MemoryPatchInfo, TraceReader};
pub use target::{RdramWrite, ViRegisterWrite};
pub use writer::TraceWriter;
