use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::format::{PacketKind, CMD_MAX_INTS};

/// Coarse classification of a [`TraceReadError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// The trace could not be opened. Recoverable; the caller decides whether to retry.
    Io,
    /// The stream is structurally invalid. Fatal for the session.
    Format,
    /// A length field exceeds a fixed limit. Fatal for the session.
    ResourceLimit,
    /// The reader was driven out of protocol order.
    Usage,
}

/// Reader operation, used to report call-order violations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderCall {
    Header,
    PacketKind,
    Payload(PacketKind),
    Close,
}

impl std::fmt::Display for ReaderCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReaderCall::Header => f.write_str("read_header"),
            ReaderCall::PacketKind => f.write_str("read_packet_kind"),
            ReaderCall::Payload(kind) => write!(f, "{} payload decoder", kind.name()),
            ReaderCall::Close => f.write_str("close"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TraceReadError {
    #[error("failed to open trace {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("io error at offset {offset}: {source}")]
    Io {
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("invalid trace file header or unsupported version (magic {found:02x?})")]
    InvalidMagic { found: [u8; 4] },

    #[error("invalid trace packet id {value} at offset {offset}")]
    UnknownPacketKind { value: u8, offset: u64 },

    #[error("command at offset {offset} is too long ({len} words, max {CMD_MAX_INTS})")]
    CommandTooLong { len: usize, offset: u64 },

    #[error("trace truncated at offset {offset} while reading {context}")]
    Truncated { offset: u64, context: &'static str },

    #[error(
        "RDRAM patch (word offset {offset}, {length} words) exceeds RDRAM size of {rdram_size} bytes"
    )]
    PatchOutOfBounds {
        offset: u64,
        length: u64,
        rdram_size: u64,
    },

    #[error("{called} called while reader expects {expected}")]
    UnexpectedCall {
        expected: ReaderCall,
        called: ReaderCall,
    },

    #[error("trace reader is closed")]
    NotOpen,

    #[error("trace reader previously failed and cannot continue")]
    Poisoned,
}

impl TraceReadError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TraceReadError::Open { .. } => ErrorClass::Io,
            TraceReadError::Io { .. }
            | TraceReadError::InvalidMagic { .. }
            | TraceReadError::UnknownPacketKind { .. }
            | TraceReadError::Truncated { .. }
            | TraceReadError::PatchOutOfBounds { .. } => ErrorClass::Format,
            TraceReadError::CommandTooLong { .. } => ErrorClass::ResourceLimit,
            TraceReadError::UnexpectedCall { .. }
            | TraceReadError::NotOpen
            | TraceReadError::Poisoned => ErrorClass::Usage,
        }
    }

    /// Whether this error ends the replay session.
    pub fn is_fatal(&self) -> bool {
        !matches!(self.class(), ErrorClass::Io)
    }
}

#[derive(Debug, Error)]
pub enum TraceWriteError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("command is too long ({0} words, max {CMD_MAX_INTS})")]
    CommandTooLong(usize),

    #[error(
        "RDRAM patch (word offset {offset}, {length} words) exceeds RDRAM size of {rdram_size} bytes"
    )]
    PatchOutOfBounds {
        offset: u64,
        length: u64,
        rdram_size: u64,
    },
}
