use crate::error::{ReaderCall, TraceReadError};
use crate::format::{
    PacketKind, RdpCommand, TraceHeader, TracePacket, ViRegister, CMD_MAX_INTS, TRACE_MAGIC,
    VI_NUM_REG,
};
use crate::target::{RdramWrite, ViRegisterWrite};
use std::fs::File;
use std::io;
use std::io::{BufReader, Read};
use std::path::Path;

/// Words pulled from the stream per `read_exact` while applying an RDRAM patch.
const PATCH_CHUNK_WORDS: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Header,
    Kind,
    Payload(PacketKind),
    Finished,
    Poisoned,
}

/// Result of applying one `Rdram` packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryPatchInfo {
    /// First word index written.
    pub offset: u64,
    /// Number of words written.
    pub length: u64,
}

/// Sequential decoder for one trace stream.
///
/// The reader enforces packet framing: `read_header` once, then alternating `read_packet_kind`
/// and the payload decoder matching the returned kind, until `Eof`. Any structural error poisons
/// the reader, since the stream has no resynchronization points.
pub struct TraceReader<R> {
    reader: Option<R>,
    state: State,
    offset: u64,
    header: Option<TraceHeader>,
}

/// Open `path` for replay, discarding the failure reason.
pub fn try_open(path: impl AsRef<Path>) -> Option<TraceReader<BufReader<File>>> {
    TraceReader::open(path).ok()
}

impl TraceReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TraceReadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| TraceReadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> TraceReader<R> {
    /// Wrap a stream positioned at the start of a trace. No bytes are read until `read_header`.
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
            state: State::Header,
            offset: 0,
            header: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Whether the `Eof` packet has been read.
    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    /// Bytes consumed from the start of the stream.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn header(&self) -> Option<&TraceHeader> {
        self.header.as_ref()
    }

    pub fn read_header(&mut self) -> Result<TraceHeader, TraceReadError> {
        self.check_call(ReaderCall::Header)?;
        self.poison_on_err(|this| {
            let mut magic = [0u8; 4];
            this.read_bytes(&mut magic, "trace header")?;
            if magic != TRACE_MAGIC {
                return Err(TraceReadError::InvalidMagic { found: magic });
            }
            let rdram_size = this.read_u64("trace header")?;

            let header = TraceHeader { rdram_size };
            tracing::debug!(rdram_size, "read trace header");
            this.header = Some(header);
            this.state = State::Kind;
            Ok(header)
        })
    }

    pub fn read_packet_kind(&mut self) -> Result<PacketKind, TraceReadError> {
        self.check_call(ReaderCall::PacketKind)?;
        self.poison_on_err(|this| {
            let offset = this.offset;
            let value = this.read_u8("packet id")?;
            let kind = PacketKind::from_u8(value)
                .ok_or(TraceReadError::UnknownPacketKind { value, offset })?;

            tracing::trace!(kind = kind.name(), offset, "packet");
            this.state = match kind {
                PacketKind::Eof => {
                    tracing::debug!(offset, "reached end of trace");
                    State::Finished
                }
                kind => State::Payload(kind),
            };
            Ok(kind)
        })
    }

    pub fn read_command(&mut self) -> Result<RdpCommand, TraceReadError> {
        self.check_call(ReaderCall::Payload(PacketKind::Command))?;
        self.poison_on_err(|this| {
            let offset = this.offset;
            let len = this.read_u8("command length")? as usize;
            if len > CMD_MAX_INTS {
                return Err(TraceReadError::CommandTooLong { len, offset });
            }

            let mut bytes = [0u8; CMD_MAX_INTS * 4];
            this.read_bytes(&mut bytes[..len * 4], "command words")?;
            let mut words = [0u32; CMD_MAX_INTS];
            for (word, chunk) in words.iter_mut().zip(bytes[..len * 4].chunks_exact(4)) {
                *word = u32::from_le_bytes(chunk.try_into().unwrap());
            }

            this.state = State::Kind;
            Ok(RdpCommand::from_raw(words, len))
        })
    }

    /// Decode an `Rdram` packet, writing each word into `rdram` as it is read.
    ///
    /// The patch range is checked against the header's RDRAM size before anything is written. A
    /// stream that ends mid-patch leaves the words read so far applied.
    pub fn read_memory_patch<W: RdramWrite + ?Sized>(
        &mut self,
        rdram: &mut W,
    ) -> Result<MemoryPatchInfo, TraceReadError> {
        self.check_call(ReaderCall::Payload(PacketKind::Rdram))?;
        self.poison_on_err(|this| {
            let offset = this.read_u64("RDRAM patch offset")?;
            let length = this.read_u64("RDRAM patch length")?;

            let rdram_size = this.header.map(|h| h.rdram_size).unwrap_or(0);
            let in_bounds = offset
                .checked_add(length)
                .and_then(|end| end.checked_mul(4))
                .is_some_and(|end_bytes| end_bytes <= rdram_size);
            if !in_bounds {
                return Err(TraceReadError::PatchOutOfBounds {
                    offset,
                    length,
                    rdram_size,
                });
            }

            let mut chunk = [0u8; PATCH_CHUNK_WORDS * 4];
            let mut index = offset;
            let mut remaining = length;
            while remaining > 0 {
                let n = remaining.min(PATCH_CHUNK_WORDS as u64) as usize;
                this.read_bytes(&mut chunk[..n * 4], "RDRAM patch words")?;
                for word in chunk[..n * 4].chunks_exact(4) {
                    rdram.write_word(index, u32::from_le_bytes(word.try_into().unwrap()));
                    index += 1;
                }
                remaining -= n as u64;
            }

            this.state = State::Kind;
            Ok(MemoryPatchInfo { offset, length })
        })
    }

    /// Decode a `Vi` packet into `regs`. The registers are only written once the whole snapshot
    /// has been read.
    pub fn read_video_registers<W: ViRegisterWrite + ?Sized>(
        &mut self,
        regs: &mut W,
    ) -> Result<(), TraceReadError> {
        self.check_call(ReaderCall::Payload(PacketKind::Vi))?;
        self.poison_on_err(|this| {
            let values = this.read_vi_words()?;
            for (reg, value) in ViRegister::ALL.into_iter().zip(values) {
                regs.set_register(reg, value);
            }
            this.state = State::Kind;
            Ok(())
        })
    }

    /// Read the next packet kind and its payload as an owned value.
    pub fn next_packet(&mut self) -> Result<TracePacket, TraceReadError> {
        match self.read_packet_kind()? {
            PacketKind::Eof => Ok(TracePacket::Eof),
            PacketKind::Command => Ok(TracePacket::Command(self.read_command()?)),
            PacketKind::Rdram => {
                let mut collected = PatchWords::default();
                let info = self.read_memory_patch(&mut collected)?;
                Ok(TracePacket::MemoryPatch {
                    offset: info.offset,
                    words: collected.0,
                })
            }
            PacketKind::Vi => {
                let mut regs = [0u32; VI_NUM_REG];
                self.read_video_registers(&mut regs)?;
                Ok(TracePacket::ViSnapshot(regs))
            }
        }
    }

    /// Release the underlying stream. Closing twice is an error.
    pub fn close(&mut self) -> Result<(), TraceReadError> {
        match self.reader.take() {
            Some(_) => Ok(()),
            None => Err(TraceReadError::NotOpen),
        }
    }

    fn check_call(&self, called: ReaderCall) -> Result<(), TraceReadError> {
        if self.reader.is_none() {
            return Err(TraceReadError::NotOpen);
        }
        let expected = match self.state {
            State::Poisoned => return Err(TraceReadError::Poisoned),
            State::Header => ReaderCall::Header,
            State::Kind => ReaderCall::PacketKind,
            State::Payload(kind) => ReaderCall::Payload(kind),
            State::Finished => ReaderCall::Close,
        };
        if expected == called {
            Ok(())
        } else {
            Err(TraceReadError::UnexpectedCall { expected, called })
        }
    }

    fn poison_on_err<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, TraceReadError>,
    ) -> Result<T, TraceReadError> {
        let res = f(self);
        if res.is_err() {
            self.state = State::Poisoned;
        }
        res
    }

    fn read_vi_words(&mut self) -> Result<[u32; VI_NUM_REG], TraceReadError> {
        let mut bytes = [0u8; VI_NUM_REG * 4];
        self.read_bytes(&mut bytes, "VI registers")?;
        let mut values = [0u32; VI_NUM_REG];
        for (value, chunk) in values.iter_mut().zip(bytes.chunks_exact(4)) {
            *value = u32::from_le_bytes(chunk.try_into().unwrap());
        }
        Ok(values)
    }

    fn read_bytes(&mut self, buf: &mut [u8], context: &'static str) -> Result<(), TraceReadError> {
        let offset = self.offset;
        let reader = self.reader.as_mut().ok_or(TraceReadError::NotOpen)?;
        match reader.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                Err(TraceReadError::Truncated { offset, context })
            }
            Err(source) => Err(TraceReadError::Io { offset, source }),
        }
    }

    fn read_u8(&mut self, context: &'static str) -> Result<u8, TraceReadError> {
        let mut buf = [0u8; 1];
        self.read_bytes(&mut buf, context)?;
        Ok(buf[0])
    }

    fn read_u64(&mut self, context: &'static str) -> Result<u64, TraceReadError> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf, context)?;
        Ok(u64::from_le_bytes(buf))
    }
}

#[derive(Default)]
struct PatchWords(Vec<u32>);

impl RdramWrite for PatchWords {
    fn write_word(&mut self, _word_index: u64, value: u32) {
        self.0.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader whose every read fails with a non-EOF error.
    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("device gone"))
        }
    }

    #[test]
    fn non_eof_io_errors_keep_their_source() {
        let mut reader = TraceReader::new(Broken);
        let err = reader.read_header().unwrap_err();
        assert!(matches!(err, TraceReadError::Io { offset: 0, .. }));
        assert!(err.to_string().contains("device gone"));
    }

    #[test]
    fn offset_tracks_consumed_bytes() {
        let mut bytes = TRACE_MAGIC.to_vec();
        bytes.extend_from_slice(&16u64.to_le_bytes());
        bytes.push(PacketKind::Eof.as_u8());

        let mut reader = TraceReader::new(Cursor::new(bytes));
        assert_eq!(reader.offset(), 0);
        reader.read_header().unwrap();
        assert_eq!(reader.offset(), crate::format::TRACE_HEADER_SIZE);
        assert_eq!(reader.read_packet_kind().unwrap(), PacketKind::Eof);
        assert_eq!(reader.offset(), crate::format::TRACE_HEADER_SIZE + 1);
        assert!(reader.is_finished());
    }
}
