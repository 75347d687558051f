use crate::error::TraceWriteError;
use crate::format::{PacketKind, CMD_MAX_INTS, TRACE_MAGIC, VI_NUM_REG};
use std::io::Write;

/// Streaming trace producer.
///
/// The header is written by [`TraceWriter::new`] and the `Eof` packet by [`TraceWriter::finish`],
/// so every trace produced through this type is well framed.
pub struct TraceWriter<W: Write> {
    writer: W,
    rdram_size: u64,
}

impl<W: Write> TraceWriter<W> {
    pub fn new(mut writer: W, rdram_size: u64) -> Result<Self, TraceWriteError> {
        writer.write_all(&TRACE_MAGIC)?;
        writer.write_all(&rdram_size.to_le_bytes())?;
        Ok(Self { writer, rdram_size })
    }

    pub fn write_command(&mut self, words: &[u32]) -> Result<(), TraceWriteError> {
        if words.len() > CMD_MAX_INTS {
            return Err(TraceWriteError::CommandTooLong(words.len()));
        }
        self.writer
            .write_all(&[PacketKind::Command.as_u8(), words.len() as u8])?;
        self.write_words(words)
    }

    /// Record `words` landing at RDRAM word index `offset` onward.
    pub fn write_rdram(&mut self, offset: u64, words: &[u32]) -> Result<(), TraceWriteError> {
        let length = words.len() as u64;
        let in_bounds = offset
            .checked_add(length)
            .and_then(|end| end.checked_mul(4))
            .is_some_and(|end_bytes| end_bytes <= self.rdram_size);
        if !in_bounds {
            return Err(TraceWriteError::PatchOutOfBounds {
                offset,
                length,
                rdram_size: self.rdram_size,
            });
        }

        self.writer.write_all(&[PacketKind::Rdram.as_u8()])?;
        self.writer.write_all(&offset.to_le_bytes())?;
        self.writer.write_all(&length.to_le_bytes())?;
        self.write_words(words)
    }

    pub fn write_vi(&mut self, regs: &[u32; VI_NUM_REG]) -> Result<(), TraceWriteError> {
        self.writer.write_all(&[PacketKind::Vi.as_u8()])?;
        self.write_words(regs)
    }

    /// Terminate the trace and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W, TraceWriteError> {
        self.writer.write_all(&[PacketKind::Eof.as_u8()])?;
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn write_words(&mut self, words: &[u32]) -> Result<(), TraceWriteError> {
        for word in words {
            self.writer.write_all(&word.to_le_bytes())?;
        }
        Ok(())
    }
}
