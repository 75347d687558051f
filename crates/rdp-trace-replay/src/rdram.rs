use rdp_trace::RdramWrite;

/// Largest RDRAM image a trace may declare. Retail hardware tops out at 8 MiB with the Expansion
/// Pak; the header field is untrusted, so anything beyond this is rejected before allocating.
pub const MAX_RDRAM_SIZE: u64 = 64 * 1024 * 1024;

/// Flat RDRAM image addressed in 32-bit words.
#[derive(Clone, Debug)]
pub struct RdramImage {
    words: Vec<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum RdramAllocError {
    #[error("RDRAM size {size} bytes exceeds the maximum of {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("out of memory allocating an RDRAM image of {size} bytes")]
    OutOfMemory { size: u64 },
}

impl RdramImage {
    /// Zeroed image backing `size` bytes (rounded up to a whole word).
    pub fn new(size: u64) -> Result<Self, RdramAllocError> {
        if size > MAX_RDRAM_SIZE {
            return Err(RdramAllocError::TooLarge {
                size,
                max: MAX_RDRAM_SIZE,
            });
        }
        let len = usize::try_from(size.div_ceil(4))
            .map_err(|_| RdramAllocError::OutOfMemory { size })?;
        let mut words = Vec::new();
        words
            .try_reserve_exact(len)
            .map_err(|_| RdramAllocError::OutOfMemory { size })?;
        words.resize(len, 0);
        Ok(Self { words })
    }

    pub fn len_words(&self) -> usize {
        self.words.len()
    }

    pub fn read_word(&self, word_index: u64) -> Option<u32> {
        usize::try_from(word_index)
            .ok()
            .and_then(|i| self.words.get(i).copied())
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Feed the image to `f` as big-endian bytes (the console's memory order), in chunks.
    pub fn for_each_be_chunk(&self, mut f: impl FnMut(&[u8])) {
        const CHUNK_WORDS: usize = 4096;
        let mut buf = [0u8; CHUNK_WORDS * 4];
        for words in self.words.chunks(CHUNK_WORDS) {
            for (dst, w) in buf.chunks_exact_mut(4).zip(words) {
                dst.copy_from_slice(&w.to_be_bytes());
            }
            f(&buf[..words.len() * 4]);
        }
    }
}

/// Writes past the end of the image are dropped. `TraceReader` rejects such patches before they
/// reach this point.
impl RdramWrite for RdramImage {
    fn write_word(&mut self, word_index: u64, value: u32) {
        if let Some(slot) = usize::try_from(word_index)
            .ok()
            .and_then(|i| self.words.get_mut(i))
        {
            *slot = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_rounds_up_to_whole_words() {
        assert_eq!(RdramImage::new(0).unwrap().len_words(), 0);
        assert_eq!(RdramImage::new(7).unwrap().len_words(), 2);
        assert_eq!(RdramImage::new(0x0040_0000).unwrap().len_words(), 0x0010_0000);
    }

    #[test]
    fn sizes_above_the_cap_are_rejected_before_allocating() {
        assert_eq!(
            RdramImage::new(MAX_RDRAM_SIZE).unwrap().len_words() as u64,
            MAX_RDRAM_SIZE / 4
        );
        assert!(matches!(
            RdramImage::new(MAX_RDRAM_SIZE + 1),
            Err(RdramAllocError::TooLarge { size, .. }) if size == MAX_RDRAM_SIZE + 1
        ));
        assert!(matches!(
            RdramImage::new(u64::MAX),
            Err(RdramAllocError::TooLarge { .. })
        ));
    }

    #[test]
    fn writes_outside_the_image_are_dropped() {
        let mut rdram = RdramImage::new(8).unwrap();
        rdram.write_word(1, 0xabcd_ef01);
        rdram.write_word(2, 5);
        assert_eq!(rdram.words(), &[0, 0xabcd_ef01]);
        assert_eq!(rdram.read_word(2), None);
    }

    #[test]
    fn be_chunks_cover_every_word() {
        let mut rdram = RdramImage::new(12).unwrap();
        rdram.write_word(0, 0x0102_0304);
        rdram.write_word(2, 0x0a0b_0c0d);
        let mut bytes = Vec::new();
        rdram.for_each_be_chunk(|chunk| bytes.extend_from_slice(chunk));
        assert_eq!(bytes, [1, 2, 3, 4, 0, 0, 0, 0, 0x0a, 0x0b, 0x0c, 0x0d]);
    }
}
