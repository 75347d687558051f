/// Magic + format version at offset 0 of every trace.
pub const TRACE_MAGIC: [u8; 4] = *b"RDP\x01";

/// `magic (4) + rdram_size (u64)`.
pub const TRACE_HEADER_SIZE: u64 = 12;

/// Longest RDP command in 32-bit words (22 64-bit words for a fully shaded, textured, z-buffered
/// triangle).
pub const CMD_MAX_INTS: usize = 44;

/// Number of VI registers carried by a `Vi` packet.
pub const VI_NUM_REG: usize = 14;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceHeader {
    /// Size of the RDRAM image in bytes.
    pub rdram_size: u64,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Eof = 0,
    Command = 1,
    Rdram = 2,
    Vi = 3,
}

impl PacketKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Eof),
            1 => Some(Self::Command),
            2 => Some(Self::Rdram),
            3 => Some(Self::Vi),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Eof => "EOF",
            Self::Command => "CMD",
            Self::Rdram => "RDRAM",
            Self::Vi => "VI",
        }
    }
}

/// VI registers in the order they appear in a `Vi` packet.
///
/// This is the register order of the zilmar GFX plugin ABI (`GFX_INFO::VI_*_REG`).
#[repr(usize)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViRegister {
    Status = 0,
    Origin = 1,
    Width = 2,
    Intr = 3,
    VCurrentLine = 4,
    Timing = 5,
    VSync = 6,
    HSync = 7,
    Leap = 8,
    HStart = 9,
    VStart = 10,
    VBurst = 11,
    XScale = 12,
    YScale = 13,
}

impl ViRegister {
    pub const ALL: [ViRegister; VI_NUM_REG] = [
        ViRegister::Status,
        ViRegister::Origin,
        ViRegister::Width,
        ViRegister::Intr,
        ViRegister::VCurrentLine,
        ViRegister::Timing,
        ViRegister::VSync,
        ViRegister::HSync,
        ViRegister::Leap,
        ViRegister::HStart,
        ViRegister::VStart,
        ViRegister::VBurst,
        ViRegister::XScale,
        ViRegister::YScale,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ViRegister::Status => "VI_STATUS",
            ViRegister::Origin => "VI_ORIGIN",
            ViRegister::Width => "VI_WIDTH",
            ViRegister::Intr => "VI_INTR",
            ViRegister::VCurrentLine => "VI_V_CURRENT_LINE",
            ViRegister::Timing => "VI_TIMING",
            ViRegister::VSync => "VI_V_SYNC",
            ViRegister::HSync => "VI_H_SYNC",
            ViRegister::Leap => "VI_LEAP",
            ViRegister::HStart => "VI_H_START",
            ViRegister::VStart => "VI_V_START",
            ViRegister::VBurst => "VI_V_BURST",
            ViRegister::XScale => "VI_X_SCALE",
            ViRegister::YScale => "VI_Y_SCALE",
        }
    }
}

/// One display-list command as recorded in a `Command` packet.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RdpCommand {
    buf: [u32; CMD_MAX_INTS],
    len: usize,
}

impl RdpCommand {
    /// Returns `None` if `words` is longer than [`CMD_MAX_INTS`].
    pub fn from_words(words: &[u32]) -> Option<Self> {
        if words.len() > CMD_MAX_INTS {
            return None;
        }
        let mut buf = [0u32; CMD_MAX_INTS];
        buf[..words.len()].copy_from_slice(words);
        Some(Self {
            buf,
            len: words.len(),
        })
    }

    pub(crate) fn from_raw(buf: [u32; CMD_MAX_INTS], len: usize) -> Self {
        debug_assert!(len <= CMD_MAX_INTS);
        Self { buf, len }
    }

    pub fn words(&self) -> &[u32] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// RDP opcode (bits 56..62 of the first 64-bit command word).
    pub fn opcode(&self) -> Option<u8> {
        self.words().first().map(|w| ((w >> 24) & 0x3f) as u8)
    }
}

impl std::fmt::Debug for RdpCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RdpCommand")
            .field("words", &self.words())
            .finish()
    }
}

/// Fully decoded packet, owning its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TracePacket {
    Eof,
    Command(RdpCommand),
    MemoryPatch { offset: u64, words: Vec<u32> },
    ViSnapshot([u32; VI_NUM_REG]),
}

impl TracePacket {
    pub fn kind(&self) -> PacketKind {
        match self {
            TracePacket::Eof => PacketKind::Eof,
            TracePacket::Command(_) => PacketKind::Command,
            TracePacket::MemoryPatch { .. } => PacketKind::Rdram,
            TracePacket::ViSnapshot(_) => PacketKind::Vi,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_kind_codes_are_stable() {
        for kind in [
            PacketKind::Eof,
            PacketKind::Command,
            PacketKind::Rdram,
            PacketKind::Vi,
        ] {
            assert_eq!(PacketKind::from_u8(kind.as_u8()), Some(kind));
        }
        assert_eq!(PacketKind::from_u8(4), None);
        assert_eq!(PacketKind::from_u8(0x7f), None);
    }

    #[test]
    fn vi_register_order_matches_indices() {
        for (i, reg) in ViRegister::ALL.iter().enumerate() {
            assert_eq!(reg.index(), i);
        }
    }

    #[test]
    fn command_rejects_oversized_buffers() {
        assert!(RdpCommand::from_words(&[0; CMD_MAX_INTS]).is_some());
        assert!(RdpCommand::from_words(&[0; CMD_MAX_INTS + 1]).is_none());
    }

    #[test]
    fn command_opcode_comes_from_top_byte() {
        // SET_FILL_COLOR = 0x37.
        let cmd = RdpCommand::from_words(&[0x3700_0000, 0xffff_ffff]).unwrap();
        assert_eq!(cmd.opcode(), Some(0x37));
        assert_eq!(RdpCommand::from_words(&[]).unwrap().opcode(), None);
    }
}
