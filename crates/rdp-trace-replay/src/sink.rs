use rdp_trace::RdpCommand;
use std::collections::BTreeMap;

/// Consumer of decoded display-list commands (the renderer, in a full emulator).
pub trait CommandSink {
    fn process(&mut self, command: &RdpCommand);
}

impl<F: FnMut(&RdpCommand)> CommandSink for F {
    fn process(&mut self, command: &RdpCommand) {
        self(command)
    }
}

/// Per-opcode command counts.
#[derive(Clone, Debug, Default)]
pub struct CommandStats {
    counts: BTreeMap<u8, u64>,
    total: u64,
    words: u64,
    empty: u64,
}

impl CommandStats {
    pub fn record(&mut self, command: &RdpCommand) {
        self.total += 1;
        self.words += command.len() as u64;
        match command.opcode() {
            Some(op) => *self.counts.entry(op).or_default() += 1,
            None => self.empty += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn words(&self) -> u64 {
        self.words
    }

    /// Commands with no words at all.
    pub fn empty(&self) -> u64 {
        self.empty
    }

    pub fn count(&self, opcode: u8) -> u64 {
        self.counts.get(&opcode).copied().unwrap_or(0)
    }

    /// `(opcode, count)` in ascending opcode order.
    pub fn by_opcode(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
        self.counts.iter().map(|(&op, &n)| (op, n))
    }
}

impl CommandSink for CommandStats {
    fn process(&mut self, command: &RdpCommand) {
        self.record(command);
    }
}

/// Emits one `debug` event per command.
#[derive(Clone, Debug, Default)]
pub struct CommandLog {
    index: u64,
}

impl CommandLog {
    pub fn log(&mut self, command: &RdpCommand) {
        let op = command.opcode().unwrap_or(0);
        tracing::debug!(
            index = self.index,
            opcode = op,
            name = opcode_name(op),
            words = ?command.words(),
            "rdp command"
        );
        self.index += 1;
    }
}

impl CommandSink for CommandLog {
    fn process(&mut self, command: &RdpCommand) {
        self.log(command);
    }
}

pub fn opcode_name(opcode: u8) -> &'static str {
    match opcode {
        0x00 => "NOOP",
        0x08 => "TRI_FILL",
        0x09 => "TRI_FILL_ZBUF",
        0x0a => "TRI_TEX",
        0x0b => "TRI_TEX_ZBUF",
        0x0c => "TRI_SHADE",
        0x0d => "TRI_SHADE_ZBUF",
        0x0e => "TRI_SHADE_TEX",
        0x0f => "TRI_SHADE_TEX_ZBUF",
        0x24 => "TEX_RECT",
        0x25 => "TEX_RECT_FLIP",
        0x26 => "SYNC_LOAD",
        0x27 => "SYNC_PIPE",
        0x28 => "SYNC_TILE",
        0x29 => "SYNC_FULL",
        0x2a => "SET_KEY_GB",
        0x2b => "SET_KEY_R",
        0x2c => "SET_CONVERT",
        0x2d => "SET_SCISSOR",
        0x2e => "SET_PRIM_DEPTH",
        0x2f => "SET_OTHER_MODES",
        0x30 => "LOAD_TLUT",
        0x32 => "SET_TILE_SIZE",
        0x33 => "LOAD_BLOCK",
        0x34 => "LOAD_TILE",
        0x35 => "SET_TILE",
        0x36 => "FILL_RECT",
        0x37 => "SET_FILL_COLOR",
        0x38 => "SET_FOG_COLOR",
        0x39 => "SET_BLEND_COLOR",
        0x3a => "SET_PRIM_COLOR",
        0x3b => "SET_ENV_COLOR",
        0x3c => "SET_COMBINE",
        0x3d => "SET_TEXTURE_IMAGE",
        0x3e => "SET_MASK_IMAGE",
        0x3f => "SET_COLOR_IMAGE",
        _ => "INVALID",
    }
}
