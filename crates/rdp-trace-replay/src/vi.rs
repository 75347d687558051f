use rdp_trace::{ViRegister, ViRegisterWrite, VI_NUM_REG};

/// VI register bank as last written by a `Vi` packet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViRegisters {
    regs: [u32; VI_NUM_REG],
}

impl ViRegisters {
    pub fn get(&self, reg: ViRegister) -> u32 {
        self.regs[reg.index()]
    }

    pub fn as_array(&self) -> &[u32; VI_NUM_REG] {
        &self.regs
    }

    /// Framebuffer address in RDRAM (24 bits).
    pub fn origin(&self) -> u32 {
        self.get(ViRegister::Origin) & 0x00FF_FFFF
    }

    /// Framebuffer line width in pixels (12 bits).
    pub fn width(&self) -> u32 {
        self.get(ViRegister::Width) & 0xFFF
    }

    /// Pixel format from `VI_STATUS[1:0]`: 0 = blank, 2 = RGBA5551, 3 = RGBA8888.
    pub fn pixel_type(&self) -> u32 {
        self.get(ViRegister::Status) & 0x3
    }
}

impl ViRegisterWrite for ViRegisters {
    fn set_register(&mut self, reg: ViRegister, value: u32) {
        self.regs[reg.index()] = value;
    }
}
