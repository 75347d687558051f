use crate::format::ViRegister;

/// Destination for `Rdram` packet payloads.
///
/// `word_index` addresses RDRAM in 32-bit words (byte address `word_index * 4`). Words arrive in
/// ascending index order.
pub trait RdramWrite {
    fn write_word(&mut self, word_index: u64, value: u32);
}

/// Destination for `Vi` packet payloads. Every register is written once per snapshot, in
/// [`ViRegister::ALL`] order.
pub trait ViRegisterWrite {
    fn set_register(&mut self, reg: ViRegister, value: u32);
}

impl<T: RdramWrite + ?Sized> RdramWrite for &mut T {
    fn write_word(&mut self, word_index: u64, value: u32) {
        (**self).write_word(word_index, value);
    }
}

impl<T: ViRegisterWrite + ?Sized> ViRegisterWrite for &mut T {
    fn set_register(&mut self, reg: ViRegister, value: u32) {
        (**self).set_register(reg, value);
    }
}

/// Sparse RDRAM target keyed by word index.
impl RdramWrite for std::collections::BTreeMap<u64, u32> {
    fn write_word(&mut self, word_index: u64, value: u32) {
        self.insert(word_index, value);
    }
}

impl ViRegisterWrite for [u32; crate::format::VI_NUM_REG] {
    fn set_register(&mut self, reg: ViRegister, value: u32) {
        self[reg.index()] = value;
    }
}
