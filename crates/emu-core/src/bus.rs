//! CPU address bus.

/// Memory and I/O as seen from the CPU.
///
/// The machine owns the bus and lends it to the CPU for the duration of one
/// instruction. Address decoding and device routing live behind it.
pub trait Bus {
    /// Read a byte. Reads may have side effects (e.g. clearing a flag).
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte.
    fn write(&mut self, address: u16, value: u8);

    /// Read a little-endian 16-bit word, as used for the CPU vectors.
    fn read_word(&mut self, address: u16) -> u16 {
        let lo = self.read(address);
        let hi = self.read(address.wrapping_add(1));
        u16::from(lo) | (u16::from(hi) << 8)
    }
}
