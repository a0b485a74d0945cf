//! Block-device boundary.
//!
//! The appliance's IDE layer transfers 512-byte sectors as 256 little-endian
//! words. Everything above it reads fields through [`SectorBuf`] byte
//! accessors so the engine's behavior is independent of target endianness
//! and alignment.

/// Words per sector.
pub const SECTOR_WORDS: usize = 256;

/// Bytes per sector. The engine supports nothing else.
pub const SECTOR_BYTES: usize = 512;

/// The sole I/O primitive, implemented by the drive layer outside this crate.
pub trait BlockDevice {
    /// Reads `count` sectors starting at the absolute sector number into
    /// `dest` (256 words per sector). Returns the number of sectors actually
    /// read; a short read signals a device error.
    fn read_sectors(&mut self, sector: u32, count: u16, dest: &mut [u16]) -> u16;
}

impl<T: BlockDevice + ?Sized> BlockDevice for &mut T {
    fn read_sectors(&mut self, sector: u32, count: u16, dest: &mut [u16]) -> u16 {
        (**self).read_sectors(sector, count, dest)
    }
}

/// One sector held as device words, with little-endian field readers.
#[derive(Clone)]
pub struct SectorBuf(pub [u16; SECTOR_WORDS]);

impl SectorBuf {
    pub const fn zeroed() -> Self {
        Self([0; SECTOR_WORDS])
    }

    /// Reads one sector into the buffer. True on success.
    pub fn load<D: BlockDevice>(&mut self, dev: &mut D, sector: u32) -> bool {
        dev.read_sectors(sector, 1, &mut self.0) == 1
    }

    /// Byte at `offset` within the sector.
    #[inline]
    pub fn byte(&self, offset: usize) -> u8 {
        (self.0[offset / 2] >> (8 * (offset % 2))) as u8
    }

    /// Little-endian 16-bit value at a byte offset.
    #[inline]
    pub fn word_at(&self, offset: usize) -> u16 {
        u16::from(self.byte(offset)) | (u16::from(self.byte(offset + 1)) << 8)
    }

    /// Little-endian 32-bit value at a byte offset.
    #[inline]
    pub fn dword_at(&self, offset: usize) -> u32 {
        u32::from(self.word_at(offset)) | (u32::from(self.word_at(offset + 2)) << 16)
    }

    /// FAT16 table entry at word index `idx`.
    #[inline]
    pub fn fat16_entry(&self, idx: usize) -> u32 {
        u32::from(self.0[idx])
    }

    /// FAT32 table entry at dword index `idx`, raw and unmasked.
    #[inline]
    pub fn fat32_entry(&self, idx: usize) -> u32 {
        u32::from(self.0[2 * idx]) | (u32::from(self.0[2 * idx + 1]) << 16)
    }
}

impl Default for SectorBuf {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_and_field_readers_are_little_endian() {
        let mut s = SectorBuf::zeroed();
        // bytes 0..4 = DE AD BE EF
        s.0[0] = 0xADDE;
        s.0[1] = 0xEFBE;
        assert_eq!(s.byte(0), 0xDE);
        assert_eq!(s.byte(1), 0xAD);
        assert_eq!(s.byte(2), 0xBE);
        assert_eq!(s.byte(3), 0xEF);
        assert_eq!(s.word_at(0), 0xADDE);
        assert_eq!(s.word_at(1), 0xBEAD);
        assert_eq!(s.dword_at(0), 0xEFBEADDE);
        assert_eq!(s.dword_at(1), 0x00EFBEAD);
    }

    #[test]
    fn fat_entry_views() {
        let mut s = SectorBuf::zeroed();
        s.0[3] = 0x1234;
        assert_eq!(s.fat16_entry(3), 0x1234);
        s.0[10] = 0x5678;
        s.0[11] = 0x0FFF;
        assert_eq!(s.fat32_entry(5), 0x0FFF_5678);
    }
}
