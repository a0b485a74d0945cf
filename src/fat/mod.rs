//! FAT16/FAT32 navigation engine.
//!
//! One live [`FatVolume`] owns the block device, the filesystem geometry,
//! the directory and file cursors, the per-file run-length cache, and the
//! directory stack. Directory traversal mutates "the current entry"; opening
//! the current entry primes the file cursor and its cache.

mod chain;
mod cursor;
mod dir;
mod mount;
mod names;
mod stack;


use crate::block::{BlockDevice, SectorBuf};
use crate::FAT_CACHE_ENTRIES;

use chain::RunCache;
use names::NameBuf;
use stack::DirStack;

pub(crate) const CHAIN_END: u32 = 0xFFFF_FFFF;
pub(crate) const FAT16_BAD: u32 = 0xFFF7;
pub(crate) const FAT32_BAD: u32 = 0xFFFF_FFF7;

pub(crate) const DIR_ENTRY_BYTES: usize = 32;
pub(crate) const DIR_ENTRIES_PER_SECTOR: usize = crate::SECTOR_BYTES / DIR_ENTRY_BYTES;

pub(crate) const ATTR_VOLUME: u8 = 0x08;
pub(crate) const ATTR_DIRECTORY: u8 = 0x10;
pub(crate) const ATTR_LONG_NAME: u8 = 0x0F;

pub(crate) const DELETED_MARK: u8 = 0xE5;

/// Errors reported by the engine. Traversal and read failures leave the
/// volume in a known-good state for retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatError {
    /// Unreadable MBR/BPB or unsupported sector size; the volume degrades to
    /// fallback geometry instead of halting.
    InitFailure,
    /// The block device returned a short read.
    DeviceRead,
}

/// Where a directory starts. Cluster 0 is the FAT16 fixed-root sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirLocation {
    pub(crate) cluster: u32,
}

impl DirLocation {
    pub fn start_cluster(self) -> u32 {
        self.cluster
    }
}

/// Filesystem geometry derived once from the partition table and BPB.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Geometry {
    pub partition_start: u32,
    pub first_fat_sector: u32,
    pub first_file_sector: u32,
    pub sectors_per_cluster: u32,
    /// FAT entries per 512-byte FAT sector: 256 for FAT16, 128 for FAT32.
    pub fat_entries_per_sector: u32,
    pub fat16: bool,
    pub root_start_sector: u32,
    pub root_dir_sectors: u32,
}

impl Geometry {
    /// Degraded defaults used before init and after an init failure.
    pub(crate) fn fallback() -> Self {
        Self {
            partition_start: 0,
            first_fat_sector: 1,
            first_file_sector: 1,
            sectors_per_cluster: 64,
            fat_entries_per_sector: crate::SECTOR_WORDS as u32,
            fat16: false,
            root_start_sector: 0,
            root_dir_sectors: 0,
        }
    }

    /// Absolute sector of a data cluster, with wrapping unsigned
    /// arithmetic; callers special-case cluster 0 (fixed root).
    #[inline]
    pub(crate) fn cluster_lba(&self, cluster: u32) -> u32 {
        cluster
            .wrapping_sub(2)
            .wrapping_mul(self.sectors_per_cluster)
            .wrapping_add(self.first_file_sector)
    }
}

/// One contiguous run of a cluster chain. `sectors == 0` marks the cache's
/// "chain truncated here, re-walk the FAT from `cluster`" slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CacheEntry {
    pub cluster: u32,
    pub sectors: u32,
}

/// Seek state for one open file or directory: the window of contiguous
/// sectors the cursor is positioned in.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockInfo {
    /// Absolute sector where the current run starts.
    pub sector: u32,
    /// Length of the current run in sectors.
    pub sectors: u32,
    /// First cluster after the run, or `CHAIN_END`.
    pub next: u32,
    /// File-relative sector offset of the run start.
    pub offset: u32,
    /// First cluster of the file; 0 means the FAT16 fixed root directory.
    pub first_cluster: u32,
    /// Position in the run cache, if this cursor is tracking it.
    pub cache_idx: Option<usize>,
}

impl BlockInfo {
    pub(crate) fn unpositioned(first_cluster: u32) -> Self {
        Self {
            sector: 0,
            sectors: 0,
            next: CHAIN_END,
            offset: u32::MAX,
            first_cluster,
            cache_idx: None,
        }
    }
}

/// Raw 32-byte directory entry viewed in place inside a sector buffer.
#[derive(Clone, Copy)]
pub(crate) struct EntryView<'a> {
    sec: &'a SectorBuf,
    base: usize,
}

impl<'a> EntryView<'a> {
    pub(crate) fn new(sec: &'a SectorBuf, slot: usize) -> Self {
        Self {
            sec,
            base: slot * DIR_ENTRY_BYTES,
        }
    }

    #[inline]
    pub(crate) fn name_byte(&self, i: usize) -> u8 {
        self.sec.byte(self.base + i)
    }

    #[inline]
    pub(crate) fn ext_byte(&self, i: usize) -> u8 {
        self.sec.byte(self.base + 8 + i)
    }

    #[inline]
    pub(crate) fn attr(&self) -> u8 {
        self.sec.byte(self.base + 11)
    }

    /// Packed time word: seconds/2 in bits 0-4, minutes 5-10, hours 11-15.
    #[inline]
    pub(crate) fn time_word(&self) -> u16 {
        self.sec.word_at(self.base + 22)
    }

    #[inline]
    pub(crate) fn size(&self) -> u32 {
        self.sec.dword_at(self.base + 28)
    }

    /// Start cluster; FAT32 adds the high word at byte 20.
    #[inline]
    pub(crate) fn start_cluster(&self, fat16: bool) -> u32 {
        let lo = u32::from(self.sec.word_at(self.base + 26));
        if fat16 {
            lo
        } else {
            lo | (u32::from(self.sec.word_at(self.base + 20)) << 16)
        }
    }

    #[inline]
    pub(crate) fn lfn_seq(&self) -> u8 {
        self.sec.byte(self.base)
    }

    /// Low byte of the k-th UCS-2 unit of a long-filename entry.
    pub(crate) fn lfn_char(&self, k: usize) -> u8 {
        // 5 units at bytes 1.., 6 at 14.., 2 at 28..
        const OFFSETS: [usize; names::LFN_CHARS] =
            [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];
        self.sec.byte(self.base + OFFSETS[k])
    }
}

/// The navigation engine: a single-instance view of one FAT16/FAT32 volume.
///
/// `CACHE` is the run-length cache capacity in entries; the default matches
/// the appliance's 32 KiB carve-out.
pub struct FatVolume<D: BlockDevice, const CACHE: usize = FAT_CACHE_ENTRIES> {
    pub(crate) dev: D,
    pub(crate) geo: Geometry,
    /// Cursor for the current entry (the openable file/directory).
    pub(crate) cur_info: BlockInfo,
    /// Cursor for the directory being iterated. Never uses the cache.
    pub(crate) dir_info: BlockInfo,
    pub(crate) cache: RunCache<CACHE>,
    pub(crate) stack: DirStack,
    /// Buffered sector of directory entries.
    pub(crate) dir_sector: SectorBuf,
    /// Entry index within `dir_sector`; -1 is the "before entry 0" sentinel.
    pub(crate) cur_dir: i32,
    /// Sector offset within the directory; `u32::MAX` wraps to 0 on advance.
    pub(crate) dir_offset: u32,
    pub(crate) dirname: NameBuf,
    pub(crate) filename: NameBuf,
}

impl<D: BlockDevice, const CACHE: usize> FatVolume<D, CACHE> {
    pub fn new(dev: D) -> Self {
        Self {
            dev,
            geo: Geometry::fallback(),
            cur_info: BlockInfo::unpositioned(0),
            dir_info: BlockInfo::unpositioned(0),
            cache: RunCache::new(),
            stack: DirStack::new(),
            dir_sector: SectorBuf::zeroed(),
            cur_dir: -1,
            dir_offset: u32::MAX,
            dirname: NameBuf::new(),
            filename: NameBuf::new(),
        }
    }

    /// Starting sector of the partition found at init.
    pub fn partition_start(&self) -> u32 {
        self.geo.partition_start
    }

    /// Display name of the current entry: the long filename when one was
    /// assembled, otherwise the 8.3 name. Empty after an error.
    pub fn current_name(&self) -> &str {
        self.filename.as_str()
    }

    /// Display name of the directory being iterated.
    pub fn directory_name(&self) -> &str {
        self.dirname.as_str()
    }

    /// Attribute byte of the current entry, 0 when there is none.
    pub fn current_attributes(&self) -> u8 {
        match self.current_entry() {
            Some(e) => e.attr(),
            None => 0,
        }
    }

    pub fn current_is_directory(&self) -> bool {
        self.current_attributes() & ATTR_DIRECTORY != 0
    }

    /// Whether the current entry is the parent directory ("..").
    pub fn current_is_parent(&self) -> bool {
        self.current_is_directory()
            && self
                .current_entry()
                .is_some_and(|e| e.name_byte(0) == b'.')
    }

    /// Size of the current entry in bytes, 0 when there is none.
    pub fn current_size(&self) -> u32 {
        match self.current_entry() {
            Some(e) => e.size(),
            None => 0,
        }
    }

    /// Timestamp of the current entry in seconds since midnight.
    pub fn current_time_seconds(&self) -> u32 {
        let t = match self.current_entry() {
            Some(e) => e.time_word(),
            None => 0,
        };
        let t = u32::from(t);
        2 * (t & 0x1F) + 60 * ((t >> 5) & 0x3F) + 60 * 60 * ((t >> 11) & 0x1F)
    }

    /// First cluster of the current entry (0 = FAT16 fixed root).
    pub fn current_start_cluster(&self) -> u32 {
        self.cur_info.first_cluster
    }

    /// Absolute starting sector of the current entry.
    pub fn current_start_sector(&self) -> u32 {
        if self.cur_info.first_cluster == 0 {
            self.geo.root_start_sector
        } else {
            self.geo.cluster_lba(self.cur_info.first_cluster)
        }
    }

    /// Location handle for the current entry, usable with
    /// [`enter_directory`](Self::enter_directory).
    pub fn current_location(&self) -> DirLocation {
        DirLocation {
            cluster: self.cur_info.first_cluster,
        }
    }

    /// Reads up to `count` file-relative sectors of the current file into
    /// `dest` (256 words per sector). Returns sectors actually read; short
    /// means a device error or reading past the end of the chain.
    pub fn read_file_blocks(&mut self, file_sector: u32, count: u16, dest: &mut [u16]) -> u16 {
        let fits = u16::try_from(dest.len() / crate::SECTOR_WORDS).unwrap_or(u16::MAX);
        let count = count.min(fits);
        cursor::read_blocks(
            &mut self.dev,
            &self.geo,
            &self.cache,
            &mut self.cur_info,
            file_sector,
            count,
            dest,
        )
    }

    /// Reads the trailing `dest.len()` bytes of the current file (the ID3v1
    /// tag slot). Zero-fills `dest` on any read failure.
    pub fn read_trailing_tag(&mut self, dest: &mut [u8]) {
        let tag = dest.len() as u32;
        let start = self.current_size().saturating_sub(tag);
        let mut sector = start / crate::SECTOR_BYTES as u32;
        let mut offset = (start % crate::SECTOR_BYTES as u32) as usize;

        let mut buf = [0u16; crate::SECTOR_WORDS];
        let mut error = self.read_file_blocks(sector, 1, &mut buf) != 1;

        for out in dest.iter_mut() {
            if !error && offset >= crate::SECTOR_BYTES {
                sector += 1;
                error = self.read_file_blocks(sector, 1, &mut buf) != 1;
                offset = 0;
            }
            if error {
                break;
            }
            *out = (buf[offset / 2] >> (8 * (offset % 2))) as u8;
            offset += 1;
        }

        if error {
            dest.fill(0);
        }
    }

    /// Raw view of the current entry, if the scan position is valid.
    fn current_entry(&self) -> Option<EntryView<'_>> {
        let idx = usize::try_from(self.cur_dir).ok()?;
        if idx >= DIR_ENTRIES_PER_SECTOR {
            return None;
        }
        Some(EntryView::new(&self.dir_sector, idx))
    }
}
