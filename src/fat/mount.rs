//! Volume initialization: partition table and BPB parsing.

use crate::block::{BlockDevice, SectorBuf};
use crate::SECTOR_BYTES;

use super::{cursor, BlockInfo, DirLocation, FatError, FatVolume, CHAIN_END};

// MBR byte offsets for the first partition table slot.
const PART_TYPE: usize = 0x1C2;
const PART_START: usize = 0x1C6;
const PART_TYPE_FAT16: u8 = 0x06;

// BPB byte offsets, relative to the partition's first sector.
const BPB_BYTES_PER_SECTOR: usize = 11;
const BPB_SECTORS_PER_CLUSTER: usize = 13;
const BPB_RESERVED_SECTORS: usize = 14;
const BPB_NUM_FATS: usize = 16;
const BPB_ROOT_ENTRIES: usize = 17;
const BPB_FAT_SECTORS_16: usize = 22;
const BPB_FAT_SECTORS_32: usize = 36;
const BPB_ROOT_CLUSTER_32: usize = 44;
const BPB_LABEL_16: usize = 43;
const BPB_LABEL_32: usize = 71;
const LABEL_LEN: usize = 11;

impl<D: BlockDevice, const CACHE: usize> FatVolume<D, CACHE> {
    /// Reads the partition table and BPB and positions the cursor at the
    /// start of the root directory. Returns the root location on success.
    ///
    /// On failure (unreadable sectors or a sector size other than 512) the
    /// volume falls back to fixed geometry and stays usable; every later
    /// operation then reports its own errors.
    pub fn init(&mut self) -> Result<DirLocation, FatError> {
        let mut buf = SectorBuf::zeroed();
        let mut error = !buf.load(&mut self.dev, 0);

        let partition_start = buf.dword_at(PART_START);
        // Partition type 0x06 selects FAT16 handling; everything else is
        // treated as FAT32.
        let fat16 = buf.byte(PART_TYPE) == PART_TYPE_FAT16;

        error = error || !buf.load(&mut self.dev, partition_start);

        let bytes_per_sector = buf.word_at(BPB_BYTES_PER_SECTOR) as usize;
        let sectors_per_cluster = u32::from(buf.byte(BPB_SECTORS_PER_CLUSTER));
        let reserved = u32::from(buf.word_at(BPB_RESERVED_SECTORS));
        let num_fats = u32::from(buf.byte(BPB_NUM_FATS));

        self.geo.partition_start = partition_start;
        self.geo.fat16 = fat16;
        self.geo.sectors_per_cluster = sectors_per_cluster;
        self.geo.first_fat_sector = partition_start.wrapping_add(reserved);

        let label_at: usize;
        let root_cluster: u32;
        if fat16 {
            let fat_sectors = u32::from(buf.word_at(BPB_FAT_SECTORS_16));
            let root_entries = u32::from(buf.word_at(BPB_ROOT_ENTRIES));
            self.geo.root_start_sector = partition_start
                .wrapping_add(reserved)
                .wrapping_add(num_fats.wrapping_mul(fat_sectors));
            self.geo.root_dir_sectors = root_entries / super::DIR_ENTRIES_PER_SECTOR as u32;
            self.geo.first_file_sector =
                self.geo.root_start_sector.wrapping_add(self.geo.root_dir_sectors);
            self.geo.fat_entries_per_sector = 256;
            label_at = BPB_LABEL_16;
            // The FAT16 root is a fixed region, not a chain.
            root_cluster = 0;
        } else {
            let fat_sectors = buf.dword_at(BPB_FAT_SECTORS_32);
            self.geo.root_start_sector = 0;
            self.geo.root_dir_sectors = 0;
            self.geo.first_file_sector = partition_start
                .wrapping_add(reserved)
                .wrapping_add(num_fats.wrapping_mul(fat_sectors));
            self.geo.fat_entries_per_sector = 128;
            label_at = BPB_LABEL_32;
            root_cluster = buf.dword_at(BPB_ROOT_CLUSTER_32);
        }

        let mut label = [0u8; LABEL_LEN];
        for (i, b) in label.iter_mut().enumerate() {
            *b = buf.byte(label_at + i);
        }
        self.dirname.set_bytes(&label);
        self.filename.clear();

        // Position the cursor at the first sector of the root directory.
        self.cur_info = BlockInfo {
            sector: 0,
            sectors: 0,
            next: CHAIN_END,
            offset: u32::MAX,
            first_cluster: root_cluster,
            cache_idx: None,
        };
        cursor::seek(&mut self.dev, &self.geo, &self.cache, &mut self.cur_info, 0);

        // No directory has been entered yet; the first enter_directory
        // records cluster 0 as the directory being left.
        self.dir_info = BlockInfo::unpositioned(0);
        self.cur_dir = -1;
        self.dir_offset = u32::MAX;
        self.stack.reset();

        error = error || bytes_per_sector != SECTOR_BYTES;
        if error {
            let fallback = super::Geometry::fallback();
            self.geo.first_fat_sector = fallback.first_fat_sector;
            self.geo.first_file_sector = fallback.first_file_sector;
            self.geo.sectors_per_cluster = fallback.sectors_per_cluster;
            log::warn!("fat: init failed, using fallback geometry");
            return Err(FatError::InitFailure);
        }

        log::debug!(
            "fat: mounted {} partition at sector {}, first file sector {}",
            if fat16 { "FAT16" } else { "FAT32" },
            partition_start,
            self.geo.first_file_sector
        );

        Ok(DirLocation {
            cluster: root_cluster,
        })
    }
}
