//! Directory traversal: forward and backward entry scanning and descent.
//!
//! The scan position is (`dir_offset`, `cur_dir`): a sector offset within
//! the directory and an entry slot within the buffered sector. Long-filename
//! entries accumulate into a working buffer until the ordinary entry they
//! belong to is reached.

use crate::block::BlockDevice;

use super::names::{self, LfnBuf};
use super::{
    cursor, BlockInfo, DirLocation, EntryView, FatError, FatVolume, ATTR_LONG_NAME, ATTR_VOLUME,
    CHAIN_END, DELETED_MARK, DIR_ENTRIES_PER_SECTOR,
};

const LAST_SLOT: i32 = DIR_ENTRIES_PER_SECTOR as i32 - 1;

impl<D: BlockDevice, const CACHE: usize> FatVolume<D, CACHE> {
    /// Descends into a directory and positions the scan on its first
    /// visible entry. `loc` is normally [`current_location`] of a directory
    /// entry; passing the location returned by [`init`] (re)enters the root.
    ///
    /// [`current_location`]: Self::current_location
    /// [`init`]: Self::init
    pub fn enter_directory(&mut self, loc: DirLocation) -> Result<(), FatError> {
        if self.cur_info.first_cluster != loc.cluster {
            // Navigating by saved location rather than the current entry.
            self.prime_cursor(loc.cluster);
            self.filename.clear();
        }

        self.stack.enter(
            self.cur_info.first_cluster,
            self.dir_info.first_cluster,
            self.dirname.as_str(),
        );
        self.dirname = self.filename.clone();

        self.dir_info = BlockInfo {
            cache_idx: None,
            ..self.cur_info
        };
        self.cur_dir = LAST_SLOT;
        self.dir_offset = u32::MAX;

        self.next_entry()
    }

    /// Advances to the next visible entry. At the end of the directory the
    /// scan stays put and the current entry is unchanged.
    ///
    /// Visible entries are ordinary files and directories plus "..";
    /// deleted entries, ".", and long-name fragments are consumed silently,
    /// and the first volume label seen becomes the directory display name
    /// when none is set.
    pub fn next_entry(&mut self) -> Result<(), FatError> {
        let mut lfn = LfnBuf::new();
        let old_offset = self.dir_offset;
        let old_slot = self.cur_dir;
        let mut error = false;
        let mut done = false;

        while !error && !done {
            if self.cur_dir >= LAST_SLOT {
                self.dir_offset = self.dir_offset.wrapping_add(1);
                error = !self.read_dir_sector(self.dir_offset);
                self.cur_dir = -1;
            }
            if self.cur_dir == -1 || self.first_name_byte() != 0 {
                self.cur_dir += 1;
            }

            while !error && !done && self.cur_dir < DIR_ENTRIES_PER_SECTOR as i32 {
                let slot = self.cur_dir as usize;
                let view = EntryView::new(&self.dir_sector, slot);
                let attr = view.attr();
                let b0 = view.name_byte(0);
                let b1 = view.name_byte(1);

                if attr == ATTR_LONG_NAME {
                    lfn.record(&view);
                    self.cur_dir += 1;
                } else if b0 == DELETED_MARK {
                    lfn.clear();
                    self.cur_dir += 1;
                } else if b0 == 0 {
                    // End of directory: restore the previous position.
                    lfn.clear();
                    self.cur_dir = old_slot;
                    if self.dir_offset != old_offset {
                        error = !self.read_dir_sector(old_offset);
                        self.dir_offset = old_offset;
                    }
                    done = true;
                } else if b0 == b'.' {
                    if b1 == b'.' {
                        self.resolve_parent();
                        done = true;
                    } else {
                        // "." is the directory itself; skip it.
                        lfn.clear();
                        self.cur_dir += 1;
                    }
                } else if attr & ATTR_VOLUME != 0 {
                    if self.dirname.is_empty() {
                        names::adopt_label(&view, &lfn, &mut self.dirname);
                    }
                    lfn.clear();
                    self.cur_dir += 1;
                } else {
                    let start = view.start_cluster(self.geo.fat16);
                    self.cache.fill(&mut self.dev, &self.geo, start);
                    self.cur_info.first_cluster = start;
                    self.cur_info.offset = 0;
                    if CACHE > 1 && self.cache.len() > 1 {
                        let run = self.cache.entry(0);
                        self.cur_info.sector = self.geo.cluster_lba(run.cluster);
                        self.cur_info.sectors = run.sectors;
                        self.cur_info.next = self.cache.entry(1).cluster;
                        self.cur_info.cache_idx = Some(0);
                    } else {
                        let (run, next) =
                            super::chain::contig_run(&mut self.dev, &self.geo, start);
                        self.cur_info.sector = self.geo.cluster_lba(run.cluster);
                        self.cur_info.sectors = run.sectors;
                        self.cur_info.next = next;
                        self.cur_info.cache_idx = None;
                    }
                    if lfn.is_empty() {
                        let view = EntryView::new(&self.dir_sector, slot);
                        names::short_name(&view, &mut self.filename);
                    } else {
                        self.filename.set_bytes(lfn.assembled());
                    }
                    done = true;
                }
            }
        }

        if error {
            self.scan_error_reset();
            return Err(FatError::DeviceRead);
        }
        Ok(())
    }

    /// Steps back to the previous visible entry. At the start of the
    /// directory the scan lands on the first entry.
    pub fn previous_entry(&mut self) -> Result<(), FatError> {
        let mut error = false;
        let mut done = false;
        let mut have_entry = false;
        let mut new_offset = 0u32;
        let mut new_slot = 0i32;

        while !error && !done {
            if self.cur_dir == 0 {
                if self.dir_offset == 0 {
                    // Already at the start; resolve the first entry.
                    new_offset = 0;
                    new_slot = 0;
                    done = true;
                } else {
                    self.dir_offset -= 1;
                    error = !self.read_dir_sector(self.dir_offset);
                    self.cur_dir = LAST_SLOT;
                }
            } else {
                self.cur_dir -= 1;
            }

            if !done && !error {
                let view = EntryView::new(&self.dir_sector, self.cur_dir as usize);
                let attr = view.attr();
                let b0 = view.name_byte(0);
                let b1 = view.name_byte(1);

                if have_entry {
                    // Keep stepping back over this entry's name fragments.
                    if attr != ATTR_LONG_NAME {
                        done = true;
                    } else {
                        new_offset = self.dir_offset;
                        new_slot = self.cur_dir;
                    }
                } else if b0 != 0
                    && b0 != DELETED_MARK
                    && attr != ATTR_LONG_NAME
                    && attr != ATTR_VOLUME
                    && (b0 != b'.' || b1 == b'.')
                {
                    have_entry = true;
                    new_offset = self.dir_offset;
                    new_slot = self.cur_dir;
                }
            }
        }

        if !error {
            if new_offset != self.dir_offset {
                error = !self.read_dir_sector(new_offset);
            }
            self.dir_offset = new_offset;
            self.cur_dir = new_slot - 1;
        }

        if error {
            self.scan_error_reset();
            return Err(FatError::DeviceRead);
        }
        // Re-resolve forward so names and the file cursor are rebuilt.
        self.next_entry()
    }

    /// Resolves ".." from the directory stack and primes the cursor for the
    /// parent directory.
    fn resolve_parent(&mut self) {
        let parent = self.stack.top_cluster();
        self.filename.set_str(self.stack.top_name());
        self.prime_cursor(parent);
    }

    /// Points `cur_info` at the start of the chain beginning at `cluster`
    /// (or the fixed root for cluster 0), bypassing the run cache.
    fn prime_cursor(&mut self, cluster: u32) {
        self.cur_info.first_cluster = cluster;
        if cluster == 0 {
            self.cur_info.sector = self.geo.root_start_sector;
            self.cur_info.sectors = self.geo.root_dir_sectors;
            self.cur_info.next = CHAIN_END;
        } else {
            let (run, next) = super::chain::contig_run(&mut self.dev, &self.geo, cluster);
            self.cur_info.sector = self.geo.cluster_lba(run.cluster);
            self.cur_info.sectors = run.sectors;
            self.cur_info.next = next;
        }
        self.cur_info.offset = 0;
        self.cur_info.cache_idx = None;
    }

    /// Reads directory sector `offset` into the entry buffer.
    fn read_dir_sector(&mut self, offset: u32) -> bool {
        cursor::read_blocks(
            &mut self.dev,
            &self.geo,
            &self.cache,
            &mut self.dir_info,
            offset,
            1,
            &mut self.dir_sector.0,
        ) == 1
    }

    fn first_name_byte(&self) -> u8 {
        match usize::try_from(self.cur_dir) {
            Ok(slot) if slot < DIR_ENTRIES_PER_SECTOR => {
                EntryView::new(&self.dir_sector, slot).name_byte(0)
            }
            _ => 0,
        }
    }

    /// After a device error the current entry is cleared and the cursor is
    /// parked on the first data cluster so retries start from known state.
    fn scan_error_reset(&mut self) {
        log::warn!("fat: directory read failed, resetting entry state");
        self.filename.clear();
        self.cur_info = BlockInfo {
            sector: self.geo.first_file_sector,
            sectors: self.geo.sectors_per_cluster,
            next: CHAIN_END,
            offset: 0,
            first_cluster: 2,
            cache_idx: None,
        };
    }
}

#[cfg(test)]
mod unit {
    use super::*;

    #[test]
    fn last_slot_matches_entry_layout() {
        assert_eq!(LAST_SLOT, 15);
        assert_eq!(
            crate::SECTOR_BYTES / super::super::DIR_ENTRY_BYTES,
            DIR_ENTRIES_PER_SECTOR
        );
    }
}
