//! FAT chain walking: contiguous-run resolution and the per-file run cache.

use heapless::Vec;

use crate::block::BlockDevice;
use crate::block::SectorBuf;

use super::{CacheEntry, Geometry, CHAIN_END, FAT16_BAD, FAT32_BAD};

/// Resolves the contiguous run starting at `cluster`. Returns the run and
/// the first cluster after it (`CHAIN_END` when the chain ends there, hits a
/// bad-cluster marker, or the FAT could not be read).
///
/// Cluster 0 is the FAT16 fixed root: the run covers the whole root region
/// and `CacheEntry::cluster` holds a sector number, not a cluster.
pub(crate) fn contig_run<D: BlockDevice>(
    dev: &mut D,
    geo: &Geometry,
    cluster: u32,
) -> (CacheEntry, u32) {
    if cluster == 0 {
        return (
            CacheEntry {
                cluster: geo.root_start_sector,
                sectors: geo.root_dir_sectors,
            },
            CHAIN_END,
        );
    }
    if cluster == CHAIN_END {
        return (
            CacheEntry {
                cluster: CHAIN_END,
                sectors: 0,
            },
            CHAIN_END,
        );
    }

    let start = cluster;
    let eps = geo.fat_entries_per_sector;
    let mut fat_sector = cluster / eps + geo.first_fat_sector;
    let mut entry = (cluster % eps) as usize;

    let mut buf = SectorBuf::zeroed();
    let mut error = !buf.load(dev, fat_sector);

    let mut cluster = cluster;
    let mut next = CHAIN_END;
    let mut sectors = 0u32;
    let mut contiguous = true;

    while !error && contiguous {
        if entry >= eps as usize {
            fat_sector += 1;
            entry = 0;
            error = !buf.load(dev, fat_sector);
            if error {
                next = CHAIN_END;
                break;
            }
        }
        next = if geo.fat16 {
            u32::from(buf.fat16_entry(entry))
        } else {
            buf.fat32_entry(entry)
        };
        contiguous = next == cluster + 1;
        sectors += geo.sectors_per_cluster;
        cluster += 1;
        entry += 1;
    }

    // End-of-chain and bad-cluster markers both terminate the chain. FAT32
    // entries are compared raw, without masking the reserved high nibble.
    let bad = if geo.fat16 { FAT16_BAD } else { FAT32_BAD };
    if error || next >= bad {
        next = CHAIN_END;
    }

    (
        CacheEntry {
            cluster: start,
            sectors,
        },
        next,
    )
}

/// Run-length cache for the current file. Filled once when the file becomes
/// the current entry; the final slot is always a marker (`sectors == 0`)
/// holding the cluster to re-walk the FAT from, or `CHAIN_END` when the
/// whole chain fit.
pub(crate) struct RunCache<const N: usize> {
    entries: Vec<CacheEntry, N>,
}

impl<const N: usize> RunCache<N> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn fill<D: BlockDevice>(&mut self, dev: &mut D, geo: &Geometry, first: u32) {
        self.entries.clear();
        let mut next = first;
        while self.entries.len() + 1 < N && next != CHAIN_END {
            let (run, n) = contig_run(dev, geo, next);
            next = n;
            let _ = self.entries.push(run);
        }
        let _ = self.entries.push(CacheEntry {
            cluster: next,
            sectors: 0,
        });
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub(crate) fn entry(&self, i: usize) -> CacheEntry {
        self.entries[i]
    }
}
