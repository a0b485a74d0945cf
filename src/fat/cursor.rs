//! Cursor positioning over a cluster chain and multi-run sector reads.

use crate::block::BlockDevice;
use crate::SECTOR_WORDS;

use super::chain::{self, RunCache};
use super::{BlockInfo, Geometry, CHAIN_END};

#[inline]
fn in_window(info: &BlockInfo, target: u32) -> bool {
    target >= info.offset && target < info.offset.wrapping_add(info.sectors)
}

/// Positions `info` so its run contains file-relative sector `target`.
///
/// Tries the run cache first (forward, then backward), falls back to a reset
/// plus a live FAT walk. Never fails visibly: if the chain ends before
/// `target` the cursor is simply left short, which the reader reports as a
/// short read.
pub(crate) fn seek<D: BlockDevice, const N: usize>(
    dev: &mut D,
    geo: &Geometry,
    cache: &RunCache<N>,
    info: &mut BlockInfo,
    target: u32,
) {
    // Forward through the cache.
    while let Some(i) = info.cache_idx {
        if info.next == CHAIN_END || in_window(info, target) || target < info.offset {
            break;
        }
        let step = i + 1;
        if step + 1 >= cache.len() {
            // The next slot is the re-walk marker; `info.next` already holds
            // its cluster, so continue on the FAT below.
            info.cache_idx = None;
            break;
        }
        let run = cache.entry(step);
        info.offset = info.offset.wrapping_add(info.sectors);
        info.sector = geo.cluster_lba(run.cluster);
        info.sectors = run.sectors;
        info.next = cache.entry(step + 1).cluster;
        info.cache_idx = Some(step);
    }

    // Backward through the cache.
    while let Some(i) = info.cache_idx {
        if i == 0 || info.next == CHAIN_END || target >= info.offset {
            break;
        }
        let prev = i - 1;
        let run = cache.entry(prev);
        info.offset = info.offset.wrapping_sub(run.sectors);
        info.sector = geo.cluster_lba(run.cluster);
        info.sectors = run.sectors;
        info.next = cache.entry(prev + 1).cluster;
        info.cache_idx = Some(prev);
    }

    // Cold backward seek: rewind to the start of the chain.
    if !in_window(info, target) && target < info.offset {
        info.next = info.first_cluster;
        info.sectors = 0;
        info.offset = 0;
    }

    // Live FAT walk.
    while !in_window(info, target)
        && info.next != CHAIN_END
        && target >= info.offset.wrapping_add(info.sectors)
    {
        let (run, next) = chain::contig_run(dev, geo, info.next);
        info.next = next;
        info.sector = if info.first_cluster == 0 {
            geo.root_start_sector
        } else {
            geo.cluster_lba(run.cluster)
        };
        info.offset = info.offset.wrapping_add(info.sectors);
        info.sectors = run.sectors;
        info.cache_idx = None;
    }
}

/// Reads `count` file-relative sectors starting at `block` into `dest`,
/// seeking and splitting across runs as needed. Returns sectors actually
/// read; short means the device failed or the chain ended first.
pub(crate) fn read_blocks<D: BlockDevice, const N: usize>(
    dev: &mut D,
    geo: &Geometry,
    cache: &RunCache<N>,
    info: &mut BlockInfo,
    mut block: u32,
    count: u16,
    dest: &mut [u16],
) -> u16 {
    let mut total: u16 = 0;
    let mut pos = 0usize;

    while total < count {
        if !in_window(info, block) {
            seek(dev, geo, cache, info, block);
            if !in_window(info, block) {
                break;
            }
        }

        let avail = info.offset.wrapping_add(info.sectors).wrapping_sub(block);
        let want = u32::from(count - total);
        let xfer = avail.min(want) as u16;

        let abs = info.sector + (block - info.offset);
        let words = usize::from(xfer) * SECTOR_WORDS;
        let got = dev.read_sectors(abs, xfer, &mut dest[pos..pos + words]);

        block += u32::from(got);
        total += got;
        pos += usize::from(got) * SECTOR_WORDS;

        if got < xfer {
            break;
        }
    }

    total
}
