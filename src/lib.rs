#![no_std]

//! Read-only FAT16/FAT32 navigation engine for an MP3 player appliance.
//!
//! Turns a raw, word-addressed block device into a navigable tree of files
//! and directories: MBR/BPB parsing, cluster-chain resolution with a
//! run-length cache for fragmented files, bidirectional directory iteration
//! with VFAT long-filename assembly, and a bounded directory stack for `..`
//! resolution. Fixed buffers throughout, no allocator, no recursion.

#[cfg(test)]
extern crate std;

pub mod block;
pub mod fat;

pub use block::{BlockDevice, SectorBuf, SECTOR_BYTES, SECTOR_WORDS};
pub use fat::{DirLocation, FatError, FatVolume};

/// Maximum length of an assembled long filename.
pub const MAX_LFN_LEN: usize = 256;

/// Total name bytes shared by all directory-stack frames.
pub const MAX_PATH_CHARS: usize = 300;

/// Maximum directory nesting depth tracked by the directory stack.
pub const MAX_NUM_SUBDIRS: usize = 150;

/// Default capacity of the per-file FAT run-length cache.
pub const FAT_CACHE_ENTRIES: usize = 2048;
