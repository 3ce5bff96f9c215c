//! Block device view (spec §2.1): the image is a contiguous byte array,
//! logically partitioned into fixed-size blocks.
//!
//! Grounded on `rcore-fs::dev::{Device, BlockDevice}`: a small trait the
//! rest of the engine programs against, plus one concrete, in-memory
//! implementation. The spec is explicit that the image is volatile by
//! construction (§1 Non-goals), so unlike the teacher's `std_impl.rs`
//! (`Device for Mutex<File>`), there is no file-backed implementation here
//! — `MemDevice` is the only one this crate ships.

use crate::error::{OspfsError, Result};
use crate::structs::BLKSIZE;
use alloc::vec;
use alloc::vec::Vec;
use spin::RwLock;

/// Abstracts the backing store the engine reads and writes blocks through.
pub trait Device: Send + Sync {
    fn read_block(&self, block: usize, buf: &mut [u8]) -> Result<()>;
    fn write_block(&self, block: usize, buf: &[u8]) -> Result<()>;
    /// Total number of blocks the device holds.
    fn nblocks(&self) -> usize;
    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// A simulated block device backed by a single growable byte buffer.
pub struct MemDevice {
    bytes: RwLock<Vec<u8>>,
    nblocks: usize,
}

impl MemDevice {
    /// Allocates a zeroed image of `nblocks` blocks.
    pub fn new(nblocks: usize) -> MemDevice {
        MemDevice {
            bytes: RwLock::new(vec![0u8; nblocks * BLKSIZE]),
            nblocks,
        }
    }

    /// Wraps an existing byte buffer as an image, e.g. one produced by an
    /// external image builder (out of scope for this crate, spec §1).
    pub fn from_bytes(bytes: Vec<u8>) -> MemDevice {
        let nblocks = bytes.len() / BLKSIZE;
        MemDevice {
            bytes: RwLock::new(bytes),
            nblocks,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes.into_inner()
    }
}

impl Device for MemDevice {
    fn read_block(&self, block: usize, buf: &mut [u8]) -> Result<()> {
        if block >= self.nblocks || buf.len() > BLKSIZE {
            return Err(OspfsError::Io);
        }
        let begin = block * BLKSIZE;
        let image = self.bytes.read();
        buf.copy_from_slice(&image[begin..begin + buf.len()]);
        Ok(())
    }

    fn write_block(&self, block: usize, buf: &[u8]) -> Result<()> {
        if block >= self.nblocks || buf.len() > BLKSIZE {
            return Err(OspfsError::Io);
        }
        let begin = block * BLKSIZE;
        let mut image = self.bytes.write();
        image[begin..begin + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn nblocks(&self) -> usize {
        self.nblocks
    }
}
