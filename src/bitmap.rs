//! Free-block bitmap (spec §4.1).
//!
//! Grounded on `rcore-fs-sfs`'s `free_map: RwLock<Dirty<BitVec<u8, Lsb0>>>`
//! and its `BitsetAlloc` trait, which scans for the lowest free bit. `1`
//! means free, matching both the teacher and the image format (spec §6).

use crate::dirty::Dirty;
use crate::structs::BlockId;
use alloc::vec;
use bitvec::prelude::{BitVec, Lsb0};

/// In-memory mirror of the on-image free-block bitmap.
pub struct Bitmap {
    bits: Dirty<BitVec<u8, Lsb0>>,
}

impl Bitmap {
    /// A fresh bitmap with every block marked free.
    pub fn new(nblocks: usize) -> Bitmap {
        let mut bits = BitVec::with_capacity(nblocks);
        bits.extend(core::iter::repeat(true).take(nblocks));
        Bitmap {
            bits: Dirty::new_dirty(bits),
        }
    }

    /// Reconstructs a bitmap from `span` blocks worth of raw bytes, as
    /// stored starting at `BLKN_FREEMAP` (spec §6).
    pub fn from_bytes(bytes: &[u8], nblocks: usize) -> Bitmap {
        let mut raw = vec![0u8; bytes.len()];
        raw.copy_from_slice(bytes);
        let mut bits = BitVec::<u8, Lsb0>::from_vec(raw);
        bits.truncate(nblocks);
        Bitmap {
            bits: Dirty::new(bits),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }

    pub fn dirty(&self) -> bool {
        self.bits.dirty()
    }

    pub fn sync(&mut self) {
        self.bits.sync();
    }

    /// `true` iff block `n` is free.
    pub fn test(&self, n: BlockId) -> bool {
        self.bits[n]
    }

    /// Marks block `n` free.
    pub fn set(&mut self, n: BlockId) {
        self.bits.set(n, true);
    }

    /// Marks block `n` allocated.
    pub fn clear(&mut self, n: BlockId) {
        self.bits.set(n, false);
    }

    /// Number of free bits, for `FsInfo`-style reporting.
    pub fn count_free(&self) -> usize {
        self.bits.count_ones()
    }

    /// Scans from index 0 for the lowest free bit, marks it allocated, and
    /// returns it. Returns 0 — the reserved boot block, never itself
    /// allocatable — to signal "no space" (spec §4.1).
    pub fn allocate(&mut self) -> BlockId {
        let len = self.bits.len();
        match (0..len).find(|&i| self.bits[i]) {
            Some(n) if n != 0 => {
                self.bits.set(n, false);
                n
            }
            _ => 0,
        }
    }

    /// Marks block `n` free. Equivalent to `set(n)`, kept as a distinct
    /// name to mirror the spec's `free(n)` operation.
    pub fn free(&mut self, n: BlockId) {
        self.set(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_returns_lowest_free_bit() {
        let mut bm = Bitmap::new(16);
        bm.clear(0);
        assert_eq!(bm.allocate(), 1);
        assert_eq!(bm.allocate(), 2);
        assert!(!bm.test(1));
        assert!(!bm.test(2));
    }

    #[test]
    fn allocate_signals_no_space_with_zero() {
        let mut bm = Bitmap::new(4);
        for n in 0..4 {
            bm.clear(n);
        }
        assert_eq!(bm.allocate(), 0);
    }

    #[test]
    fn free_marks_bit_set() {
        let mut bm = Bitmap::new(4);
        bm.clear(0);
        bm.clear(1);
        bm.free(1);
        assert!(bm.test(1));
    }
}
