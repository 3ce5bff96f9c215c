//! Block addressing (spec §4.2).
//!
//! Grounded on `rcore-fs-sfs`'s `get_disk_block_id`/`set_disk_block_id`
//! three-level translation, pulled apart into the pure index functions the
//! spec calls for so the size engine and the read/write paths can share
//! one addressing truth without going through the device.

use crate::structs::{BlockId, DiskInode, FileType, DIRENTRY_SIZE, NDIRECT, NINDIRECT};

/// `true` iff file-block index `b` falls in the doubly-indirect range.
pub fn is_indirect2(b: usize) -> bool {
    b >= NDIRECT + NINDIRECT
}

/// `true` iff `b` falls in the singly-indirect range.
pub fn is_indirect(b: usize) -> bool {
    b >= NDIRECT && b < NDIRECT + NINDIRECT
}

/// Slot within the `indirect2` table that holds the indirect block
/// covering `b`. Only meaningful when `is_indirect2(b)`.
pub fn indir_slot(b: usize) -> usize {
    if is_indirect2(b) {
        (b - NDIRECT - NINDIRECT) / NINDIRECT
    } else {
        0
    }
}

/// Slot within whichever block actually holds the pointer to `b`'s data
/// (the inode's `direct` array, the `indirect` block, or the relevant
/// second-level indirect block).
pub fn direct_slot(b: usize) -> usize {
    if b < NDIRECT {
        b
    } else if b < NDIRECT + NINDIRECT {
        b - NDIRECT
    } else {
        (b - NDIRECT - NINDIRECT) % NINDIRECT
    }
}

/// Number of file blocks needed to hold `size` bytes.
pub fn blocks_needed(size: u32) -> usize {
    let block_size = crate::structs::BLKSIZE as u32;
    ((size + block_size - 1) / block_size) as usize
}

/// Number of directory entries `size` bytes of directory content holds.
pub fn direntries_needed(size: u32) -> usize {
    (size as usize) / DIRENTRY_SIZE
}

/// Resolves `(inode, byte_offset)` to a data block number. Returns 0 when
/// `byte_offset >= inode.size` or `inode` is a symlink (spec §4.2); the
/// caller must already hold the relevant indirect/indirect2 block
/// contents, passed as `read_block`, a callback returning the `NINDIRECT`
/// `u32` pointers stored in block `blockno`.
pub fn blockno_for_offset(
    inode: &DiskInode,
    byte_offset: u32,
    read_block: impl Fn(BlockId) -> [u32; NINDIRECT],
) -> BlockId {
    if inode.ftype == FileType::SymLink || byte_offset >= inode.size {
        return 0;
    }
    let b = (byte_offset as usize) / crate::structs::BLKSIZE;
    let blocks = inode.blocks();
    if b < NDIRECT {
        return blocks.direct[b] as BlockId;
    }
    if b < NDIRECT + NINDIRECT {
        if blocks.indirect == 0 {
            return 0;
        }
        let table = read_block(blocks.indirect as BlockId);
        return table[direct_slot(b)] as BlockId;
    }
    if blocks.indirect2 == 0 {
        return 0;
    }
    let l1 = read_block(blocks.indirect2 as BlockId);
    let indirect_blkno = l1[indir_slot(b)];
    if indirect_blkno == 0 {
        return 0;
    }
    let l2 = read_block(indirect_blkno as BlockId);
    l2[direct_slot(b)] as BlockId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_agree_with_spec() {
        assert!(!is_indirect2(NDIRECT + NINDIRECT - 1));
        assert!(is_indirect2(NDIRECT + NINDIRECT));
        assert_eq!(direct_slot(NDIRECT - 1), NDIRECT - 1);
        assert_eq!(direct_slot(NDIRECT), 0);
        assert_eq!(direct_slot(NDIRECT + NINDIRECT), 0);
        assert_eq!(indir_slot(NDIRECT + NINDIRECT), 0);
        assert_eq!(indir_slot(NDIRECT + NINDIRECT + NINDIRECT), 1);
    }

    #[test]
    fn blocks_needed_rounds_up() {
        assert_eq!(blocks_needed(0), 0);
        assert_eq!(blocks_needed(1), 1);
        assert_eq!(blocks_needed(crate::structs::BLKSIZE as u32), 1);
        assert_eq!(blocks_needed(crate::structs::BLKSIZE as u32 + 1), 2);
    }
}
