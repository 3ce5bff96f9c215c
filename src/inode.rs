//! File size engine, file I/O, and symlink resolution (spec §4.3, §4.4,
//! §4.7).
//!
//! Grounded on `rcore-fs-sfs`'s `INodeImpl::_resize` (growth/shrink of the
//! three-level pointer scaffolding) and `_io_at`/`_read_at`/`_write_at`
//! (the block-wise transfer loop, which walks `[pos, pos+count)` one block
//! span at a time). Unlike the teacher, which keeps one cached
//! `DiskInode` per open `INodeImpl` and syncs it on `Drop`, this engine
//! re-reads and re-writes the fixed inode-table record on every mutating
//! step, since OSPFS has no open-file-handle concept above the inode
//! table itself (spec §4.3-§4.4 operate directly on "inode `i`").

use crate::addr::{self, blockno_for_offset, direct_slot, indir_slot};
use crate::error::{OspfsError, Result};
use crate::fs::Ospfs;
use crate::host::{CopyIn, CopyOut, Identity};
use crate::structs::{
    BlockId, FileType, InodeId, BLKSIZE, MAXFILEBLKS, MAXSYMLINKLEN, NDIRECT, NINDIRECT,
};
use alloc::string::String;
use alloc::vec::Vec;

/// Grows inode `ino` by one block (spec §4.3). Transactional: on any
/// failure mid-sequence every block this call allocated is freed, every
/// pointer slot this call wrote in a pre-existing table is reset to 0, and
/// `size` is left untouched.
pub fn add_block(fs: &Ospfs, ino: InodeId) -> Result<()> {
    let mut inode = fs.read_inode(ino)?;
    let old_size = inode.size;

    // A non-block-aligned tail block already exists and is already counted
    // in `blocks_needed`; growing just pads it out to the boundary.
    if old_size % BLKSIZE as u32 != 0 {
        inode.size = (old_size / BLKSIZE as u32 + 1) * BLKSIZE as u32;
        fs.write_inode(ino, &inode)?;
        return Ok(());
    }

    let b = (old_size as usize) / BLKSIZE;
    if b >= MAXFILEBLKS {
        return Err(OspfsError::Io);
    }

    let mut allocated: Vec<BlockId> = Vec::new();
    let mut table_writes: Vec<(BlockId, usize)> = Vec::new();

    let outcome = (|| -> Result<()> {
        if b < NDIRECT {
            let data = fs.alloc_block()?;
            allocated.push(data);
            inode.blocks_mut().direct[b] = data as u32;
        } else if b < NDIRECT + NINDIRECT {
            let pre_existing = inode.blocks().indirect != 0;
            let indirect_block = if pre_existing {
                inode.blocks().indirect as BlockId
            } else {
                let nb = fs.alloc_block()?;
                allocated.push(nb);
                inode.blocks_mut().indirect = nb as u32;
                nb
            };
            let data = fs.alloc_block()?;
            allocated.push(data);
            let slot = direct_slot(b);
            fs.write_pointer_slot(indirect_block, slot, data as u32)?;
            if pre_existing {
                table_writes.push((indirect_block, slot));
            }
        } else {
            let pre_existing2 = inode.blocks().indirect2 != 0;
            let indirect2_block = if pre_existing2 {
                inode.blocks().indirect2 as BlockId
            } else {
                let nb = fs.alloc_block()?;
                allocated.push(nb);
                inode.blocks_mut().indirect2 = nb as u32;
                nb
            };
            let i1 = indir_slot(b);
            let l1 = fs.read_pointer_block(indirect2_block)?;
            let pre_existing1 = l1[i1] != 0;
            let indirect_block = if pre_existing1 {
                l1[i1] as BlockId
            } else {
                let nb = fs.alloc_block()?;
                allocated.push(nb);
                fs.write_pointer_slot(indirect2_block, i1, nb as u32)?;
                if pre_existing2 {
                    table_writes.push((indirect2_block, i1));
                }
                nb
            };
            let data = fs.alloc_block()?;
            allocated.push(data);
            let slot = direct_slot(b);
            fs.write_pointer_slot(indirect_block, slot, data as u32)?;
            if pre_existing1 {
                table_writes.push((indirect_block, slot));
            }
        }
        Ok(())
    })();

    match outcome {
        Ok(()) => {
            inode.size = old_size + BLKSIZE as u32;
            fs.write_inode(ino, &inode)?;
            Ok(())
        }
        Err(e) => {
            for (block, slot) in table_writes {
                fs.write_pointer_slot(block, slot, 0)?;
            }
            for block in allocated {
                fs.free_block(block);
            }
            warn!("ospfs: add_block({}) rolled back: {:?}", ino, e);
            Err(e)
        }
    }
}

/// Shrinks inode `ino` by one block (spec §4.3). Cascades: frees an
/// indirect or indirect2 block the moment its last occupant is removed.
pub fn remove_block(fs: &Ospfs, ino: InodeId) -> Result<()> {
    let mut inode = fs.read_inode(ino)?;
    if inode.size == 0 {
        return Err(OspfsError::Io);
    }
    let blocks_before = addr::blocks_needed(inode.size);
    let b = blocks_before - 1;

    if b < NDIRECT {
        let data = inode.blocks().direct[b];
        if data == 0 {
            return Err(OspfsError::Io);
        }
        inode.blocks_mut().direct[b] = 0;
        fs.free_block(data as BlockId);
    } else if b < NDIRECT + NINDIRECT {
        let indirect_block = inode.blocks().indirect as BlockId;
        if indirect_block == 0 {
            return Err(OspfsError::Io);
        }
        let slot = direct_slot(b);
        let table = fs.read_pointer_block(indirect_block)?;
        let data = table[slot];
        if data == 0 {
            return Err(OspfsError::Io);
        }
        fs.write_pointer_slot(indirect_block, slot, 0)?;
        fs.free_block(data as BlockId);
        if slot == 0 {
            fs.free_block(indirect_block);
            inode.blocks_mut().indirect = 0;
        }
    } else {
        let indirect2_block = inode.blocks().indirect2 as BlockId;
        if indirect2_block == 0 {
            return Err(OspfsError::Io);
        }
        let i1 = indir_slot(b);
        let l1 = fs.read_pointer_block(indirect2_block)?;
        let indirect_block = l1[i1] as BlockId;
        if indirect_block == 0 {
            return Err(OspfsError::Io);
        }
        let slot = direct_slot(b);
        let table = fs.read_pointer_block(indirect_block)?;
        let data = table[slot];
        if data == 0 {
            return Err(OspfsError::Io);
        }
        fs.write_pointer_slot(indirect_block, slot, 0)?;
        fs.free_block(data as BlockId);
        if slot == 0 {
            fs.free_block(indirect_block);
            fs.write_pointer_slot(indirect2_block, i1, 0)?;
            if i1 == 0 {
                fs.free_block(indirect2_block);
                inode.blocks_mut().indirect2 = 0;
            }
        }
    }

    inode.size = b as u32 * BLKSIZE as u32;
    fs.write_inode(ino, &inode)?;
    Ok(())
}

/// Grows or shrinks inode `ino` one block at a time until it reaches
/// `new_size` (spec §4.3). On `NO_SPACE` during growth, unwinds back to
/// the pre-call size and propagates the error, leaving `size` and the
/// reachable-block set bitwise unchanged.
pub fn change_size(fs: &Ospfs, ino: InodeId, new_size: u32) -> Result<()> {
    let old_size = fs.read_inode(ino)?.size;
    let target_blocks = addr::blocks_needed(new_size);

    while addr::blocks_needed(fs.read_inode(ino)?.size) < target_blocks {
        if let Err(e) = add_block(fs, ino) {
            while addr::blocks_needed(fs.read_inode(ino)?.size) > addr::blocks_needed(old_size) {
                remove_block(fs, ino)?;
            }
            let mut inode = fs.read_inode(ino)?;
            inode.size = old_size;
            fs.write_inode(ino, &inode)?;
            return Err(e);
        }
    }
    while addr::blocks_needed(fs.read_inode(ino)?.size) > target_blocks {
        remove_block(fs, ino)?;
    }

    let mut inode = fs.read_inode(ino)?;
    inode.size = new_size;
    fs.write_inode(ino, &inode)?;
    Ok(())
}

fn lookup_block(fs: &Ospfs, inode: &crate::structs::DiskInode, pos: u32) -> BlockId {
    blockno_for_offset(inode, pos, |b| {
        fs.read_pointer_block(b).unwrap_or([0u32; NINDIRECT])
    })
}

/// Copies up to `buf.len()` bytes starting at `pos` out of inode `ino`
/// (spec §4.4). Clamps the transfer to `size`; a host-reported fault aborts
/// the loop, returning bytes transferred so far, or `FAULT` if none.
pub fn read(fs: &Ospfs, ino: InodeId, pos: u32, buf: &mut [u8], copy_out: CopyOut) -> Result<usize> {
    let inode = fs.read_inode(ino)?;
    let avail = inode.size.saturating_sub(pos);
    let count = core::cmp::min(buf.len() as u32, avail) as usize;

    let mut amount = 0usize;
    let mut p = pos;
    while amount < count {
        let within = (p as usize) % BLKSIZE;
        let tail = BLKSIZE - within;
        let n = core::cmp::min(count - amount, tail);

        let blockno = lookup_block(fs, &inode, p);
        if blockno == 0 {
            return if amount == 0 { Err(OspfsError::Io) } else { Ok(amount) };
        }
        let block = fs.read_block(blockno)?;
        if !copy_out(&mut buf[amount..amount + n], &block[within..within + n]) {
            return if amount == 0 { Err(OspfsError::Fault) } else { Ok(amount) };
        }
        amount += n;
        p += n as u32;
    }
    Ok(amount)
}

/// Copies `buf` into inode `ino` starting at `pos` (spec §4.4). When
/// `append` is set, `pos` is first reset to the current size. Extends via
/// [`change_size`] when the write would grow the file; a failed extension
/// propagates without transferring any bytes.
pub fn write(
    fs: &Ospfs,
    ino: InodeId,
    pos: u32,
    buf: &[u8],
    append: bool,
    copy_in: CopyIn,
) -> Result<usize> {
    let mut inode = fs.read_inode(ino)?;
    let mut p = if append { inode.size } else { pos };
    let count = buf.len() as u32;

    let end = p + count;
    if end > inode.size {
        change_size(fs, ino, end)?;
        inode = fs.read_inode(ino)?;
    }

    let mut amount = 0usize;
    while (amount as u32) < count {
        let within = (p as usize) % BLKSIZE;
        let tail = BLKSIZE - within;
        let n = core::cmp::min((count - amount as u32) as usize, tail);

        let blockno = lookup_block(fs, &inode, p);
        if blockno == 0 {
            return if amount == 0 { Err(OspfsError::Io) } else { Ok(amount) };
        }
        let mut block = fs.read_block(blockno)?;
        if !copy_in(&mut block[within..within + n], &buf[amount..amount + n]) {
            return if amount == 0 { Err(OspfsError::Fault) } else { Ok(amount) };
        }
        fs.write_block(blockno, &block)?;
        amount += n;
        p += n as u32;
    }
    Ok(amount)
}

/// Resolves a symlink's stored target (spec §4.7). A conditional symlink
/// (`root?PRIMARY:FALLBACK`) resolves to `PRIMARY` for the superuser and
/// `FALLBACK` otherwise; the split is recomputed on a scratch copy every
/// call and the stored bytes are never mutated (spec §9).
pub fn follow_link(fs: &Ospfs, ino: InodeId, identity: Identity) -> Result<String> {
    let inode = fs.read_inode(ino)?;
    if inode.ftype != FileType::SymLink {
        return Err(OspfsError::Io);
    }
    let len = (inode.size as usize).min(MAXSYMLINKLEN);
    let target = core::str::from_utf8(&inode.symlink_bytes()[..len]).map_err(|_| OspfsError::Io)?;

    const PREFIX: &str = "root?";
    if let Some(rest) = target.strip_prefix(PREFIX) {
        if let Some(colon) = rest.find(':') {
            let primary = &rest[..colon];
            let fallback = &rest[colon + 1..];
            let chosen = if identity.is_superuser() { primary } else { fallback };
            return Ok(String::from(chosen));
        }
    }
    Ok(String::from(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::ImageConfig;
    use crate::host::memcpy;
    use crate::ns;

    fn small_fs() -> Ospfs {
        Ospfs::create(ImageConfig::new(64, 16)).unwrap()
    }

    #[test]
    fn add_block_pads_partial_tail_without_allocating() {
        let fs = small_fs();
        let dir = fs.root_inode();
        let ino = ns::create(&fs, dir, "f", 0o644).unwrap();
        let free_before = fs.free_blocks();
        change_size(&fs, ino, 10).unwrap();
        let free_after_first_grow = fs.free_blocks();
        assert_eq!(free_before - free_after_first_grow, 1);
        add_block(&fs, ino).unwrap();
        let inode = fs.read_inode(ino).unwrap();
        assert_eq!(inode.size, BLKSIZE as u32);
        assert_eq!(fs.free_blocks(), free_after_first_grow);
    }

    #[test]
    fn write_then_read_round_trips() {
        let fs = small_fs();
        let dir = fs.root_inode();
        let ino = ns::create(&fs, dir, "f", 0o644).unwrap();
        let data = b"hello, ospfs";
        let n = write(&fs, ino, 0, data, false, &mut memcpy).unwrap();
        assert_eq!(n, data.len());
        let mut out = [0u8; 12];
        let n = read(&fs, ino, 0, &mut out, &mut memcpy).unwrap();
        assert_eq!(n, data.len());
        assert_eq!(&out, data);
    }

    #[test]
    fn grow_crosses_direct_indirect_boundary() {
        let fs = small_fs();
        let dir = fs.root_inode();
        let ino = ns::create(&fs, dir, "f", 0o644).unwrap();
        let target = (NDIRECT as u32) * BLKSIZE as u32 + 17;
        change_size(&fs, ino, target).unwrap();
        let inode = fs.read_inode(ino).unwrap();
        assert_eq!(inode.size, target);
        assert_ne!(inode.blocks().indirect, 0);
    }

    #[test]
    fn enospc_rolls_back_size_and_blocks() {
        let fs = Ospfs::create(ImageConfig::new(32, 8)).unwrap();
        let dir = fs.root_inode();
        let ino = ns::create(&fs, dir, "f", 0o644).unwrap();
        // Drain free blocks down to 2.
        let mut hogs = Vec::new();
        while fs.free_blocks() > 2 {
            hogs.push(fs.alloc_block().unwrap());
        }
        let free_before = fs.free_blocks();
        let size_before = fs.read_inode(ino).unwrap().size;
        let huge = (NDIRECT as u32 + NINDIRECT as u32 + 10) * BLKSIZE as u32;
        let err = change_size(&fs, ino, huge).unwrap_err();
        assert_eq!(err, OspfsError::NoSpace);
        assert_eq!(fs.read_inode(ino).unwrap().size, size_before);
        assert_eq!(fs.free_blocks(), free_before);
        for b in hogs {
            fs.free_block(b);
        }
    }

    #[test]
    fn conditional_symlink_resolves_by_identity_without_mutating() {
        let fs = small_fs();
        let dir = fs.root_inode();
        ns::symlink(&fs, dir, "c", "root?/priv:/pub").unwrap();
        let ino = ns::lookup(&fs, dir, "c").unwrap();
        let as_root = follow_link(&fs, ino, Identity::superuser()).unwrap();
        let as_user = follow_link(&fs, ino, Identity::user()).unwrap();
        assert_eq!(as_root, "/priv");
        assert_eq!(as_user, "/pub");
        let as_root_again = follow_link(&fs, ino, Identity::superuser()).unwrap();
        assert_eq!(as_root_again, "/priv");
    }

    #[test]
    fn read_fault_on_first_block_returns_fault() {
        let fs = small_fs();
        let dir = fs.root_inode();
        let ino = ns::create(&fs, dir, "f", 0o644).unwrap();
        write(&fs, ino, 0, &[1u8; 10], false, &mut memcpy).unwrap();
        let mut out = [0u8; 10];
        let err = read(&fs, ino, 0, &mut out, &mut |_, _| false).unwrap_err();
        assert_eq!(err, OspfsError::Fault);
    }

    #[test]
    fn read_fault_mid_transfer_returns_bytes_so_far() {
        let fs = small_fs();
        let dir = fs.root_inode();
        let ino = ns::create(&fs, dir, "f", 0o644).unwrap();
        let len = BLKSIZE + 10;
        let data: alloc::vec::Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        write(&fs, ino, 0, &data, false, &mut memcpy).unwrap();

        let mut out = alloc::vec![0u8; len];
        let mut calls = 0;
        let mut fail_after_first = |dst: &mut [u8], src: &[u8]| {
            calls += 1;
            if calls == 1 {
                dst.copy_from_slice(src);
                true
            } else {
                false
            }
        };
        let n = read(&fs, ino, 0, &mut out, &mut fail_after_first).unwrap();
        assert_eq!(n, BLKSIZE);
    }

    #[test]
    fn write_fault_on_first_block_returns_fault() {
        let fs = small_fs();
        let dir = fs.root_inode();
        let ino = ns::create(&fs, dir, "f", 0o644).unwrap();
        let err = write(&fs, ino, 0, &[1u8; 10], false, &mut |_, _| false).unwrap_err();
        assert_eq!(err, OspfsError::Fault);
    }
}
