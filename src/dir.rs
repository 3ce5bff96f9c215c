//! Directory layer (spec §4.5): directory files are regular files whose
//! contents are an array of fixed-width [`DiskEntry`] records.
//!
//! Grounded on `rcore-fs-sfs`'s `read_direntry`/`write_direntry`/
//! `append_direntry`/`init_direntry`, which manipulate directory content
//! through the raw block path rather than the public read/write API since
//! no host-memory boundary is involved. `DIRENTRY_SIZE` divides `BLKSIZE`
//! evenly, so unlike the teacher's dirent helpers this crate never needs
//! to worry about an entry straddling a block boundary.

use crate::addr::{self, blockno_for_offset};
use crate::error::{OspfsError, Result};
use crate::fs::Ospfs;
use crate::structs::{
    AsBuf, BlockId, DiskEntry, InodeId, BLKSIZE, DIRENTRY_SIZE, NINDIRECT,
};

fn entry_block(fs: &Ospfs, dir_ino: InodeId, slot: usize) -> Result<BlockId> {
    let inode = fs.read_inode(dir_ino)?;
    let byte_off = (slot * DIRENTRY_SIZE) as u32;
    let blockno = blockno_for_offset(&inode, byte_off, |b| {
        fs.read_pointer_block(b).unwrap_or([0u32; NINDIRECT])
    });
    if blockno == 0 {
        return Err(OspfsError::Io);
    }
    Ok(blockno)
}

pub fn read_entry(fs: &Ospfs, dir_ino: InodeId, slot: usize) -> Result<DiskEntry> {
    let blockno = entry_block(fs, dir_ino, slot)?;
    let block = fs.read_block(blockno)?;
    let within = (slot * DIRENTRY_SIZE) % BLKSIZE;
    let mut entry = crate::util::zeroed_memory::<DiskEntry>();
    entry
        .as_buf_mut()
        .copy_from_slice(&block[within..within + DIRENTRY_SIZE]);
    Ok(entry)
}

pub fn write_entry(fs: &Ospfs, dir_ino: InodeId, slot: usize, entry: &DiskEntry) -> Result<()> {
    let blockno = entry_block(fs, dir_ino, slot)?;
    let mut block = fs.read_block(blockno)?;
    let within = (slot * DIRENTRY_SIZE) % BLKSIZE;
    block[within..within + DIRENTRY_SIZE].copy_from_slice(entry.as_buf());
    fs.write_block(blockno, &block)
}

/// Linear scan over `dir`'s entries for an exact name match (spec §4.5).
pub fn find_direntry(fs: &Ospfs, dir_ino: InodeId, name: &str) -> Result<Option<usize>> {
    let inode = fs.read_inode(dir_ino)?;
    let n = addr::direntries_needed(inode.size);
    for slot in 0..n {
        let entry = read_entry(fs, dir_ino, slot)?;
        if entry.ino != 0 && entry.name.as_str() == name {
            return Ok(Some(slot));
        }
    }
    Ok(None)
}

/// Finds a slot with `ino == 0`, growing `dir` by one block (all entries
/// in a fresh block are zero by `add_block`'s zeroing rule, spec §4.3) if
/// none exists.
pub fn create_blank_direntry(fs: &Ospfs, dir_ino: InodeId) -> Result<usize> {
    let inode = fs.read_inode(dir_ino)?;
    let n = addr::direntries_needed(inode.size);
    for slot in 0..n {
        let entry = read_entry(fs, dir_ino, slot)?;
        if entry.ino == 0 {
            return Ok(slot);
        }
    }
    crate::inode::add_block(fs, dir_ino)?;
    Ok(n)
}

/// Outcome of a [`readdir`] call (spec §4.5).
#[derive(Debug, Eq, PartialEq)]
pub enum ReaddirOutcome {
    /// Reached the end of the directory.
    Done,
    /// The emit callback signalled backpressure; `pos` is where to resume.
    Interrupted,
}

/// Enumerates `dir`'s entries starting at `pos`, synthesizing `.` and `..`
/// at positions 0 and 1 (spec §4.5). `emit(pos, name, ino)` returns `false`
/// to request the scan stop; the returned `u32` is the position to resume
/// from on [`ReaddirOutcome::Interrupted`].
pub fn readdir(
    fs: &Ospfs,
    dir_ino: InodeId,
    parent_ino: InodeId,
    start_pos: u32,
    mut emit: impl FnMut(u32, &str, InodeId) -> bool,
) -> Result<(ReaddirOutcome, u32)> {
    let mut pos = start_pos;
    if pos == 0 {
        if !emit(pos, ".", dir_ino) {
            return Ok((ReaddirOutcome::Interrupted, pos));
        }
        pos = 1;
    }
    if pos == 1 {
        if !emit(pos, "..", parent_ino) {
            return Ok((ReaddirOutcome::Interrupted, pos));
        }
        pos = 2;
    }

    let size = fs.read_inode(dir_ino)?.size;
    loop {
        let byte_off = pos - 2;
        if byte_off >= size {
            return Ok((ReaddirOutcome::Done, pos));
        }
        let slot = (byte_off as usize) / DIRENTRY_SIZE;
        let entry = read_entry(fs, dir_ino, slot)?;
        if entry.ino != 0 {
            if !emit(pos, entry.name.as_str(), entry.ino as InodeId) {
                return Ok((ReaddirOutcome::Interrupted, pos));
            }
        }
        pos += DIRENTRY_SIZE as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::ImageConfig;
    use crate::ns;

    #[test]
    fn readdir_synthesizes_dot_and_dotdot_first() {
        let fs = Ospfs::create(ImageConfig::new(32, 8)).unwrap();
        let root = fs.root_inode();
        ns::create(&fs, root, "a", 0o644).unwrap();
        let mut seen = alloc::vec::Vec::new();
        let (outcome, _) = readdir(&fs, root, root, 0, |_, name, _| {
            seen.push(alloc::string::String::from(name));
            true
        })
        .unwrap();
        assert_eq!(outcome, ReaddirOutcome::Done);
        assert_eq!(seen, alloc::vec![".", "..", "a"]);
    }

    #[test]
    fn readdir_skips_empty_slots() {
        let fs = Ospfs::create(ImageConfig::new(32, 8)).unwrap();
        let root = fs.root_inode();
        ns::create(&fs, root, "a", 0o644).unwrap();
        ns::create(&fs, root, "b", 0o644).unwrap();
        ns::unlink(&fs, root, "a").unwrap();
        let mut seen = alloc::vec::Vec::new();
        readdir(&fs, root, root, 0, |_, name, _| {
            seen.push(alloc::string::String::from(name));
            true
        })
        .unwrap();
        assert_eq!(seen, alloc::vec![".", "..", "b"]);
    }
}
