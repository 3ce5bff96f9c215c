//! Namespace operations (spec §4.6): `create`, `link`, `unlink`,
//! `symlink`, plus `rename`.
//!
//! Grounded on `rcore-fs-sfs::INodeImpl`'s `create2`/`link`/`unlink`/
//! `move_`: the same four-operation shape, generalized from the teacher's
//! one-inode-per-block scheme to OSPFS's fixed inode table, plus a
//! `rename` supplementing the distilled spec (spec's own `link`+`unlink`
//! pair is exactly what the teacher's `move_` reduces to when source and
//! destination directories are the `rcore-fs` VFS's concern, not the
//! engine's — here `rename` is a first-class engine operation instead,
//! since OSPFS has no separate VFS layer to host it).

use crate::dir;
use crate::error::{OspfsError, Result};
use crate::fs::Ospfs;
use crate::inode;
use crate::structs::{DiskEntry, DiskInode, FileType, InodeId, MAXNAMELEN, MAXSYMLINKLEN};

fn check_name(name: &str) -> Result<()> {
    if name.len() > MAXNAMELEN {
        return Err(OspfsError::NameTooLong);
    }
    Ok(())
}

fn check_dir(fs: &Ospfs, dir_ino: InodeId) -> Result<()> {
    if fs.read_inode(dir_ino)?.ftype != FileType::Dir {
        return Err(OspfsError::NotDir);
    }
    Ok(())
}

pub fn lookup(fs: &Ospfs, dir_ino: InodeId, name: &str) -> Result<InodeId> {
    check_dir(fs, dir_ino)?;
    match dir::find_direntry(fs, dir_ino, name)? {
        Some(slot) => Ok(dir::read_entry(fs, dir_ino, slot)?.ino as InodeId),
        None => Err(OspfsError::NotFound),
    }
}

/// Creates a new regular file named `name` in `dir` (spec §4.6). The new
/// inode is fully populated and written before the directory entry's
/// `ino` is set, so a concurrent-looking reader never observes a dangling
/// reference.
pub fn create(fs: &Ospfs, dir_ino: InodeId, name: &str, mode: u16) -> Result<InodeId> {
    check_name(name)?;
    check_dir(fs, dir_ino)?;
    if dir::find_direntry(fs, dir_ino, name)?.is_some() {
        return Err(OspfsError::Exists);
    }

    let slot = dir::create_blank_direntry(fs, dir_ino)?;
    let ino = fs.alloc_inode()?;

    let new_inode = DiskInode {
        nlink: 1,
        ..DiskInode::new_reg(mode)
    };
    fs.write_inode(ino, &new_inode)?;

    let entry = DiskEntry {
        ino: ino as u32,
        name: name.into(),
    };
    dir::write_entry(fs, dir_ino, slot, &entry)?;
    Ok(ino)
}

/// Binds `dst_name` in `dir` to the existing inode `src_ino` (spec §4.6).
/// Hard-linking a directory is the caller's responsibility to avoid; the
/// engine does not check.
pub fn link(fs: &Ospfs, src_ino: InodeId, dir_ino: InodeId, dst_name: &str) -> Result<()> {
    check_name(dst_name)?;
    check_dir(fs, dir_ino)?;
    if dir::find_direntry(fs, dir_ino, dst_name)?.is_some() {
        return Err(OspfsError::Exists);
    }

    let slot = dir::create_blank_direntry(fs, dir_ino)?;
    let entry = DiskEntry {
        ino: src_ino as u32,
        name: dst_name.into(),
    };
    dir::write_entry(fs, dir_ino, slot, &entry)?;

    let mut src = fs.read_inode(src_ino)?;
    src.nlink += 1;
    fs.write_inode(src_ino, &src)?;
    Ok(())
}

/// Removes `name` from `dir` (spec §4.6). When the target's `nlink` drops
/// to 0, releases its blocks (symlinks release implicitly, their data
/// fits in the inode record).
pub fn unlink(fs: &Ospfs, dir_ino: InodeId, name: &str) -> Result<()> {
    check_dir(fs, dir_ino)?;
    let slot = dir::find_direntry(fs, dir_ino, name)?.ok_or(OspfsError::NotFound)?;
    let entry = dir::read_entry(fs, dir_ino, slot)?;
    let target_ino = entry.ino as InodeId;

    dir::write_entry(
        fs,
        dir_ino,
        slot,
        &DiskEntry {
            ino: 0,
            name: "".into(),
        },
    )?;

    let mut target = fs.read_inode(target_ino)?;
    target.nlink -= 1;
    let now_free = target.nlink == 0;
    let is_symlink = target.ftype == FileType::SymLink;
    fs.write_inode(target_ino, &target)?;

    if now_free && !is_symlink {
        inode::change_size(fs, target_ino, 0)?;
    }
    Ok(())
}

/// Creates a symlink named `name` in `dir` whose target is `target` (spec
/// §4.6). `target` is rejected with `NAME_TOO_LONG` if it would not fit
/// in the inode's symlink storage.
pub fn symlink(fs: &Ospfs, dir_ino: InodeId, name: &str, target: &str) -> Result<InodeId> {
    check_name(name)?;
    check_dir(fs, dir_ino)?;
    if target.len() > MAXSYMLINKLEN {
        return Err(OspfsError::NameTooLong);
    }
    if dir::find_direntry(fs, dir_ino, name)?.is_some() {
        return Err(OspfsError::Exists);
    }

    let slot = dir::create_blank_direntry(fs, dir_ino)?;
    let ino = fs.alloc_inode()?;

    let mut new_inode = DiskInode::new_symlink();
    new_inode.nlink = 1;
    new_inode.size = target.len() as u32;
    new_inode.symlink_bytes_mut()[..target.len()].copy_from_slice(target.as_bytes());
    fs.write_inode(ino, &new_inode)?;

    let entry = DiskEntry {
        ino: ino as u32,
        name: name.into(),
    };
    dir::write_entry(fs, dir_ino, slot, &entry)?;
    Ok(ino)
}

/// Moves `old_name` from `old_dir` to `new_name` in `new_dir` (not in
/// spec.md's distilled operation list, but implied by its `move_`-shaped
/// counterpart in the teacher and a natural consequence of already having
/// `link` + `unlink`; see DESIGN.md and SPEC_FULL.md AMBIENT-6). If
/// `new_name` already exists in `new_dir`, that entry is removed first,
/// matching the teacher's overwrite-on-rename semantics. Moving a directory
/// across directories adjusts `nlink` on both parents to account for the
/// moved subdirectory's (unstored) `..` pointer.
pub fn rename(
    fs: &Ospfs,
    old_dir: InodeId,
    old_name: &str,
    new_dir: InodeId,
    new_name: &str,
) -> Result<()> {
    check_name(new_name)?;
    check_dir(fs, old_dir)?;
    check_dir(fs, new_dir)?;
    if old_dir == new_dir && old_name == new_name {
        return dir::find_direntry(fs, old_dir, old_name)?
            .map(|_| ())
            .ok_or(OspfsError::NotFound);
    }

    let old_slot = dir::find_direntry(fs, old_dir, old_name)?.ok_or(OspfsError::NotFound)?;
    let entry = dir::read_entry(fs, old_dir, old_slot)?;
    let moved_ftype = fs.read_inode(entry.ino as InodeId)?.ftype;

    if dir::find_direntry(fs, new_dir, new_name)?.is_some() {
        unlink(fs, new_dir, new_name)?;
    }

    let new_slot = dir::create_blank_direntry(fs, new_dir)?;
    dir::write_entry(
        fs,
        new_dir,
        new_slot,
        &DiskEntry {
            ino: entry.ino,
            name: new_name.into(),
        },
    )?;
    dir::write_entry(
        fs,
        old_dir,
        old_slot,
        &DiskEntry {
            ino: 0,
            name: "".into(),
        },
    )?;

    if moved_ftype == FileType::Dir && old_dir != new_dir {
        let mut od = fs.read_inode(old_dir)?;
        od.nlink -= 1;
        fs.write_inode(old_dir, &od)?;
        let mut nd = fs.read_inode(new_dir)?;
        nd.nlink += 1;
        fs.write_inode(new_dir, &nd)?;
    }
    Ok(())
}
