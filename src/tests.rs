//! Cross-module integration tests for the concrete scenarios and
//! quantified invariants of spec §8, exercised through the public
//! surface ([`crate::Ospfs`] plus the free functions in [`crate::ns`] and
//! [`crate::inode`]) rather than any one module's internals.
//!
//! Grounded in test style on `rcore-fs-sfs/src/tests.rs`: small helper
//! functions that build a fresh file system, `#[test]` functions named
//! after the scenario they check, everything returning through `.unwrap()`
//! rather than threading `Result` up through the test harness.

use crate::fs::{ImageConfig, Ospfs};
use crate::host::{memcpy, Identity};
use crate::ns;
use crate::structs::{BLKSIZE, NDIRECT, NINDIRECT};
use crate::{inode, OspfsError};

fn new_fs() -> Ospfs {
    Ospfs::create(ImageConfig::new(256, 32)).unwrap()
}

/// Walks every reachable data/indirect/indirect2 block for inode `ino`,
/// checking each is marked allocated (P-BITMAP) and that the reachable
/// count matches `ceil(size / BLKSIZE)` (P-SIZE-BLOCKS), and that
/// `indirect`/`indirect2` presence matches the size thresholds
/// (P-INDIRECT).
fn assert_block_invariants(fs: &Ospfs, ino: crate::structs::InodeId) {
    let disk_inode = fs.read_inode(ino).unwrap();
    let nblocks = crate::addr::blocks_needed(disk_inode.size);
    let blocks = disk_inode.blocks();

    assert_eq!(blocks.indirect != 0, nblocks > NDIRECT);
    assert_eq!(blocks.indirect2 != 0, nblocks > NDIRECT + NINDIRECT);

    let mut reachable = 0usize;
    for b in 0..nblocks {
        let blockno = crate::addr::blockno_for_offset(
            &disk_inode,
            (b * BLKSIZE) as u32,
            |p| fs.read_pointer_block(p).unwrap(),
        );
        assert_ne!(blockno, 0, "block {} of inode {} unreachable", b, ino);
        reachable += 1;
    }
    assert_eq!(reachable, nblocks);
}

#[test]
fn create_then_read_empty() {
    let fs = new_fs();
    let root = fs.root_inode();
    let a = ns::create(&fs, root, "a", 0o644).unwrap();
    let mut buf = [0u8; 10];
    let n = inode::read(&fs, a, 0, &mut buf, &mut memcpy).unwrap();
    assert_eq!(n, 0);
    assert_eq!(fs.read_inode(a).unwrap().size, 0);
}

#[test]
fn grow_across_direct_to_indirect_boundary() {
    let fs = new_fs();
    let root = fs.root_inode();
    let a = ns::create(&fs, root, "a", 0o644).unwrap();

    let len = NDIRECT * BLKSIZE + 17;
    let data: alloc::vec::Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    let n = inode::write(&fs, a, 0, &data, false, &mut memcpy).unwrap();
    assert_eq!(n, len);

    let disk_inode = fs.read_inode(a).unwrap();
    assert_eq!(disk_inode.size as usize, len);
    assert_ne!(disk_inode.blocks().indirect, 0);
    assert_eq!(disk_inode.blocks().indirect2, 0);
    assert_block_invariants(&fs, a);

    let mut out = alloc::vec![0u8; len];
    let n = inode::read(&fs, a, 0, &mut out, &mut memcpy).unwrap();
    assert_eq!(n, len);
    assert_eq!(out, data);
}

#[test]
fn unlink_releases_exactly_the_data_block() {
    let fs = new_fs();
    let root = fs.root_inode();
    let a = ns::create(&fs, root, "a", 0o644).unwrap();
    let free_before = fs.free_blocks();
    let full_block = [9u8; BLKSIZE];
    inode::write(&fs, a, 0, &full_block, false, &mut memcpy).unwrap();
    ns::unlink(&fs, root, "a").unwrap();
    assert_eq!(fs.free_blocks(), free_before);
    assert_eq!(fs.read_inode(a).unwrap().nlink, 0);
}

#[test]
fn hard_link_then_unlink_original_preserves_content() {
    let fs = new_fs();
    let root = fs.root_inode();
    let a = ns::create(&fs, root, "a", 0o644).unwrap();
    inode::write(&fs, a, 0, b"hello", false, &mut memcpy).unwrap();
    ns::link(&fs, a, root, "b").unwrap();
    ns::unlink(&fs, root, "a").unwrap();

    let b = ns::lookup(&fs, root, "b").unwrap();
    let mut out = [0u8; 5];
    inode::read(&fs, b, 0, &mut out, &mut memcpy).unwrap();
    assert_eq!(&out, b"hello");
    assert_eq!(fs.read_inode(b).unwrap().nlink, 1);
}

#[test]
fn conditional_symlink_chooses_by_identity() {
    let fs = new_fs();
    let root = fs.root_inode();
    ns::symlink(&fs, root, "c", "root?/priv:/pub").unwrap();
    let c = ns::lookup(&fs, root, "c").unwrap();

    assert_eq!(
        inode::follow_link(&fs, c, Identity::superuser()).unwrap(),
        "/priv"
    );
    assert_eq!(
        inode::follow_link(&fs, c, Identity::user()).unwrap(),
        "/pub"
    );
    // Stored target must be unchanged between calls (spec §9).
    let raw = fs.read_inode(c).unwrap();
    let len = raw.size as usize;
    assert_eq!(&raw.symlink_bytes()[..len], b"root?/priv:/pub");
}

#[test]
fn plain_symlink_target_is_returned_verbatim() {
    let fs = new_fs();
    let root = fs.root_inode();
    ns::symlink(&fs, root, "c", "/etc/motd").unwrap();
    let c = ns::lookup(&fs, root, "c").unwrap();
    assert_eq!(
        inode::follow_link(&fs, c, Identity::user()).unwrap(),
        "/etc/motd"
    );
}

#[test]
fn enospc_rollback_leaves_size_and_bitmap_untouched() {
    let fs = Ospfs::create(ImageConfig::new(40, 8)).unwrap();
    let root = fs.root_inode();
    let a = ns::create(&fs, root, "a", 0o644).unwrap();

    let mut hogs = alloc::vec::Vec::new();
    while fs.free_blocks() > 2 {
        hogs.push(fs.alloc_block().unwrap());
    }
    let free_before = fs.free_blocks();
    let size_before = fs.read_inode(a).unwrap().size;

    let needs_five = ((NDIRECT + NINDIRECT + 10) * BLKSIZE) as u32;
    let err = inode::change_size(&fs, a, needs_five).unwrap_err();
    assert_eq!(err, OspfsError::NoSpace);
    assert_eq!(fs.read_inode(a).unwrap().size, size_before);
    assert_eq!(fs.free_blocks(), free_before);

    for b in hogs {
        fs.free_block(b);
    }
}

#[test]
fn namelen_over_max_is_rejected() {
    let fs = new_fs();
    let root = fs.root_inode();
    let long_name: alloc::string::String = core::iter::repeat('x')
        .take(crate::structs::MAXNAMELEN + 1)
        .collect();
    assert_eq!(
        ns::create(&fs, root, &long_name, 0o644),
        Err(OspfsError::NameTooLong)
    );
}

#[test]
fn p_nlink_holds_after_link_and_unlink() {
    let fs = new_fs();
    let root = fs.root_inode();
    let a = ns::create(&fs, root, "a", 0o644).unwrap();
    ns::link(&fs, a, root, "b").unwrap();
    ns::link(&fs, a, root, "c").unwrap();
    assert_eq!(fs.read_inode(a).unwrap().nlink, 3);
    ns::unlink(&fs, root, "b").unwrap();
    assert_eq!(fs.read_inode(a).unwrap().nlink, 2);
}

#[test]
fn readdir_reaches_end_of_directory() {
    let fs = new_fs();
    let root = fs.root_inode();
    ns::create(&fs, root, "a", 0o644).unwrap();
    let mut count = 0;
    let (outcome, _) = crate::dir::readdir(&fs, root, root, 0, |_, _, _| {
        count += 1;
        true
    })
    .unwrap();
    assert_eq!(outcome, crate::dir::ReaddirOutcome::Done);
    assert_eq!(count, 3); // "." "..", "a"
}

#[test]
fn readdir_honors_backpressure() {
    let fs = new_fs();
    let root = fs.root_inode();
    ns::create(&fs, root, "a", 0o644).unwrap();
    ns::create(&fs, root, "b", 0o644).unwrap();
    let (outcome, pos) = crate::dir::readdir(&fs, root, root, 0, |_, _, _| false).unwrap();
    assert_eq!(outcome, crate::dir::ReaddirOutcome::Interrupted);
    assert_eq!(pos, 0);
}
