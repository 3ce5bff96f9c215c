//! OSPFS: a small, in-memory Unix-style file system.
//!
//! The durable image is a contiguous byte array treated as a simulated
//! block device (see [`dev::Device`]). This crate implements the on-image
//! engine: the free-block bitmap, the fixed inode table, the
//! direct/indirect/doubly-indirect block addressing machinery, file size
//! growth and shrinkage, the directory entry layout, and the read/write
//! byte transfer paths. Host OS integration (mounting, user-memory copies)
//! is out of scope; [`host`] defines the narrow boundary a host would plug
//! into.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;
#[macro_use]
extern crate log;

pub use dir::ReaddirOutcome;
pub use error::{OspfsError, Result};
pub use fs::{ImageConfig, Ospfs};
pub use host::{memcpy, CopyIn, CopyOut, Identity};
pub use structs::{
    BlockId, FileType, InodeId, Stat, BLKSIZE, DIRENTRY_SIZE, MAXFILEBLKS, MAXNAMELEN,
    MAXSYMLINKLEN, NDIRECT, NINDIRECT, ROOT_INO,
};

mod addr;
mod bitmap;
mod dev;
mod dir;
mod dirty;
mod error;
mod fs;
mod host;
mod inode;
mod ns;
mod structs;
#[cfg(test)]
mod tests;
mod util;

pub use dev::{Device, MemDevice};
