//! Error taxonomy for the OSPFS engine.
//!
//! Grounded on `rcore-fs`'s `vfs::FsError`: one flat enum, a `Result<T>`
//! alias, and a `std::error::Error` impl gated behind the `std` feature so
//! the crate still builds `no_std`.

use core::fmt;

/// Engine-level error taxonomy (spec §7).
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum OspfsError {
    /// Capacity exhausted: no free block or no free inode slot. `ENOSPC`.
    NoSpace,
    /// Corruption or invariant violation. `EIO`.
    Io,
    /// Name conflict on a namespace operation. `EEXIST`.
    Exists,
    /// Missing directory entry or inode. `ENOENT`.
    NotFound,
    /// Name or symlink target exceeds its maximum length. `ENAMETOOLONG`.
    NameTooLong,
    /// Host `copy_in`/`copy_out` reported a fault. `EFAULT`.
    Fault,
    /// Policy violation (e.g. resizing a directory). `EPERM`.
    Perm,
    /// The target is a directory where a non-directory was expected.
    IsDir,
    /// The target is not a directory where one was expected.
    NotDir,
    /// Directory has more than `.`/`..` left and cannot be unlinked.
    DirNotEmpty,
}

impl fmt::Display for OspfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(any(test, feature = "std"))]
impl std::error::Error for OspfsError {}

pub type Result<T> = core::result::Result<T, OspfsError>;
