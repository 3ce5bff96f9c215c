//! Dirty-tracking wrapper, unchanged from the teacher's `dirty.rs`: lets
//! in-memory superblock/bitmap/inode copies know whether they need to be
//! written back without a separate bookkeeping bit scattered everywhere.

use core::ops::{Deref, DerefMut};

/// Wraps a value of type `T`, tracking whether it has been written to
/// since the last [`Dirty::sync`].
pub struct Dirty<T> {
    value: T,
    dirty: bool,
}

impl<T> Dirty<T> {
    /// Wrap a value that is considered clean (e.g. just loaded from disk).
    pub fn new(val: T) -> Dirty<T> {
        Dirty {
            value: val,
            dirty: false,
        }
    }

    /// Wrap a value that is considered dirty (e.g. freshly created).
    pub fn new_dirty(val: T) -> Dirty<T> {
        Dirty {
            value: val,
            dirty: true,
        }
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Reset the dirty flag after writing the value back.
    pub fn sync(&mut self) {
        self.dirty = false;
    }
}

impl<T> Deref for Dirty<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Dirty<T> {
    /// Mutable access marks the value dirty.
    fn deref_mut(&mut self) -> &mut T {
        self.dirty = true;
        &mut self.value
    }
}
