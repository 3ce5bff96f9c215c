//! Small helpers shared across the engine.

use core::mem::MaybeUninit;

/// Produces a zeroed `T`. All on-disk structs in this crate are plain
/// integer/array records, for which the all-zero bit pattern is always
/// valid, so this avoids the teacher's `mem::uninitialized()` (UB-prone,
/// and long removed from `core`) while keeping the same "give me scratch
/// storage to read a struct into" idiom.
pub fn zeroed_memory<T: Copy>() -> T {
    unsafe { MaybeUninit::zeroed().assume_init() }
}
