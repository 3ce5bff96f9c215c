//! Host adapter surface (spec §6, §9 "Host callbacks instead of kernel
//! specifics").
//!
//! The engine never touches caller memory directly; every byte transfer
//! goes through one of these two callbacks, which a host maps onto
//! whatever its copy-to/from-user-space primitive looks like. Grounded in
//! shape (not code — the teacher has no direct analogue) on the narrowness
//! of ucore's `c_interface.rs` `IoBuf`/`INodeOps` boundary: a thin surface
//! the rest of the engine is built without knowledge of.

/// Copies `src` into `dst`, returning `false` to report a host-side fault
/// (spec's `copy_in`/`copy_out` returning `FAULT`). Slices are always the
/// same length; the caller picks that length from the transfer loop.
pub type CopyIn<'a> = &'a mut dyn FnMut(&mut [u8], &[u8]) -> bool;
pub type CopyOut<'a> = &'a mut dyn FnMut(&mut [u8], &[u8]) -> bool;

/// The only permission fact a host must supply: whether the caller is the
/// superuser, used by conditional symlink resolution (spec §4.7). The spec
/// explicitly excludes richer access control (§1 Non-goals).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Identity {
    superuser: bool,
}

impl Identity {
    pub fn superuser() -> Identity {
        Identity { superuser: true }
    }
    pub fn user() -> Identity {
        Identity { superuser: false }
    }
    pub fn is_superuser(&self) -> bool {
        self.superuser
    }
}

/// A plain in-process buffer copy. Stands in for a host's real
/// copy-to/from-user-space routine; this is what the test suite passes as
/// `copy_in`/`copy_out`.
pub fn memcpy(dst: &mut [u8], src: &[u8]) -> bool {
    dst.copy_from_slice(src);
    true
}
