//! On-image structures for OSPFS.
//!
//! Grounded on `rcore-fs-sfs/src/structs.rs`: `#[repr(C)]` records, an
//! `AsBuf` trait that reinterprets a struct as its own byte representation
//! for block I/O, and `static_assertions::const_assert!` checks that keep
//! every record within one block. The inode record additionally reuses its
//! block-pointer bytes as symlink-target storage (spec §3, §9) via a
//! `PointerUnion`, generalizing the teacher's single-purpose `AsBuf` idiom
//! from whole-struct to field-level reinterpretation.

use core::fmt;
use core::mem::size_of;
use core::slice;
use static_assertions::const_assert;

pub type BlockId = usize;
pub type InodeId = usize;

/// Size of one block, in bytes.
pub const BLKSIZE: usize = 4096;
/// log2(BLKSIZE), kept alongside `BLKSIZE` for callers that need shift
/// rather than divide/mod arithmetic over block offsets.
pub const BLKSIZE_LOG2: u8 = 12;
/// Number of direct block pointers in an inode.
pub const NDIRECT: usize = 16;
/// Size of one block-pointer entry on disk.
pub const ENTRY_SIZE: usize = 4;
/// Number of block-pointer entries that fit in one block.
pub const NINDIRECT: usize = BLKSIZE / ENTRY_SIZE;
/// Number of bits in one block, i.e. how many blocks one bitmap block covers.
pub const BLKBITS: usize = BLKSIZE * 8;
/// Largest block index (exclusive) a file can address through
/// direct/indirect/doubly-indirect pointers.
pub const MAXFILEBLKS: usize = NDIRECT + NINDIRECT + NINDIRECT * NINDIRECT;
/// Upper bound of the direct range.
pub const MAX_NBLOCK_DIRECT: usize = NDIRECT;
/// Upper bound of the singly-indirect range.
pub const MAX_NBLOCK_INDIRECT: usize = NDIRECT + NINDIRECT;
/// Upper bound of the doubly-indirect range (== MAXFILEBLKS).
pub const MAX_NBLOCK_DOUBLE_INDIRECT: usize = MAXFILEBLKS;

/// Maximum file-name length, in bytes, *not* counting the trailing zero.
pub const MAXNAMELEN: usize = 59;
/// On-disk width of a directory entry's name field (name + trailing zero).
const NAME_FIELD_LEN: usize = MAXNAMELEN + 1;
/// Fixed byte width of one directory entry.
pub const DIRENTRY_SIZE: usize = ENTRY_SIZE + NAME_FIELD_LEN;

/// Byte span occupied by an inode's block-pointer union; the symlink target
/// reuses exactly this many bytes (spec §3, §9).
pub const MAXSYMLINKLEN: usize = NDIRECT * ENTRY_SIZE + ENTRY_SIZE + ENTRY_SIZE;

/// Inode number of the root directory.
pub const ROOT_INO: InodeId = 0;

/// Block 0 is reserved/boot and never allocatable; it doubles as the "null"
/// block-pointer sentinel (spec §9).
pub const BLKN_BOOT: BlockId = 0;
/// Block the superblock lives in.
pub const BLKN_SUPER: BlockId = 1;
/// First block of the free-block bitmap.
pub const BLKN_FREEMAP: BlockId = 2;

pub const MAGIC: u32 = 0x05FD_05FD;
pub const DEFAULT_INFO: &str = "ospfs";
pub const MAX_INFO_LEN: usize = 31;

/// On-disk superblock (block 1).
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct SuperBlock {
    pub magic: u32,
    /// Total number of blocks in the image.
    pub nblocks: u32,
    /// Number of inode records in the inode table.
    pub ninodes: u32,
    /// First block of the inode table.
    pub firstinob: u32,
    /// Number of bitmap blocks (`firstinob - BLKN_FREEMAP`).
    pub freemap_blocks: u32,
    /// Free block count, kept for `FsInfo`-style reporting.
    pub unused_blocks: u32,
    pub info: Str32,
}

impl SuperBlock {
    pub fn check(&self) -> bool {
        self.magic == MAGIC
    }
}

/// File types an inode can hold.
#[repr(u16)]
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum FileType {
    Invalid = 0,
    Reg = 1,
    Dir = 2,
    SymLink = 3,
}

impl FileType {
    pub(crate) fn from_u16(v: u16) -> FileType {
        match v {
            1 => FileType::Reg,
            2 => FileType::Dir,
            3 => FileType::SymLink,
            _ => FileType::Invalid,
        }
    }
}

/// Direct/indirect/doubly-indirect block pointers, as stored on disk.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct BlockPointers {
    pub direct: [u32; NDIRECT],
    pub indirect: u32,
    pub indirect2: u32,
}

const_assert!(size_of::<BlockPointers>() == MAXSYMLINKLEN);

/// The block-pointer array and the symlink target occupy the same bytes
/// (spec §3: "Symlink variant reuses the record"). `ftype` on the owning
/// [`DiskInode`] says which interpretation is live; callers must check it
/// before reading either field.
#[repr(C)]
#[derive(Copy, Clone)]
pub union PointerUnion {
    pub blocks: BlockPointers,
    pub symlink: [u8; MAXSYMLINKLEN],
}

/// On-disk inode record.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct DiskInode {
    /// Byte length of the file (or `MAXNAMELEN`-bounded symlink target
    /// length; directory size is a multiple of `DIRENTRY_SIZE`).
    pub size: u32,
    pub ftype: FileType,
    /// Number of directory entries naming this inode (always 1 for
    /// symlinks, spec §3).
    pub nlink: u16,
    pub mode: u16,
    pub ptr: PointerUnion,
}

impl fmt::Debug for DiskInode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskInode")
            .field("size", &self.size)
            .field("ftype", &self.ftype)
            .field("nlink", &self.nlink)
            .field("mode", &self.mode)
            .finish()
    }
}

impl DiskInode {
    pub fn new_reg(mode: u16) -> Self {
        DiskInode {
            size: 0,
            ftype: FileType::Reg,
            nlink: 0,
            mode,
            ptr: PointerUnion {
                blocks: BlockPointers {
                    direct: [0; NDIRECT],
                    indirect: 0,
                    indirect2: 0,
                },
            },
        }
    }
    pub fn new_dir(mode: u16) -> Self {
        DiskInode {
            size: 0,
            ftype: FileType::Dir,
            nlink: 0,
            mode,
            ptr: PointerUnion {
                blocks: BlockPointers {
                    direct: [0; NDIRECT],
                    indirect: 0,
                    indirect2: 0,
                },
            },
        }
    }
    pub fn new_symlink() -> Self {
        DiskInode {
            size: 0,
            ftype: FileType::SymLink,
            nlink: 0,
            mode: 0,
            ptr: PointerUnion {
                symlink: [0; MAXSYMLINKLEN],
            },
        }
    }
    pub fn free() -> Self {
        DiskInode {
            size: 0,
            ftype: FileType::Invalid,
            nlink: 0,
            mode: 0,
            ptr: PointerUnion {
                blocks: BlockPointers {
                    direct: [0; NDIRECT],
                    indirect: 0,
                    indirect2: 0,
                },
            },
        }
    }

    pub fn is_free(&self) -> bool {
        self.nlink == 0
    }

    /// Read-only view of the block-pointer half of the union. Caller must
    /// ensure `ftype != SymLink`.
    pub fn blocks(&self) -> &BlockPointers {
        debug_assert_ne!(self.ftype, FileType::SymLink);
        unsafe { &self.ptr.blocks }
    }
    pub fn blocks_mut(&mut self) -> &mut BlockPointers {
        debug_assert_ne!(self.ftype, FileType::SymLink);
        unsafe { &mut self.ptr.blocks }
    }
    /// Read-only view of the symlink-target half of the union. Caller must
    /// ensure `ftype == SymLink`.
    pub fn symlink_bytes(&self) -> &[u8; MAXSYMLINKLEN] {
        debug_assert_eq!(self.ftype, FileType::SymLink);
        unsafe { &self.ptr.symlink }
    }
    pub fn symlink_bytes_mut(&mut self) -> &mut [u8; MAXSYMLINKLEN] {
        debug_assert_eq!(self.ftype, FileType::SymLink);
        unsafe { &mut self.ptr.symlink }
    }
}

/// Metadata snapshot handed to a host (spec §2 "Host adapter surface"): the
/// fields of a [`DiskInode`] a caller is allowed to see without reaching
/// into the on-disk record directly.
#[derive(Debug, Clone, Copy)]
pub struct Stat {
    pub size: u32,
    pub ftype: FileType,
    pub nlink: u16,
    pub mode: u16,
}

impl From<&DiskInode> for Stat {
    fn from(inode: &DiskInode) -> Self {
        Stat {
            size: inode.size,
            ftype: inode.ftype,
            nlink: inode.nlink,
            mode: inode.mode,
        }
    }
}

/// Fixed-width directory entry: an inode number plus a zero-terminated name.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct DiskEntry {
    /// Owning inode number; 0 means an empty slot (spec §3). Note that 0 is
    /// also `ROOT_INO` — an empty slot is distinguished from a root-owned
    /// entry by its position (entries are never synthesized for `.`/`..`,
    /// see `dir::readdir`), not by this field alone.
    pub ino: u32,
    pub name: NameField,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct NameField(pub [u8; NAME_FIELD_LEN]);

impl NameField {
    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(self.0.len());
        core::str::from_utf8(&self.0[..len]).unwrap_or("")
    }
}

impl<'a> From<&'a str> for NameField {
    fn from(s: &'a str) -> Self {
        let mut buf = [0u8; NAME_FIELD_LEN];
        buf[..s.len()].copy_from_slice(s.as_bytes());
        NameField(buf)
    }
}

impl fmt::Debug for NameField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// Converts a struct to/from its own byte representation for block I/O.
pub trait AsBuf {
    fn as_buf(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self as *const _ as *const u8, size_of::<Self>()) }
    }
    fn as_buf_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self as *mut _ as *mut u8, size_of::<Self>()) }
    }
}

impl AsBuf for SuperBlock {}
impl AsBuf for DiskInode {}
impl AsBuf for DiskEntry {}
impl AsBuf for u32 {}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct Str32(pub [u8; 32]);

impl<'a> From<&'a str> for Str32 {
    fn from(s: &'a str) -> Self {
        let mut buf = [0u8; 32];
        buf[..s.len()].copy_from_slice(s.as_bytes());
        Str32(buf)
    }
}

impl fmt::Debug for Str32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(self.0.len());
        write!(f, "{}", core::str::from_utf8(&self.0[..len]).unwrap_or(""))
    }
}

const_assert!(size_of::<SuperBlock>() <= BLKSIZE);
const_assert!(size_of::<DiskInode>() <= BLKSIZE);
const_assert!(size_of::<DiskEntry>() <= BLKSIZE);
const_assert!(size_of::<DiskEntry>() == DIRENTRY_SIZE);
const_assert!(DEFAULT_INFO.len() <= MAX_INFO_LEN);
