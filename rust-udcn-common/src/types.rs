//! Common identifiers and sizing constants shared by the table and its tools.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default maximum number of composite entries in the PCCT.
pub const MAX_PCC_ENTRIES: usize = 65536;

/// Default capacity of the direct CS FIFO list.
pub const MAX_CS_DIRECT_ENTRIES: usize = 32768;

/// Default capacity of the indirect CS FIFO list.
pub const MAX_CS_INDIRECT_ENTRIES: usize = 32768;

/// Maximum number of indirect CS entries that may reference one direct entry.
pub const CS_MAX_INDIRECTS: usize = 4;

/// Block size expected from the device underneath the disk store.
pub const DISK_BLOCK_SIZE: u64 = 512;

/// Number of bits in a PCC token.
pub const PCC_TOKEN_BITS: u32 = 48;

/// Mask selecting the valid bits of a PCC token.
pub const PCC_TOKEN_MASK: u64 = (1 << PCC_TOKEN_BITS) - 1;

/// Unique identifier for a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(C)]
pub struct FaceId(pub u16);

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaceId({})", self.0)
    }
}

/// 48-bit opaque correlation value carried by a composite entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PccToken(u64);

impl PccToken {
    /// Wrap a raw value.
    ///
    /// Panics if the value does not fit in 48 bits.
    pub fn new(value: u64) -> Self {
        assert!(value <= PCC_TOKEN_MASK, "PCC token {:#x} exceeds 48 bits", value);
        Self(value)
    }

    /// Returns the raw 48-bit value.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PccToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PccToken({:012x})", self.0)
    }
}

/// Disk slot number; slot 0 is reserved and never holds a live entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiskSlotId(pub u64);

impl fmt::Display for DiskSlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DiskSlot({})", self.0)
    }
}
