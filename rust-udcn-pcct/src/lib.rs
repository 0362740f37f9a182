//! PIT-CS composite table (PCCT) for μDCN (micro Data-Centric Networking)
//!
//! One hash table tracks both pending Interests (PIT semantics) and cached
//! Data (CS semantics) under a key derived from the name. Each composite
//! entry multiplexes up to three slots; the content store bounds cached
//! entries with per-kind FIFO lists and can spill evicted Data to a
//! block-addressed disk store.

pub mod config;
pub mod cs;
pub mod disk;
pub mod entry;
pub mod key;
pub mod pcct;
pub mod pit;
pub mod table;

pub use config::{DiskConfig, PcctConfig};
pub use cs::{Cs, CsCounters, CsEntry, CsHit, CsListId, DirectEntry};
pub use disk::{
    BlockDevice, DiskAlloc, DiskCallback, DiskCounters, DiskStore, FileDevice, GetDataCompletion,
    MemoryDevice,
};
pub use entry::{EntryId, PccEntry, PccSlot, Role, SlotContent, SlotIndex};
pub use key::PccKey;
pub use pcct::Pcct;
pub use pit::{PitCounters, PitDownstream, PitEntry, PitFindResult, PitInsertResult};
pub use table::PccTable;
