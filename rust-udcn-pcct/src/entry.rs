//! PIT-CS composite entry.
//!
//! A [`PccEntry`] multiplexes three logical roles over three physical slots.
//! Slot 1 is embedded in the entry; slots 2 and 3 live in an extension block
//! that is allocated the first time either of them is needed and stays with
//! the entry until the entry is destroyed.
//!
//! Role bindings and the correlation token share one 64-bit word whose layout
//! is fixed, starting from the least significant bit:
//!
//! | bits   | field                         |
//! |--------|-------------------------------|
//! | 0      | token present                 |
//! | 1      | reserved                      |
//! | 2..4   | slot of PIT entry MustBeFresh=0 |
//! | 4..6   | slot of PIT entry MustBeFresh=1 |
//! | 6..8   | slot of CS entry              |
//! | 8..16  | reserved                      |
//! | 16..64 | 48-bit token                  |

use crate::cs::CsEntry;
use crate::key::PccKey;
use crate::pit::PitEntry;
use rust_udcn_common::types::{PccToken, PCC_TOKEN_MASK};
use std::fmt;

/// Index of a PCC entry inside the table arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub(crate) u32);

impl EntryId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PccEntry#{}", self.0)
    }
}

/// Physical slot a role is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SlotIndex {
    None = 0,
    Slot1 = 1,
    Slot2 = 2,
    Slot3 = 3,
}

impl SlotIndex {
    fn from_bits(bits: u64) -> Self {
        match bits & SLOT_FIELD_MASK {
            0 => SlotIndex::None,
            1 => SlotIndex::Slot1,
            2 => SlotIndex::Slot2,
            _ => SlotIndex::Slot3,
        }
    }
}

/// Logical purpose of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// PIT entry for Interests without MustBeFresh.
    Pit0,
    /// PIT entry for Interests with MustBeFresh.
    Pit1,
    /// CS entry.
    Cs,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Pit0, Role::Pit1, Role::Cs];
    pub const PIT: [Role; 2] = [Role::Pit0, Role::Pit1];

    fn shift(self) -> u32 {
        match self {
            Role::Pit0 => 2,
            Role::Pit1 => 4,
            Role::Cs => 6,
        }
    }

    /// Slot assigned to this role when it is first bound.
    pub fn home_slot(self) -> SlotIndex {
        match self {
            Role::Pit0 => SlotIndex::Slot1,
            Role::Pit1 => SlotIndex::Slot2,
            Role::Cs => SlotIndex::Slot3,
        }
    }

    /// Whether the role's slot lives in the extension block.
    pub fn needs_ext(self) -> bool {
        self.home_slot() != SlotIndex::Slot1
    }
}

const HAS_TOKEN_BIT: u64 = 1;
const SLOT_FIELD_MASK: u64 = 0b11;
const ROLE_FIELDS_SHIFT: u32 = 2;
const ROLE_FIELDS_MASK: u64 = 0x3F;
const PIT_FIELDS_MASK: u64 = 0x0F;
const TOKEN_SHIFT: u32 = 16;

/// Packed role bindings and token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenWord(u64);

impl TokenWord {
    /// Raw 64-bit representation.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Rebuild from a raw representation.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn slot(self, role: Role) -> SlotIndex {
        SlotIndex::from_bits(self.0 >> role.shift())
    }

    fn set_slot(&mut self, role: Role, slot: SlotIndex) {
        self.0 &= !(SLOT_FIELD_MASK << role.shift());
        self.0 |= (slot as u64) << role.shift();
    }

    /// Whether any role is bound.
    pub fn has_entries(self) -> bool {
        (self.0 >> ROLE_FIELDS_SHIFT) & ROLE_FIELDS_MASK != 0
    }

    /// Whether either PIT role is bound.
    pub fn has_pit_entries(self) -> bool {
        (self.0 >> ROLE_FIELDS_SHIFT) & PIT_FIELDS_MASK != 0
    }

    /// Number of bound roles.
    pub fn role_count(self) -> usize {
        Role::ALL
            .iter()
            .filter(|&&role| self.slot(role) != SlotIndex::None)
            .count()
    }

    pub fn token(self) -> Option<PccToken> {
        if self.0 & HAS_TOKEN_BIT == 0 {
            return None;
        }
        Some(PccToken::new(self.0 >> TOKEN_SHIFT))
    }

    fn set_token(&mut self, token: PccToken) {
        self.0 &= !(PCC_TOKEN_MASK << TOKEN_SHIFT);
        self.0 |= (token.value() << TOKEN_SHIFT) | HAS_TOKEN_BIT;
    }

    fn clear_token(&mut self) {
        self.0 &= !((PCC_TOKEN_MASK << TOKEN_SHIFT) | HAS_TOKEN_BIT);
    }
}

/// What a physical slot currently holds.
#[derive(Debug, Default)]
pub enum SlotContent {
    #[default]
    Vacant,
    Pit(PitEntry),
    Cs(CsEntry),
}

/// A physical slot with its back-reference to the owning entry.
#[derive(Debug, Default)]
pub struct PccSlot {
    owner: Option<EntryId>,
    content: SlotContent,
}

impl PccSlot {
    /// Entry that owns this slot, if the slot is bound.
    pub fn owner(&self) -> Option<EntryId> {
        self.owner
    }

    pub fn content(&self) -> &SlotContent {
        &self.content
    }

    /// Recover the owning entry from a slot holding a PIT entry.
    pub fn entry_from_pit(&self) -> EntryId {
        match (&self.content, self.owner) {
            (SlotContent::Pit(_), Some(owner)) => owner,
            _ => panic!("slot does not hold a bound PIT entry"),
        }
    }

    /// Recover the owning entry from a slot holding a CS entry.
    pub fn entry_from_cs(&self) -> EntryId {
        match (&self.content, self.owner) {
            (SlotContent::Cs(_), Some(owner)) => owner,
            _ => panic!("slot does not hold a bound CS entry"),
        }
    }
}

/// Slots 2 and 3, allocated on demand.
#[derive(Debug, Default)]
pub struct PccEntryExt {
    slot2: PccSlot,
    slot3: PccSlot,
}

/// PIT-CS composite entry.
#[derive(Debug)]
pub struct PccEntry {
    id: EntryId,
    key: PccKey,
    word: TokenWord,
    slot1: PccSlot,
    ext: Option<Box<PccEntryExt>>,
}

impl PccEntry {
    pub(crate) fn new(id: EntryId, key: PccKey) -> Self {
        Self {
            id,
            key,
            word: TokenWord::default(),
            slot1: PccSlot::default(),
            ext: None,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn key(&self) -> &PccKey {
        &self.key
    }

    /// Packed role bindings and token.
    pub fn word(&self) -> TokenWord {
        self.word
    }

    pub fn has_ext(&self) -> bool {
        self.ext.is_some()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.word.slot(role) != SlotIndex::None
    }

    pub fn has_entries(&self) -> bool {
        self.word.has_entries()
    }

    pub fn has_pit_entries(&self) -> bool {
        self.word.has_pit_entries()
    }

    pub fn token(&self) -> Option<PccToken> {
        self.word.token()
    }

    pub(crate) fn set_token(&mut self, token: PccToken) {
        self.word.set_token(token);
    }

    pub(crate) fn clear_token(&mut self) {
        self.word.clear_token();
    }

    fn slot(&self, index: SlotIndex) -> &PccSlot {
        match index {
            SlotIndex::Slot1 => &self.slot1,
            SlotIndex::Slot2 => &self.ext().slot2,
            SlotIndex::Slot3 => &self.ext().slot3,
            SlotIndex::None => panic!("{}: access to unbound slot", self.id),
        }
    }

    fn slot_mut(&mut self, index: SlotIndex) -> &mut PccSlot {
        match index {
            SlotIndex::Slot1 => &mut self.slot1,
            SlotIndex::Slot2 => &mut self.ext_mut().slot2,
            SlotIndex::Slot3 => &mut self.ext_mut().slot3,
            SlotIndex::None => panic!("{}: access to unbound slot", self.id),
        }
    }

    fn ext(&self) -> &PccEntryExt {
        match &self.ext {
            Some(ext) => ext,
            None => panic!("{}: slot 2/3 accessed without extension block", self.id),
        }
    }

    fn ext_mut(&mut self) -> &mut PccEntryExt {
        let id = self.id;
        match &mut self.ext {
            Some(ext) => ext,
            None => panic!("{}: slot 2/3 accessed without extension block", id),
        }
    }

    /// Slot bound to `role`; panics if the role is unbound.
    pub fn role_slot(&self, role: Role) -> &PccSlot {
        self.slot(self.word.slot(role))
    }

    /// Bind `role`, storing `init()` in its slot.
    ///
    /// Binding an already bound role returns the existing slot untouched and
    /// does not call `init`. Goes through [`crate::PccTable::bind_role`] so the
    /// extension budget is charged.
    pub(crate) fn bind_role(&mut self, role: Role, init: impl FnOnce() -> SlotContent) -> &mut PccSlot {
        if !self.has_role(role) {
            let index = role.home_slot();
            if role.needs_ext() && self.ext.is_none() {
                self.ext = Some(Box::default());
            }
            let id = self.id;
            let slot = self.slot_mut(index);
            assert!(slot.owner.is_none(), "{}: slot {:?} already occupied", id, index);
            slot.owner = Some(id);
            slot.content = init();
            self.word.set_slot(role, index);
        }
        let index = self.word.slot(role);
        self.slot_mut(index)
    }

    /// Unbind `role`, handing its content back to the caller.
    ///
    /// The extension block is kept even if both of its slots become vacant.
    pub fn unbind_role(&mut self, role: Role) -> SlotContent {
        let index = self.word.slot(role);
        if index == SlotIndex::None {
            return SlotContent::Vacant;
        }
        let slot = self.slot_mut(index);
        slot.owner = None;
        let content = std::mem::take(&mut slot.content);
        self.word.set_slot(role, SlotIndex::None);
        content
    }

    /// PIT entry bound to `role`.
    pub fn pit_entry(&self, role: Role) -> &PitEntry {
        match &self.role_slot(role).content {
            SlotContent::Pit(pit) => pit,
            _ => panic!("{}: role {:?} does not hold a PIT entry", self.id, role),
        }
    }

    pub fn pit_entry_mut(&mut self, role: Role) -> &mut PitEntry {
        let id = self.id;
        let index = self.word.slot(role);
        match &mut self.slot_mut(index).content {
            SlotContent::Pit(pit) => pit,
            _ => panic!("{}: role {:?} does not hold a PIT entry", id, role),
        }
    }

    /// Unbind a PIT role, returning its PIT entry.
    pub fn remove_pit_entry(&mut self, role: Role) -> Option<PitEntry> {
        match self.unbind_role(role) {
            SlotContent::Pit(pit) => Some(pit),
            SlotContent::Vacant => None,
            SlotContent::Cs(_) => panic!("{}: role {:?} held a CS entry", self.id, role),
        }
    }

    /// CS entry of this entry.
    pub fn cs_entry(&self) -> &CsEntry {
        match &self.role_slot(Role::Cs).content {
            SlotContent::Cs(cs) => cs,
            _ => panic!("{}: CS role does not hold a CS entry", self.id),
        }
    }

    pub fn cs_entry_mut(&mut self) -> &mut CsEntry {
        let id = self.id;
        let index = self.word.slot(Role::Cs);
        match &mut self.slot_mut(index).content {
            SlotContent::Cs(cs) => cs,
            _ => panic!("{}: CS role does not hold a CS entry", id),
        }
    }

    /// CS entry of this entry, if the CS role is bound.
    pub fn try_cs_entry(&self) -> Option<&CsEntry> {
        if self.has_role(Role::Cs) {
            Some(self.cs_entry())
        } else {
            None
        }
    }

    /// Unbind the CS role, returning its CS entry.
    pub fn remove_cs_entry(&mut self) -> Option<CsEntry> {
        match self.unbind_role(Role::Cs) {
            SlotContent::Cs(cs) => Some(cs),
            SlotContent::Vacant => None,
            SlotContent::Pit(_) => panic!("{}: CS role held a PIT entry", self.id),
        }
    }
}
