//! The composite table: PCC entries indexed by key and by token.
//!
//! Entries live in an arena so that PIT/CS code can refer to them by
//! [`EntryId`]. The table is owned by one forwarding worker and has no
//! internal locking.

use crate::cs::list::{CsNode, NodeArena};
use crate::entry::{EntryId, PccEntry, PccSlot, Role, SlotContent};
use crate::key::PccKey;
use log::{debug, trace};
use rust_udcn_common::types::{PccToken, PCC_TOKEN_MASK};
use rust_udcn_common::{Error, Result};
use std::collections::HashMap;

/// PIT-CS composite table.
#[derive(Debug)]
pub struct PccTable {
    entries: Vec<Option<PccEntry>>,
    free: Vec<u32>,
    by_key: HashMap<PccKey, EntryId>,
    by_token: HashMap<u64, EntryId>,
    last_token: u64,
    capacity: usize,
    ext_capacity: usize,
    n_ext: usize,
}

impl PccTable {
    /// Create a table holding at most `capacity` entries, of which at most
    /// `ext_capacity` may have an extension block.
    pub fn new(capacity: usize, ext_capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            by_key: HashMap::new(),
            by_token: HashMap::new(),
            last_token: 0,
            capacity,
            ext_capacity,
            n_ext: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries currently holding an extension block.
    pub fn count_extensions(&self) -> usize {
        self.n_ext
    }

    pub fn find(&self, key: &PccKey) -> Option<EntryId> {
        self.by_key.get(key).copied()
    }

    /// Find the entry for `key`, creating an empty one on miss.
    ///
    /// Returns the entry and whether it was created.
    pub fn insert(&mut self, key: PccKey) -> Result<(EntryId, bool)> {
        if let Some(id) = self.find(&key) {
            return Ok((id, false));
        }
        if self.len() >= self.capacity {
            debug!("PCCT full, rejecting {:?}", key);
            return Err(Error::TableFull(self.capacity));
        }

        let id = match self.free.pop() {
            Some(index) => EntryId(index),
            None => {
                self.entries.push(None);
                EntryId((self.entries.len() - 1) as u32)
            }
        };
        trace!("{} created for {:?}", id, key);
        self.by_key.insert(key.clone(), id);
        self.entries[id.index()] = Some(PccEntry::new(id, key));
        Ok((id, true))
    }

    /// Entry at `id`, if it is live.
    pub fn try_get(&self, id: EntryId) -> Option<&PccEntry> {
        self.entries.get(id.index()).and_then(Option::as_ref)
    }

    /// Entry at `id`; panics if the entry has been destroyed.
    pub fn get(&self, id: EntryId) -> &PccEntry {
        match self.try_get(id) {
            Some(entry) => entry,
            None => panic!("{} is not a live entry", id),
        }
    }

    pub fn get_mut(&mut self, id: EntryId) -> &mut PccEntry {
        match self.entries.get_mut(id.index()).and_then(Option::as_mut) {
            Some(entry) => entry,
            None => panic!("{} is not a live entry", id),
        }
    }

    /// Bind `role` on entry `id`, charging the extension budget if the role
    /// requires an extension block the entry does not have yet.
    pub fn bind_role(
        &mut self,
        id: EntryId,
        role: Role,
        init: impl FnOnce() -> SlotContent,
    ) -> Result<&mut PccSlot> {
        let needs_new_ext = {
            let entry = self.get(id);
            !entry.has_role(role) && role.needs_ext() && !entry.has_ext()
        };
        if needs_new_ext {
            if self.n_ext >= self.ext_capacity {
                debug!("{}: no extension block for {:?}", id, role);
                return Err(Error::ExtensionExhausted(self.n_ext));
            }
            self.n_ext += 1;
        }
        Ok(self.get_mut(id).bind_role(role, init))
    }

    /// Recover the entry owning a slot that holds a CS entry.
    pub fn entry_of_cs_slot(&self, slot: &PccSlot) -> EntryId {
        let id = slot.entry_from_cs();
        assert!(self.get(id).has_role(Role::Cs), "{} has no CS role", id);
        id
    }

    /// Assign a token to entry `id`, or return the one it already has.
    pub fn assign_token(&mut self, id: EntryId) -> PccToken {
        if let Some(token) = self.get(id).token() {
            return token;
        }
        let token = loop {
            self.last_token = (self.last_token + 1) & PCC_TOKEN_MASK;
            if self.last_token != 0 && !self.by_token.contains_key(&self.last_token) {
                break PccToken::new(self.last_token);
            }
        };
        self.by_token.insert(token.value(), id);
        self.get_mut(id).set_token(token);
        token
    }

    pub fn find_by_token(&self, token: PccToken) -> Option<EntryId> {
        self.by_token.get(&token.value()).copied()
    }

    fn release_token(&mut self, id: EntryId) {
        if let Some(token) = self.get(id).token() {
            self.by_token.remove(&token.value());
            self.get_mut(id).clear_token();
        }
    }

    /// Destroy entry `id`; all roles must already be unbound.
    pub fn erase(&mut self, id: EntryId) {
        assert!(!self.get(id).has_entries(), "{} still has bound roles", id);
        self.release_token(id);
        let entry = match self.entries[id.index()].take() {
            Some(entry) => entry,
            None => panic!("{} is not a live entry", id),
        };
        if entry.has_ext() {
            assert!(self.n_ext > 0, "{} holds an uncharged extension block", id);
            self.n_ext -= 1;
        }
        self.by_key.remove(entry.key());
        self.free.push(id.0);
        trace!("{} destroyed", id);
    }

    /// Destroy entry `id` if it is live and no role is bound.
    pub fn erase_if_empty(&mut self, id: EntryId) -> bool {
        match self.try_get(id) {
            Some(entry) if !entry.has_entries() => {
                self.erase(id);
                true
            }
            _ => false,
        }
    }
}

impl NodeArena for PccTable {
    fn node(&self, id: EntryId) -> &CsNode {
        self.get(id).cs_entry().node()
    }

    fn node_mut(&mut self, id: EntryId) -> &mut CsNode {
        self.get_mut(id).cs_entry_mut().node_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pit::PitEntry;
    use rust_udcn_common::ndn::{Interest, Name};
    use rust_udcn_common::types::FaceId;
    use std::time::Instant;

    fn key(name: &str) -> PccKey {
        PccKey::from_name(&Name::from_string(name))
    }

    fn pit_content(name: &str) -> SlotContent {
        SlotContent::Pit(PitEntry::new(Interest::new(Name::from_string(name)), FaceId(1), Instant::now()))
    }

    #[test]
    fn test_insert_find_erase() {
        let mut table = PccTable::new(4, 4);
        let (id, created) = table.insert(key("/a")).unwrap();
        assert!(created);
        assert_eq!(table.insert(key("/a")).unwrap(), (id, false));
        assert_eq!(table.find(&key("/a")), Some(id));

        table.erase(id);
        assert_eq!(table.find(&key("/a")), None);
        assert!(table.try_get(id).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_capacity_is_recoverable() {
        let mut table = PccTable::new(1, 1);
        table.insert(key("/a")).unwrap();
        assert!(matches!(table.insert(key("/b")), Err(Error::TableFull(1))));
    }

    #[test]
    fn test_extension_budget() {
        let mut table = PccTable::new(4, 1);
        let (a, _) = table.insert(key("/a")).unwrap();
        let (b, _) = table.insert(key("/b")).unwrap();

        table.bind_role(a, Role::Pit0, || pit_content("/a")).unwrap();
        assert_eq!(table.count_extensions(), 0);
        table.bind_role(a, Role::Pit1, || pit_content("/a")).unwrap();
        assert_eq!(table.count_extensions(), 1);

        table.bind_role(b, Role::Pit0, || pit_content("/b")).unwrap();
        assert!(matches!(
            table.bind_role(b, Role::Pit1, || pit_content("/b")),
            Err(Error::ExtensionExhausted(1))
        ));

        table.get_mut(a).unbind_role(Role::Pit0);
        table.get_mut(a).unbind_role(Role::Pit1);
        assert!(table.erase_if_empty(a));
        assert_eq!(table.count_extensions(), 0);
        table.bind_role(b, Role::Pit1, || pit_content("/b")).unwrap();
    }

    #[test]
    fn test_extension_charged_once_per_entry() {
        let mut table = PccTable::new(4, 1);
        let (a, _) = table.insert(key("/a")).unwrap();

        table.bind_role(a, Role::Pit1, || pit_content("/a")).unwrap();
        table.get_mut(a).unbind_role(Role::Pit1);
        assert!(table.get(a).has_ext());
        table.bind_role(a, Role::Cs, SlotContent::default).unwrap();
        assert_eq!(table.count_extensions(), 1);

        table.get_mut(a).unbind_role(Role::Cs);
        table.erase(a);
        assert_eq!(table.count_extensions(), 0);

        for name in ["/b", "/c"] {
            let (id, _) = table.insert(key(name)).unwrap();
            table.bind_role(id, Role::Pit1, || pit_content(name)).unwrap();
            table.get_mut(id).unbind_role(Role::Pit1);
            table.erase(id);
        }
        assert_eq!(table.count_extensions(), 0);
    }

    #[test]
    fn test_tokens() {
        let mut table = PccTable::new(4, 4);
        let (a, _) = table.insert(key("/a")).unwrap();
        let (b, _) = table.insert(key("/b")).unwrap();
        let ta = table.assign_token(a);
        let tb = table.assign_token(b);
        assert_ne!(ta, tb);
        assert_eq!(table.assign_token(a), ta);
        assert_eq!(table.find_by_token(tb), Some(b));

        table.erase(b);
        assert_eq!(table.find_by_token(tb), None);
    }

    #[test]
    fn test_token_wraps_and_skips_zero() {
        let mut table = PccTable::new(4, 4);
        table.last_token = PCC_TOKEN_MASK - 1;
        let (a, _) = table.insert(key("/a")).unwrap();
        let (b, _) = table.insert(key("/b")).unwrap();
        assert_eq!(table.assign_token(a).value(), PCC_TOKEN_MASK);
        assert_eq!(table.assign_token(b).value(), 1);
    }

    #[test]
    #[should_panic(expected = "still has bound roles")]
    fn test_erase_with_roles_panics() {
        let mut table = PccTable::new(4, 4);
        let (a, _) = table.insert(key("/a")).unwrap();
        table.bind_role(a, Role::Pit0, || pit_content("/a")).unwrap();
        table.erase(a);
    }
}
