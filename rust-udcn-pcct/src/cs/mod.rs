//! Content Store (CS) over the composite table.
//!
//! Cached Data occupies the CS role of a PCC entry. The entry whose key is the
//! plain Data name is *direct* and owns the Data; other entries satisfied by the
//! same Data (prefix Interests, digest Interests, forwarding hints) become
//! *indirect* and point at the direct one. Erasing a direct entry erases its
//! indirect entries as well.
//!
//! Each kind is bounded by its own FIFO list. With a disk tier configured, a
//! direct entry evicted from memory is written to a disk slot and moves to a
//! third FIFO list bounded by the number of slots.

pub mod list;


use crate::disk::{DiskAlloc, DiskStore};
use crate::entry::{EntryId, Role, SlotContent};
use crate::key::PccKey;
use crate::pit::{PitEntry, PitFindResult};
use crate::table::PccTable;
use list::{CsList, CsNode};
use log::{debug, trace};
use rust_udcn_common::metrics::Counter;
use rust_udcn_common::ndn::{Data, DataMeta, DataSatisfy, Interest};
use rust_udcn_common::types::{DiskSlotId, CS_MAX_INDIRECTS};
use rust_udcn_common::Result;
use std::time::Instant;

/// Identifies one of the CS FIFO lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CsListId {
    /// Direct entries with the Data in memory.
    Direct,
    /// Indirect entries.
    Indirect,
    /// Direct entries whose Data has been spilled to disk.
    Disk,
}

/// A direct CS entry: owns the Data or the disk slot holding it.
#[derive(Debug)]
pub struct DirectEntry {
    meta: DataMeta,
    data: Option<Data>,
    disk_slot: Option<DiskSlotId>,
    indirects: Vec<EntryId>,
}

impl DirectEntry {
    pub fn meta(&self) -> &DataMeta {
        &self.meta
    }

    /// The Data, if it is resident in memory.
    pub fn data(&self) -> Option<&Data> {
        self.data.as_ref()
    }

    pub fn disk_slot(&self) -> Option<DiskSlotId> {
        self.disk_slot
    }

    /// Indirect entries referencing this one.
    pub fn indirects(&self) -> &[EntryId] {
        &self.indirects
    }
}

#[derive(Debug)]
enum CsKind {
    Direct(DirectEntry),
    Indirect { direct: EntryId },
}

/// CS entry stored in the CS role of a PCC entry.
#[derive(Debug)]
pub struct CsEntry {
    kind: CsKind,
    node: CsNode,
    list: Option<CsListId>,
}

impl CsEntry {
    fn direct(data: Data) -> Self {
        Self {
            kind: CsKind::Direct(DirectEntry {
                meta: data.meta(),
                data: Some(data),
                disk_slot: None,
                indirects: Vec::new(),
            }),
            node: CsNode::default(),
            list: None,
        }
    }

    fn indirect(direct: EntryId) -> Self {
        Self {
            kind: CsKind::Indirect { direct },
            node: CsNode::default(),
            list: None,
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.kind, CsKind::Direct(_))
    }

    pub fn as_direct(&self) -> Option<&DirectEntry> {
        match &self.kind {
            CsKind::Direct(direct) => Some(direct),
            CsKind::Indirect { .. } => None,
        }
    }

    fn as_direct_mut(&mut self) -> Option<&mut DirectEntry> {
        match &mut self.kind {
            CsKind::Direct(direct) => Some(direct),
            CsKind::Indirect { .. } => None,
        }
    }

    /// The direct entry an indirect entry points to.
    pub fn indirect_target(&self) -> Option<EntryId> {
        match self.kind {
            CsKind::Indirect { direct } => Some(direct),
            CsKind::Direct(_) => None,
        }
    }

    /// FIFO list this entry is a member of.
    pub fn list(&self) -> Option<CsListId> {
        self.list
    }

    pub(crate) fn node(&self) -> &CsNode {
        &self.node
    }

    pub(crate) fn node_mut(&mut self) -> &mut CsNode {
        &mut self.node
    }
}

/// Where a CS hit can be served from.
#[derive(Debug, Clone)]
pub enum CsHit {
    /// The Data is in memory.
    Memory(Data),
    /// The Data must be read from a disk slot with [`DiskStore::get_data`].
    Disk { slot: DiskSlotId, len: usize },
}

/// CS statistics.
#[derive(Debug, Default, Clone)]
pub struct CsCounters {
    pub n_hit_memory: Counter,
    pub n_hit_disk: Counter,
    pub n_miss: Counter,
    pub n_insert: Counter,
    pub n_evict_direct: Counter,
    pub n_evict_indirect: Counter,
    pub n_evict_disk: Counter,
    pub n_spill: Counter,
    pub n_spill_drop: Counter,
}

#[derive(Debug)]
struct DiskTier {
    store: DiskStore,
    alloc: DiskAlloc,
    list: CsList,
}

/// The content store.
#[derive(Debug)]
pub struct Cs {
    direct: CsList,
    indirect: CsList,
    disk: Option<DiskTier>,
    counters: CsCounters,
}

impl Cs {
    pub fn new(capacity_direct: usize, capacity_indirect: usize) -> Self {
        Self {
            direct: CsList::new(capacity_direct),
            indirect: CsList::new(capacity_indirect),
            disk: None,
            counters: CsCounters::default(),
        }
    }

    /// Spill evicted direct entries to `store`, using every slot it offers.
    pub fn with_disk(mut self, store: DiskStore) -> Self {
        let alloc = DiskAlloc::new(1, store.max_slot());
        let list = CsList::new(alloc.capacity() as usize);
        self.disk = Some(DiskTier { store, alloc, list });
        self
    }

    pub fn disk_store(&self) -> Option<&DiskStore> {
        self.disk.as_ref().map(|tier| &tier.store)
    }

    pub fn counters(&self) -> &CsCounters {
        &self.counters
    }

    pub fn capacity(&self, list: CsListId) -> usize {
        self.list(list).map_or(0, CsList::capacity)
    }

    pub fn count_entries(&self, list: CsListId) -> usize {
        self.list(list).map_or(0, CsList::count)
    }

    /// Members of `list`, oldest first.
    pub fn list_entries(&self, table: &PccTable, list: CsListId) -> Vec<EntryId> {
        self.list(list).map_or_else(Vec::new, |l| l.ids(table))
    }

    fn list(&self, list: CsListId) -> Option<&CsList> {
        match list {
            CsListId::Direct => Some(&self.direct),
            CsListId::Indirect => Some(&self.indirect),
            CsListId::Disk => self.disk.as_ref().map(|tier| &tier.list),
        }
    }

    fn list_mut(&mut self, list: CsListId) -> &mut CsList {
        match list {
            CsListId::Direct => &mut self.direct,
            CsListId::Indirect => &mut self.indirect,
            CsListId::Disk => match &mut self.disk {
                Some(tier) => &mut tier.list,
                None => panic!("disk list used without disk tier"),
            },
        }
    }

    fn append(&mut self, table: &mut PccTable, list: CsListId, id: EntryId) {
        self.list_mut(list).append(table, id);
        table.get_mut(id).cs_entry_mut().list = Some(list);
    }

    fn detach(&mut self, table: &mut PccTable, id: EntryId) {
        if let Some(list) = table.get(id).cs_entry().list {
            self.list_mut(list).remove(table, id);
            table.get_mut(id).cs_entry_mut().list = None;
        }
    }

    /// Cache `data`, which satisfied the PIT entries in `found`.
    ///
    /// The satisfied PIT entries are unbound and returned. The Data is cached
    /// in the direct entry keyed by its name; every other entry in `found`
    /// becomes an indirect entry. On error nothing has been changed.
    pub fn insert(
        &mut self,
        table: &mut PccTable,
        data: Data,
        found: &PitFindResult,
    ) -> Result<Vec<PitEntry>> {
        assert!(!found.is_empty(), "Cs::insert called without satisfied PIT entries");
        let direct_id = self.bind_direct(table, data)?;
        self.counters.n_insert.increment();

        let mut satisfied = Vec::with_capacity(found.entries.len());
        for &(id, role) in &found.entries {
            satisfied.extend(table.get_mut(id).remove_pit_entry(role));
        }

        let mut new_indirects = Vec::new();
        for id in found.entry_ids() {
            if id != direct_id && self.bind_indirect(table, id, direct_id) {
                new_indirects.push(id);
            }
        }
        for &id in &found.entry_ids() {
            table.erase_if_empty(id);
        }

        self.append(table, CsListId::Direct, direct_id);
        for id in new_indirects {
            self.append(table, CsListId::Indirect, id);
        }
        self.evict_direct(table);
        self.evict_indirect(table);
        Ok(satisfied)
    }

    /// Bind or refresh the direct entry for `data`, detached from any list.
    fn bind_direct(&mut self, table: &mut PccTable, data: Data) -> Result<EntryId> {
        let (id, created) = table.insert(PccKey::from_name(&data.name))?;

        if let Some(cs) = table.get(id).try_cs_entry() {
            if cs.is_direct() {
                trace!("{} refreshing cached Data", id);
                self.detach(table, id);
                let slot = table.get_mut(id).cs_entry_mut().as_direct_mut().and_then(|d| {
                    d.meta = data.meta();
                    d.data = Some(data);
                    d.disk_slot.take()
                });
                if let Some(slot) = slot {
                    self.free_disk_slot(slot);
                }
                return Ok(id);
            }
            self.unbind_cs(table, id);
        }

        if let Err(e) = table.bind_role(id, Role::Cs, || SlotContent::Cs(CsEntry::direct(data))) {
            if created {
                table.erase_if_empty(id);
            }
            return Err(e);
        }
        Ok(id)
    }

    /// Make `id` an indirect entry of `direct_id`; returns whether it was newly bound.
    fn bind_indirect(&mut self, table: &mut PccTable, id: EntryId, direct_id: EntryId) -> bool {
        if let Some(cs) = table.get(id).try_cs_entry() {
            match cs.indirect_target() {
                None => return false,
                Some(target) if target == direct_id => return false,
                Some(_) => self.unbind_cs(table, id),
            }
        }

        let n_indirects = table
            .get(direct_id)
            .cs_entry()
            .as_direct()
            .map_or(0, |d| d.indirects.len());
        if n_indirects >= CS_MAX_INDIRECTS {
            debug!("{} has {} indirect entries, skipping {}", direct_id, n_indirects, id);
            return false;
        }

        if let Err(e) = table.bind_role(id, Role::Cs, || SlotContent::Cs(CsEntry::indirect(direct_id))) {
            debug!("{} cannot become indirect: {}", id, e);
            return false;
        }
        if let Some(direct) = table.get_mut(direct_id).cs_entry_mut().as_direct_mut() {
            direct.indirects.push(id);
        }
        true
    }

    /// Decide whether the CS entry on `id` satisfies `interest` at `now`.
    ///
    /// A CS entry that cannot satisfy the Interest is erased so that a PIT
    /// entry can take over the key.
    pub fn match_interest(
        &mut self,
        table: &mut PccTable,
        id: EntryId,
        interest: &Interest,
        now: Instant,
    ) -> bool {
        let direct_id = self.resolve(table, id);
        let direct = table.get(direct_id).cs_entry().as_direct();
        let (satisfied, resident) = match direct {
            Some(d) => {
                let fresh = !interest.must_be_fresh || d.meta.is_fresh(now);
                (d.meta.can_satisfy(interest) == DataSatisfy::Yes && fresh, d.data.is_some())
            }
            None => (false, false),
        };

        if !satisfied {
            trace!("{} cannot satisfy {}", id, interest.name);
            self.counters.n_miss.increment();
            self.erase(table, id);
            return false;
        }
        if resident {
            self.counters.n_hit_memory.increment();
        } else {
            self.counters.n_hit_disk.increment();
        }
        true
    }

    /// Direct entry holding the Data for the CS entry on `id`.
    fn resolve(&self, table: &PccTable, id: EntryId) -> EntryId {
        table.get(id).cs_entry().indirect_target().unwrap_or(id)
    }

    /// Locate the Data cached for entry `id`.
    pub fn cs_hit(&self, table: &PccTable, id: EntryId) -> CsHit {
        let direct_id = self.resolve(table, id);
        let direct = match table.get(direct_id).cs_entry().as_direct() {
            Some(direct) => direct,
            None => panic!("{} points at {} which is not direct", id, direct_id),
        };
        match (&direct.data, direct.disk_slot) {
            (Some(data), _) => CsHit::Memory(data.clone()),
            (None, Some(slot)) => CsHit::Disk {
                slot,
                len: direct.meta.wire_len,
            },
            (None, None) => panic!("{} has neither Data nor disk slot", direct_id),
        }
    }

    /// Erase the CS entry on `id` and destroy the PCC entry if nothing else is bound.
    pub fn erase(&mut self, table: &mut PccTable, id: EntryId) {
        self.unbind_cs(table, id);
        table.erase_if_empty(id);
    }

    fn unbind_cs(&mut self, table: &mut PccTable, id: EntryId) {
        self.detach(table, id);
        let cs = match table.get_mut(id).remove_cs_entry() {
            Some(cs) => cs,
            None => panic!("{} has no CS entry", id),
        };
        match cs.kind {
            CsKind::Direct(direct) => {
                if let Some(slot) = direct.disk_slot {
                    self.free_disk_slot(slot);
                }
                for indirect in direct.indirects {
                    trace!("{} erased along with {}", indirect, id);
                    self.erase(table, indirect);
                }
            }
            CsKind::Indirect { direct } => {
                let target = table
                    .try_get(direct)
                    .and_then(|entry| entry.try_cs_entry().map(|_| direct));
                if let Some(target) = target {
                    if let Some(d) = table.get_mut(target).cs_entry_mut().as_direct_mut() {
                        d.indirects.retain(|&ind| ind != id);
                    }
                }
            }
        }
    }

    fn free_disk_slot(&mut self, slot: DiskSlotId) {
        match &mut self.disk {
            Some(tier) => tier.alloc.free(slot),
            None => panic!("{} held without disk tier", slot),
        }
    }

    fn evict_direct(&mut self, table: &mut PccTable) {
        while self.direct.is_over_capacity() {
            let Some(id) = self.direct.pop_front(table) else {
                break;
            };
            table.get_mut(id).cs_entry_mut().list = None;
            self.counters.n_evict_direct.increment();
            if self.disk.is_some() {
                self.spill(table, id);
            } else {
                trace!("{} evicted from direct list", id);
                self.erase(table, id);
            }
        }
    }

    fn evict_indirect(&mut self, table: &mut PccTable) {
        while self.indirect.is_over_capacity() {
            let Some(id) = self.indirect.pop_front(table) else {
                break;
            };
            table.get_mut(id).cs_entry_mut().list = None;
            self.counters.n_evict_indirect.increment();
            trace!("{} evicted from indirect list", id);
            self.erase(table, id);
        }
    }

    /// Move the Data of evicted direct entry `id` to disk, or erase the entry.
    fn spill(&mut self, table: &mut PccTable, id: EntryId) {
        let oldest = match &mut self.disk {
            Some(tier) if tier.list.count() >= tier.list.capacity() => tier.list.pop_front(table),
            _ => None,
        };
        if let Some(oldest) = oldest {
            table.get_mut(oldest).cs_entry_mut().list = None;
            self.counters.n_evict_disk.increment();
            trace!("{} evicted from disk list", oldest);
            self.erase(table, oldest);
        }

        let tier = match &mut self.disk {
            Some(tier) => tier,
            None => panic!("spill without disk tier"),
        };
        let Some(slot) = tier.alloc.alloc() else {
            debug!("no free disk slot for {}", id);
            self.counters.n_spill_drop.increment();
            self.erase(table, id);
            return;
        };
        let data = table
            .get_mut(id)
            .cs_entry_mut()
            .as_direct_mut()
            .and_then(|d| d.data.take());
        let Some(data) = data else {
            tier.alloc.free(slot);
            self.erase(table, id);
            return;
        };

        match tier.store.put_data(slot, data) {
            Ok(()) => {
                if let Some(d) = table.get_mut(id).cs_entry_mut().as_direct_mut() {
                    d.disk_slot = Some(slot);
                }
                self.counters.n_spill.increment();
                trace!("{} spilled to {}", id, slot);
                self.append(table, CsListId::Disk, id);
            }
            Err(e) => {
                debug!("cannot spill {}: {}", id, e);
                tier.alloc.free(slot);
                self.counters.n_spill_drop.increment();
                self.erase(table, id);
            }
        }
    }
}
