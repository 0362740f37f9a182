//! The PIT-CS composite table as seen by a forwarding worker.

use crate::config::PcctConfig;
use crate::cs::{Cs, CsHit};
use crate::disk::DiskStore;
use crate::entry::{EntryId, Role, SlotContent};
use crate::key::PccKey;
use crate::pit::{PitCounters, PitEntry, PitFindResult, PitInsertResult};
use crate::table::PccTable;
use log::{debug, trace};
use rust_udcn_common::ndn::{Data, DataSatisfy, Interest};
use rust_udcn_common::types::{FaceId, PccToken};
use rust_udcn_common::Result;
use std::time::Instant;

/// PIT and CS sharing one composite table.
///
/// A `Pcct` belongs to a single forwarding worker; none of its operations
/// suspend or lock.
#[derive(Debug)]
pub struct Pcct {
    table: PccTable,
    cs: Cs,
    pit_counters: PitCounters,
}

impl Pcct {
    pub fn new(cfg: &PcctConfig) -> Self {
        Self {
            table: PccTable::new(cfg.pcct_capacity, cfg.ext_capacity()),
            cs: Cs::new(cfg.cs_direct_capacity, cfg.cs_indirect_capacity),
            pit_counters: PitCounters::default(),
        }
    }

    /// Spill Data evicted from memory to `store`.
    pub fn with_disk(mut self, store: DiskStore) -> Self {
        self.cs = self.cs.with_disk(store);
        self
    }

    pub fn table(&self) -> &PccTable {
        &self.table
    }

    pub fn cs(&self) -> &Cs {
        &self.cs
    }

    pub fn pit_counters(&self) -> &PitCounters {
        &self.pit_counters
    }

    pub fn disk_store(&self) -> Option<&DiskStore> {
        self.cs.disk_store()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn find_by_token(&self, token: PccToken) -> Option<EntryId> {
        self.table.find_by_token(token)
    }

    /// Process an incoming Interest.
    ///
    /// A cached Data that satisfies the Interest yields
    /// [`PitInsertResult::CsHit`]. Otherwise the Interest creates or joins the
    /// PIT entry for its MustBeFresh flavor.
    pub fn insert_interest(
        &mut self,
        interest: &Interest,
        face: FaceId,
        now: Instant,
    ) -> Result<PitInsertResult> {
        let key = PccKey::from_interest(interest);
        let (mut id, created) = self.table.insert(key.clone())?;

        if !created && self.table.get(id).has_role(Role::Cs) {
            if self.cs.match_interest(&mut self.table, id, interest, now) {
                self.pit_counters.n_cs_match.increment();
                return Ok(PitInsertResult::CsHit { entry: id });
            }
            // the mismatching CS entry was erased, possibly with the whole entry
            id = self.table.insert(key)?.0;
        }

        let role = if interest.must_be_fresh { Role::Pit1 } else { Role::Pit0 };
        if self.table.get(id).has_role(role) {
            self.table
                .get_mut(id)
                .pit_entry_mut(role)
                .add_downstream(interest, face, now);
            self.pit_counters.n_aggregated.increment();
            trace!("{} aggregated on {} {:?}", interest.name, id, role);
            return Ok(PitInsertResult::Aggregated { entry: id, role });
        }

        let bound = self.table.bind_role(id, role, || {
            SlotContent::Pit(PitEntry::new(interest.clone(), face, now))
        });
        if let Err(e) = bound {
            debug!("cannot create PIT entry for {}: {}", interest.name, e);
            self.table.erase_if_empty(id);
            return Err(e);
        }

        let token = self.table.assign_token(id);
        self.pit_counters.n_insert.increment();
        trace!("{} created on {} {:?} {}", interest.name, id, role, token);
        Ok(PitInsertResult::Created { entry: id, role, token })
    }

    /// Find the PIT entries satisfied by `data`.
    ///
    /// Candidates are the entry keyed by the Data name and the entry carrying
    /// `token`, which covers Interests whose key differs from the Data name.
    pub fn find_by_data(&self, data: &Data, token: Option<PccToken>) -> PitFindResult {
        let mut candidates = Vec::with_capacity(2);
        candidates.extend(self.table.find(&PccKey::from_name(&data.name)));
        if let Some(id) = token.and_then(|t| self.table.find_by_token(t)) {
            if !candidates.contains(&id) {
                candidates.push(id);
            }
        }

        let meta = data.meta();
        let mut result = PitFindResult::default();
        for id in candidates {
            let entry = self.table.get(id);
            for role in Role::PIT {
                if !entry.has_role(role) {
                    continue;
                }
                match meta.can_satisfy(&entry.pit_entry(role).interest) {
                    DataSatisfy::Yes => result.entries.push((id, role)),
                    DataSatisfy::NeedDigest => result.need_digest = true,
                    DataSatisfy::No => {}
                }
            }
        }

        if result.need_digest {
            self.pit_counters.n_need_digest.increment();
        }
        if result.is_empty() {
            self.pit_counters.n_data_miss.increment();
        } else {
            self.pit_counters.n_data_hit.increment();
        }
        result
    }

    /// Satisfy the PIT entries in `found` with `data` and cache it.
    ///
    /// Returns the satisfied PIT entries so their downstreams can be answered.
    /// If the Data cannot be cached, the PIT entries are still removed.
    pub fn insert_data(&mut self, data: Data, found: &PitFindResult) -> Vec<PitEntry> {
        if found.is_empty() {
            return Vec::new();
        }
        let name = data.name.clone();
        match self.cs.insert(&mut self.table, data, found) {
            Ok(satisfied) => satisfied,
            Err(e) => {
                debug!("not caching {}: {}", name, e);
                found
                    .entries
                    .iter()
                    .filter_map(|&(id, role)| self.erase_pit(id, role))
                    .collect()
            }
        }
    }

    /// Remove the PIT entry in `role` of `id`, destroying the entry if it becomes empty.
    pub fn erase_pit(&mut self, id: EntryId, role: Role) -> Option<PitEntry> {
        let pit = self.table.get_mut(id).remove_pit_entry(role);
        self.table.erase_if_empty(id);
        pit
    }

    /// Locate the Data for a [`PitInsertResult::CsHit`].
    pub fn cs_hit(&self, id: EntryId) -> CsHit {
        self.cs.cs_hit(&self.table, id)
    }

    /// Erase the CS entry of `id`.
    pub fn erase_cs(&mut self, id: EntryId) {
        self.cs.erase(&mut self.table, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cs::CsListId;
    use bytes::Bytes;
    use rust_udcn_common::ndn::Name;
    use rust_udcn_common::Error;
    use std::time::Duration;

    fn pcct() -> Pcct {
        Pcct::new(&PcctConfig {
            pcct_capacity: 64,
            ext_capacity: Some(64),
            cs_direct_capacity: 8,
            cs_indirect_capacity: 8,
            disk: None,
        })
    }

    fn interest(name: &str) -> Interest {
        Interest::new(Name::from_string(name))
    }

    fn data(name: &str) -> Data {
        Data::new(Name::from_string(name), Bytes::from_static(b"hello"))
    }

    #[test]
    fn test_interest_data_interest() {
        let mut pcct = pcct();
        let now = Instant::now();

        let created = pcct.insert_interest(&interest("/a/1"), FaceId(1), now).unwrap();
        let (entry, token) = match created {
            PitInsertResult::Created { entry, role, token } => {
                assert_eq!(role, Role::Pit0);
                (entry, token)
            }
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(pcct.find_by_token(token), Some(entry));

        let again = pcct.insert_interest(&interest("/a/1"), FaceId(2), now).unwrap();
        assert_eq!(again, PitInsertResult::Aggregated { entry, role: Role::Pit0 });

        let d = data("/a/1");
        let found = pcct.find_by_data(&d, Some(token));
        assert_eq!(found.entries, vec![(entry, Role::Pit0)]);
        let satisfied = pcct.insert_data(d, &found);
        assert_eq!(satisfied.len(), 1);
        assert_eq!(satisfied[0].downstreams.len(), 2);
        assert!(!pcct.table().get(entry).has_pit_entries());

        let hit = pcct.insert_interest(&interest("/a/1"), FaceId(3), now).unwrap();
        assert_eq!(hit, PitInsertResult::CsHit { entry });
        match pcct.cs_hit(entry) {
            CsHit::Memory(d) => assert_eq!(d.content, Bytes::from_static(b"hello")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(pcct.pit_counters().n_cs_match.value(), 1);
    }

    #[test]
    fn test_must_be_fresh_uses_second_pit_role() {
        let mut pcct = pcct();
        let now = Instant::now();
        pcct.insert_interest(&interest("/f"), FaceId(1), now).unwrap();
        let fresh = interest("/f").with_must_be_fresh(true);
        match pcct.insert_interest(&fresh, FaceId(1), now).unwrap() {
            PitInsertResult::Created { entry, role, .. } => {
                assert_eq!(role, Role::Pit1);
                assert!(pcct.table().get(entry).has_ext());
                assert_eq!(pcct.table().get(entry).word().role_count(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_stale_cache_gives_way_to_pit() {
        let mut pcct = pcct();
        let now = Instant::now();
        pcct.insert_interest(&interest("/s"), FaceId(1), now).unwrap();
        let d = data("/s").with_freshness(0);
        let found = pcct.find_by_data(&d, None);
        pcct.insert_data(d, &found);
        assert_eq!(pcct.cs().count_entries(CsListId::Direct), 1);

        let fresh = interest("/s").with_must_be_fresh(true);
        let result = pcct.insert_interest(&fresh, FaceId(1), now + Duration::from_millis(1)).unwrap();
        assert!(matches!(result, PitInsertResult::Created { role: Role::Pit1, .. }));
        assert_eq!(pcct.cs().count_entries(CsListId::Direct), 0);
    }

    #[test]
    fn test_token_finds_hinted_interest() {
        let mut pcct = pcct();
        let hinted = interest("/h/1").with_forwarding_hint(Name::from_string("/isp"));
        let token = match pcct.insert_interest(&hinted, FaceId(1), Instant::now()).unwrap() {
            PitInsertResult::Created { token, .. } => token,
            other => panic!("unexpected {:?}", other),
        };

        let d = data("/h/1");
        assert!(pcct.find_by_data(&d, None).is_empty());
        let found = pcct.find_by_data(&d, Some(token));
        assert_eq!(found.entries.len(), 1);

        pcct.insert_data(d, &found);
        // the hinted entry now refers to the Data cached under the plain name
        assert_eq!(pcct.len(), 2);
        assert_eq!(pcct.cs().count_entries(CsListId::Indirect), 1);
    }

    #[test]
    fn test_digest_interest_needs_digest() {
        let mut pcct = pcct();
        let name = Name::from_string("/d/1");
        let by_digest = Interest::new(name.with_digest([9; 32]));
        let token = match pcct.insert_interest(&by_digest, FaceId(1), Instant::now()).unwrap() {
            PitInsertResult::Created { token, .. } => token,
            other => panic!("unexpected {:?}", other),
        };

        let d = Data::new(name, Bytes::new());
        let found = pcct.find_by_data(&d, Some(token));
        assert!(found.is_empty());
        assert!(found.need_digest);

        let found = pcct.find_by_data(&d.with_digest([9; 32]), Some(token));
        assert_eq!(found.entries.len(), 1);
        assert_eq!(pcct.pit_counters().n_need_digest.value(), 1);
    }

    #[test]
    fn test_table_full_is_reported() {
        let mut pcct = Pcct::new(&PcctConfig {
            pcct_capacity: 1,
            ..PcctConfig::default()
        });
        let now = Instant::now();
        pcct.insert_interest(&interest("/1"), FaceId(1), now).unwrap();
        let err = pcct.insert_interest(&interest("/2"), FaceId(1), now).unwrap_err();
        assert!(matches!(err, Error::TableFull(1)));
    }

    #[test]
    fn test_uncacheable_data_still_satisfies() {
        let mut pcct = Pcct::new(&PcctConfig {
            ext_capacity: Some(0),
            ..PcctConfig::default()
        });
        pcct.insert_interest(&interest("/u"), FaceId(1), Instant::now()).unwrap();
        let d = data("/u");
        let found = pcct.find_by_data(&d, None);
        assert_eq!(pcct.insert_data(d, &found).len(), 1);
        assert!(pcct.is_empty());
    }

    #[test]
    fn test_erase_pit_destroys_entry() {
        let mut pcct = pcct();
        let entry = match pcct.insert_interest(&interest("/e"), FaceId(1), Instant::now()).unwrap() {
            PitInsertResult::Created { entry, .. } => entry,
            other => panic!("unexpected {:?}", other),
        };
        assert!(pcct.erase_pit(entry, Role::Pit0).is_some());
        assert!(pcct.is_empty());
        assert!(pcct.table().try_get(entry).is_none());
    }
}
