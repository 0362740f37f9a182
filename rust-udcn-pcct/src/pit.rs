//! PIT (Pending Interest Table) entries and lookup results.
//!
//! PIT entries occupy the pending-request roles of a PCC entry. The lookup
//! operations themselves live on [`crate::Pcct`] because they need both the
//! table and the content store.

use crate::entry::{EntryId, Role};
use rust_udcn_common::metrics::Counter;
use rust_udcn_common::ndn::Interest;
use rust_udcn_common::types::{FaceId, PccToken};
use std::time::{Duration, Instant};

/// A downstream face waiting for Data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PitDownstream {
    pub face: FaceId,
    pub nonce: u32,
    pub expiry: Instant,
}

/// One pending Interest and the faces that expressed it.
#[derive(Debug, Clone)]
pub struct PitEntry {
    /// First Interest that created the entry.
    pub interest: Interest,
    pub downstreams: Vec<PitDownstream>,
}

impl PitEntry {
    /// Create a PIT entry for `interest` arriving at `now` on `face`.
    pub fn new(interest: Interest, face: FaceId, now: Instant) -> Self {
        let expiry = now + Duration::from_millis(interest.lifetime_ms as u64);
        let downstream = PitDownstream {
            face,
            nonce: interest.nonce,
            expiry,
        };
        Self {
            interest,
            downstreams: vec![downstream],
        }
    }

    /// Record another Interest on this entry; a face already present is refreshed.
    pub fn add_downstream(&mut self, interest: &Interest, face: FaceId, now: Instant) {
        let expiry = now + Duration::from_millis(interest.lifetime_ms as u64);
        match self.downstreams.iter_mut().find(|dn| dn.face == face) {
            Some(dn) => {
                dn.nonce = interest.nonce;
                dn.expiry = dn.expiry.max(expiry);
            }
            None => self.downstreams.push(PitDownstream {
                face,
                nonce: interest.nonce,
                expiry,
            }),
        }
    }

    /// Latest expiry among the downstreams.
    pub fn expiry(&self) -> Option<Instant> {
        self.downstreams.iter().map(|dn| dn.expiry).max()
    }
}

/// Result of inserting an Interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PitInsertResult {
    /// A new PIT entry was created; the Interest should be forwarded.
    Created {
        entry: EntryId,
        role: Role,
        token: PccToken,
    },
    /// The Interest joined an existing PIT entry.
    Aggregated { entry: EntryId, role: Role },
    /// A cached Data satisfies the Interest.
    CsHit { entry: EntryId },
}

/// PIT entries satisfied by one Data packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PitFindResult {
    pub entries: Vec<(EntryId, Role)>,
    /// Some PIT entry can only be matched once the Data's implicit digest is known.
    pub need_digest: bool,
}

impl PitFindResult {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct entries in the order they were found.
    pub fn entry_ids(&self) -> Vec<EntryId> {
        let mut ids: Vec<EntryId> = Vec::with_capacity(self.entries.len());
        for &(id, _) in &self.entries {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

/// PIT statistics.
#[derive(Debug, Default, Clone)]
pub struct PitCounters {
    pub n_insert: Counter,
    pub n_aggregated: Counter,
    pub n_cs_match: Counter,
    pub n_data_hit: Counter,
    pub n_data_miss: Counter,
    pub n_need_digest: Counter,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_udcn_common::ndn::Name;

    #[test]
    fn test_downstream_refresh() {
        let now = Instant::now();
        let interest = Interest::new(Name::from_string("/p")).with_nonce(1).with_lifetime(1000);
        let mut pit = PitEntry::new(interest.clone(), FaceId(1), now);

        let later = interest.clone().with_nonce(2).with_lifetime(4000);
        pit.add_downstream(&later, FaceId(1), now);
        assert_eq!(pit.downstreams.len(), 1);
        assert_eq!(pit.downstreams[0].nonce, 2);
        assert_eq!(pit.expiry(), Some(now + Duration::from_millis(4000)));

        pit.add_downstream(&interest, FaceId(2), now);
        assert_eq!(pit.downstreams.len(), 2);
    }

    #[test]
    fn test_find_result_dedup() {
        let result = PitFindResult {
            entries: vec![(EntryId(1), Role::Pit0), (EntryId(1), Role::Pit1), (EntryId(2), Role::Pit0)],
            need_digest: false,
        };
        assert_eq!(result.entry_ids(), vec![EntryId(1), EntryId(2)]);
    }
}
