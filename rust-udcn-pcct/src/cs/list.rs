//! Intrusive FIFO list of CS entries.
//!
//! Link fields live inside each [`CsEntry`](super::CsEntry), so membership costs
//! no allocation. The list only stores head, tail and count; node storage is
//! reached through a [`NodeArena`].

use crate::entry::EntryId;

/// Link fields embedded in a list member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CsNode {
    prev: Option<EntryId>,
    next: Option<EntryId>,
}

/// Storage that can resolve an entry id to its embedded [`CsNode`].
pub trait NodeArena {
    fn node(&self, id: EntryId) -> &CsNode;
    fn node_mut(&mut self, id: EntryId) -> &mut CsNode;
}

/// Bounded FIFO list: append at the tail, evict from the head.
#[derive(Debug, Clone)]
pub struct CsList {
    head: Option<EntryId>,
    tail: Option<EntryId>,
    count: usize,
    capacity: usize,
}

impl CsList {
    pub fn new(capacity: usize) -> Self {
        Self {
            head: None,
            tail: None,
            count: 0,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether the list holds more members than its capacity.
    pub fn is_over_capacity(&self) -> bool {
        self.count > self.capacity
    }

    /// Oldest member.
    pub fn front(&self) -> Option<EntryId> {
        self.head
    }

    /// Append `id` as the newest member; its node must be detached.
    pub fn append<A: NodeArena + ?Sized>(&mut self, arena: &mut A, id: EntryId) {
        let old_tail = self.tail;
        *arena.node_mut(id) = CsNode {
            prev: old_tail,
            next: None,
        };
        match old_tail {
            Some(t) => arena.node_mut(t).next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.count += 1;
    }

    /// Detach member `id`.
    pub fn remove<A: NodeArena + ?Sized>(&mut self, arena: &mut A, id: EntryId) {
        assert!(self.count > 0, "remove from empty CS list");
        let CsNode { prev, next } = *arena.node(id);
        match prev {
            Some(p) => arena.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => arena.node_mut(n).prev = prev,
            None => self.tail = prev,
        }
        *arena.node_mut(id) = CsNode::default();
        self.count -= 1;
    }

    /// Detach and return the oldest member.
    pub fn pop_front<A: NodeArena + ?Sized>(&mut self, arena: &mut A) -> Option<EntryId> {
        let id = self.head?;
        self.remove(arena, id);
        Some(id)
    }

    /// Members from oldest to newest.
    pub fn ids<A: NodeArena + ?Sized>(&self, arena: &A) -> Vec<EntryId> {
        let mut ids = Vec::with_capacity(self.count);
        let mut cursor = self.head;
        while let Some(id) = cursor {
            ids.push(id);
            cursor = arena.node(id).next;
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecArena(Vec<CsNode>);

    impl NodeArena for VecArena {
        fn node(&self, id: EntryId) -> &CsNode {
            &self.0[id.index()]
        }

        fn node_mut(&mut self, id: EntryId) -> &mut CsNode {
            &mut self.0[id.index()]
        }
    }

    fn arena(n: usize) -> VecArena {
        VecArena(vec![CsNode::default(); n])
    }

    #[test]
    fn test_append_and_remove_middle() {
        let mut arena = arena(3);
        let mut list = CsList::new(10);
        for i in 0..3 {
            list.append(&mut arena, EntryId(i));
        }
        list.remove(&mut arena, EntryId(1));
        assert_eq!(list.ids(&arena), vec![EntryId(0), EntryId(2)]);
        assert_eq!(list.count(), 2);

        list.remove(&mut arena, EntryId(2));
        list.remove(&mut arena, EntryId(0));
        assert_eq!(list.front(), None);
        assert_eq!(list.count(), 0);
    }

    #[test]
    fn test_fifo_eviction_keeps_newest() {
        let capacity = 4;
        let k = 3;
        let mut arena = arena(capacity + k);
        let mut list = CsList::new(capacity);
        let mut evicted = Vec::new();

        for i in 0..(capacity + k) as u32 {
            list.append(&mut arena, EntryId(i));
            while list.is_over_capacity() {
                evicted.extend(list.pop_front(&mut arena));
            }
        }

        assert_eq!(list.count(), capacity);
        assert_eq!(evicted, (0..k as u32).map(EntryId).collect::<Vec<_>>());
        assert_eq!(
            list.ids(&arena),
            (k as u32..(capacity + k) as u32).map(EntryId).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_zero_capacity_evicts_immediately() {
        let mut arena = arena(1);
        let mut list = CsList::new(0);
        list.append(&mut arena, EntryId(0));
        assert!(list.is_over_capacity());
        assert_eq!(list.pop_front(&mut arena), Some(EntryId(0)));
        assert_eq!(list.pop_front(&mut arena), None);
    }
}
