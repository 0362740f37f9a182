//! Disk slot allocator.

use rust_udcn_common::types::DiskSlotId;

/// Bitmap allocator over the inclusive slot range `[min, max]`.
#[derive(Debug, Clone)]
pub struct DiskAlloc {
    min: u64,
    max: u64,
    /// One bit per slot; a set bit means the slot is free.
    bitmap: Vec<u64>,
    n_free: u64,
    cursor: u64,
}

impl DiskAlloc {
    /// Create an allocator with every slot in `[min, max]` free.
    ///
    /// Panics if `min` is 0 (slot 0 is reserved) or `min > max`.
    pub fn new(min: u64, max: u64) -> Self {
        assert!(min >= 1, "disk slot 0 is reserved");
        assert!(min <= max, "empty disk slot range {}..={}", min, max);
        let n_slots = max - min + 1;
        let mut bitmap = vec![u64::MAX; n_slots.div_ceil(64) as usize];
        let tail_bits = n_slots % 64;
        if tail_bits != 0 {
            if let Some(last) = bitmap.last_mut() {
                *last = (1 << tail_bits) - 1;
            }
        }
        Self {
            min,
            max,
            bitmap,
            n_free: n_slots,
            cursor: 0,
        }
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn count_free(&self) -> u64 {
        self.n_free
    }

    /// Total number of slots managed.
    pub fn capacity(&self) -> u64 {
        self.max - self.min + 1
    }

    /// Allocate a free slot, or `None` when every slot is in use.
    pub fn alloc(&mut self) -> Option<DiskSlotId> {
        if self.n_free == 0 {
            return None;
        }
        let n_words = self.bitmap.len() as u64;
        for step in 0..n_words {
            let word_index = ((self.cursor + step) % n_words) as usize;
            let word = self.bitmap[word_index];
            if word == 0 {
                continue;
            }
            let bit = word.trailing_zeros() as u64;
            self.bitmap[word_index] &= !(1 << bit);
            self.n_free -= 1;
            self.cursor = word_index as u64;
            return Some(DiskSlotId(self.min + word_index as u64 * 64 + bit));
        }
        None
    }

    /// Return `slot` to the pool.
    ///
    /// Panics if the slot is outside the range or not allocated.
    pub fn free(&mut self, slot: DiskSlotId) {
        assert!(
            (self.min..=self.max).contains(&slot.0),
            "{} outside allocator range {}..={}",
            slot,
            self.min,
            self.max
        );
        let offset = slot.0 - self.min;
        let (word, bit) = ((offset / 64) as usize, offset % 64);
        assert!(self.bitmap[word] & (1 << bit) == 0, "{} is not allocated", slot);
        self.bitmap[word] |= 1 << bit;
        self.n_free += 1;
    }
}
