//! Metric primitives for the PIT, CS and disk store statistics.
//!
//! All updates use relaxed atomics so that counters can be bumped through a
//! shared reference, including from the disk store's I/O task.

use std::sync::atomic::{AtomicU64, Ordering};

/* ---------------------------------------------------------------- *
 * Counter
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.add(1);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

impl Clone for Counter {
    fn clone(&self) -> Self {
        Self {
            value: AtomicU64::new(self.value()),
        }
    }
}

/* ---------------------------------------------------------------- *
 * Histogram
 * ---------------------------------------------------------------- */

/// Histogram with fixed, ascending upper bucket bounds.
///
/// A sample lands in the first bucket whose bound is `>=` the sample; samples
/// above the last bound are counted as overflow.
#[derive(Debug)]
pub struct Histogram {
    bounds: Vec<u64>,
    buckets: Vec<AtomicU64>,
    overflow: AtomicU64,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(bounds: Vec<u64>) -> Self {
        assert!(!bounds.is_empty(), "histogram needs at least one bucket");
        assert!(bounds.windows(2).all(|w| w[0] < w[1]), "histogram bounds must ascend");
        let buckets = bounds.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            buckets,
            overflow: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// `n` buckets growing geometrically from `min` to `max`.
    pub fn exponential(min: u64, max: u64, n: usize) -> Self {
        assert!(0 < min && min < max && n > 1);
        let factor = (max as f64 / min as f64).powf(1.0 / (n as f64 - 1.0));
        let mut bounds: Vec<u64> = Vec::with_capacity(n);
        let mut bound = min as f64;
        for _ in 0..n {
            let next = (bound.round() as u64).max(bounds.last().map_or(0, |&b| b + 1));
            bounds.push(next);
            bound *= factor;
        }
        Self::new(bounds)
    }

    pub fn observe(&self, value: u64) {
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        match self.buckets.get(self.bounds.partition_point(|&b| b < value)) {
            Some(bucket) => bucket.fetch_add(1, Ordering::Relaxed),
            None => self.overflow.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn average(&self) -> f64 {
        match self.count() {
            0 => 0.0,
            n => self.sum() as f64 / n as f64,
        }
    }

    /// `(upper bound, samples)` for every bucket.
    pub fn counts(&self) -> Vec<(u64, u64)> {
        self.bounds
            .iter()
            .zip(&self.buckets)
            .map(|(&b, n)| (b, n.load(Ordering::Relaxed)))
            .collect()
    }

    /// Upper bound of the bucket holding quantile `q` (0.0..=1.0), or `None`
    /// when empty or when the quantile falls into the overflow.
    pub fn quantile(&self, q: f64) -> Option<u64> {
        let total = self.count();
        if total == 0 {
            return None;
        }
        let rank = ((q.clamp(0.0, 1.0) * total as f64).ceil() as u64).max(1);
        let mut seen = 0;
        for (bound, n) in self.counts() {
            seen += n;
            if seen >= rank {
                return Some(bound);
            }
        }
        None
    }
}

impl Clone for Histogram {
    fn clone(&self) -> Self {
        let load = |a: &AtomicU64| AtomicU64::new(a.load(Ordering::Relaxed));
        Self {
            bounds: self.bounds.clone(),
            buckets: self.buckets.iter().map(load).collect(),
            overflow: load(&self.overflow),
            sum: load(&self.sum),
            count: load(&self.count),
        }
    }
}
