use std::sync::atomic::{AtomicU64, Ordering};

use crate::{DebugValue, DimensionSet, Family, MetricKind, Snapshot};

/// A monotonically increasing count, kept per dimension set.
///
/// Increments are atomic: concurrent callers never lose an update, and the order in which they
/// land does not affect the final value.
#[derive(Default)]
pub struct Counter {
    family: Family<AtomicU64>,
}

impl Counter {
    /// Creates a new, empty `Counter`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the count recorded under `dimensions` by one.
    pub fn increment(&self, dimensions: &DimensionSet) {
        self.increment_by(1, dimensions);
    }

    /// Increments the count recorded under `dimensions` by `value`.
    pub fn increment_by(&self, value: u64, dimensions: &DimensionSet) {
        self.family.get_or_create(dimensions, |count| count.fetch_add(value, Ordering::Relaxed));
    }

    /// Gets the count recorded under exactly `dimensions`, or zero if nothing was recorded.
    pub fn value(&self, dimensions: &DimensionSet) -> u64 {
        self.family.get(dimensions, |count| count.load(Ordering::Relaxed)).unwrap_or(0)
    }

    /// Gets the sum of the counts recorded under every dimension set.
    pub fn total(&self) -> u64 {
        let mut total = 0;
        self.family.visit(|_, count| total += count.load(Ordering::Relaxed));
        total
    }

    /// Visits every dimension set and its current count.
    pub fn visit<F>(&self, mut collect: F)
    where
        F: FnMut(&DimensionSet, u64),
    {
        self.family.visit(|dimensions, count| collect(dimensions, count.load(Ordering::Relaxed)));
    }

    /// Appends the current state of this counter to `snapshot` under `name`.
    pub fn snapshot_into(&self, name: &str, snapshot: &mut Snapshot) {
        self.visit(|dimensions, count| {
            snapshot.push(MetricKind::Counter, name, dimensions.clone(), DebugValue::Counter(count))
        });
    }
}
