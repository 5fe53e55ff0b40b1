use std::sync::atomic::{AtomicI64, Ordering};

use crate::{DebugValue, DimensionSet, Family, MetricKind, Snapshot};

/// A level that goes up and down, kept per dimension set.
///
/// Gauges track currently-open things, such as in-flight requests or open connections, and so
/// expect every increment to be balanced by a decrement.  The value is signed and never clamped:
/// an unbalanced caller shows up as a wrong (possibly negative) value.
#[derive(Default)]
pub struct Gauge {
    family: Family<AtomicI64>,
}

impl Gauge {
    /// Creates a new, empty `Gauge`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the level recorded under `dimensions` by one.
    pub fn increment(&self, dimensions: &DimensionSet) {
        self.family.get_or_create(dimensions, |level| level.fetch_add(1, Ordering::AcqRel));
    }

    /// Decrements the level recorded under `dimensions` by one.
    pub fn decrement(&self, dimensions: &DimensionSet) {
        self.family.get_or_create(dimensions, |level| level.fetch_sub(1, Ordering::AcqRel));
    }

    /// Gets the level recorded under exactly `dimensions`, or zero if nothing was recorded.
    pub fn value(&self, dimensions: &DimensionSet) -> i64 {
        self.family.get(dimensions, |level| level.load(Ordering::Acquire)).unwrap_or(0)
    }

    /// Gets the sum of the levels recorded under every dimension set.
    pub fn total(&self) -> i64 {
        let mut total = 0;
        self.family.visit(|_, level| total += level.load(Ordering::Acquire));
        total
    }

    /// Appends the current state of this gauge to `snapshot` under `name`.
    pub fn snapshot_into(&self, name: &str, snapshot: &mut Snapshot) {
        self.family.visit(|dimensions, level| {
            let value = DebugValue::Gauge(level.load(Ordering::Acquire));
            snapshot.push(MetricKind::Gauge, name, dimensions.clone(), value)
        });
    }
}
