use std::{mem, time::Duration};

use ordered_float::OrderedFloat;
use parking_lot::Mutex;

use crate::{DebugValue, DimensionSet, Family, MetricKind, Snapshot};

/// A distribution of observed values, kept per dimension set.
///
/// Every observation is kept, in the order it was recorded, until it is drained.  Readers that
/// run for the lifetime of a process should drain ([`drain`][Histogram::drain] or
/// [`drain_into`][Histogram::drain_into]) rather than copy, or samples accumulate without bound.
/// Durations are recorded in seconds.
#[derive(Default)]
pub struct Histogram {
    family: Family<Mutex<Vec<f64>>>,
}

impl Histogram {
    /// Creates a new, empty `Histogram`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` under `dimensions`.
    pub fn observe(&self, value: f64, dimensions: &DimensionSet) {
        self.family.get_or_create(dimensions, |samples| samples.lock().push(value));
    }

    /// Records `duration`, in seconds, under `dimensions`.
    pub fn record_duration(&self, duration: Duration, dimensions: &DimensionSet) {
        self.observe(duration.as_secs_f64(), dimensions);
    }

    /// Gets the values recorded under exactly `dimensions`, in recording order.
    pub fn values(&self, dimensions: &DimensionSet) -> Vec<f64> {
        self.family.get(dimensions, |samples| samples.lock().clone()).unwrap_or_default()
    }

    /// Gets the number of values recorded under exactly `dimensions`.
    pub fn count(&self, dimensions: &DimensionSet) -> usize {
        self.family.get(dimensions, |samples| samples.lock().len()).unwrap_or(0)
    }

    /// Takes the values recorded under exactly `dimensions`, leaving none behind.
    pub fn drain(&self, dimensions: &DimensionSet) -> Vec<f64> {
        self.family.get(dimensions, |samples| mem::take(&mut *samples.lock())).unwrap_or_default()
    }

    /// Number of values currently held, across every dimension set.
    pub fn retained(&self) -> usize {
        let mut retained = 0;
        self.family.visit(|_, samples| retained += samples.lock().len());
        retained
    }

    /// Appends a copy of the current state of this histogram to `snapshot` under `name`.
    pub fn snapshot_into(&self, name: &str, snapshot: &mut Snapshot) {
        self.family.visit(|dimensions, samples| {
            let values = samples.lock().iter().copied().map(OrderedFloat).collect();
            push(snapshot, name, dimensions, values);
        });
    }

    /// Moves the current state of this histogram into `snapshot` under `name`.
    ///
    /// Every dimension set seen so far gets an entry, empty if nothing was recorded since the
    /// last drain.  Values recorded concurrently land either in this snapshot or in the next one.
    pub fn drain_into(&self, name: &str, snapshot: &mut Snapshot) {
        self.family.visit(|dimensions, samples| {
            let drained = mem::take(&mut *samples.lock());
            push(snapshot, name, dimensions, drained.into_iter().map(OrderedFloat).collect());
        });
    }
}

fn push(
    snapshot: &mut Snapshot,
    name: &str,
    dimensions: &DimensionSet,
    values: Vec<OrderedFloat<f64>>,
) {
    let value = DebugValue::Histogram(values);
    snapshot.push(MetricKind::Histogram, name, dimensions.clone(), value);
}
