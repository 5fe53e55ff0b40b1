use std::fmt;

use ordered_float::OrderedFloat;

use crate::{DimensionSet, MetricKind};

/// A point-in-time value for a metric exposing raw values.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DebugValue {
    /// Counter.
    Counter(u64),
    /// Gauge.
    Gauge(i64),
    /// Histogram.
    Histogram(Vec<OrderedFloat<f64>>),
}

/// A single metric in a [`Snapshot`]: one primitive, under one dimension set.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SnapshotEntry {
    /// Kind of the primitive.
    pub kind: MetricKind,
    /// Full name of the metric.
    pub name: String,
    /// Dimension set the value was recorded under.
    pub dimensions: DimensionSet,
    /// Recorded value.
    pub value: DebugValue,
}

/// A point-in-time copy of a set of metric primitives.
///
/// Snapshots are what an exporter reads: every primitive appends one entry per dimension set it
/// has seen.  Entries carry no exposition format of their own.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Creates an empty `Snapshot`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(
        &mut self,
        kind: MetricKind,
        name: &str,
        dimensions: DimensionSet,
        value: DebugValue,
    ) {
        self.entries.push(SnapshotEntry { kind, name: name.to_string(), dimensions, value });
    }

    /// Finds the entry for the given metric name and dimension set.
    pub fn get(&self, name: &str, dimensions: &DimensionSet) -> Option<&DebugValue> {
        self.entries
            .iter()
            .find(|entry| entry.name == name && &entry.dimensions == dimensions)
            .map(|entry| &entry.value)
    }

    /// Iterates over every entry.
    pub fn iter(&self) -> std::slice::Iter<'_, SnapshotEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether or not this snapshot holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes this snapshot, returning its entries sorted by name, then dimension fingerprint.
    pub fn into_sorted_vec(mut self) -> Vec<SnapshotEntry> {
        self.entries
            .sort_by_cached_key(|entry| (entry.name.clone(), entry.dimensions.fingerprint()));
        self.entries
    }
}

impl IntoIterator for Snapshot {
    type Item = SnapshotEntry;
    type IntoIter = std::vec::IntoIter<SnapshotEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl fmt::Display for SnapshotEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}{} = ", self.kind, self.name, self.dimensions)?;
        match &self.value {
            DebugValue::Counter(count) => write!(f, "{}", count),
            DebugValue::Gauge(level) => write!(f, "{}", level),
            DebugValue::Histogram(values) => write!(f, "{} samples", values.len()),
        }
    }
}
