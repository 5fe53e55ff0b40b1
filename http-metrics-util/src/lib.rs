//! Dimension-keyed metric primitives used by `http-metrics`.
//!
//! The types here know nothing about HTTP.  A [`Dimension`] is a key/value tag, a
//! [`DimensionSet`] is the canonical, order-independent aggregation key built from a handful of
//! them, and [`Counter`], [`Gauge`] and [`Histogram`] keep one aggregate per distinct set.
//! Primitives are safe to update from many threads at once.
//!
//! A [`Snapshot`] copies the current state of any number of primitives for an exporter to read.
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod dimension;
pub use dimension::{Dimension, DimensionHasher, DimensionSet, IntoDimensions, SharedString};

mod family;
pub use family::Family;

mod kind;
pub use kind::MetricKind;

mod primitives;
pub use primitives::{Counter, Gauge, Histogram};

mod snapshot;
pub use snapshot::{DebugValue, Snapshot, SnapshotEntry};
