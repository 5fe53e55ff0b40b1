//! Dimension-keyed metric primitives.
mod counter;
pub use self::counter::Counter;

mod gauge;
pub use self::gauge::Gauge;

mod histogram;
pub use self::histogram::Histogram;
