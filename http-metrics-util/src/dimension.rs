use std::{
    borrow::Cow,
    fmt,
    hash::{Hash, Hasher},
    slice::Iter,
};

use rapidhash::fast::RapidHasher;

/// An owned or static string used for dimension keys and values.
pub type SharedString = Cow<'static, str>;

/// A key/value tag attached to a metric sample.
///
/// Dimensions segment a metric: a `requests` counter recorded with `method=GET` and one recorded
/// with `method=PUT` are aggregated separately.  The key of a dimension is expected to be
/// non-empty, and the keys used within a single sample are expected to be unique.  Neither is
/// checked here: violating them produces surprising aggregation, not an error.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Debug)]
pub struct Dimension(SharedString, SharedString);

impl Dimension {
    /// Creates a [`Dimension`] from a key and value.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<SharedString>,
        V: Into<SharedString>,
    {
        Dimension(key.into(), value.into())
    }

    /// Creates a [`Dimension`] from a static key and value.
    pub const fn from_static_parts(key: &'static str, value: &'static str) -> Self {
        Dimension(Cow::Borrowed(key), Cow::Borrowed(value))
    }

    /// Key of this dimension.
    pub fn key(&self) -> &str {
        self.0.as_ref()
    }

    /// Value of this dimension.
    pub fn value(&self) -> &str {
        self.1.as_ref()
    }

    /// Consumes this [`Dimension`], returning the key and value.
    pub fn into_parts(self) -> (SharedString, SharedString) {
        (self.0, self.1)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.0, self.1)
    }
}

impl From<&Dimension> for Dimension {
    fn from(dimension: &Dimension) -> Dimension {
        dimension.clone()
    }
}

impl<K, V> From<&(K, V)> for Dimension
where
    K: Into<SharedString> + Clone,
    V: Into<SharedString> + Clone,
{
    fn from(pair: &(K, V)) -> Dimension {
        Dimension::new(pair.0.clone(), pair.1.clone())
    }
}

/// A value that can be converted to [`Dimension`]s.
pub trait IntoDimensions {
    /// Consumes this value, turning it into a vector of [`Dimension`]s.
    fn into_dimensions(self) -> Vec<Dimension>;
}

impl IntoDimensions for Vec<Dimension> {
    fn into_dimensions(self) -> Vec<Dimension> {
        self
    }
}

impl<T, D> IntoDimensions for &T
where
    T: ?Sized,
    Self: IntoIterator<Item = D>,
    D: Into<Dimension>,
{
    fn into_dimensions(self) -> Vec<Dimension> {
        self.into_iter().map(|d| d.into()).collect()
    }
}

/// A canonical set of dimensions, used as the aggregation key of every metric primitive.
///
/// Dimensions are sorted on construction, so two sets built from the same pairs in a different
/// order are equal and hash identically.  The hash is computed once, up front, since a set is
/// typically hashed on every update of every primitive it is used with.
#[derive(Clone, Debug)]
pub struct DimensionSet {
    dimensions: Vec<Dimension>,
    hash: u64,
}

impl DimensionSet {
    /// Creates a [`DimensionSet`] from the given dimensions.
    pub fn new<D>(dimensions: D) -> Self
    where
        D: IntoDimensions,
    {
        let mut dimensions = dimensions.into_dimensions();
        dimensions.sort_unstable();
        let hash = Self::compute_hash(&dimensions);
        DimensionSet { dimensions, hash }
    }

    /// Creates an empty [`DimensionSet`].
    pub fn empty() -> Self {
        Self::new(Vec::<Dimension>::new())
    }

    fn compute_hash(dimensions: &[Dimension]) -> u64 {
        let mut hasher = RapidHasher::default();
        dimensions.hash(&mut hasher);
        hasher.finish()
    }

    /// Gets the precomputed hash of this set.
    pub fn get_hash(&self) -> u64 {
        self.hash
    }

    /// Dimensions in this set, in canonical order.
    pub fn dimensions(&self) -> Iter<'_, Dimension> {
        self.dimensions.iter()
    }

    /// Gets the value of the dimension with the given key, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.dimensions.iter().find(|d| d.key() == key).map(Dimension::value)
    }

    /// Number of dimensions in this set.
    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    /// Whether or not this set holds no dimensions.
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Renders the set as `key=value` pairs joined by commas, in canonical order.
    pub fn fingerprint(&self) -> String {
        self.dimensions.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
    }
}

impl Default for DimensionSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for DimensionSet {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.dimensions == other.dimensions
    }
}

impl Eq for DimensionSet {}

impl Hash for DimensionSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Display for DimensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.fingerprint())
    }
}

impl<'a> IntoIterator for &'a DimensionSet {
    type Item = &'a Dimension;
    type IntoIter = Iter<'a, Dimension>;

    fn into_iter(self) -> Self::IntoIter {
        self.dimensions.iter()
    }
}

/// A no-op hasher for pre-hashed [`DimensionSet`] values.
///
/// `DimensionSet::hash` writes its precomputed hash via `write_u64`, and `finish` hands it back
/// untouched, so maps keyed by `DimensionSet` never rehash the dimensions themselves.
///
/// # Panics
///
/// Panics if any write method other than `write_u64` is called.
#[derive(Debug, Default)]
pub struct DimensionHasher {
    hash: u64,
}

impl Hasher for DimensionHasher {
    #[inline(always)]
    fn finish(&self) -> u64 {
        self.hash
    }

    fn write(&mut self, _bytes: &[u8]) {
        panic!(
            "DimensionHasher::write() called; DimensionHasher only supports pre-hashed \
             DimensionSet keys"
        );
    }

    #[inline(always)]
    fn write_u64(&mut self, i: u64) {
        self.hash = i;
    }
}
