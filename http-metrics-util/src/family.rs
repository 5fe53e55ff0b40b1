//! Sharded storage of per-dimension-set values.
use std::{
    hash::BuildHasherDefault,
    iter::repeat_with,
    sync::{PoisonError, RwLock},
};

use hashbrown::HashMap;

use crate::{DimensionHasher, DimensionSet};

type FamilyHashMap<V> = HashMap<DimensionSet, V, BuildHasherDefault<DimensionHasher>>;

/// A family of values, one per distinct [`DimensionSet`].
///
/// Every metric primitive is a family: the value stored for a set is whatever aggregate the
/// primitive maintains (an atomic integer, a sample buffer, ...).  Values are created lazily, the
/// first time a set is updated, and are never removed.
///
/// ## Performance
///
/// `Family` is optimized for reads.  Sets are spread over a power-of-two number of shards, each
/// behind its own `RwLock`, and the shard is picked from the set's precomputed hash.  Updating an
/// existing value only takes a read lock: values are expected to provide their own interior
/// mutability.
pub struct Family<V> {
    shards: Vec<RwLock<FamilyHashMap<V>>>,
    shard_mask: usize,
}

impl<V> Family<V> {
    /// Creates an empty `Family`.
    pub fn new() -> Self {
        let shard_count = std::cmp::max(1, num_cpus::get()).next_power_of_two();
        let shard_mask = shard_count - 1;
        let shards =
            repeat_with(|| RwLock::new(FamilyHashMap::default())).take(shard_count).collect();

        Self { shards, shard_mask }
    }

    #[inline]
    fn get_hash_and_shard(&self, key: &DimensionSet) -> (u64, &RwLock<FamilyHashMap<V>>) {
        let hash = key.get_hash();

        // SAFETY: We initialize the vector of shards with a power-of-two length, and
        // `self.shard_mask` is `self.shards.len() - 1`, thus the masking operation can never
        // produce an index which is out of bounds.
        let shard = unsafe { self.shards.get_unchecked(hash as usize & self.shard_mask) };

        (hash, shard)
    }

    /// Runs `op` against the value stored for `key`, if one exists.
    pub fn get<O, R>(&self, key: &DimensionSet, op: O) -> Option<R>
    where
        O: FnOnce(&V) -> R,
    {
        let (hash, shard) = self.get_hash_and_shard(key);
        let shard_read = shard.read().unwrap_or_else(PoisonError::into_inner);
        shard_read.raw_entry().from_key_hashed_nocheck(hash, key).map(|(_, v)| op(v))
    }

    /// Visits every set and value stored in this family.
    ///
    /// Shards are visited one at a time, so a set created concurrently with a call to `visit` may
    /// or may not be observed.
    pub fn visit<F>(&self, mut collect: F)
    where
        F: FnMut(&DimensionSet, &V),
    {
        for shard in &self.shards {
            let shard_read = shard.read().unwrap_or_else(PoisonError::into_inner);
            for (key, value) in shard_read.iter() {
                collect(key, value);
            }
        }
    }

    /// Number of distinct sets stored in this family.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    /// Whether or not any set has been stored in this family.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Default> Family<V> {
    /// Gets or creates the value for the given set.
    ///
    /// The `op` function will be called for the value under `key`, with the value first being
    /// created if it does not already exist.
    pub fn get_or_create<O, R>(&self, key: &DimensionSet, op: O) -> R
    where
        O: FnOnce(&V) -> R,
    {
        let (hash, shard) = self.get_hash_and_shard(key);

        // Try and get the value if it exists, running our operation if we succeed.
        let shard_read = shard.read().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, v)) = shard_read.raw_entry().from_key_hashed_nocheck(hash, key) {
            op(v)
        } else {
            // Switch to write guard and insert the value first.
            drop(shard_read);
            let mut shard_write = shard.write().unwrap_or_else(PoisonError::into_inner);
            let (_, v) = shard_write
                .raw_entry_mut()
                .from_key_hashed_nocheck(hash, key)
                .or_insert_with(|| (key.clone(), V::default()));

            op(v)
        }
    }
}

impl<V> Default for Family<V> {
    fn default() -> Self {
        Self::new()
    }
}
