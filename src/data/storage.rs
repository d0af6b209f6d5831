//! Per-simplex attribute storage with transactional write journals.
//!
//! An [`AttributeCollection`] maps a slot key (a vertex or tetrahedron id, or a
//! [`FaceKey`](crate::topology::FaceKey)) to a payload. Keys that were never
//! written read back as the collection's fallback value, so growing the
//! complex never requires an eager resize.
//!
//! Writes made during an operation attempt go through the `*_logged` methods,
//! which record the first pre-image of every key in an [`AttributeJournal`].
//! [`AttributeCollection::restore`] replays the journal backwards and leaves
//! the collection bit-identical to its state before the attempt.

use core::fmt::{self, Debug};
use core::hash::Hash;

use dashmap::DashMap;
use hashbrown::HashSet;

use crate::mesh_error::MeshOpsError;

/// Keys accepted by [`AttributeCollection`].
pub trait AttributeKey: Copy + Eq + Hash + Ord + Debug + Send + Sync {}

impl<K> AttributeKey for K where K: Copy + Eq + Hash + Ord + Debug + Send + Sync {}

/// First pre-image of every key written during one operation attempt.
pub struct AttributeJournal<K, T> {
    entries: Vec<(K, Option<T>)>,
    seen: HashSet<K>,
}

impl<K, T> Default for AttributeJournal<K, T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            seen: HashSet::new(),
        }
    }
}

impl<K: AttributeKey, T> AttributeJournal<K, T> {
    fn record(&mut self, key: K, prior: impl FnOnce() -> Option<T>) {
        if self.seen.insert(key) {
            self.entries.push((key, prior()));
        }
    }

    /// Keys touched so far, in first-write order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Debug, T> Debug for AttributeJournal<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeJournal")
            .field("touched", &self.entries.len())
            .finish()
    }
}

/// Concurrent key-to-payload map with a fallback value.
pub struct AttributeCollection<K, T> {
    name: &'static str,
    values: DashMap<K, T>,
    fallback: T,
}

impl<K: Eq + Hash, T> Debug for AttributeCollection<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeCollection")
            .field("name", &self.name)
            .field("len", &self.values.len())
            .finish()
    }
}

impl<K: AttributeKey, T: Clone> Clone for AttributeCollection<K, T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            values: self.values.clone(),
            fallback: self.fallback.clone(),
        }
    }
}

impl<K: AttributeKey, T: Clone> AttributeCollection<K, T> {
    /// Empty collection; unset keys read as `fallback`.
    pub fn new(name: &'static str, fallback: T) -> Self {
        Self {
            name,
            values: DashMap::new(),
            fallback,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fallback(&self) -> &T {
        &self.fallback
    }

    /// Number of explicitly stored entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.values.contains_key(key)
    }

    /// Value at `key`, or the fallback.
    #[inline]
    pub fn get(&self, key: &K) -> T {
        self.values
            .get(key)
            .map(|r| r.value().clone())
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Value at `key`, failing when it was never written.
    pub fn try_get(&self, key: &K) -> Result<T, MeshOpsError>
    where
        K: Into<usize>,
    {
        self.values
            .get(key)
            .map(|r| r.value().clone())
            .ok_or_else(|| MeshOpsError::MissingAttribute {
                store: self.name,
                slot: (*key).into(),
            })
    }

    /// Value at `key` if one was written.
    pub fn get_opt(&self, key: &K) -> Option<T> {
        self.values.get(key).map(|r| r.value().clone())
    }

    pub fn set(&self, key: K, value: T) {
        self.values.insert(key, value);
    }

    /// Mutate the value at `key` in place, starting from the fallback if unset.
    pub fn update<F: FnOnce(&mut T)>(&self, key: K, f: F) {
        let mut entry = self
            .values
            .entry(key)
            .or_insert_with(|| self.fallback.clone());
        f(entry.value_mut());
    }

    pub fn remove(&self, key: &K) -> Option<T> {
        self.values.remove(key).map(|(_, v)| v)
    }

    /// Every stored entry, ordered by key.
    pub fn snapshot(&self) -> Vec<(K, T)> {
        let mut out: Vec<(K, T)> = self
            .values
            .iter()
            .map(|r| (*r.key(), r.value().clone()))
            .collect();
        out.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Rekey every entry; entries mapped to `None` are dropped.
    pub fn remap<F: Fn(K) -> Option<K>>(&mut self, map: F) {
        let old = std::mem::take(&mut self.values);
        let remapped = DashMap::with_capacity(old.len());
        for (k, v) in old {
            if let Some(new_key) = map(k) {
                remapped.insert(new_key, v);
            }
        }
        self.values = remapped;
    }

    // -------------------------------------------------------------------------
    // Journaled writes
    // -------------------------------------------------------------------------

    pub fn set_logged(&self, key: K, value: T, journal: &mut AttributeJournal<K, T>) {
        journal.record(key, || self.get_opt(&key));
        self.values.insert(key, value);
    }

    pub fn update_logged<F: FnOnce(&mut T)>(
        &self,
        key: K,
        f: F,
        journal: &mut AttributeJournal<K, T>,
    ) {
        journal.record(key, || self.get_opt(&key));
        self.update(key, f);
    }

    pub fn remove_logged(&self, key: &K, journal: &mut AttributeJournal<K, T>) -> Option<T> {
        journal.record(*key, || self.get_opt(key));
        self.remove(key)
    }

    /// Undo every journaled write.
    pub fn restore(&self, journal: AttributeJournal<K, T>) {
        for (key, prior) in journal.entries.into_iter().rev() {
            match prior {
                Some(value) => {
                    self.values.insert(key, value);
                }
                None => {
                    self.values.remove(&key);
                }
            }
        }
    }
}

impl<T: Clone> AttributeCollection<usize, T> {
    /// Materialize the fallback for every unset slot below `len`.
    pub fn grow_to(&self, len: usize) {
        for key in 0..len {
            self.values
                .entry(key)
                .or_insert_with(|| self.fallback.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_and_growth() {
        let c: AttributeCollection<usize, f64> = AttributeCollection::new("quality", 1.5);
        assert_eq!(c.get(&7), 1.5);
        assert!(c.try_get(&7).is_err());
        c.grow_to(3);
        assert_eq!(c.len(), 3);
        c.set(1, 4.0);
        assert_eq!(c.snapshot(), vec![(0, 1.5), (1, 4.0), (2, 1.5)]);
    }

    #[test]
    fn restore_reverts_to_first_pre_image() {
        let c: AttributeCollection<usize, i32> = AttributeCollection::new("tag", 0);
        c.set(0, 10);
        c.set(1, 20);
        let before = c.snapshot();

        let mut journal = AttributeJournal::default();
        c.set_logged(0, 11, &mut journal);
        c.set_logged(0, 12, &mut journal);
        c.update_logged(5, |v| *v += 3, &mut journal);
        c.remove_logged(&1, &mut journal);
        assert_eq!(journal.len(), 3);
        assert_eq!(c.get(&0), 12);
        assert_eq!(c.get(&5), 3);

        c.restore(journal);
        assert_eq!(c.snapshot(), before);
    }

    #[test]
    fn remap_drops_unmapped_keys() {
        let mut c: AttributeCollection<usize, char> = AttributeCollection::new("label", '.');
        for (k, v) in [(0, 'a'), (2, 'b'), (5, 'c')] {
            c.set(k, v);
        }
        c.remap(|k| (k != 2).then_some(k / 2));
        assert_eq!(c.snapshot(), vec![(0, 'a'), (2, 'c')]);
    }
}
