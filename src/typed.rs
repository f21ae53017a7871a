//! Family-bound trie wrappers.
//!
//! [`AddressTrie`] and [`AssociativeAddressTrie`] pin a [`BinaryTrie`] to one
//! address family at the type level, so mixing IPv4 and MAC keys is a compile
//! error instead of a runtime width panic. They accept whole [`Grouping`]s,
//! reducing each to its canonical key, as well as pre-built [`Key`]s.

use std::{fmt, marker::PhantomData};

use crate::{
    AddressFamily, BinaryTrie, CachingIter, Grouping, IncompatibleErr, Key, NodeEntry,
};

/// A set of addresses and blocks of one address family.
///
/// # Examples
///
/// ```
/// use bittrie::{AddressTrie, Grouping, Ipv4};
///
/// let mut trie = AddressTrie::<Ipv4>::new();
/// trie.add(&Grouping::ipv4_block([10, 0, 0, 0], 8).unwrap()).unwrap();
/// trie.add(&Grouping::ipv4([10, 1, 2, 3])).unwrap();
///
/// let lookup = Grouping::ipv4([10, 9, 9, 9]);
/// let lpm = trie.longest_prefix_match(&lookup).unwrap().unwrap();
/// assert_eq!(lpm.to_string(), "10.0.0.0/8");
/// ```
pub struct AddressTrie<F: AddressFamily> {
    trie: BinaryTrie<()>,
    _family: PhantomData<F>,
}

/// A map from addresses and blocks of one address family to values.
pub struct AssociativeAddressTrie<F: AddressFamily, V> {
    trie: BinaryTrie<V>,
    _family: PhantomData<F>,
}

/// Reduces `grouping` to its canonical key, checking the family bound.
///
/// # Panics
///
/// If the grouping belongs to a different address family than `F`.
fn reduce<F: AddressFamily>(grouping: &Grouping) -> Result<Key, IncompatibleErr> {
    assert_eq!(
        grouping.family(),
        F::FAMILY,
        "grouping family does not match the trie's address family",
    );
    grouping.to_single_prefix_block_or_address()
}

/// Checks a pre-built key against the family bound.
///
/// # Panics
///
/// If the key's width is not the width of `F`.
fn bound<F: AddressFamily>(key: Key) -> Key {
    assert_eq!(
        key.bit_count(),
        F::BITS,
        "key width does not match the trie's address family",
    );
    key
}

impl<F: AddressFamily> AddressTrie<F> {
    pub fn new() -> Self {
        Self { trie: BinaryTrie::new(), _family: PhantomData }
    }

    /// The number of added elements, O(1).
    #[inline]
    pub fn size(&self) -> usize {
        self.trie.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    pub fn clear(&mut self) {
        self.trie.clear();
    }

    /// Adds a grouping, reduced to its single prefix block or address.
    /// Returns `true` if it was not present before.
    pub fn add(&mut self, grouping: &Grouping) -> Result<bool, IncompatibleErr> {
        Ok(self.trie.add(reduce::<F>(grouping)?))
    }

    /// Adds a pre-built key of this family.
    pub fn add_key(&mut self, key: Key) -> bool {
        self.trie.add(bound::<F>(key))
    }

    pub fn remove(&mut self, grouping: &Grouping) -> Result<bool, IncompatibleErr> {
        Ok(self.trie.remove(&reduce::<F>(grouping)?).is_some())
    }

    pub fn remove_key(&mut self, key: &Key) -> bool {
        self.trie.remove(key).is_some()
    }

    /// Removes every element contained in the grouping's block, returning
    /// the number removed.
    pub fn remove_elements_contained_by(
        &mut self,
        grouping: &Grouping,
    ) -> Result<usize, IncompatibleErr> {
        Ok(self.trie.remove_elements_contained_by(&reduce::<F>(grouping)?))
    }

    pub fn contains(&self, grouping: &Grouping) -> Result<bool, IncompatibleErr> {
        Ok(self.trie.contains(&reduce::<F>(grouping)?))
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.trie.contains(key)
    }

    /// The most specific added block or address containing the grouping.
    pub fn longest_prefix_match(
        &self,
        grouping: &Grouping,
    ) -> Result<Option<&Key>, IncompatibleErr> {
        Ok(self.trie.longest_prefix_match(&reduce::<F>(grouping)?))
    }

    pub fn longest_prefix_match_key(&self, key: &Key) -> Option<&Key> {
        self.trie.longest_prefix_match(key)
    }

    /// True iff some added element contains `key`.
    pub fn element_contains(&self, key: &Key) -> bool {
        self.trie.element_contains(key)
    }

    /// Every added ancestor containing `key`, outermost first.
    pub fn elements_containing(&self, key: &Key) -> Vec<NodeEntry<'_, ()>> {
        self.trie.elements_containing(key)
    }

    /// Added keys sorted ascending.
    pub fn iter(&self) -> impl Iterator<Item = &Key> {
        self.trie.iter().map(|(k, _)| k)
    }

    pub fn iter_descending(&self) -> impl Iterator<Item = &Key> {
        self.trie.iter_descending().map(|(k, _)| k)
    }

    pub fn pre_order_iter(&self) -> impl Iterator<Item = &Key> {
        self.trie.pre_order_iter().map(|(k, _)| k)
    }

    pub fn pre_order_iter_reversed(&self) -> impl Iterator<Item = &Key> {
        self.trie.pre_order_iter_reversed().map(|(k, _)| k)
    }

    pub fn post_order_iter(&self) -> impl Iterator<Item = &Key> {
        self.trie.post_order_iter().map(|(k, _)| k)
    }

    pub fn post_order_iter_reversed(&self) -> impl Iterator<Item = &Key> {
        self.trie.post_order_iter_reversed().map(|(k, _)| k)
    }

    pub fn block_size_iter(&self) -> impl Iterator<Item = &Key> {
        self.trie.block_size_iter().map(|(k, _)| k)
    }

    pub fn block_size_iter_descending(&self) -> impl Iterator<Item = &Key> {
        self.trie.block_size_iter_descending().map(|(k, _)| k)
    }

    /// All-node pre-order walk with caller-attached sub-node caches.
    pub fn cached_pre_order_iter<C>(&self) -> CachingIter<'_, (), C> {
        self.trie.cached_pre_order_iter()
    }
}

impl<F: AddressFamily, V> AssociativeAddressTrie<F, V> {
    pub fn new() -> Self {
        Self { trie: BinaryTrie::new(), _family: PhantomData }
    }

    /// The number of added elements, O(1).
    #[inline]
    pub fn size(&self) -> usize {
        self.trie.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    pub fn clear(&mut self) {
        self.trie.clear();
    }

    /// Maps a grouping to `value`, returning the value it displaces.
    pub fn insert(&mut self, grouping: &Grouping, value: V) -> Result<Option<V>, IncompatibleErr> {
        Ok(self.trie.insert(reduce::<F>(grouping)?, value))
    }

    pub fn insert_key(&mut self, key: Key, value: V) -> Option<V> {
        self.trie.insert(bound::<F>(key), value)
    }

    pub fn remove(&mut self, grouping: &Grouping) -> Result<Option<V>, IncompatibleErr> {
        Ok(self.trie.remove(&reduce::<F>(grouping)?))
    }

    pub fn remove_key(&mut self, key: &Key) -> Option<V> {
        self.trie.remove(key)
    }

    pub fn remove_elements_contained_by(
        &mut self,
        grouping: &Grouping,
    ) -> Result<usize, IncompatibleErr> {
        Ok(self.trie.remove_elements_contained_by(&reduce::<F>(grouping)?))
    }

    pub fn get(&self, grouping: &Grouping) -> Result<Option<&V>, IncompatibleErr> {
        Ok(self.trie.get(&reduce::<F>(grouping)?))
    }

    pub fn get_key(&self, key: &Key) -> Option<&V> {
        self.trie.get(key)
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.trie.contains(key)
    }

    /// The most specific added entry containing `key`, with its value.
    pub fn longest_prefix_match_entry(&self, key: &Key) -> Option<(&Key, &V)> {
        self.trie.longest_prefix_match_entry(key)
    }

    pub fn longest_prefix_match_key(&self, key: &Key) -> Option<&Key> {
        self.trie.longest_prefix_match(key)
    }

    pub fn elements_containing(&self, key: &Key) -> Vec<NodeEntry<'_, V>> {
        self.trie.elements_containing(key)
    }

    /// Entries sorted ascending by key.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &V)> {
        self.trie.iter()
    }

    pub fn iter_descending(&self) -> impl Iterator<Item = (&Key, &V)> {
        self.trie.iter_descending()
    }

    pub fn pre_order_iter(&self) -> impl Iterator<Item = (&Key, &V)> {
        self.trie.pre_order_iter()
    }

    pub fn pre_order_iter_reversed(&self) -> impl Iterator<Item = (&Key, &V)> {
        self.trie.pre_order_iter_reversed()
    }

    pub fn post_order_iter(&self) -> impl Iterator<Item = (&Key, &V)> {
        self.trie.post_order_iter()
    }

    pub fn post_order_iter_reversed(&self) -> impl Iterator<Item = (&Key, &V)> {
        self.trie.post_order_iter_reversed()
    }

    pub fn block_size_iter(&self) -> impl Iterator<Item = (&Key, &V)> {
        self.trie.block_size_iter()
    }

    pub fn block_size_iter_descending(&self) -> impl Iterator<Item = (&Key, &V)> {
        self.trie.block_size_iter_descending()
    }

    pub fn cached_pre_order_iter<C>(&self) -> CachingIter<'_, V, C> {
        self.trie.cached_pre_order_iter()
    }
}

impl<F: AddressFamily> Default for AddressTrie<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: AddressFamily> Clone for AddressTrie<F> {
    fn clone(&self) -> Self {
        Self { trie: self.trie.clone(), _family: PhantomData }
    }
}

impl<F: AddressFamily> fmt::Debug for AddressTrie<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AddressTrie").field(&self.trie).finish()
    }
}

impl<F: AddressFamily> FromIterator<Key> for AddressTrie<F> {
    fn from_iter<I: IntoIterator<Item = Key>>(iter: I) -> Self {
        let mut trie = Self::new();
        trie.extend(iter);
        trie
    }
}

impl<F: AddressFamily> Extend<Key> for AddressTrie<F> {
    fn extend<I: IntoIterator<Item = Key>>(&mut self, iter: I) {
        for key in iter {
            self.add_key(key);
        }
    }
}

impl<F: AddressFamily, V> Default for AssociativeAddressTrie<F, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: AddressFamily, V: Clone> Clone for AssociativeAddressTrie<F, V> {
    fn clone(&self) -> Self {
        Self { trie: self.trie.clone(), _family: PhantomData }
    }
}

impl<F: AddressFamily, V> fmt::Debug for AssociativeAddressTrie<F, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AssociativeAddressTrie").field(&self.trie).finish()
    }
}

impl<F: AddressFamily, V> FromIterator<(Key, V)> for AssociativeAddressTrie<F, V> {
    fn from_iter<I: IntoIterator<Item = (Key, V)>>(iter: I) -> Self {
        let mut trie = Self::new();
        trie.extend(iter);
        trie
    }
}

impl<F: AddressFamily, V> Extend<(Key, V)> for AssociativeAddressTrie<F, V> {
    fn extend<I: IntoIterator<Item = (Key, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert_key(key, value);
        }
    }
}
