use std::fmt;

use crate::{Key, bits::leading_common_bits};

mod iter;
mod node;

pub use iter::CachingIter;
pub use node::NodeEntry;

use iter::{BlockSizeNodes, InOrderNodes, PostOrderNodes, PreOrderNodes};
use node::Node;

/// A compact binary (PATRICIA-style) trie over canonical [`Key`]s, the
/// structure underlying routing tables and ACL evaluation.
///
/// Nodes are either *added* (explicitly inserted, countable elements) or
/// *structural* branch ancestors created where two added keys diverge.
/// The first inserted key establishes the trie's bit width (its address
/// family); inserting a key of any other width is a contract violation and
/// panics. Lookups with a mismatched width simply answer `false`/`None`.
///
/// Reads through `&self` are freely concurrent; mutation takes `&mut self`
/// and must be serialized by the caller. Iterators borrow the trie, so
/// structural modification during iteration is a compile-time error rather
/// than a runtime generation check.
///
/// # Examples
///
/// ```
/// use bittrie::{BinaryTrie, Key};
///
/// let mut trie: BinaryTrie = BinaryTrie::new();
/// trie.add(Key::ipv4_block([10, 0, 0, 0], 8).unwrap());
/// trie.add(Key::ipv4([10, 1, 2, 3]));
///
/// assert_eq!(trie.size(), 2);
/// let lpm = trie.longest_prefix_match(&Key::ipv4([10, 9, 9, 9])).unwrap();
/// assert_eq!(lpm.to_string(), "10.0.0.0/8");
/// ```
#[derive(Clone, Default)]
pub struct BinaryTrie<V = ()> {
    root: Option<Box<Node<V>>>,
}

impl<V> BinaryTrie<V> {
    pub fn new() -> Self {
        Self { root: None }
    }

    /// The number of added elements, O(1) from the cached subtree size.
    #[inline]
    pub fn size(&self) -> usize {
        self.root.as_ref().map_or(0, |n| n.size)
    }

    /// The total node count including structural nodes, by walking the tree.
    pub fn node_size(&self) -> usize {
        PreOrderNodes::new(self.root.as_deref(), false).count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// The bit width the trie is bound to, established by the first
    /// insertion.
    pub fn bit_count(&self) -> Option<u8> {
        self.root.as_ref().map(|n| n.key.bit_count())
    }

    /// Drops every node, unbinding the trie from its width.
    pub fn clear(&mut self) {
        self.root = None;
    }

    /// Inserts `key` with an associated value, returning the value it
    /// displaces if the key was already added.
    ///
    /// # Panics
    ///
    /// If the trie already holds keys of a different bit width.
    pub fn insert(&mut self, key: Key, value: V) -> Option<V> {
        // the root is the full address space of the key's family,
        // structural until 0/0 itself is added
        let root = self.root.get_or_insert_with(|| {
            Box::new(Node::structural(Key::normalized(key.bit_count(), 0, Some(0))))
        });
        assert_eq!(
            root.key.bit_count(),
            key.bit_count(),
            "key width does not match the trie's established width",
        );
        Self::insert_at(root, key, value)
    }

    /// Adds `key`, returning `true` if it was not present before.
    ///
    /// # Panics
    ///
    /// If the trie already holds keys of a different bit width.
    pub fn add(&mut self, key: Key) -> bool
    where
        V: Default,
    {
        self.insert(key, V::default()).is_none()
    }

    fn insert_at(node: &mut Node<V>, key: Key, value: V) -> Option<V> {
        debug_assert!(node.key.contains(&key));
        if node.key == key {
            let displaced = node.value.replace(value);
            node.added = true;
            node.update_size();
            return displaced;
        }

        let branch_bit = node.key.effective_prefix();
        let displaced = Self::insert_into_slot(node.child_slot_mut(key.bit(branch_bit)), key, value);
        node.update_size();
        displaced
    }

    fn insert_into_slot(slot: &mut Option<Box<Node<V>>>, key: Key, value: V) -> Option<V> {
        enum Shape {
            Empty,
            Descend,
            Between { child_bit: bool },
            Diverge { common: u8, key_bit: bool },
        }

        let shape = match slot.as_deref() {
            None => Shape::Empty,
            Some(child) if child.key.contains(&key) => Shape::Descend,
            Some(child) if key.contains(&child.key) => {
                Shape::Between { child_bit: child.key.bit(key.effective_prefix()) }
            }
            Some(child) => {
                let common = leading_common_bits(key.value(), child.key.value(), key.bit_count())
                    .min(key.effective_prefix())
                    .min(child.key.effective_prefix());
                Shape::Diverge { common, key_bit: key.bit(common) }
            }
        };

        match shape {
            Shape::Empty => {
                *slot = Some(Box::new(Node::leaf(key, value)));
                None
            }
            Shape::Descend => slot
                .as_deref_mut()
                .and_then(|child| Self::insert_at(child, key, value)),
            Shape::Between { child_bit } => {
                // the new block sits between this node and the child
                let old = slot.take();
                let mut between = Node::leaf(key, value);
                *between.child_slot_mut(child_bit) = old;
                between.update_size();
                *slot = Some(Box::new(between));
                None
            }
            Shape::Diverge { common, key_bit } => {
                // diverging keys: branch at the longest common prefix
                let old = slot.take();
                let mut branch =
                    Node::structural(Key::normalized(key.bit_count(), key.value(), Some(common)));
                let leaf = Some(Box::new(Node::leaf(key, value)));
                if key_bit {
                    branch.lower = old;
                    branch.upper = leaf;
                } else {
                    branch.lower = leaf;
                    branch.upper = old;
                }
                branch.update_size();
                *slot = Some(Box::new(branch));
                None
            }
        }
    }

    /// Removes the exact added element for `key`, returning its value.
    /// Structural nodes and blocks merely containing `key` are untouched.
    pub fn remove(&mut self, key: &Key) -> Option<V> {
        if self.bit_count() != Some(key.bit_count()) {
            return None;
        }
        Self::remove_at(&mut self.root, key, true)
    }

    fn remove_at(slot: &mut Option<Box<Node<V>>>, key: &Key, is_root: bool) -> Option<V> {
        let node = slot.as_deref_mut()?;
        if !node.key.contains(key) {
            return None;
        }
        let removed = if node.key == *key {
            if !node.added {
                return None;
            }
            node.added = false;
            node.value.take()
        } else {
            let child = node.child_slot_mut(key.bit(node.key.effective_prefix()));
            Self::remove_at(child, key, false)
        };
        if removed.is_some() {
            if is_root {
                node.update_size();
            } else {
                Self::restructure(slot);
            }
        }
        removed
    }

    /// After a removal below `slot`: drop a childless structural node, hoist
    /// the child of a non-branching one, otherwise refresh the size.
    fn restructure(slot: &mut Option<Box<Node<V>>>) {
        let Some(node) = slot.as_deref_mut() else { return };
        if node.added {
            node.update_size();
            return;
        }
        match (node.lower.is_some(), node.upper.is_some()) {
            (false, false) => *slot = None,
            (true, false) => *slot = node.lower.take(),
            (false, true) => *slot = node.upper.take(),
            (true, true) => node.update_size(),
        }
    }

    /// Removes every added element whose key is contained in `key`,
    /// detaching whole subtrees in one operation. Returns the number of
    /// elements removed.
    pub fn remove_elements_contained_by(&mut self, key: &Key) -> usize {
        if self.bit_count() != Some(key.bit_count()) {
            return 0;
        }
        Self::remove_contained_at(&mut self.root, key, true)
    }

    fn remove_contained_at(slot: &mut Option<Box<Node<V>>>, key: &Key, is_root: bool) -> usize {
        let Some(node) = slot.as_deref_mut() else { return 0 };
        if key.contains(&node.key) {
            let count = node.size;
            if is_root {
                // the root outlives the wipe
                node.lower = None;
                node.upper = None;
                node.added = false;
                node.value = None;
                node.update_size();
            } else {
                *slot = None;
            }
            return count;
        }
        if !node.key.contains(key) {
            return 0;
        }
        let child = node.child_slot_mut(key.bit(node.key.effective_prefix()));
        let count = Self::remove_contained_at(child, key, false);
        if count > 0 {
            if is_root {
                node.update_size();
            } else {
                Self::restructure(slot);
            }
        }
        count
    }

    fn find(&self, key: &Key) -> Option<&Node<V>> {
        let mut node = self.root.as_deref()?;
        if node.key.bit_count() != key.bit_count() {
            return None;
        }
        loop {
            if node.key == *key {
                return Some(node);
            }
            if !node.key.contains(key) {
                return None;
            }
            node = node.child(key.bit(node.key.effective_prefix()))?;
        }
    }

    /// True iff `key` was explicitly added.
    pub fn contains(&self, key: &Key) -> bool {
        self.find(key).is_some_and(|n| n.added)
    }

    /// The value associated with the exact added element for `key`.
    pub fn get(&self, key: &Key) -> Option<&V> {
        self.find(key).filter(|n| n.added)?.value.as_ref()
    }

    /// The node for `key`, added or structural.
    pub fn get_node(&self, key: &Key) -> Option<NodeEntry<'_, V>> {
        self.find(key).map(NodeEntry::of)
    }

    /// The node for `key`, only if it is an added element.
    pub fn get_added_node(&self, key: &Key) -> Option<NodeEntry<'_, V>> {
        self.find(key).filter(|n| n.added).map(NodeEntry::of)
    }

    fn lpm_node(&self, key: &Key) -> Option<&Node<V>> {
        let mut node = self.root.as_deref()?;
        if node.key.bit_count() != key.bit_count() {
            return None;
        }
        let mut best = None;
        loop {
            if !node.key.contains(key) {
                break;
            }
            if node.added {
                best = Some(node);
            }
            if node.key == *key {
                break;
            }
            match node.child(key.bit(node.key.effective_prefix())) {
                Some(child) => node = child,
                None => break,
            }
        }
        best
    }

    /// The most specific added block or address containing `key`, the
    /// routing-table lookup.
    pub fn longest_prefix_match(&self, key: &Key) -> Option<&Key> {
        self.lpm_node(key).map(|n| &n.key)
    }

    /// [`Self::longest_prefix_match`] together with the associated value.
    pub fn longest_prefix_match_entry(&self, key: &Key) -> Option<(&Key, &V)> {
        let node = self.lpm_node(key)?;
        Some((&node.key, node.value.as_ref()?))
    }

    /// True iff some added element contains `key`.
    pub fn element_contains(&self, key: &Key) -> bool {
        self.lpm_node(key).is_some()
    }

    /// Every added ancestor whose block contains `key`, outermost first:
    /// the stack an ACL evaluator works through.
    pub fn elements_containing(&self, key: &Key) -> Vec<NodeEntry<'_, V>> {
        let mut out = Vec::new();
        let Some(mut node) = self.root.as_deref() else {
            return out;
        };
        if node.key.bit_count() != key.bit_count() {
            return out;
        }
        loop {
            if !node.key.contains(key) {
                break;
            }
            if node.added {
                out.push(NodeEntry::of(node));
            }
            if node.key == *key {
                break;
            }
            match node.child(key.bit(node.key.effective_prefix())) {
                Some(child) => node = child,
                None => break,
            }
        }
        out
    }

    /// Added elements sorted ascending by canonical key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &V)> {
        Self::elements(InOrderNodes::new(self.root.as_deref(), false))
    }

    /// Added elements sorted descending.
    pub fn iter_descending(&self) -> impl Iterator<Item = (&Key, &V)> {
        Self::elements(InOrderNodes::new(self.root.as_deref(), true))
    }

    /// Added elements pre-order: every containing block before the elements
    /// it contains, lower sub-nodes first.
    pub fn pre_order_iter(&self) -> impl Iterator<Item = (&Key, &V)> {
        Self::elements(PreOrderNodes::new(self.root.as_deref(), false))
    }

    /// Pre-order with upper sub-nodes first.
    pub fn pre_order_iter_reversed(&self) -> impl Iterator<Item = (&Key, &V)> {
        Self::elements(PreOrderNodes::new(self.root.as_deref(), true))
    }

    /// Added elements post-order: contained elements before their containing
    /// blocks, lower sub-nodes first.
    pub fn post_order_iter(&self) -> impl Iterator<Item = (&Key, &V)> {
        Self::elements(PostOrderNodes::new(self.root.as_deref(), false))
    }

    /// Post-order with upper sub-nodes first.
    pub fn post_order_iter_reversed(&self) -> impl Iterator<Item = (&Key, &V)> {
        Self::elements(PostOrderNodes::new(self.root.as_deref(), true))
    }

    /// Added elements by block size: larger blocks (shorter prefixes) first,
    /// ties in canonical key order.
    pub fn block_size_iter(&self) -> impl Iterator<Item = (&Key, &V)> {
        Self::elements(BlockSizeNodes::new(self.root.as_deref(), false))
    }

    /// Block-size order reversed: most specific first.
    pub fn block_size_iter_descending(&self) -> impl Iterator<Item = (&Key, &V)> {
        Self::elements(BlockSizeNodes::new(self.root.as_deref(), true))
    }

    /// All-node pre-order walk with caller-attached sub-node caches; see
    /// [`CachingIter`].
    pub fn cached_pre_order_iter<C>(&self) -> CachingIter<'_, V, C> {
        CachingIter::new(self.root.as_deref())
    }

    fn elements<'a>(
        nodes: impl Iterator<Item = &'a Node<V>>,
    ) -> impl Iterator<Item = (&'a Key, &'a V)>
    where
        V: 'a,
    {
        nodes.filter(|n| n.added).filter_map(|n| Some((&n.key, n.value.as_ref()?)))
    }
}

impl<V> fmt::Debug for BinaryTrie<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.iter().map(|(k, _)| k.to_string()).collect();
        f.debug_struct("BinaryTrie")
            .field("size", &self.size())
            .field("elements", &keys)
            .finish()
    }
}

impl<V: Default> FromIterator<Key> for BinaryTrie<V> {
    fn from_iter<I: IntoIterator<Item = Key>>(iter: I) -> Self {
        let mut trie = Self::new();
        for key in iter {
            trie.add(key);
        }
        trie
    }
}

impl<V> FromIterator<(Key, V)> for BinaryTrie<V> {
    fn from_iter<I: IntoIterator<Item = (Key, V)>>(iter: I) -> Self {
        let mut trie = Self::new();
        for (key, value) in iter {
            trie.insert(key, value);
        }
        trie
    }
}

impl<V: Default> Extend<Key> for BinaryTrie<V> {
    fn extend<I: IntoIterator<Item = Key>>(&mut self, iter: I) {
        for key in iter {
            self.add(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use proptest::{collection::vec, proptest};

    use super::*;
    use crate::testutil::{v4, v4_block};

    /// O(n) reference count of added nodes, cross-checking the cached size.
    fn walk_size<V>(trie: &BinaryTrie<V>) -> usize {
        trie.iter().count()
    }

    #[test]
    fn test_round_trip() {
        let mut trie = BinaryTrie::<()>::new();
        let key = v4([1, 2, 3, 4]);
        assert!(trie.add(key));
        assert!(trie.contains(&key));
        assert_eq!(trie.size(), 1);

        assert!(!trie.add(key), "second add is a no-op");
        assert_eq!(trie.size(), 1);

        assert!(trie.remove(&key).is_some());
        assert!(!trie.contains(&key));
        assert_eq!(trie.size(), 0);
        assert!(trie.remove(&key).is_none());
    }

    #[test]
    fn test_structural_nodes() {
        let mut trie = BinaryTrie::<()>::new();
        trie.add(v4([1, 2, 3, 0]));
        trie.add(v4([1, 2, 3, 1]));

        // the two addresses hang off an implicit /31 branch
        let branch = v4_block([1, 2, 3, 0], 31);
        assert!(!trie.contains(&branch));
        let entry = trie.get_node(&branch).expect("branch node exists");
        assert!(!entry.added);
        assert_eq!(trie.size(), 2);
        // root + branch + two leaves
        assert_eq!(trie.node_size(), 4);

        // promoting the structural node to added
        trie.add(branch);
        assert!(trie.contains(&branch));
        assert_eq!(trie.size(), 3);
        assert_eq!(trie.node_size(), 4);

        // removing it while it still branches demotes it back
        assert!(trie.remove(&branch).is_some());
        assert_eq!(trie.size(), 2);
        assert_eq!(trie.node_size(), 4);
        assert!(trie.get_node(&branch).is_some());
    }

    #[test]
    fn test_remove_collapses_branches() {
        let mut trie = BinaryTrie::<()>::new();
        trie.add(v4([1, 2, 3, 0]));
        trie.add(v4([1, 2, 3, 1]));
        assert_eq!(trie.node_size(), 4);

        // removing one leaf hoists the sibling over the /31 branch
        trie.remove(&v4([1, 2, 3, 1]));
        assert_eq!(trie.size(), 1);
        assert_eq!(trie.node_size(), 2);
        assert!(trie.contains(&v4([1, 2, 3, 0])));
    }

    #[test]
    fn test_insert_between() {
        let mut trie = BinaryTrie::<()>::new();
        trie.add(v4([10, 0, 0, 1]));
        trie.add(v4_block([10, 0, 0, 0], 24));
        trie.add(v4_block([10, 0, 0, 0], 16));

        assert_eq!(trie.size(), 3);
        let ancestors = trie
            .elements_containing(&v4([10, 0, 0, 1]))
            .iter()
            .map(|e| e.key.to_string())
            .collect_vec();
        assert_eq!(ancestors, ["10.0.0.0/16", "10.0.0.0/24", "10.0.0.1"]);
    }

    #[test]
    fn test_merge_scenario() {
        // two sibling addresses, then bulk-remove their covering /31
        let mut trie = BinaryTrie::<()>::new();
        trie.add(v4([1, 2, 3, 0]));
        trie.add(v4([1, 2, 3, 1]));

        // plain remove of the (never added) block removes nothing
        assert!(trie.remove(&v4_block([1, 2, 3, 0], 31)).is_none());
        assert_eq!(trie.size(), 2);

        // bulk removal of the block takes both addresses
        assert_eq!(trie.remove_elements_contained_by(&v4_block([1, 2, 3, 0], 31)), 2);
        assert_eq!(trie.size(), 0);
        assert!(!trie.contains(&v4([1, 2, 3, 0])));
        assert!(!trie.contains(&v4([1, 2, 3, 1])));
    }

    #[test]
    fn test_remove_contained_subtree() {
        let mut trie = BinaryTrie::<()>::new();
        trie.add(v4_block([10, 0, 0, 0], 8));
        trie.add(v4_block([10, 1, 0, 0], 16));
        trie.add(v4([10, 1, 2, 3]));
        trie.add(v4([11, 0, 0, 1]));

        assert_eq!(trie.remove_elements_contained_by(&v4_block([10, 0, 0, 0], 8)), 3);
        assert_eq!(trie.size(), 1);
        assert!(trie.contains(&v4([11, 0, 0, 1])));

        // removing everything via the zero block keeps the trie usable
        assert_eq!(trie.remove_elements_contained_by(&v4_block([0, 0, 0, 0], 0)), 1);
        assert!(trie.is_empty());
        trie.add(v4([11, 0, 0, 1]));
        assert_eq!(trie.size(), 1);
    }

    #[test]
    fn test_longest_prefix_match() {
        let mut trie = BinaryTrie::new();
        trie.insert(v4_block([0, 0, 0, 0], 0), "default");
        trie.insert(v4_block([10, 0, 0, 0], 8), "corp");
        trie.insert(v4_block([10, 1, 0, 0], 16), "lab");
        trie.insert(v4([10, 1, 2, 3]), "host");

        let cases = [
            ([10, 1, 2, 3], "host"),
            ([10, 1, 9, 9], "lab"),
            ([10, 200, 0, 1], "corp"),
            ([192, 168, 0, 1], "default"),
        ];
        for (addr, expected) in cases {
            let (_, value) = trie.longest_prefix_match_entry(&v4(addr)).unwrap();
            assert_eq!(*value, expected, "lpm for {addr:?}");
        }

        assert!(trie.element_contains(&v4([8, 8, 8, 8])));
        let stack = trie
            .elements_containing(&v4([10, 1, 2, 3]))
            .iter()
            .filter_map(|e| e.value.copied())
            .collect_vec();
        assert_eq!(stack, ["default", "corp", "lab", "host"]);
    }

    #[test]
    fn test_lpm_of_block_key() {
        let mut trie = BinaryTrie::<()>::new();
        trie.add(v4_block([10, 0, 0, 0], 8));
        trie.add(v4_block([10, 1, 0, 0], 16));

        // a block's LPM is the tightest added block containing it
        let lpm = trie.longest_prefix_match(&v4_block([10, 1, 2, 0], 24)).unwrap();
        assert_eq!(*lpm, v4_block([10, 1, 0, 0], 16));
        let lpm = trie.longest_prefix_match(&v4_block([10, 0, 0, 0], 12)).unwrap();
        assert_eq!(*lpm, v4_block([10, 0, 0, 0], 8));
        assert!(trie.longest_prefix_match(&v4_block([0, 0, 0, 0], 4)).is_none());
    }

    #[test]
    fn test_sorted_iteration() {
        // inserted out of order on purpose
        let mut trie = BinaryTrie::<()>::new();
        trie.add(v4([10, 0, 0, 5]));
        trie.add(v4_block([10, 0, 0, 2], 31));
        trie.add(v4([10, 0, 0, 1]));

        let keys = trie.iter().map(|(k, _)| k.to_string()).collect_vec();
        assert_eq!(keys, ["10.0.0.1", "10.0.0.2/31", "10.0.0.5"]);

        let keys = trie.iter_descending().map(|(k, _)| k.to_string()).collect_vec();
        assert_eq!(keys, ["10.0.0.5", "10.0.0.2/31", "10.0.0.1"]);
    }

    fn keys<'a>(it: impl Iterator<Item = (&'a Key, &'a ())>) -> Vec<String> {
        it.map(|(k, _)| k.to_string()).collect_vec()
    }

    #[test]
    fn test_traversal_orders() {
        let mut trie = BinaryTrie::<()>::new();
        for key in [
            v4_block([10, 0, 0, 0], 8),
            v4_block([10, 1, 0, 0], 16),
            v4([10, 1, 0, 1]),
            v4([10, 2, 0, 1]),
            v4([192, 168, 0, 1]),
        ] {
            trie.add(key);
        }

        // sorted order interleaves blocks between their halves
        assert_eq!(
            keys(trie.iter()),
            ["10.1.0.1", "10.1.0.0/16", "10.2.0.1", "10.0.0.0/8", "192.168.0.1"]
        );

        // pre-order: containers strictly before their contents
        assert_eq!(
            keys(trie.pre_order_iter()),
            ["10.0.0.0/8", "10.1.0.0/16", "10.1.0.1", "10.2.0.1", "192.168.0.1"]
        );
        assert_eq!(
            keys(trie.pre_order_iter_reversed()),
            ["192.168.0.1", "10.0.0.0/8", "10.2.0.1", "10.1.0.0/16", "10.1.0.1"]
        );

        // post-order: contents strictly before their containers
        assert_eq!(
            keys(trie.post_order_iter()),
            ["10.1.0.1", "10.1.0.0/16", "10.2.0.1", "10.0.0.0/8", "192.168.0.1"]
        );
        assert_eq!(
            keys(trie.post_order_iter_reversed()),
            ["192.168.0.1", "10.2.0.1", "10.1.0.1", "10.1.0.0/16", "10.0.0.0/8"]
        );

        // block-size order: shortest prefix first, ties by key order
        assert_eq!(
            keys(trie.block_size_iter()),
            ["10.0.0.0/8", "10.1.0.0/16", "10.1.0.1", "10.2.0.1", "192.168.0.1"]
        );
        assert_eq!(
            keys(trie.block_size_iter_descending()),
            ["192.168.0.1", "10.2.0.1", "10.1.0.1", "10.1.0.0/16", "10.0.0.0/8"]
        );
    }

    #[test]
    fn test_caching_pre_order_iter() {
        let mut trie = BinaryTrie::new();
        trie.insert(v4_block([10, 0, 0, 0], 8), "deny");
        trie.insert(v4_block([10, 1, 0, 0], 16), "allow");
        trie.insert(v4([10, 1, 2, 3]), "log");
        trie.insert(v4([10, 200, 0, 1]), "audit");

        // propagate the nearest decision downward in one pass
        let mut effective = Vec::new();
        let mut iter = trie.cached_pre_order_iter::<&str>();
        while let Some(entry) = iter.next() {
            let inherited = iter.get_cached().copied();
            let decision = entry.value.copied().or(inherited);
            if let Some(decision) = decision {
                iter.cache_with_lower(decision);
                iter.cache_with_upper(decision);
            }
            if entry.added {
                effective.push((entry.key.to_string(), decision.unwrap()));
            }
        }

        let lookup = |key: &str| {
            effective
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, d)| *d)
                .unwrap()
        };
        assert_eq!(lookup("10.0.0.0/8"), "deny");
        assert_eq!(lookup("10.1.0.0/16"), "allow");
        assert_eq!(lookup("10.1.2.3"), "log");
        // own decision wins over the inherited one
        assert_eq!(lookup("10.200.0.1"), "audit");

        // a pure inheritor: structural branches see their ancestor's cache
        trie.insert(v4([10, 1, 2, 4]), "trace");
        let mut iter = trie.cached_pre_order_iter::<&str>();
        let mut inherited_at_branch = None;
        while let Some(entry) = iter.next() {
            let inherited = iter.get_cached().copied();
            let decision = entry.value.copied().or(inherited);
            if let Some(decision) = decision {
                iter.cache_with_lower(decision);
                iter.cache_with_upper(decision);
            }
            if !entry.added && entry.key.prefix_len().is_some_and(|p| p > 16) {
                // the branch splitting 10.1.2.3 from 10.1.2.4
                inherited_at_branch = decision;
            }
        }
        assert_eq!(inherited_at_branch, Some("allow"));
    }

    #[test]
    fn test_associative_semantics() {
        let mut trie = BinaryTrie::new();
        assert_eq!(trie.insert(v4([1, 2, 3, 4]), 10), None);
        assert_eq!(trie.insert(v4([1, 2, 3, 4]), 20), Some(10));
        assert_eq!(trie.get(&v4([1, 2, 3, 4])), Some(&20));
        assert_eq!(trie.size(), 1);

        assert_eq!(trie.remove(&v4([1, 2, 3, 4])), Some(20));
        assert_eq!(trie.get(&v4([1, 2, 3, 4])), None);
    }

    #[test]
    #[should_panic(expected = "established width")]
    fn test_mixed_width_insert_panics() {
        let mut trie = BinaryTrie::<()>::new();
        trie.add(v4([1, 2, 3, 4]));
        trie.add(Key::mac([0, 1, 2, 3, 4, 5]));
    }

    #[test]
    fn test_mixed_width_queries_answer_negative() {
        let mut trie = BinaryTrie::<()>::new();
        trie.add(v4([1, 2, 3, 4]));

        let mac = Key::mac([0, 1, 2, 3, 4, 5]);
        assert!(!trie.contains(&mac));
        assert!(trie.longest_prefix_match(&mac).is_none());
        assert!(trie.remove(&mac).is_none());
        assert_eq!(trie.remove_elements_contained_by(&mac), 0);
        assert_eq!(trie.size(), 1);
    }

    #[test]
    fn test_clear_rebinds_width() {
        let mut trie = BinaryTrie::<()>::new();
        trie.add(v4([1, 2, 3, 4]));
        assert_eq!(trie.bit_count(), Some(32));

        trie.clear();
        assert!(trie.is_empty());
        assert_eq!(trie.bit_count(), None);
        trie.add(Key::mac([0, 1, 2, 3, 4, 5]));
        assert_eq!(trie.bit_count(), Some(48));
    }

    #[test]
    fn test_from_iterator() {
        let trie: BinaryTrie = [v4([1, 2, 3, 4]), v4([1, 2, 3, 5]), v4([1, 2, 3, 4])]
            .into_iter()
            .collect();
        assert_eq!(trie.size(), 2);

        let mut trie = trie;
        trie.extend([v4([9, 9, 9, 9])]);
        assert_eq!(trie.size(), 3);
    }

    #[test]
    fn test_ipv6_and_mac_tries() {
        let mut v6 = BinaryTrie::<()>::new();
        v6.add(Key::ipv6_block([0x2001, 0xdb8, 0, 0, 0, 0, 0, 0], 32).unwrap());
        v6.add(Key::ipv6([0x2001, 0xdb8, 0, 0, 0, 0, 0, 1]));
        let lpm = v6
            .longest_prefix_match(&Key::ipv6([0x2001, 0xdb8, 0, 0, 0, 0, 0, 2]))
            .unwrap();
        assert_eq!(lpm.to_string(), "2001:db8:0:0:0:0:0:0/32");

        let mut mac = BinaryTrie::<()>::new();
        mac.add(Key::mac([0xde, 0xad, 0xbe, 0xef, 0, 1]));
        assert!(mac.contains(&Key::mac([0xde, 0xad, 0xbe, 0xef, 0, 1])));
        assert_eq!(mac.size(), 1);
    }

    proptest! {
        #[test]
        fn test_size_matches_reference_walk(values in vec(proptest::num::u32::ANY, 0..256)) {
            let mut trie = BinaryTrie::<()>::new();
            let mut reference = std::collections::BTreeSet::new();
            for v in &values {
                let newly = trie.add(v4(v.to_be_bytes()));
                assert_eq!(newly, reference.insert(*v));
            }
            assert_eq!(trie.size(), reference.len());
            assert_eq!(trie.size(), walk_size(&trie));

            // sorted iteration over plain addresses is numeric order
            let got = trie.iter().map(|(k, _)| k.value() as u32).collect_vec();
            itertools::assert_equal(got, reference.iter().copied());

            // remove every other element and cross-check again
            for v in values.iter().step_by(2) {
                let removed = trie.remove(&v4(v.to_be_bytes())).is_some();
                assert_eq!(removed, reference.remove(v));
            }
            assert_eq!(trie.size(), reference.len());
            assert_eq!(trie.size(), walk_size(&trie));
        }

        #[test]
        fn test_lpm_matches_linear_scan(
            blocks in vec((proptest::num::u32::ANY, 0u8..=32), 1..64),
            lookups in vec(proptest::num::u32::ANY, 1..32),
        ) {
            let mut trie = BinaryTrie::<()>::new();
            let mut added = Vec::new();
            for (value, prefix) in blocks {
                let key = v4_block(value.to_be_bytes(), prefix);
                if trie.add(key) {
                    added.push(key);
                }
            }
            for lookup in lookups {
                let lookup = v4(lookup.to_be_bytes());
                let expect = added
                    .iter()
                    .filter(|k| k.contains(&lookup))
                    .max_by_key(|k| k.prefix_len().unwrap_or(32));
                assert_eq!(trie.longest_prefix_match(&lookup).copied(), expect.copied());

                let containing = trie.elements_containing(&lookup);
                let scan = added.iter().filter(|k| k.contains(&lookup)).count();
                assert_eq!(containing.len(), scan);
                assert_eq!(trie.element_contains(&lookup), scan > 0);
            }
        }

        #[test]
        fn test_bulk_removal_matches_filter(
            addrs in vec(proptest::num::u32::ANY, 0..128),
            block in (proptest::num::u32::ANY, 0u8..=32),
        ) {
            let mut trie: BinaryTrie = addrs.iter().map(|v| v4(v.to_be_bytes())).collect();
            let block = v4_block(block.0.to_be_bytes(), block.1);

            let unique: std::collections::BTreeSet<_> = addrs.iter().copied().collect();
            let expect_removed = unique
                .iter()
                .filter(|v| block.contains(&v4(v.to_be_bytes())))
                .count();

            assert_eq!(trie.remove_elements_contained_by(&block), expect_removed);
            assert_eq!(trie.size(), unique.len() - expect_removed);
            assert_eq!(trie.size(), walk_size(&trie));
            for v in &unique {
                let key = v4(v.to_be_bytes());
                assert_eq!(trie.contains(&key), !block.contains(&key));
            }
        }
    }
}
