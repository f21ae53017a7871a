//! Trie traversals.
//!
//! All iterators borrow the trie, so a structural mutation while one is live
//! is rejected by the borrow checker; there is no runtime generation check
//! to trip.

use super::node::{Node, NodeEntry};
use crate::Key;

/// In-order walk (lower subtree, node, upper subtree), which by the key
/// ordering yields nodes sorted by canonical key; `descending` mirrors it.
pub(crate) struct InOrderNodes<'a, V> {
    stack: Vec<&'a Node<V>>,
    descending: bool,
}

impl<'a, V> InOrderNodes<'a, V> {
    pub(crate) fn new(root: Option<&'a Node<V>>, descending: bool) -> Self {
        let mut iter = Self { stack: Vec::new(), descending };
        iter.descend(root);
        iter
    }

    fn descend(&mut self, mut node: Option<&'a Node<V>>) {
        while let Some(n) = node {
            self.stack.push(n);
            node = n.child(self.descending);
        }
    }
}

impl<'a, V> Iterator for InOrderNodes<'a, V> {
    type Item = &'a Node<V>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.descend(node.child(!self.descending));
        Some(node)
    }
}

/// Pre-order walk: node before its sub-nodes, which visits every containing
/// block before the blocks it contains. `reverse_children` flips the
/// sub-node order.
pub(crate) struct PreOrderNodes<'a, V> {
    stack: Vec<&'a Node<V>>,
    reverse_children: bool,
}

impl<'a, V> PreOrderNodes<'a, V> {
    pub(crate) fn new(root: Option<&'a Node<V>>, reverse_children: bool) -> Self {
        Self { stack: root.into_iter().collect(), reverse_children }
    }
}

impl<'a, V> Iterator for PreOrderNodes<'a, V> {
    type Item = &'a Node<V>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // push the child to visit first last
        let (first, second) = if self.reverse_children {
            (node.upper.as_deref(), node.lower.as_deref())
        } else {
            (node.lower.as_deref(), node.upper.as_deref())
        };
        self.stack.extend(second);
        self.stack.extend(first);
        Some(node)
    }
}

enum Visit<'a, V> {
    Expand(&'a Node<V>),
    Emit(&'a Node<V>),
}

/// Post-order walk: sub-nodes before the node, visiting contained blocks
/// before their containers.
pub(crate) struct PostOrderNodes<'a, V> {
    stack: Vec<Visit<'a, V>>,
    reverse_children: bool,
}

impl<'a, V> PostOrderNodes<'a, V> {
    pub(crate) fn new(root: Option<&'a Node<V>>, reverse_children: bool) -> Self {
        Self {
            stack: root.map(Visit::Expand).into_iter().collect(),
            reverse_children,
        }
    }
}

impl<'a, V> Iterator for PostOrderNodes<'a, V> {
    type Item = &'a Node<V>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stack.pop()? {
                Visit::Emit(node) => return Some(node),
                Visit::Expand(node) => {
                    self.stack.push(Visit::Emit(node));
                    let (first, second) = if self.reverse_children {
                        (node.upper.as_deref(), node.lower.as_deref())
                    } else {
                        (node.lower.as_deref(), node.upper.as_deref())
                    };
                    self.stack.extend(second.map(Visit::Expand));
                    self.stack.extend(first.map(Visit::Expand));
                }
            }
        }
    }
}

/// Block-size order over the added elements: shorter prefixes (larger
/// blocks) first, ties broken by canonical key order. Built from a
/// size-keyed sort of the added nodes rather than a tree walk.
pub(crate) struct BlockSizeNodes<'a, V> {
    nodes: std::vec::IntoIter<&'a Node<V>>,
}

impl<'a, V> BlockSizeNodes<'a, V> {
    pub(crate) fn new(root: Option<&'a Node<V>>, descending: bool) -> Self {
        let mut nodes: Vec<_> = PreOrderNodes::new(root, false).filter(|n| n.added).collect();
        nodes.sort_by(|a, b| {
            let ord = a
                .key
                .effective_prefix()
                .cmp(&b.key.effective_prefix())
                .then_with(|| a.key.cmp(&b.key));
            if descending { ord.reverse() } else { ord }
        });
        Self { nodes: nodes.into_iter() }
    }
}

impl<'a, V> Iterator for BlockSizeNodes<'a, V> {
    type Item = &'a Node<V>;

    fn next(&mut self) -> Option<Self::Item> {
        self.nodes.next()
    }
}

/// A pre-order walk over *all* nodes that lets the caller hand an opaque
/// value down to the just-visited node's sub-nodes and read it back in O(1)
/// when the sub-node is visited: single-pass context propagation, e.g.
/// accumulating ACL decisions along a subtree.
///
/// ```
/// use bittrie::{BinaryTrie, Key};
///
/// let mut trie = BinaryTrie::new();
/// trie.insert(Key::ipv4_block([10, 0, 0, 0], 8).unwrap(), "deny");
/// trie.insert(Key::ipv4_block([10, 1, 0, 0], 16).unwrap(), "allow");
/// trie.insert(Key::ipv4([10, 1, 2, 3]), "log");
///
/// // propagate the nearest decision down to every node
/// let mut iter = trie.cached_pre_order_iter::<&str>();
/// let mut seen = Vec::new();
/// while let Some(entry) = iter.next() {
///     let decision = entry.value.copied().or_else(|| iter.get_cached().copied());
///     if let Some(d) = decision {
///         iter.cache_with_lower(d);
///         iter.cache_with_upper(d);
///         seen.push((entry.key.to_string(), d));
///     }
/// }
/// assert!(seen.contains(&("10.1.0.0/16".to_string(), "allow")));
/// ```
pub struct CachingIter<'a, V, C> {
    stack: Vec<(&'a Node<V>, Option<C>)>,
    current: Option<&'a Node<V>>,
    current_cache: Option<C>,
    lower_cache: Option<C>,
    upper_cache: Option<C>,
}

impl<'a, V, C> CachingIter<'a, V, C> {
    pub(crate) fn new(root: Option<&'a Node<V>>) -> Self {
        Self {
            stack: root.map(|n| (n, None)).into_iter().collect(),
            current: None,
            current_cache: None,
            lower_cache: None,
            upper_cache: None,
        }
    }

    /// Attaches `cache` to the current node's lower sub-node, returning
    /// whether that sub-node exists.
    pub fn cache_with_lower(&mut self, cache: C) -> bool {
        match self.current {
            Some(node) if node.lower.is_some() => {
                self.lower_cache = Some(cache);
                true
            }
            _ => false,
        }
    }

    /// Attaches `cache` to the current node's upper sub-node.
    pub fn cache_with_upper(&mut self, cache: C) -> bool {
        match self.current {
            Some(node) if node.upper.is_some() => {
                self.upper_cache = Some(cache);
                true
            }
            _ => false,
        }
    }

    /// The cache attached to the current node when its parent was visited.
    pub fn get_cached(&self) -> Option<&C> {
        self.current_cache.as_ref()
    }

    /// The key of the current node.
    pub fn current_key(&self) -> Option<&'a Key> {
        self.current.map(|n| &n.key)
    }
}

impl<'a, V, C> Iterator for CachingIter<'a, V, C> {
    type Item = NodeEntry<'a, V>;

    fn next(&mut self) -> Option<Self::Item> {
        // defer pushing children until now so the caller had a chance to
        // attach caches to them
        if let Some(node) = self.current.take() {
            let upper_cache = self.upper_cache.take();
            let lower_cache = self.lower_cache.take();
            if let Some(upper) = node.upper.as_deref() {
                self.stack.push((upper, upper_cache));
            }
            if let Some(lower) = node.lower.as_deref() {
                self.stack.push((lower, lower_cache));
            }
        }
        let (node, cache) = self.stack.pop()?;
        self.current = Some(node);
        self.current_cache = cache;
        Some(NodeEntry::of(node))
    }
}
