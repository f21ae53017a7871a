use crate::Key;

/// One trie node: a key, an optional association, and exclusively-owned
/// sub-node links.
///
/// Invariants: `value.is_some()` exactly when `added`; `size` counts the
/// added nodes in the subtree including this one; each child's key is
/// strictly contained in `key` and the two children diverge on the bit at
/// `key`'s prefix length.
#[derive(Debug, Clone)]
pub(crate) struct Node<V> {
    pub(crate) key: Key,
    pub(crate) value: Option<V>,
    pub(crate) added: bool,
    pub(crate) size: usize,
    pub(crate) lower: Option<Box<Node<V>>>,
    pub(crate) upper: Option<Box<Node<V>>>,
}

impl<V> Node<V> {
    /// A freshly inserted element.
    pub(crate) fn leaf(key: Key, value: V) -> Self {
        Self {
            key,
            value: Some(value),
            added: true,
            size: 1,
            lower: None,
            upper: None,
        }
    }

    /// A branch-only ancestor created where two added keys diverge.
    pub(crate) fn structural(key: Key) -> Self {
        Self {
            key,
            value: None,
            added: false,
            size: 0,
            lower: None,
            upper: None,
        }
    }

    #[inline]
    pub(crate) fn child(&self, upper: bool) -> Option<&Node<V>> {
        if upper { self.upper.as_deref() } else { self.lower.as_deref() }
    }

    #[inline]
    pub(crate) fn child_slot_mut(&mut self, upper: bool) -> &mut Option<Box<Node<V>>> {
        if upper { &mut self.upper } else { &mut self.lower }
    }

    /// Recomputes the cached subtree size from the children.
    #[inline]
    pub(crate) fn update_size(&mut self) {
        self.size = self.added as usize
            + self.lower.as_ref().map_or(0, |n| n.size)
            + self.upper.as_ref().map_or(0, |n| n.size);
    }
}

/// A read-only view of one trie node, distinguishing added elements from
/// structural branch nodes.
#[derive(Debug, Clone, Copy)]
pub struct NodeEntry<'a, V> {
    pub key: &'a Key,
    pub value: Option<&'a V>,
    pub added: bool,
}

impl<'a, V> NodeEntry<'a, V> {
    pub(crate) fn of(node: &'a Node<V>) -> Self {
        Self {
            key: &node.key,
            value: node.value.as_ref(),
            added: node.added,
        }
    }
}
