use super::handle::Handle;
use super::size::Size;

/// Color of the link from a node's parent.
///
/// An absent child is an implicit black link. The root's incoming link is
/// forced black at the end of every mutating operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Color {
    Red,
    Black,
}

impl Color {
    #[inline]
    pub(crate) const fn flipped(self) -> Self {
        match self {
            Color::Red => Color::Black,
            Color::Black => Color::Red,
        }
    }
}

/// A single map entry.
///
/// The key is stored inline; the value lives behind a handle into a
/// separate arena so value-only mutation never touches the tree structure.
/// `size` caches the entry count of the subtree rooted here, including the
/// node itself, and is what drives every order-statistic query.
#[derive(Clone)]
pub(crate) struct Node<K> {
    key: K,
    value: Handle,
    color: Color,
    left: Option<Handle>,
    right: Option<Handle>,
    size: Size,
}

impl<K> Node<K> {
    /// Creates a fresh leaf: red, size one, no children.
    ///
    /// Insertion only ever attaches new nodes as red leaves; every other
    /// color or shape is produced by the balancing fixups.
    pub(crate) const fn new(key: K, value: Handle) -> Self {
        Self {
            key,
            value,
            color: Color::Red,
            left: None,
            right: None,
            size: Size::ONE,
        }
    }

    #[inline]
    pub(crate) const fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    pub(crate) const fn value(&self) -> Handle {
        self.value
    }

    #[inline]
    pub(crate) const fn color(&self) -> Color {
        self.color
    }

    pub(crate) fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    #[inline]
    pub(crate) const fn left(&self) -> Option<Handle> {
        self.left
    }

    pub(crate) fn set_left(&mut self, left: Option<Handle>) {
        self.left = left;
    }

    #[inline]
    pub(crate) const fn right(&self) -> Option<Handle> {
        self.right
    }

    pub(crate) fn set_right(&mut self, right: Option<Handle>) {
        self.right = right;
    }

    #[inline]
    pub(crate) const fn size(&self) -> Size {
        self.size
    }

    pub(crate) fn set_size(&mut self, size: Size) {
        self.size = size;
    }

    /// Swaps in a replacement key and value handle, returning the old pair.
    /// Used by delete's successor transplant; the caller is responsible for
    /// releasing the returned value handle.
    pub(crate) fn replace_entry(&mut self, key: K, value: Handle) -> (K, Handle) {
        (core::mem::replace(&mut self.key, key), core::mem::replace(&mut self.value, value))
    }

    /// Consumes an unlinked node, yielding its key and value handle.
    pub(crate) fn into_parts(self) -> (K, Handle) {
        (self.key, self.value)
    }
}
