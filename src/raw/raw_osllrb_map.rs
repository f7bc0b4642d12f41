use core::borrow::Borrow;
use core::cmp::Ordering;

use alloc::vec::Vec;

use smallvec::SmallVec;

use super::arena::Arena;
use super::handle::Handle;
use super::node::{Color, Node};
use super::size::Size;

/// Explicit stack for the iterative traversals; sized so that trees of a
/// few thousand entries never spill to the heap.
type TraversalStack = SmallVec<[Handle; 16]>;

/// The core left-leaning red-black tree backing `OSLlrbMap`.
///
/// Nodes and values live in two separate arenas: rank queries hand out
/// `&K` from the node arena and `&mut V` from the value arena without the
/// borrows ever aliasing. All structural changes go through `rotate_left`,
/// `rotate_right` and `flip_colors`; insert and delete restore the
/// red-black invariants bottom-up with `balance` on the way out of their
/// recursion, so the invariants hold whenever a public operation returns.
#[derive(Clone)]
pub(crate) struct RawOSLlrbMap<K, V> {
    /// Arena storing all tree nodes.
    nodes: Arena<Node<K>>,
    /// Arena storing all values (separate from nodes so value mutation
    /// never touches tree structure).
    values: Arena<V>,
    /// Handle to the root node, if the tree is non-empty.
    root: Option<Handle>,
    /// Total number of key-value pairs in the tree.
    len: usize,
}

impl<K, V> RawOSLlrbMap<K, V> {
    /// Creates a new, empty tree.
    pub(crate) const fn new() -> Self {
        Self {
            nodes: Arena::new(),
            values: Arena::new(),
            root: None,
            len: 0,
        }
    }

    /// Creates a new tree with room for `capacity` entries.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Arena::with_capacity(capacity),
            values: Arena::with_capacity(capacity),
            root: None,
            len: 0,
        }
    }

    /// Returns the number of key-value pairs in the tree.
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the tree contains no elements.
    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the capacity of the tree.
    pub(crate) fn capacity(&self) -> usize {
        self.values.capacity()
    }

    /// Clears all elements from the tree.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.values.clear();
        self.root = None;
        self.len = 0;
    }

    /// Returns the height of the tree: the number of links on the longest
    /// root-to-leaf path, or -1 for an empty tree.
    ///
    /// The red-black invariants bound this by `2 * log2(len + 1)`.
    #[allow(clippy::cast_possible_wrap)]
    pub(crate) fn height(&self) -> isize {
        let Some(root) = self.root else {
            return -1;
        };

        let mut max_depth = 0usize;
        let mut stack: SmallVec<[(Handle, usize); 16]> = SmallVec::new();
        stack.push((root, 0));

        while let Some((handle, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            let node = self.nodes.get(handle);
            if let Some(left) = node.left() {
                stack.push((left, depth + 1));
            }
            if let Some(right) = node.right() {
                stack.push((right, depth + 1));
            }
        }

        max_depth as isize
    }

    /// Returns the entry with the minimum key, if any.
    pub(crate) fn first_key_value(&self) -> Option<(&K, &V)> {
        let mut handle = self.root?;
        while let Some(left) = self.nodes.get(handle).left() {
            handle = left;
        }
        let node = self.nodes.get(handle);
        Some((node.key(), self.values.get(node.value())))
    }

    /// Returns the entry with the maximum key, if any.
    pub(crate) fn last_key_value(&self) -> Option<(&K, &V)> {
        let mut handle = self.root?;
        while let Some(right) = self.nodes.get(handle).right() {
            handle = right;
        }
        let node = self.nodes.get(handle);
        Some((node.key(), self.values.get(node.value())))
    }

    /// Collects every entry in ascending key order.
    pub(crate) fn in_order(&self) -> Vec<(&K, &V)> {
        let mut entries = Vec::with_capacity(self.len);
        let mut stack = TraversalStack::new();
        let mut current = self.root;

        while current.is_some() || !stack.is_empty() {
            while let Some(handle) = current {
                stack.push(handle);
                current = self.nodes.get(handle).left();
            }
            let Some(handle) = stack.pop() else {
                break;
            };
            let node = self.nodes.get(handle);
            entries.push((node.key(), self.values.get(node.value())));
            current = node.right();
        }

        entries
    }

    /// Gets an entry by its rank (0-indexed position in sorted order).
    ///
    /// Driven purely by the cached subtree sizes; no key comparisons.
    pub(crate) fn get_by_rank(&self, rank: usize) -> Option<(&K, &V)> {
        if rank >= self.len {
            return None;
        }

        let mut current = self.root?;
        let mut remaining = rank;

        loop {
            let node = self.nodes.get(current);
            let left_size = self.subtree_size(node.left());
            match remaining.cmp(&left_size) {
                Ordering::Equal => return Some((node.key(), self.values.get(node.value()))),
                Ordering::Less => {
                    current = node.left().expect("`get_by_rank()` - size cache promises a left subtree!");
                }
                Ordering::Greater => {
                    remaining -= left_size + 1;
                    current = node.right().expect("`get_by_rank()` - size cache promises a right subtree!");
                }
            }
        }
    }

    /// Gets an entry by rank with a mutable value reference.
    ///
    /// The key stays shared: mutating it would break the ordering
    /// invariant. The split is safe because keys live in the node arena
    /// and values in their own arena.
    pub(crate) fn get_by_rank_mut(&mut self, rank: usize) -> Option<(&K, &mut V)> {
        if rank >= self.len {
            return None;
        }

        let mut current = self.root?;
        let mut remaining = rank;

        loop {
            let node = self.nodes.get(current);
            let left_size = node.left().map_or(0, |left| self.nodes.get(left).size().to_usize());
            match remaining.cmp(&left_size) {
                Ordering::Equal => {
                    return Some((node.key(), self.values.get_mut(node.value())));
                }
                Ordering::Less => {
                    current = node.left().expect("`get_by_rank_mut()` - size cache promises a left subtree!");
                }
                Ordering::Greater => {
                    remaining -= left_size + 1;
                    current = node.right().expect("`get_by_rank_mut()` - size cache promises a right subtree!");
                }
            }
        }
    }

    /// Removes and returns the entry with the minimum key.
    pub(crate) fn pop_first(&mut self) -> Option<(K, V)> {
        let root = self.root?;
        self.redden_root_for_removal(root);

        let (new_root, key, value) = self.take_min(root);
        self.root = new_root;
        self.blacken_root();
        self.len -= 1;

        Some((key, self.values.take(value)))
    }

    /// Removes and returns the entry with the maximum key.
    pub(crate) fn pop_last(&mut self) -> Option<(K, V)> {
        let root = self.root?;
        self.redden_root_for_removal(root);

        let (new_root, key, value) = self.take_max(root);
        self.root = new_root;
        self.blacken_root();
        self.len -= 1;

        Some((key, self.values.take(value)))
    }

    // ─── Link inspection ────────────────────────────────────────────────

    /// Is the link to this child red? An absent child is a black link.
    fn is_red(&self, link: Option<Handle>) -> bool {
        link.is_some_and(|handle| self.nodes.get(handle).color() == Color::Red)
    }

    /// Entry count of the subtree behind `link`; 0 for an absent child.
    fn subtree_size(&self, link: Option<Handle>) -> usize {
        link.map_or(0, |handle| self.nodes.get(handle).size().to_usize())
    }

    fn left_left(&self, handle: Handle) -> Option<Handle> {
        self.nodes.get(handle).left().and_then(|left| self.nodes.get(left).left())
    }

    fn right_left(&self, handle: Handle) -> Option<Handle> {
        self.nodes.get(handle).right().and_then(|right| self.nodes.get(right).left())
    }

    // ─── Balancing primitives ───────────────────────────────────────────
    //
    // These three are the only operations that change tree shape or link
    // colors; everything else is written in terms of them.

    /// Recomputes the cached size of `handle` from its children.
    fn update_size(&mut self, handle: Handle) {
        let node = self.nodes.get(handle);
        let size = 1 + self.subtree_size(node.left()) + self.subtree_size(node.right());
        self.nodes.get_mut(handle).set_size(Size::from_usize(size));
    }

    /// Rotates a right-leaning red link to the left. The right child takes
    /// this node's place and color; this node becomes its red left child.
    fn rotate_left(&mut self, handle: Handle) -> Handle {
        debug_assert!(self.is_red(self.nodes.get(handle).right()));

        let pivot = self.nodes.get(handle).right().expect("`rotate_left()` - node has no right child!");
        let pivot_left = self.nodes.get(pivot).left();
        let color = self.nodes.get(handle).color();

        let node = self.nodes.get_mut(handle);
        node.set_right(pivot_left);
        node.set_color(Color::Red);
        self.update_size(handle);

        let node = self.nodes.get_mut(pivot);
        node.set_left(Some(handle));
        node.set_color(color);
        self.update_size(pivot);

        pivot
    }

    /// Mirror of [`rotate_left`](Self::rotate_left) for a red left link.
    fn rotate_right(&mut self, handle: Handle) -> Handle {
        debug_assert!(self.is_red(self.nodes.get(handle).left()));

        let pivot = self.nodes.get(handle).left().expect("`rotate_right()` - node has no left child!");
        let pivot_right = self.nodes.get(pivot).right();
        let color = self.nodes.get(handle).color();

        let node = self.nodes.get_mut(handle);
        node.set_left(pivot_right);
        node.set_color(Color::Red);
        self.update_size(handle);

        let node = self.nodes.get_mut(pivot);
        node.set_right(Some(handle));
        node.set_color(color);
        self.update_size(pivot);

        pivot
    }

    /// Inverts the color of a node and of both its children, moving
    /// redness one level up or down.
    fn flip_colors(&mut self, handle: Handle) {
        let node = self.nodes.get(handle);
        let left = node.left().expect("`flip_colors()` - node has no left child!");
        let right = node.right().expect("`flip_colors()` - node has no right child!");

        for handle in [handle, left, right] {
            let node = self.nodes.get_mut(handle);
            node.set_color(node.color().flipped());
        }
    }

    /// The universal bottom-up fixup, applied to every frame on the way
    /// out of the insert and delete recursions. Order matters: rotating a
    /// right-leaning red link left can expose a left-left double red, and
    /// fixing that can leave two red children to flip.
    fn balance(&mut self, mut handle: Handle) -> Handle {
        if self.is_red(self.nodes.get(handle).right()) {
            handle = self.rotate_left(handle);
        }
        if self.is_red(self.nodes.get(handle).left()) && self.is_red(self.left_left(handle)) {
            handle = self.rotate_right(handle);
        }
        if self.is_red(self.nodes.get(handle).left()) && self.is_red(self.nodes.get(handle).right()) {
            self.flip_colors(handle);
        }
        self.update_size(handle);
        handle
    }

    /// Guarantees a usable red link on the left before the delete
    /// recursion descends there. Precondition: this node is red, its left
    /// child and left-left grandchild are black.
    fn move_red_left(&mut self, mut handle: Handle) -> Handle {
        self.flip_colors(handle);
        if self.is_red(self.right_left(handle)) {
            let right = self
                .nodes
                .get(handle)
                .right()
                .expect("`move_red_left()` - a red right-left grandchild implies a right child!");
            let right = self.rotate_right(right);
            self.nodes.get_mut(handle).set_right(Some(right));
            handle = self.rotate_left(handle);
        }
        handle
    }

    /// Mirror of [`move_red_left`](Self::move_red_left): guarantees a
    /// usable red link on the right.
    fn move_red_right(&mut self, mut handle: Handle) -> Handle {
        self.flip_colors(handle);
        if self.is_red(self.left_left(handle)) {
            handle = self.rotate_right(handle);
        }
        handle
    }

    // ─── Delete plumbing shared by remove / pop_first / pop_last ────────

    /// Sedgewick's precondition trick: deletion needs a red link at the
    /// top of the descent. If both root children are black, temporarily
    /// redden the root.
    fn redden_root_for_removal(&mut self, root: Handle) {
        let node = self.nodes.get(root);
        if !self.is_red(node.left()) && !self.is_red(node.right()) {
            self.nodes.get_mut(root).set_color(Color::Red);
        }
    }

    /// Restores the root's conceptually-black incoming link after a
    /// mutation, clearing any transient red left by the fixups.
    fn blacken_root(&mut self) {
        if let Some(root) = self.root {
            self.nodes.get_mut(root).set_color(Color::Black);
        }
    }

    /// Unlinks the minimum node of the subtree rooted at `handle` and
    /// returns the new subtree root plus the unlinked key and value
    /// handle. The caller decides whether the pair is a result (pop) or a
    /// transplant into a deleted interior node.
    fn take_min(&mut self, mut handle: Handle) -> (Option<Handle>, K, Handle) {
        if self.nodes.get(handle).left().is_none() {
            let node = self.nodes.take(handle);
            // A minimum with a right child would hang a lone right child
            // off an empty black left link, breaking black balance.
            debug_assert!(node.right().is_none());
            let (key, value) = node.into_parts();
            return (None, key, value);
        }

        if !self.is_red(self.nodes.get(handle).left()) && !self.is_red(self.left_left(handle)) {
            handle = self.move_red_left(handle);
        }

        let left = self.nodes.get(handle).left().expect("`take_min()` - interior node lost its left child!");
        let (new_left, key, value) = self.take_min(left);
        self.nodes.get_mut(handle).set_left(new_left);
        (Some(self.balance(handle)), key, value)
    }

    /// Mirror of [`take_min`](Self::take_min) for the maximum node.
    fn take_max(&mut self, mut handle: Handle) -> (Option<Handle>, K, Handle) {
        if self.is_red(self.nodes.get(handle).left()) {
            handle = self.rotate_right(handle);
        }

        if self.nodes.get(handle).right().is_none() {
            let node = self.nodes.take(handle);
            debug_assert!(node.left().is_none());
            let (key, value) = node.into_parts();
            return (None, key, value);
        }

        if !self.is_red(self.nodes.get(handle).right()) && !self.is_red(self.right_left(handle)) {
            handle = self.move_red_right(handle);
        }

        let right = self.nodes.get(handle).right().expect("`take_max()` - interior node lost its right child!");
        let (new_right, key, value) = self.take_max(right);
        self.nodes.get_mut(handle).set_right(new_right);
        (Some(self.balance(handle)), key, value)
    }
}

impl<K: Ord, V> RawOSLlrbMap<K, V> {
    /// Searches for a key and returns its node handle if present.
    fn search<Q>(&self, key: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = self.root;

        while let Some(handle) = current {
            let node = self.nodes.get(handle);
            current = match key.cmp(node.key().borrow()) {
                Ordering::Less => node.left(),
                Ordering::Greater => node.right(),
                Ordering::Equal => return Some(handle),
            };
        }

        None
    }

    /// Returns a reference to the value corresponding to the key.
    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let handle = self.search(key)?;
        Some(self.values.get(self.nodes.get(handle).value()))
    }

    /// Returns a mutable reference to the value corresponding to the key.
    pub(crate) fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let handle = self.search(key)?;
        Some(self.values.get_mut(self.nodes.get(handle).value()))
    }

    /// Returns the key-value pair corresponding to the key.
    pub(crate) fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let handle = self.search(key)?;
        let node = self.nodes.get(handle);
        Some((node.key(), self.values.get(node.value())))
    }

    /// Returns true if the tree contains the specified key.
    pub(crate) fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.search(key).is_some()
    }

    /// Inserts a key-value pair into the tree.
    /// Returns the old value if the key was already present.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Option<V> {
        let (new_root, old_value) = match self.root {
            Some(root) => self.insert_at(root, key, value),
            None => {
                let value = self.values.alloc(value);
                (self.nodes.alloc(Node::new(key, value)), None)
            }
        };

        self.root = Some(new_root);
        self.blacken_root();
        if old_value.is_none() {
            self.len += 1;
        }
        old_value
    }

    /// Recursive step of insert: descend to the key's position, attach a
    /// fresh red leaf or overwrite in place, then `balance` every frame on
    /// the way back up.
    fn insert_at(&mut self, handle: Handle, key: K, value: V) -> (Handle, Option<V>) {
        let old_value = match key.cmp(self.nodes.get(handle).key()) {
            Ordering::Less => match self.nodes.get(handle).left() {
                Some(left) => {
                    let (new_left, old_value) = self.insert_at(left, key, value);
                    self.nodes.get_mut(handle).set_left(Some(new_left));
                    old_value
                }
                None => {
                    let value = self.values.alloc(value);
                    let leaf = self.nodes.alloc(Node::new(key, value));
                    self.nodes.get_mut(handle).set_left(Some(leaf));
                    None
                }
            },
            Ordering::Greater => match self.nodes.get(handle).right() {
                Some(right) => {
                    let (new_right, old_value) = self.insert_at(right, key, value);
                    self.nodes.get_mut(handle).set_right(Some(new_right));
                    old_value
                }
                None => {
                    let value = self.values.alloc(value);
                    let leaf = self.nodes.alloc(Node::new(key, value));
                    self.nodes.get_mut(handle).set_right(Some(leaf));
                    None
                }
            },
            Ordering::Equal => {
                // Key exists: replace the value in place, keep the node.
                let value_handle = self.nodes.get(handle).value();
                Some(core::mem::replace(self.values.get_mut(value_handle), value))
            }
        };

        (self.balance(handle), old_value)
    }

    /// Removes a key from the tree and returns the value.
    pub(crate) fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes a key from the tree and returns the key-value pair.
    pub(crate) fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        // Membership pre-pass: one extra O(log n) read lets every branch
        // of the descent below assume the key is present.
        if !self.contains_key(key) {
            return None;
        }

        let root = self.root.expect("`remove_entry()` - containment implies a non-empty tree!");
        self.redden_root_for_removal(root);

        let (new_root, removed) = self.remove_at(root, key);
        self.root = new_root;
        self.blacken_root();
        self.len -= 1;

        Some(removed)
    }

    /// Recursive step of delete. Pushes a red link toward the side being
    /// descended into (`move_red_left` / `move_red_right`), removes the
    /// target at the bottom or transplants its in-order successor, then
    /// `balance`s every frame on the way back up.
    ///
    /// The key must be present in the subtree rooted at `handle`.
    fn remove_at<Q>(&mut self, mut handle: Handle, key: &Q) -> (Option<Handle>, (K, V))
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        if key < self.nodes.get(handle).key().borrow() {
            if !self.is_red(self.nodes.get(handle).left()) && !self.is_red(self.left_left(handle)) {
                handle = self.move_red_left(handle);
            }
            let left = self.nodes.get(handle).left().expect("`remove_at()` - key is present in the left subtree!");
            let (new_left, removed) = self.remove_at(left, key);
            self.nodes.get_mut(handle).set_left(new_left);
            return (Some(self.balance(handle)), removed);
        }

        // Lean a red left link to the right so the logic below sees the
        // same shape whether the target is here or further down.
        if self.is_red(self.nodes.get(handle).left()) {
            handle = self.rotate_right(handle);
        }
        if self.nodes.get(handle).right().is_some()
            && !self.is_red(self.nodes.get(handle).right())
            && !self.is_red(self.right_left(handle))
        {
            handle = self.move_red_right(handle);
        }

        match key.cmp(self.nodes.get(handle).key().borrow()) {
            Ordering::Equal => match self.nodes.get(handle).right() {
                None => {
                    // Bottom of the adjusted tree: unlink the node. A left
                    // child here would break black balance.
                    let node = self.nodes.take(handle);
                    debug_assert!(node.left().is_none());
                    let (key, value) = node.into_parts();
                    (None, (key, self.values.take(value)))
                }
                Some(right) => {
                    // Interior node: transplant the in-order successor's
                    // key and value into this node and physically unlink
                    // the successor from the right subtree.
                    let (new_right, successor_key, successor_value) = self.take_min(right);
                    let node = self.nodes.get_mut(handle);
                    let (old_key, old_value) = node.replace_entry(successor_key, successor_value);
                    node.set_right(new_right);
                    (Some(self.balance(handle)), (old_key, self.values.take(old_value)))
                }
            },
            Ordering::Greater => {
                let right = self.nodes.get(handle).right().expect("`remove_at()` - key is present in the right subtree!");
                let (new_right, removed) = self.remove_at(right, key);
                self.nodes.get_mut(handle).set_right(new_right);
                (Some(self.balance(handle)), removed)
            }
            Ordering::Less => {
                unreachable!("`remove_at()` - rotations cannot order the searched key below this node")
            }
        }
    }

    /// Returns the number of keys strictly less than `key`.
    ///
    /// Total over all keys: for an absent key this is the rank it would
    /// occupy if inserted.
    pub(crate) fn rank_of<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut rank = 0;
        let mut current = self.root;

        while let Some(handle) = current {
            let node = self.nodes.get(handle);
            match key.cmp(node.key().borrow()) {
                Ordering::Less => current = node.left(),
                Ordering::Greater => {
                    rank += self.subtree_size(node.left()) + 1;
                    current = node.right();
                }
                Ordering::Equal => return rank + self.subtree_size(node.left()),
            }
        }

        rank
    }

    /// Collects the keys with ranks in `lo..=hi`, ascending.
    ///
    /// Bounds are validated first (`lo > hi` or `hi >= len` yields an
    /// empty vector), then resolved to actual keys so a single pruned
    /// in-order traversal can visit only the subtrees that overlap the
    /// range.
    pub(crate) fn range_by_rank(&self, lo: usize, hi: usize) -> Vec<&K> {
        if lo > hi || hi >= self.len {
            return Vec::new();
        }

        let (lower, _) = self.get_by_rank(lo).expect("`range_by_rank()` - `lo` is in bounds!");
        let (upper, _) = self.get_by_rank(hi).expect("`range_by_rank()` - `hi` is in bounds!");

        let mut keys = Vec::with_capacity(hi - lo + 1);
        self.collect_between(self.root, lower, upper, &mut keys);
        keys
    }

    /// Pruned in-order traversal: descends left only when keys below the
    /// lower bound cannot fill the subtree, right only when keys above the
    /// upper bound cannot.
    fn collect_between<'a>(&'a self, link: Option<Handle>, lower: &K, upper: &K, keys: &mut Vec<&'a K>) {
        let Some(handle) = link else {
            return;
        };
        let node = self.nodes.get(handle);
        let key = node.key();

        if lower < key {
            self.collect_between(node.left(), lower, upper, keys);
        }
        if lower <= key && key <= upper {
            keys.push(key);
        }
        if upper > key {
            self.collect_between(node.right(), lower, upper, keys);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::String;
    use alloc::vec::Vec;
    use proptest::prelude::*;

    impl<K: Ord, V> RawOSLlrbMap<K, V> {
        /// Validates every tree invariant, panicking with a description of
        /// all violations. Test-only corruption detector.
        pub(crate) fn validate_invariants(&self) {
            let Some(root) = self.root else {
                assert_eq!(self.len, 0, "empty tree should have len 0");
                assert!(self.nodes.is_empty(), "empty tree should hold no nodes");
                assert!(self.values.is_empty(), "empty tree should hold no values");
                return;
            };

            let mut errors: Vec<String> = Vec::new();

            if self.is_red(Some(root)) {
                errors.push("root hangs from a red link".into());
            }

            let (count, _) = self.validate_node(root, None, None, &mut errors);

            if count != self.len {
                errors.push(format!("len mismatch: self.len={}, actual count={count}", self.len));
            }
            if self.nodes.len() != self.len {
                errors.push(format!("leaked node slots: arena holds {}, len={}", self.nodes.len(), self.len));
            }
            if self.values.len() != self.len {
                errors.push(format!("leaked value slots: arena holds {}, len={}", self.values.len(), self.len));
            }

            assert!(errors.is_empty(), "tree invariant violations:\n{}", errors.join("\n"));
        }

        /// Returns (entry count, black height) of the subtree at `handle`,
        /// recording violations of the ordering, leaning, double-red,
        /// black-balance and size-cache invariants.
        fn validate_node(
            &self,
            handle: Handle,
            lower: Option<&K>,
            upper: Option<&K>,
            errors: &mut Vec<String>,
        ) -> (usize, usize) {
            let node = self.nodes.get(handle);
            let key = node.key();

            if let Some(lower) = lower
                && key <= lower
            {
                errors.push(format!("BST order violated at {handle:?} (key <= left bound)"));
            }
            if let Some(upper) = upper
                && key >= upper
            {
                errors.push(format!("BST order violated at {handle:?} (key >= right bound)"));
            }

            if self.is_red(node.right()) {
                errors.push(format!("red link leans right at {handle:?}"));
            }
            if node.color() == Color::Red && self.is_red(node.left()) {
                errors.push(format!("double red on the left spine at {handle:?}"));
            }

            let (left_count, left_black) =
                node.left().map_or((0, 0), |left| self.validate_node(left, lower, Some(key), errors));
            let (right_count, right_black) =
                node.right().map_or((0, 0), |right| self.validate_node(right, Some(key), upper, errors));

            if left_black != right_black {
                errors.push(format!(
                    "black balance broken at {handle:?}: left {left_black}, right {right_black}"
                ));
            }

            let count = 1 + left_count + right_count;
            if node.size().to_usize() != count {
                errors.push(format!(
                    "size cache stale at {handle:?}: stored {}, actual {count}",
                    node.size().to_usize()
                ));
            }

            let black = left_black + usize::from(node.color() == Color::Black);
            (count, black)
        }

        /// The red-black height guarantee; a bug that silently degrades the
        /// tree to plain-BST behavior blows this long before tests that
        /// only check ordering would notice.
        fn assert_height_bound(&self) {
            let height = self.height();
            let bound = 2.0 * ((self.len + 1) as f64).log2();
            assert!(
                height as f64 <= bound,
                "height {height} exceeds 2*log2(len+1) = {bound} at len {}",
                self.len
            );
        }
    }

    #[test]
    fn empty_tree() {
        let tree: RawOSLlrbMap<i32, i32> = RawOSLlrbMap::new();
        tree.validate_invariants();

        assert_eq!(tree.len(), 0);
        assert!(tree.is_empty());
        assert_eq!(tree.height(), -1);
        assert_eq!(tree.get(&5), None);
        assert_eq!(tree.get_by_rank(0), None);
        assert_eq!(tree.rank_of(&5), 0);
        assert_eq!(tree.first_key_value(), None);
        assert_eq!(tree.last_key_value(), None);
    }

    #[test]
    fn remove_from_empty_tree_is_a_noop() {
        let mut tree: RawOSLlrbMap<i32, i32> = RawOSLlrbMap::new();
        assert_eq!(tree.remove(&5), None);
        tree.validate_invariants();
    }

    #[test]
    fn insert_overwrites_in_place() {
        let mut tree: RawOSLlrbMap<i32, &str> = RawOSLlrbMap::new();
        assert_eq!(tree.insert(10, "x"), None);
        assert_eq!(tree.insert(10, "y"), Some("x"));
        tree.validate_invariants();

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(&10), Some(&"y"));
    }

    #[test]
    fn ascending_inserts_stay_shallow() {
        let mut tree: RawOSLlrbMap<i32, i32> = RawOSLlrbMap::new();
        for key in 1..=3 {
            tree.insert(key, key * 10);
            tree.validate_invariants();
        }

        assert!(tree.height() <= 2);
        assert_eq!(tree.rank_of(&2), 1);
        assert_eq!(tree.get_by_rank(1).map(|(key, _)| *key), Some(2));
    }

    #[test]
    fn interior_delete_transplants_successor() {
        let mut tree: RawOSLlrbMap<i32, i32> = RawOSLlrbMap::new();
        for key in 1..=7 {
            tree.insert(key, key);
        }

        assert_eq!(tree.remove_entry(&4), Some((4, 4)));
        tree.validate_invariants();

        assert!(!tree.contains_key(&4));
        let keys: Vec<i32> = tree.in_order().iter().map(|&(key, _)| *key).collect();
        assert_eq!(keys, [1, 2, 3, 5, 6, 7]);
    }

    #[test]
    fn pop_first_and_last_drain_in_order() {
        let mut tree: RawOSLlrbMap<i32, i32> = RawOSLlrbMap::new();
        for key in [5, 1, 9, 3, 7] {
            tree.insert(key, key);
        }

        assert_eq!(tree.pop_first(), Some((1, 1)));
        tree.validate_invariants();
        assert_eq!(tree.pop_last(), Some((9, 9)));
        tree.validate_invariants();
        assert_eq!(tree.first_key_value(), Some((&3, &3)));
        assert_eq!(tree.last_key_value(), Some((&7, &7)));
    }

    #[test]
    fn range_by_rank_prunes_to_the_requested_span() {
        let mut tree: RawOSLlrbMap<i32, i32> = RawOSLlrbMap::new();
        for key in 1..=7 {
            tree.insert(key, key);
        }

        assert_eq!(tree.range_by_rank(0, 6), [&1, &2, &3, &4, &5, &6, &7]);
        assert_eq!(tree.range_by_rank(2, 4), [&3, &4, &5]);
        assert_eq!(tree.range_by_rank(3, 3), [&4]);
        // Inverted and out-of-bounds spans are empty, not errors.
        assert!(tree.range_by_rank(3, 1).is_empty());
        assert!(tree.range_by_rank(0, 7).is_empty());
    }

    // Test operations enum for property testing
    #[derive(Clone, Debug)]
    enum Op {
        Insert(i32),
        Remove(i32),
        PopFirst,
        PopLast,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0i32..1000).prop_map(Op::Insert),
            2 => (0i32..1000).prop_map(Op::Remove),
            1 => Just(Op::PopFirst),
            1 => Just(Op::PopLast),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn invariants_hold_after_every_operation(ops in prop::collection::vec(op_strategy(), 0..500)) {
            let mut tree: RawOSLlrbMap<i32, i32> = RawOSLlrbMap::new();

            for op in ops {
                match op {
                    Op::Insert(key) => {
                        tree.insert(key, key * 2);
                    }
                    Op::Remove(key) => {
                        tree.remove(&key);
                    }
                    Op::PopFirst => {
                        tree.pop_first();
                    }
                    Op::PopLast => {
                        tree.pop_last();
                    }
                }
                tree.validate_invariants();
                tree.assert_height_bound();
            }
        }

        #[test]
        fn rank_and_select_are_inverse(keys in prop::collection::btree_set(0i32..500, 1..200)) {
            let mut tree: RawOSLlrbMap<i32, i32> = RawOSLlrbMap::new();
            for &key in &keys {
                tree.insert(key, key * 2);
            }
            tree.validate_invariants();

            for (rank, &key) in keys.iter().enumerate() {
                let (selected, value) = tree.get_by_rank(rank).expect("rank is in bounds");
                prop_assert_eq!(*selected, key);
                prop_assert_eq!(*value, key * 2);
                prop_assert_eq!(tree.rank_of(&key), rank);
            }
            prop_assert!(tree.get_by_rank(keys.len()).is_none());
        }

        #[test]
        fn rank_of_an_absent_key_counts_smaller_keys(
            keys in prop::collection::btree_set(0i32..500, 1..100),
            probe in 0i32..500,
        ) {
            let mut tree: RawOSLlrbMap<i32, i32> = RawOSLlrbMap::new();
            for &key in &keys {
                tree.insert(key, key);
            }

            let expected = keys.iter().filter(|&&key| key < probe).count();
            prop_assert_eq!(tree.rank_of(&probe), expected);
        }

        #[test]
        fn deleting_every_key_in_any_order_empties_the_tree(
            keys in prop::collection::btree_set(0i32..1000, 1..200).prop_flat_map(|keys| {
                let keys: Vec<i32> = keys.into_iter().collect();
                let len = keys.len();
                (Just(keys), prop::collection::vec(any::<usize>(), len))
            })
        ) {
            let (keys, order) = keys;
            let mut tree: RawOSLlrbMap<i32, i32> = RawOSLlrbMap::new();
            for &key in &keys {
                tree.insert(key, key);
            }
            prop_assert_eq!(tree.len(), keys.len());

            let mut remaining = keys;
            for pick in order {
                let key = remaining.swap_remove(pick % remaining.len());
                prop_assert_eq!(tree.remove(&key), Some(key));
                tree.validate_invariants();
                tree.assert_height_bound();
            }

            prop_assert!(tree.is_empty());
            prop_assert_eq!(tree.height(), -1);
        }

        #[test]
        fn range_by_rank_matches_the_sorted_keys(
            keys in prop::collection::btree_set(0i32..500, 1..100),
            lo in any::<usize>(),
            hi in any::<usize>(),
        ) {
            let mut tree: RawOSLlrbMap<i32, i32> = RawOSLlrbMap::new();
            for &key in &keys {
                tree.insert(key, key);
            }

            let sorted: Vec<i32> = keys.into_iter().collect();
            let (lo, hi) = (lo % (sorted.len() * 2), hi % (sorted.len() * 2));

            let result: Vec<i32> = tree.range_by_rank(lo, hi).into_iter().copied().collect();
            if lo > hi || hi >= sorted.len() {
                prop_assert!(result.is_empty());
            } else {
                prop_assert_eq!(result, sorted[lo..=hi].to_vec());
            }
        }
    }
}
