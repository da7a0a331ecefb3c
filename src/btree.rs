//! Root-to-leaf traversal, mutation, and range scan over a tree of
//! [`Node`]s: the driver that enforces fence keys and the foster
//! invariants (§4.4).
//!
//! Internal nodes are `Node<K, u64>`: every entry's key is some
//! child's own low fence and the value is that child's [`PageId`].
//! This is why `adopt_foster` only ever needs to insert *one* new
//! entry on a split — the left half keeps the page id the parent
//! already points to, only the newly allocated right half needs a
//! separator. The very first entry of an internal node (key
//! `K::min_value()`) is installed once, when that node is created
//! either by root promotion or (recursively) never split further,
//! since this driver never calls `Node::split` on an internal node —
//! see `adopt_along`'s doc comment.

use std::cell::UnsafeCell;
use std::marker::PhantomData;

use tracing::instrument;

use crate::alloc::{InMemoryAllocator, PageAllocator};
use crate::codec::{KeyCodec, ValueCodec};
use crate::error::{Error, Result};
use crate::node::{Node, NodeError, SplitError};
use crate::page::{PageId, NULL_PAGE, PAGE_SIZE};

/// An ordered key-value index over pages handed out by `A`.
///
/// `BTree` is `Send` — an owner may hand a whole tree to another
/// thread — but deliberately not `Sync`: the core assumes
/// latch-coupling happens outside it (spec §5), so concurrent access
/// from multiple threads at once is simply not offered. The
/// `UnsafeCell` marker field carries no state; it exists purely to
/// suppress the auto-derived `Sync` impl `PageId`/`A`'s own fields
/// would otherwise earn it.
pub struct BTree<K: KeyCodec, V: ValueCodec, A: PageAllocator = InMemoryAllocator> {
    root: PageId,
    alloc: A,
    underfull_threshold: usize,
    _k: PhantomData<K>,
    _v: PhantomData<V>,
    _not_sync: PhantomData<UnsafeCell<()>>,
}

impl<K: KeyCodec, V: ValueCodec> BTree<K, V, InMemoryAllocator> {
    /// A tree backed by the reference in-memory allocator, with the
    /// default underfull threshold (spec §4: 25% of page size).
    pub fn new() -> Self {
        Self::with_allocator(InMemoryAllocator::new()).expect("InMemoryAllocator never refuses the first page")
    }
}

impl<K: KeyCodec, V: ValueCodec> Default for BTree<K, V, InMemoryAllocator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: KeyCodec, V: ValueCodec, A: PageAllocator> BTree<K, V, A> {
    pub fn with_allocator(alloc: A) -> Result<Self> {
        Self::with_allocator_and_threshold(alloc, PAGE_SIZE / 4)
    }

    /// As [`Self::with_allocator`], but with a caller-chosen underfull
    /// threshold instead of the default 25% of page size (spec §4.4
    /// "configurable threshold").
    pub fn with_allocator_and_threshold(mut alloc: A, underfull_threshold: usize) -> Result<Self> {
        let root = alloc.allocate().map_err(|_| Error::AllocFailure)?;
        Node::<K, V>::initialize(alloc.deref_mut(root), None, None, 0);
        Ok(BTree {
            root,
            alloc,
            underfull_threshold,
            _k: PhantomData,
            _v: PhantomData,
            _not_sync: PhantomData,
        })
    }

    /// Descends from the root to the leaf owning `key`, transparently
    /// following foster pointers at every level (spec §4.4
    /// "Traversal"). Returns the leaf's id plus the `(parent_id,
    /// child_anchor)` edges actually walked to get there, root-down —
    /// `adopt_along` later replays these for opportunistic adoption.
    ///
    /// `child_anchor` is deliberately the *pre-hop* pointer value read
    /// straight out of `parent_id`'s own separator table, not whatever
    /// node `resolve_foster_chain` eventually lands the key on:
    /// `parent_id`'s table still only names `child_anchor`, so that is
    /// the id whose own (possibly still-unresolved) foster chain
    /// `adopt_foster` must be called on. Using the post-hop node
    /// instead — the bug this replaced — makes every `adopt_foster`
    /// call a silent no-op whenever the key actually lands in a foster
    /// sibling rather than back in the node that just split, which is
    /// the common case under a monotonic insert pattern: the chain
    /// never gets adopted and degenerates into an O(n)-deep list off a
    /// single separator entry.
    fn descend(&mut self, key: &K) -> (PageId, Vec<(PageId, PageId)>) {
        let mut edges = Vec::new();
        let mut anchor = self.root;
        loop {
            let current = self.resolve_foster_chain(anchor, key);
            if self.alloc.deref(current).is_leaf() {
                return (current, edges);
            }
            let child_anchor = {
                let node = Node::<K, u64>::new(self.alloc.deref_mut(current));
                Self::find_child(&node, key)
            };
            edges.push((current, child_anchor));
            anchor = child_anchor;
        }
    }

    /// Follows `current`'s own foster pointer while `key` falls in the
    /// foster child's range, landing on the node that actually owns
    /// `key` at this level.
    fn resolve_foster_chain(&mut self, mut current: PageId, key: &K) -> PageId {
        loop {
            let page = self.alloc.deref_mut(current);
            let mut meta = Node::<K, ()>::new(page);
            if !meta.has_foster() {
                return current;
            }
            let foster_key = meta.foster_key().expect("has_foster implies foster_key is set");
            if *key < foster_key {
                return current;
            }
            current = meta.foster_ptr().expect("has_foster implies foster_ptr is set");
        }
    }

    /// The child whose separator range contains `key`: the entry at
    /// `key`'s exact position if present, else its predecessor (every
    /// internal node's first entry is keyed by `K::min_value()`, so a
    /// predecessor always exists for any in-range key).
    fn find_child(node: &Node<K, u64>, key: &K) -> PageId {
        let (found, idx) = node.find(key);
        let idx = if found { idx } else { idx.saturating_sub(1) };
        node.read(idx).1
    }

    /// Adopts the foster chain starting at `child_id` into `parent_id`,
    /// hopping to each newly promoted node's own foster child in turn.
    /// A single `Node::adopt_foster` call only ever resolves the
    /// immediate hop; when adoption has been deferred across several
    /// splits — sequential inserts that each land in the new right
    /// sibling before adoption gets a chance to run, for instance — the
    /// chain below `child_id` can be several nodes deep, so this keeps
    /// adopting until the newly promoted node carries no foster pointer
    /// of its own, or `parent_id` has no room left for another
    /// separator (best-effort, same as a single call: see this
    /// function's callers).
    fn adopt_chain(&mut self, parent_id: PageId, child_id: PageId) {
        let mut current = child_id;
        loop {
            let next = {
                let mut meta = Node::<K, ()>::new(self.alloc.deref_mut(current));
                meta.foster_ptr()
            };
            let Some(next_id) = next else { break };
            if !Node::<K, u64>::adopt_foster(parent_id, current, &mut self.alloc) {
                break;
            }
            current = next_id;
        }
    }

    /// Walks `edges` bottom-up, adopting the foster chain rooted at
    /// each `child_anchor` into its `parent_id`, then promotes a new
    /// root if the root itself just became a foster parent (the one
    /// case `edges` is empty and adoption has no parent to fold the
    /// foster entry into).
    ///
    /// Adoption is best-effort throughout: if some `parent_id` is
    /// itself too full to accept a new separator, the foster relation
    /// below it is simply left in place (spec §4.4 "best effort";
    /// `Node::adopt_foster`'s own return value already reflects this).
    /// This driver never calls `Node::split` on an internal node in
    /// response — spec.md §4.4 only describes leaf-level `NoSpace`
    /// handling, and an unresolved foster chain below a full parent
    /// stays reachable and correct, just longer than ideal until
    /// entries are later removed from that parent.
    fn adopt_along(&mut self, edges: &[(PageId, PageId)]) {
        if edges.is_empty() {
            self.maybe_promote_root();
            return;
        }
        for &(parent_id, child_anchor) in edges {
            self.adopt_chain(parent_id, child_anchor);
        }
    }

    /// If the root (still a leaf the first time this ever fires) has
    /// just split and become a foster parent, wraps it in a brand new
    /// internal root addressing both halves directly. This is the only
    /// way the tree ever grows taller: every later split happens on a
    /// node already reachable through some internal node's pointer
    /// table, so `adopt_along`'s ordinary path covers it.
    fn maybe_promote_root(&mut self) {
        let (has_foster, level) = {
            let page = self.alloc.deref(self.root);
            (page.has_foster(), page.level())
        };
        if !has_foster {
            return;
        }
        let (foster_key, foster_ptr) = {
            let mut meta = Node::<K, ()>::new(self.alloc.deref_mut(self.root));
            (meta.foster_key().expect("has_foster implies foster_key"), meta.foster_ptr().expect("has_foster implies foster_ptr"))
        };
        let new_root_id = match self.alloc.allocate() {
            Ok(id) => id,
            // Best-effort, same as adopt_foster: the old root keeps serving
            // reads/writes correctly through its own foster pointer meanwhile.
            Err(_) => return,
        };
        Node::<K, u64>::initialize(self.alloc.deref_mut(new_root_id), None, None, level + 1);
        {
            let mut new_root = Node::<K, u64>::new(self.alloc.deref_mut(new_root_id));
            new_root.insert(&K::min_value(), &self.root).expect("freshly initialized root has room for two entries");
            new_root.insert(&foster_key, &foster_ptr).expect("freshly initialized root has room for two entries");
        }
        let old_root = self.alloc.deref_mut(self.root);
        old_root.set_has_foster(false);
        old_root.set_foster_ptr(NULL_PAGE);
        old_root.set_foster_key_off(0);
        self.root = new_root_id;
    }

    /// Inserts `(key, value)`. `NoSpace` is never surfaced: the driver
    /// compacts, then splits and retries, exactly per spec §4.4/§7.
    #[instrument(skip(self, value))]
    pub fn put(&mut self, key: K, value: V) -> Result<()> {
        loop {
            let (leaf_id, edges) = self.descend(&key);
            let outcome = {
                let mut node = Node::<K, V>::new(self.alloc.deref_mut(leaf_id));
                match node.insert(&key, &value) {
                    Ok(()) => Ok(true),
                    Err(NodeError::Duplicate) => Err(Error::Duplicate),
                    Err(NodeError::NoSpace) => {
                        node.compact();
                        match node.insert(&key, &value) {
                            Ok(()) => Ok(true),
                            Err(NodeError::Duplicate) => unreachable!("duplicate check already passed before compaction"),
                            Err(NodeError::NoSpace) => Ok(false),
                        }
                    }
                }
            };
            match outcome {
                Err(e) => return Err(e),
                Ok(true) => {
                    self.adopt_along(&edges);
                    return Ok(());
                }
                Ok(false) => match Node::<K, V>::split(leaf_id, &mut self.alloc) {
                    Ok(_) => {
                        // Retry from the root: the just-split leaf now has a
                        // foster child, so re-descending lands on whichever
                        // half owns `key`'s range (spec §4.4 "retry the insert
                        // on whichever of the two resulting nodes owns the
                        // key's range").
                    }
                    Err(SplitError::AllocFailure) => return Err(Error::AllocFailure),
                    // A single entry too large to leave room for a second
                    // one even after compaction cannot be split into two
                    // non-empty halves; retrying would loop forever.
                    Err(SplitError::TooFewEntries) => return Err(Error::EntryTooLarge),
                },
            }
        }
    }

    /// Looks up `key`, returning its value if present.
    #[instrument(skip(self))]
    pub fn get(&mut self, key: &K) -> Option<V> {
        let (leaf_id, _path) = self.descend(key);
        let node = Node::<K, V>::new(self.alloc.deref_mut(leaf_id));
        node.get(key)
    }

    /// Removes `key`. Underfull leaves (below the configured
    /// threshold) attempt a merge, falling back to a rebalance, with
    /// whichever adjacent sibling the parent's separator table
    /// exposes; an internal root left with a single child collapses
    /// (spec §4.4 "Deletion").
    #[instrument(skip(self))]
    pub fn remove(&mut self, key: &K) -> Result<()> {
        let (leaf_id, edges) = self.descend(key);
        let removed = {
            let mut node = Node::<K, V>::new(self.alloc.deref_mut(leaf_id));
            node.remove(key)
        };
        if !removed {
            return Err(Error::NotFound);
        }
        self.rebalance_if_underfull(leaf_id, &edges);
        Ok(())
    }

    fn rebalance_if_underfull(&mut self, leaf_id: PageId, edges: &[(PageId, PageId)]) {
        let (used, slot_count) = {
            let node = Node::<K, V>::new(self.alloc.deref_mut(leaf_id));
            (node.used_space(), node.slot_count())
        };
        if slot_count != 0 && used >= self.underfull_threshold {
            return;
        }
        let Some(&(parent_id, _)) = edges.last() else {
            return; // root leaf: nothing to merge or rebalance with
        };
        let leaf_low = {
            let mut node = Node::<K, V>::new(self.alloc.deref_mut(leaf_id));
            node.low_fence()
        };
        let (idx, left_sib, right_sib) = {
            let parent = Node::<K, u64>::new(self.alloc.deref_mut(parent_id));
            let (found, idx) = parent.find(&leaf_low);
            debug_assert!(found, "leaf's low fence must be a separator key in its parent");
            let left = (idx > 0).then(|| parent.read(idx - 1).1);
            let right = (idx + 1 < parent.slot_count()).then(|| parent.read(idx + 1).1);
            (idx, left, right)
        };

        if let Some(right_id) = right_sib {
            match Node::<K, V>::merge(leaf_id, right_id, &mut self.alloc) {
                Ok(()) => {
                    self.remove_parent_entry(parent_id, idx + 1);
                    return;
                }
                Err(NodeError::NoSpace) => {
                    self.rebalance_and_refresh_separator(parent_id, leaf_id, right_id);
                    return;
                }
                Err(NodeError::Duplicate) => unreachable!("merge never inserts a duplicate key"),
            }
        }
        if let Some(left_id) = left_sib {
            match Node::<K, V>::merge(left_id, leaf_id, &mut self.alloc) {
                Ok(()) => {
                    self.remove_parent_entry(parent_id, idx);
                }
                Err(NodeError::NoSpace) => {
                    self.rebalance_and_refresh_separator(parent_id, left_id, leaf_id);
                }
                Err(NodeError::Duplicate) => unreachable!("merge never inserts a duplicate key"),
            }
        }
        // No sibling at all: this leaf is the parent's only child.
        // Left underfull but intact; nothing adjacent to relieve it
        // with (spec invariant 5 allows underfull, just never empty
        // except transiently).
    }

    /// `Node::rebalance` moves the boundary between `left_id`/`right_id`
    /// but only updates the two nodes' own fence fields — the parent's
    /// separator *key* for `right_id` (which must equal `right`'s low
    /// fence) goes stale. Re-keys that one parent entry to match.
    fn rebalance_and_refresh_separator(&mut self, parent_id: PageId, left_id: PageId, right_id: PageId) {
        let old_key = {
            let mut meta = Node::<K, ()>::new(self.alloc.deref_mut(right_id));
            meta.low_fence()
        };
        Node::<K, V>::rebalance(left_id, right_id, &mut self.alloc);
        let new_key = {
            let mut meta = Node::<K, ()>::new(self.alloc.deref_mut(right_id));
            meta.low_fence()
        };
        if old_key != new_key {
            let mut parent = Node::<K, u64>::new(self.alloc.deref_mut(parent_id));
            parent.remove(&old_key);
            parent.insert(&new_key, &right_id).expect("re-keying a separator does not change the parent's total size");
        }
    }

    /// Removes the entry at `idx` from `parent_id` (used after a merge
    /// releases the child that entry pointed to), then collapses the
    /// root if it is now internal with a single remaining child.
    fn remove_parent_entry(&mut self, parent_id: PageId, idx: usize) {
        let key = {
            let parent = Node::<K, u64>::new(self.alloc.deref_mut(parent_id));
            parent.key_at(idx)
        };
        let mut parent = Node::<K, u64>::new(self.alloc.deref_mut(parent_id));
        parent.remove(&key);
        if parent_id == self.root && parent.slot_count() == 1 {
            let only_child = parent.read(0).1;
            self.alloc.release(self.root);
            self.root = only_child;
        }
    }

    /// A lazy, finite, restartable ascending sequence of `(key, value)`
    /// pairs with `low` inclusive and `high` exclusive (spec §4.4
    /// "Range scan"). Each call to `Iterator::next` borrows exactly one
    /// page for the duration of that call; nothing is held across
    /// calls beyond the cursor's position.
    #[instrument(skip(self, low, high))]
    pub fn scan(&mut self, low: Option<&K>, high: Option<&K>) -> Scan<'_, K, V, A> {
        let (leaf_id, stack) = self.first_leaf(low);
        Scan {
            tree: self,
            current_leaf: leaf_id,
            idx_in_leaf: 0,
            stack,
            high: high.cloned(),
            done: false,
        }
    }

    /// Descends to the leftmost leaf that could contain `low` (or the
    /// tree's leftmost leaf if `low` is `None`), recording at each
    /// internal node the index of the *next* child to visit once this
    /// subtree is exhausted — the stack `Scan` climbs back up through.
    fn first_leaf(&mut self, low: Option<&K>) -> (PageId, Vec<(PageId, usize)>) {
        let mut stack = Vec::new();
        let mut current = self.root;
        loop {
            if let Some(k) = low {
                current = self.resolve_foster_chain(current, k);
            }
            if self.alloc.deref(current).is_leaf() {
                return (current, stack);
            }
            let node = Node::<K, u64>::new(self.alloc.deref_mut(current));
            let idx = match low {
                Some(k) => {
                    let (found, idx) = node.find(k);
                    if found { idx } else { idx.saturating_sub(1) }
                }
                None => 0,
            };
            let child = node.read(idx).1;
            stack.push((current, idx + 1));
            current = child;
        }
    }

    /// Descends leftmost from `start`, pushing a stack frame at every
    /// internal level, landing on the leftmost leaf of that subtree.
    /// Never needs to follow a foster pointer: a foster child's range
    /// `(foster_key, high_fence]` only ever holds keys greater than
    /// everything in its left sibling's own portion, so the leftmost
    /// leaf is always reachable through ordinary child pointers alone.
    fn leftmost_leaf(&mut self, mut current: PageId, stack: &mut Vec<(PageId, usize)>) -> PageId {
        loop {
            if self.alloc.deref(current).is_leaf() {
                return current;
            }
            let node = Node::<K, u64>::new(self.alloc.deref_mut(current));
            let child = node.read(0).1;
            stack.push((current, 1));
            current = child;
        }
    }

    #[cfg(debug_assertions)]
    pub fn validate_leaf(&mut self, id: PageId) {
        Node::<K, V>::new(self.alloc.deref_mut(id)).validate();
    }
}

/// Cursor produced by [`BTree::scan`]. See its doc comment for the
/// resumption contract.
pub struct Scan<'t, K: KeyCodec, V: ValueCodec, A: PageAllocator> {
    tree: &'t mut BTree<K, V, A>,
    current_leaf: PageId,
    idx_in_leaf: usize,
    stack: Vec<(PageId, usize)>,
    high: Option<K>,
    done: bool,
}

impl<'t, K: KeyCodec, V: ValueCodec, A: PageAllocator> Iterator for Scan<'t, K, V, A> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        if self.done {
            return None;
        }
        loop {
            let count = self.tree.alloc.deref(self.current_leaf).slot_count() as usize;
            if self.idx_in_leaf < count {
                let node = Node::<K, V>::new(self.tree.alloc.deref_mut(self.current_leaf));
                let (k, v) = node.read(self.idx_in_leaf);
                if let Some(hi) = &self.high {
                    if k >= *hi {
                        self.done = true;
                        return None;
                    }
                }
                self.idx_in_leaf += 1;
                return Some((k, v));
            }

            let mut meta = Node::<K, ()>::new(self.tree.alloc.deref_mut(self.current_leaf));
            if meta.has_foster() {
                let foster_key = meta.foster_key().expect("has_foster implies foster_key");
                if let Some(hi) = &self.high {
                    if foster_key >= *hi {
                        self.done = true;
                        return None;
                    }
                }
                self.current_leaf = meta.foster_ptr().expect("has_foster implies foster_ptr");
                self.idx_in_leaf = 0;
                continue;
            }

            // This leaf is exhausted and has no foster child: climb the
            // stack to find the next subtree, per spec §4.4 "return to
            // the parent to find the next leaf".
            match self.next_leaf_from_stack() {
                Some(next) => {
                    self.current_leaf = next;
                    self.idx_in_leaf = 0;
                }
                None => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

impl<'t, K: KeyCodec, V: ValueCodec, A: PageAllocator> Scan<'t, K, V, A> {
    fn next_leaf_from_stack(&mut self) -> Option<PageId> {
        loop {
            let (node_id, next_idx) = *self.stack.last()?;
            let count = {
                let node = Node::<K, u64>::new(self.tree.alloc.deref_mut(node_id));
                node.slot_count()
            };
            if next_idx >= count {
                self.stack.pop();
                continue;
            }
            let child = {
                let node = Node::<K, u64>::new(self.tree.alloc.deref_mut(node_id));
                node.read(next_idx).1
            };
            self.stack.last_mut().unwrap().1 += 1;
            return Some(self.tree.leftmost_leaf(child, &mut self.stack));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{BytesKey, U64Key};

    type U64Tree = BTree<U64Key<u32>, Vec<u8>>;
    type StrTree = BTree<BytesKey<u16>, Vec<u8>>;

    #[test]
    fn s1_basic_insert_and_lookup() {
        let mut t = U64Tree::new();
        t.put(U64Key::new(5), b"e".to_vec()).unwrap();
        t.put(U64Key::new(1), b"a".to_vec()).unwrap();
        t.put(U64Key::new(3), b"c".to_vec()).unwrap();
        assert_eq!(t.get(&U64Key::new(1)), Some(b"a".to_vec()));
        assert_eq!(t.get(&U64Key::new(3)), Some(b"c".to_vec()));
        assert_eq!(t.get(&U64Key::new(5)), Some(b"e".to_vec()));
        assert_eq!(t.get(&U64Key::new(2)), None);
    }

    #[test]
    fn s2_duplicate_rejection() {
        let mut t = U64Tree::new();
        assert_eq!(t.put(U64Key::new(7), b"x".to_vec()), Ok(()));
        assert_eq!(t.put(U64Key::new(7), b"y".to_vec()), Err(Error::Duplicate));
        assert_eq!(t.get(&U64Key::new(7)), Some(b"x".to_vec()));
    }

    #[test]
    fn split_under_pressure_keeps_every_key_reachable() {
        let mut t = U64Tree::new();
        for k in 1..=16u64 {
            t.put(U64Key::new(k), vec![0u8; 8]).unwrap();
        }
        for k in 1..=16u64 {
            assert_eq!(t.get(&U64Key::new(k)), Some(vec![0u8; 8]), "key {k} missing after splits");
        }
    }

    #[test]
    fn s4_pmnk_collision_is_resolved_by_full_key() {
        let mut t: BTree<U64Key<u16>, Vec<u8>> = BTree::new();
        let keys = [0x0001_0000_0000_0001u64, 0x0001_0000_0000_0002, 0x0001_0000_0000_0003];
        for k in keys {
            t.put(U64Key::new(k), k.to_le_bytes().to_vec()).unwrap();
        }
        let mut prev = None;
        for k in keys {
            let v = t.get(&U64Key::new(k)).unwrap();
            assert_eq!(v, k.to_le_bytes().to_vec());
            if let Some(p) = prev {
                assert!(p < k);
            }
            prev = Some(k);
        }
    }

    #[test]
    fn s5_variable_length_keys_range_scan() {
        let mut t = StrTree::new();
        t.put(BytesKey::from_str("apple"), b"1".to_vec()).unwrap();
        t.put(BytesKey::from_str("banana"), b"2".to_vec()).unwrap();
        t.put(BytesKey::from_str("apricot"), b"3".to_vec()).unwrap();
        let lo = BytesKey::from_str("apple");
        let hi = BytesKey::from_str("banana");
        let got: Vec<_> = t.scan(Some(&lo), Some(&hi)).map(|(k, v)| (String::from_utf8(k.0).unwrap(), v)).collect();
        assert_eq!(got, vec![("apple".to_string(), b"1".to_vec()), ("apricot".to_string(), b"3".to_vec())]);
    }

    #[test]
    fn s6_delete_then_reinsert() {
        let mut t = U64Tree::new();
        t.put(U64Key::new(10), b"x".to_vec()).unwrap();
        t.remove(&U64Key::new(10)).unwrap();
        t.put(U64Key::new(10), b"y".to_vec()).unwrap();
        assert_eq!(t.get(&U64Key::new(10)), Some(b"y".to_vec()));
    }

    #[test]
    fn remove_missing_key_is_not_found() {
        let mut t = U64Tree::new();
        assert_eq!(t.remove(&U64Key::new(1)), Err(Error::NotFound));
        assert_eq!(t.remove(&U64Key::new(1)), Err(Error::NotFound));
    }

    #[test]
    fn scan_without_bounds_yields_everything_ascending() {
        let mut t = U64Tree::new();
        for k in [5u64, 1, 9, 3, 7, 2, 8, 4, 6] {
            t.put(U64Key::new(k), vec![k as u8]).unwrap();
        }
        let got: Vec<u64> = t.scan(None, None).map(|(k, _)| k.0).collect();
        assert_eq!(got, (1..=9).collect::<Vec<_>>());
    }

    #[test]
    fn many_inserts_then_deletes_shrink_the_tree_without_losing_survivors() {
        let mut t = U64Tree::new();
        for k in 0..200u64 {
            t.put(U64Key::new(k), vec![0u8; 16]).unwrap();
        }
        for k in (0..200u64).step_by(2) {
            t.remove(&U64Key::new(k)).unwrap();
        }
        for k in 0..200u64 {
            let expected = if k % 2 == 0 { None } else { Some(vec![0u8; 16]) };
            assert_eq!(t.get(&U64Key::new(k)), expected, "key {k}");
        }
    }
}
