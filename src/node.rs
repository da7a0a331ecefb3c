//! Gives a [`KeyValueArray`] an identity in a tree: fence keys, level,
//! and foster linkage. A `Node` never touches another
//! page's bytes directly except through the [`PageAllocator`] it is
//! handed for `split`/`merge`/`adopt_foster`.
//!
//! `V` is the value type stored at this node's level: the tree's own
//! value type at leaves, `u64` (a `PageId`) at every internal level.
//! `adopt_foster` is therefore only implemented for `Node<K, u64>` —
//! inserting a child pointer only makes sense one level up from a leaf.

use tracing::instrument;

use crate::alloc::PageAllocator;
use crate::codec::{KeyCodec, ValueCodec};
use crate::kv_array::{KeyValueArray, KvError};
use crate::page::{Page, PageId, NULL_PAGE};
use crate::slot_array::SlotArray;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum NodeError {
    Duplicate,
    NoSpace,
}

impl From<KvError> for NodeError {
    fn from(e: KvError) -> Self {
        match e {
            KvError::Duplicate => NodeError::Duplicate,
            KvError::NoSpace => NodeError::NoSpace,
        }
    }
}

/// Failure modes specific to [`Node::split`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SplitError {
    /// The node holds fewer than two entries, so it cannot be divided
    /// into two non-empty halves — reaching this means a single
    /// entry's encoded size alone leaves no room for anything else in
    /// the page even after compaction. `BTree::put` surfaces this as
    /// `Error::EntryTooLarge` rather than retrying the split.
    TooFewEntries,
    /// The external allocator refused to hand out the new sibling page.
    AllocFailure,
}

fn encode_key<K: KeyCodec>(key: &K) -> Vec<u8> {
    let mut buf = vec![0u8; key.encoded_len()];
    key.encode(&mut buf);
    buf
}

pub struct Node<'p, K: KeyCodec, V: ValueCodec> {
    kv: KeyValueArray<'p, K, V>,
}

impl<'p, K: KeyCodec, V: ValueCodec> Node<'p, K, V> {
    pub fn new(page: &'p mut Page) -> Self {
        Node { kv: KeyValueArray::new(page) }
    }

    /// Writes the two fence keys into the page header and resets the
    /// slot array to empty. Does not touch foster state beyond
    /// clearing it — a freshly initialized node is always `Plain`.
    /// `low_fence: None` means "use `K::min_value()`", the exact,
    /// non-excluding global lower bound (see `K::min_value`);
    /// `high_fence: None` means genuinely unbounded — the tree's
    /// rightmost node (see `page::FLAG_NO_HIGH_FENCE`).
    #[instrument(skip(page, low_fence, high_fence), fields(level))]
    pub fn initialize(page: &mut Page, low_fence: Option<&K>, high_fence: Option<&K>, level: u8) {
        KeyValueArray::<K, V>::init_empty(page);
        page.set_level(level);
        page.set_has_foster(false);
        page.set_foster_ptr(NULL_PAGE);
        page.set_foster_key_off(0);
        let mut kv = KeyValueArray::<K, V>::new(page);
        page.set_has_high_fence(high_fence.is_some());
        let owned_low = low_fence.cloned().unwrap_or_else(K::min_value);
        let low_off = kv.write_heap_chunk(&encode_key(&owned_low));
        let high_off = high_fence.map(|k| kv.write_heap_chunk(&encode_key(k))).unwrap_or(0);
        let page = kv.page_mut();
        page.set_low_fence_off(low_off);
        page.set_high_fence_off(high_off);
    }

    fn decode_fence(&mut self, off: u16) -> K {
        let page = self.kv.page_mut();
        let sa = SlotArray::<K::Pmnk>::new(page);
        K::decode(sa.read_heap_chunk(off))
    }

    /// This node's inclusive low fence. Always a concrete key: the
    /// tree's global lower bound is represented by `K::min_value()`
    /// rather than a separate "unbounded" flag, since it is already an
    /// exact bound no real key falls below.
    pub fn low_fence(&mut self) -> K {
        let off = self.kv.page().low_fence_off();
        self.decode_fence(off)
    }

    pub fn high_fence(&mut self) -> Option<K> {
        self.kv.page().has_high_fence().then(|| {
            let off = self.kv.page().high_fence_off();
            self.decode_fence(off)
        })
    }

    pub fn has_foster(&self) -> bool {
        self.kv.page().has_foster()
    }

    pub fn foster_ptr(&self) -> Option<PageId> {
        self.has_foster().then(|| self.kv.page().foster_ptr())
    }

    pub fn foster_key(&mut self) -> Option<K> {
        if !self.has_foster() {
            return None;
        }
        let off = self.kv.page().foster_key_off();
        Some(self.decode_fence(off))
    }

    pub fn level(&self) -> u8 {
        self.kv.page().level()
    }

    pub fn is_leaf(&self) -> bool {
        self.kv.page().is_leaf()
    }

    /// `high_fence` while `Plain`, `foster_key` while a foster parent —
    /// the upper bound of keys this node itself (not its foster child)
    /// currently owns. `None` means unbounded (the tree's rightmost
    /// node, and only while it has no foster child).
    pub fn effective_high(&mut self) -> Option<K> {
        if self.has_foster() { self.foster_key() } else { self.high_fence() }
    }

    pub fn contains(&mut self, key: &K) -> bool {
        let low = self.low_fence();
        let high = self.effective_high();
        *key >= low && high.map_or(true, |h| *key < h)
    }

    pub fn slot_count(&self) -> usize {
        self.kv.slot_count()
    }

    pub fn is_empty(&self) -> bool {
        self.kv.slot_count() == 0
    }

    pub fn used_space(&self) -> usize {
        self.kv.used_space()
    }

    pub fn free_space(&self) -> usize {
        self.kv.free_space()
    }

    pub fn find(&self, key: &K) -> (bool, usize) {
        self.kv.find(key)
    }

    pub fn read(&self, index: usize) -> (K, V) {
        self.kv.read(index)
    }

    pub fn key_at(&self, index: usize) -> K {
        self.kv.key_at(index)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let (found, idx) = self.kv.find(key);
        found.then(|| self.kv.read(idx).1)
    }

    pub fn range_iter<'a>(&'a self, low: Option<&K>, high: Option<&K>) -> impl Iterator<Item = (K, V)> + 'a {
        self.kv.range_iter(low, high)
    }

    pub(crate) fn set_low_fence(&mut self, key: &K) {
        let off = self.kv.write_heap_chunk(&encode_key(key));
        let page = self.kv.page_mut();
        page.set_low_fence_off(off);
    }

    pub(crate) fn set_high_fence(&mut self, key: &K) {
        let off = self.kv.write_heap_chunk(&encode_key(key));
        let page = self.kv.page_mut();
        page.set_high_fence_off(off);
        page.set_has_high_fence(true);
    }

    pub(crate) fn set_high_fence_opt(&mut self, key: Option<&K>) {
        match key {
            Some(k) => self.set_high_fence(k),
            None => {
                let page = self.kv.page_mut();
                page.set_high_fence_off(0);
                page.set_has_high_fence(false);
            }
        }
    }

    /// Fence-guarded insert. An out-of-range key is a programmer error
    /// in how the `BTree` driver navigated here, not a recoverable
    /// condition — it aborts via `debug_assert!` rather than returning
    /// a `KeyOutOfRange` result variant (redesigned split
    /// between recoverable and fatal error kinds).
    pub fn insert(&mut self, key: &K, value: &V) -> Result<(), NodeError> {
        debug_assert!(self.contains(key), "insert key out of node's effective range");
        self.kv.insert(key, value)?;
        Ok(())
    }

    /// Fence-guarded remove. Returns whether the key was present.
    pub fn remove(&mut self, key: &K) -> bool {
        debug_assert!(self.contains(key), "remove key out of node's effective range");
        self.kv.remove(key)
    }

    /// Reclaims dead heap bytes left by earlier removes/overwrites,
    /// preserving the fence and foster-key chunks.
    pub fn compact(&mut self) {
        let mut extra = [self.kv.page().low_fence_off(), self.kv.page().high_fence_off(), self.kv.page().foster_key_off()];
        self.kv.compact(&mut extra);
        let page = self.kv.page_mut();
        page.set_low_fence_off(extra[0]);
        page.set_high_fence_off(extra[1]);
        if page.has_foster() {
            page.set_foster_key_off(extra[2]);
        }
    }

    #[cfg(debug_assertions)]
    pub fn validate(&self) {
        self.kv.validate();
    }
}

/// `split`/`rebalance`/`merge` each need two pages mutably at once —
/// the node under operation plus a sibling — so they take explicit
/// `PageId`s and an allocator rather than `&mut self`. A `&mut self`
/// method's page is itself borrowed out of the same allocator; there
/// is no lifetime under which the borrow checker would also let that
/// method accept a second `&mut A` to reach a sibling page. Taking
/// `PageId`s and fetching both pages through `deref2_mut` in one call
/// keeps the two borrows disjoint and checkable.
impl<K: KeyCodec, V: ValueCodec> Node<'_, K, V> {
    /// Splits the node at `id` at the leftmost slot whose cumulative
    /// encoded size exceeds half the used payload bytes: allocates a
    /// sibling, moves the upper half into it, and installs it as the
    /// node's foster child. Only valid on a `Plain` node with at least
    /// two entries — fails with `SplitError::TooFewEntries` otherwise,
    /// since one entry cannot be divided into two non-empty halves.
    #[instrument(skip(alloc))]
    pub fn split<A: PageAllocator>(id: PageId, alloc: &mut A) -> Result<PageId, SplitError> {
        let (split_at, count, sep_key, old_high, level, moved) = {
            let page = alloc.deref_mut(id);
            let node = Node::<K, V>::new(page);
            debug_assert!(!node.has_foster(), "splitting a node that is already a foster parent");
            let count = node.kv.slot_count();
            if count < 2 {
                return Err(SplitError::TooFewEntries);
            }

            let total: usize = (0..count).map(|i| node.kv.payload_len(i)).sum();
            let half = total / 2;
            let mut cum = 0usize;
            let mut split_at = count - 1;
            for i in 0..count {
                cum += node.kv.payload_len(i);
                if cum > half {
                    split_at = i;
                    break;
                }
            }
            let split_at = split_at.clamp(1, count - 1);
            let sep_key = node.kv.key_at(split_at);
            let moved: Vec<(K, V)> = (split_at..count).map(|i| node.kv.read(i)).collect();
            (split_at, count, sep_key, node.high_fence(), node.level(), moved)
        };

        let sibling_id = alloc.allocate().map_err(|_| SplitError::AllocFailure)?;
        let (self_page, sibling_page) = alloc.deref2_mut(id, sibling_id);
        Node::<K, V>::initialize(sibling_page, Some(&sep_key), old_high.as_ref(), level);
        let mut sibling = Node::<K, V>::new(sibling_page);
        for (k, v) in &moved {
            sibling.kv.insert(k, v).expect("freshly initialized sibling page has room for its own half");
        }

        let mut this = Node::<K, V>::new(self_page);
        for i in (split_at..count).rev() {
            this.kv.remove_at(i);
        }
        let foster_off = this.kv.write_heap_chunk(&encode_key(&sep_key));
        let page = this.kv.page_mut();
        page.set_foster_key_off(foster_off);
        page.set_foster_ptr(sibling_id);
        page.set_has_foster(true);

        Ok(sibling_id)
    }

    /// Moves entries between the adjacent nodes `left_id`/`right_id`
    /// (sharing the fence `left.high_fence() == right.low_fence()`)
    /// until their used space is as close to equal as a single
    /// boundary move allows; updates the shared fence to match. Used
    /// by deletion to relieve an underfull node without a full merge.
    pub fn rebalance<A: PageAllocator>(left_id: PageId, right_id: PageId, alloc: &mut A) {
        let (left_page, right_page) = alloc.deref2_mut(left_id, right_id);
        let mut left = Node::<K, V>::new(left_page);
        let mut right = Node::<K, V>::new(right_page);
        debug_assert_eq!(left.high_fence(), Some(right.low_fence()), "rebalance requires adjacent nodes sharing a fence");
        if left.kv.slot_count() == 0 || right.kv.slot_count() == 0 {
            return;
        }
        if left.kv.used_space() > right.kv.used_space() {
            while left.kv.used_space() > right.kv.used_space() && left.kv.slot_count() > 1 {
                let last = left.kv.slot_count() - 1;
                let (k, v) = left.kv.read(last);
                left.kv.remove_at(last);
                match right.kv.insert(&k, &v) {
                    Ok(_) => {}
                    Err(_) => {
                        left.kv.insert(&k, &v).expect("entry just removed from left fits back in left");
                        break;
                    }
                }
            }
        } else {
            while right.kv.used_space() > left.kv.used_space() && right.kv.slot_count() > 1 {
                let (k, v) = right.kv.read(0);
                right.kv.remove_at(0);
                match left.kv.insert(&k, &v) {
                    Ok(_) => {}
                    Err(_) => {
                        right.kv.insert(&k, &v).expect("entry just removed from right fits back in right");
                        break;
                    }
                }
            }
        }
        let new_boundary = right.kv.key_at(0);
        left.set_high_fence(&new_boundary);
        right.set_low_fence(&new_boundary);
    }

    /// Copies every entry from `right_id` into `left_id` and releases
    /// it, widening `left`'s high fence to `right`'s. Requires
    /// adjacency and that the combined size fits in one page.
    #[instrument(skip(alloc))]
    pub fn merge<A: PageAllocator>(left_id: PageId, right_id: PageId, alloc: &mut A) -> Result<(), NodeError> {
        let (left_page, right_page) = alloc.deref2_mut(left_id, right_id);
        let mut left = Node::<K, V>::new(left_page);
        let mut right = Node::<K, V>::new(right_page);
        debug_assert!(!left.has_foster(), "merging into a node that is already a foster parent");
        debug_assert!(!right.has_foster(), "merging a foster-parent sibling");
        debug_assert_eq!(left.high_fence(), Some(right.low_fence()), "merge requires adjacent nodes sharing a fence");

        let entries: Vec<(K, V)> = (0..right.kv.slot_count()).map(|i| right.kv.read(i)).collect();
        let new_high = right.high_fence();
        let needed: usize = entries.iter().map(|(k, v)| KeyValueArray::<K, V>::space_needed(k, v)).sum();
        if needed > left.kv.free_space() {
            return Err(NodeError::NoSpace);
        }
        for (k, v) in &entries {
            left.kv.insert(k, v).expect("merge pre-checked that the combined size fits");
        }
        left.set_high_fence_opt(new_high.as_ref());
        alloc.release(right_id);
        Ok(())
    }
}

/// Adoption only makes sense one level up from a leaf: the parent
/// stores `PageId`s (`u64`) as values, regardless of what the child
/// itself stores. `child_id` can be either a leaf or an internal node —
/// adoption only touches the child's fence/foster header fields, never
/// its payload, so it is read through the value-less `Node<K, ()>`
/// metadata view rather than requiring a second type parameter here.
impl<K: KeyCodec> Node<'_, K, u64> {
    /// Installs `child_id`'s foster child as a proper separator in
    /// `parent_id` and clears `child_id`'s foster state. Idempotent: a
    /// no-op if `child_id` is not currently a foster parent (spec §5,
    /// invariant 8). Best-effort — if the parent has no room for the
    /// new separator, the foster relation is left in place and `false`
    /// is returned; this is not a user-visible error.
    #[instrument(skip(alloc))]
    pub fn adopt_foster<A: PageAllocator>(parent_id: PageId, child_id: PageId, alloc: &mut A) -> bool {
        let (parent_page, child_page) = alloc.deref2_mut(parent_id, child_id);
        let mut parent = Node::<K, u64>::new(parent_page);
        let mut child = Node::<K, ()>::new(child_page);
        if !child.has_foster() {
            return false;
        }
        let foster_key = child.foster_key().expect("has_foster implies foster_key is set");
        let foster_ptr = child.foster_ptr().expect("has_foster implies foster_ptr is set");

        match parent.kv.insert(&foster_key, &foster_ptr) {
            Ok(_) => {
                child.set_high_fence(&foster_key);
                let page = child.kv.page_mut();
                page.set_has_foster(false);
                page.set_foster_ptr(NULL_PAGE);
                page.set_foster_key_off(0);
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::InMemoryAllocator;
    use crate::codec::U64Key;

    type K = U64Key<u64>;

    fn full_range_page() -> Page {
        let mut page = Page::zeroed();
        Node::<K, Vec<u8>>::initialize(&mut page, None, None, 0);
        page
    }

    fn allocate_full_range_page(alloc: &mut InMemoryAllocator) -> PageId {
        let id = alloc.allocate().unwrap();
        Node::<K, Vec<u8>>::initialize(alloc.deref_mut(id), None, None, 0);
        id
    }

    #[test]
    fn initialize_sets_fences_and_empty_slots() {
        let mut page = full_range_page();
        let mut node = Node::<K, Vec<u8>>::new(&mut page);
        assert_eq!(node.low_fence(), K::min_value());
        assert_eq!(node.high_fence(), None);
        assert_eq!(node.slot_count(), 0);
        assert!(!node.has_foster());
    }

    #[test]
    fn insert_respects_fence_guard_and_round_trips() {
        let mut page = full_range_page();
        let mut node = Node::<K, Vec<u8>>::new(&mut page);
        node.insert(&K::new(5), &b"e".to_vec()).unwrap();
        node.insert(&K::new(1), &b"a".to_vec()).unwrap();
        assert_eq!(node.get(&K::new(5)), Some(b"e".to_vec()));
        assert_eq!(node.get(&K::new(2)), None);
    }

    #[test]
    fn split_produces_balanced_foster_children_covering_all_keys() {
        let mut alloc = InMemoryAllocator::new();
        let node_id = allocate_full_range_page(&mut alloc);
        {
            let mut node = Node::<K, Vec<u8>>::new(alloc.deref_mut(node_id));
            for k in 0..20u64 {
                node.insert(&K::new(k), &vec![0u8; 40]).unwrap();
            }
        }
        let sibling_id = Node::<K, Vec<u8>>::split(node_id, &mut alloc).unwrap();
        let mut node = Node::<K, Vec<u8>>::new(alloc.deref_mut(node_id));
        assert!(node.has_foster());
        let foster_key = node.foster_key().unwrap();

        for k in 0..20u64 {
            let key = K::new(k);
            if key < foster_key {
                assert_eq!(node.get(&key), Some(vec![0u8; 40]), "key {k} should remain in the original node");
            } else {
                let sibling_page = alloc.deref_mut(sibling_id);
                let sibling = Node::<K, Vec<u8>>::new(sibling_page);
                assert_eq!(sibling.get(&key), Some(vec![0u8; 40]), "key {k} should have moved to the foster child");
            }
        }

        let node_used = node.used_space();
        let sibling_used = {
            let sibling_page = alloc.deref_mut(sibling_id);
            Node::<K, Vec<u8>>::new(sibling_page).used_space()
        };
        let diff = node_used.abs_diff(sibling_used);
        assert!(diff <= 48, "split should be size-balanced, got a gap of {diff} bytes");
    }

    #[test]
    fn adopt_foster_is_idempotent() {
        let mut alloc = InMemoryAllocator::new();
        let parent_id = allocate_full_range_page(&mut alloc);

        let child_id = allocate_full_range_page(&mut alloc);
        {
            let mut child = Node::<K, Vec<u8>>::new(alloc.deref_mut(child_id));
            for k in 0..20u64 {
                child.insert(&K::new(k), &vec![0u8; 40]).unwrap();
            }
        }
        let sibling_id = Node::<K, Vec<u8>>::split(child_id, &mut alloc).unwrap();

        assert!(Node::<K, u64>::adopt_foster(parent_id, child_id, &mut alloc));
        let child_ref = Node::<K, Vec<u8>>::new(alloc.deref_mut(child_id));
        assert!(!child_ref.has_foster());
        let mut parent = Node::<K, u64>::new(alloc.deref_mut(parent_id));
        assert_eq!(parent.get(&parent.key_at(0)), Some(sibling_id));

        assert!(!Node::<K, u64>::adopt_foster(parent_id, child_id, &mut alloc), "second adoption must be a no-op");
    }
}
