//! The page allocator the core consumes, plus a reference in-memory implementation so the
//! core is testable and runnable as a standalone library.
//!
//! A real embedder backs [`PageAllocator`] with a buffer pool; nothing
//! in `node`/`btree` depends on [`InMemoryAllocator`] beyond the trait.

use rustc_hash::FxHashMap;

use crate::error::Error;
use crate::page::{Page, PageId, NULL_PAGE};

/// External collaborator the core borrows pages from. The core never
/// retains a reference across operation boundaries and only ever
/// calls `release` from [`crate::node::Node::merge`].
pub trait PageAllocator {
    /// Returns a zeroed fixed-size page, or `AllocFailure` if the
    /// allocator is exhausted.
    fn allocate(&mut self) -> Result<PageId, Error>;

    fn deref(&self, id: PageId) -> &Page;

    fn deref_mut(&mut self, id: PageId) -> &mut Page;

    /// Borrows two distinct pages mutably at once. `split`, `merge`,
    /// `rebalance` and `adopt_foster` each touch exactly two nodes —
    /// mirroring the latch-coupling protocol that never holds
    /// more than two latches at a time — so this is the only
    /// multi-page borrow the core ever needs; a plain `deref_mut`
    /// called twice can't express two live mutable borrows of the same
    /// allocator to the borrow checker. Panics if `a == b`.
    fn deref2_mut(&mut self, a: PageId, b: PageId) -> (&mut Page, &mut Page);

    /// Returns the page to the allocator. Only called by `merge`.
    fn release(&mut self, id: PageId);
}

/// Reference [`PageAllocator`] backing every page with an owned
/// `Box<Page>` in a hash map keyed by a monotonically increasing id.
/// `rustc_hash`'s `FxHashMap` is used in place of the stdlib's SipHash
/// map for the same reason the teacher reaches for `rustc-hash`: the
/// keys are plain integers on a hot path, so a faster non-DoS-resistant
/// hash is the right trade for an in-process structure with no
/// adversarial input.
#[derive(Default)]
pub struct InMemoryAllocator {
    pages: FxHashMap<PageId, Box<Page>>,
    next_id: PageId,
}

impl InMemoryAllocator {
    pub fn new() -> Self {
        InMemoryAllocator { pages: FxHashMap::default(), next_id: 1 }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

impl PageAllocator for InMemoryAllocator {
    fn allocate(&mut self) -> Result<PageId, Error> {
        let id = self.next_id;
        self.next_id += 1;
        debug_assert_ne!(id, NULL_PAGE);
        self.pages.insert(id, Box::new(Page::zeroed()));
        Ok(id)
    }

    fn deref(&self, id: PageId) -> &Page {
        self.pages.get(&id).expect("dereferenced a page id not owned by this allocator")
    }

    fn deref_mut(&mut self, id: PageId) -> &mut Page {
        self.pages.get_mut(&id).expect("dereferenced a page id not owned by this allocator")
    }

    fn deref2_mut(&mut self, a: PageId, b: PageId) -> (&mut Page, &mut Page) {
        assert_ne!(a, b, "deref2_mut requires two distinct pages");
        // Safety: `a != b` means these are two distinct map entries,
        // each an independent `Box<Page>` heap allocation, so the
        // resulting references can't alias. Two sequential `get_mut`
        // calls would prove that to us too, but borrowck can't see it
        // across the second call on the same map — this is the same
        // trick `slice::split_at_mut`/`HashMap::get_many_mut` use.
        let pa: *mut Page =
            &mut **self.pages.get_mut(&a).expect("dereferenced a page id not owned by this allocator");
        let pb: *mut Page =
            &mut **self.pages.get_mut(&b).expect("dereferenced a page id not owned by this allocator");
        unsafe { (&mut *pa, &mut *pb) }
    }

    fn release(&mut self, id: PageId) {
        self.pages.remove(&id);
    }
}
