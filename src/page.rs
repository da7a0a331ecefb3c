//! The fixed-size byte page and its header layout (§6).
//!
//! A [`Page`] is the unit the external allocator hands out and the
//! core borrows for the duration of one operation. Header fields are
//! read and written as explicit little-endian byte ranges rather than
//! overlaid with a `#[repr(packed)]` struct: the slot record directly
//! after the header varies in width with the configured PMNK type, so
//! no single fixed struct describes every tree configuration. Keeping
//! the header itself byte-addressed keeps every access safe and
//! alignment-agnostic.

use std::fmt;

/// Page size in bytes. A build-time constant; real
/// deployments needing a different size recompile with this changed.
pub const PAGE_SIZE: usize = 4096;

/// Identifies a page within whatever external allocator is in use.
/// Opaque to the core beyond equality and the sentinel `NULL_PAGE`.
pub type PageId = u64;

/// No page. Used for "no foster child" and "no parent" (root).
pub const NULL_PAGE: PageId = 0;

const SLOT_COUNT_OFF: usize = 0;
const HEAP_END_OFF: usize = 2;
const LEVEL_OFF: usize = 4;
const FLAGS_OFF: usize = 5;
const FOSTER_PTR_OFF: usize = 6;
const LOW_FENCE_OFF_OFF: usize = 14;
const HIGH_FENCE_OFF_OFF: usize = 16;
const FOSTER_KEY_OFF_OFF: usize = 18;

/// Total header size in bytes (layout table).
pub const HEADER_SIZE: usize = 20;

const FLAG_HAS_FOSTER: u8 = 1 << 0;
/// Set when this node's high fence is unbounded (the tree's rightmost
/// node). No fence bytes are written; `high_fence_off` stays `0`, the
/// same "absent" sentinel `foster_key_off` uses. Grounded in the
/// teacher's own `FenceRef(&[])` convention (`node_traits.rs`) for an
/// unbounded fence. Only the high side ever needs this: each key
/// codec's natural minimum (`0`, `""`, `(vec![], 0)`) is already an
/// exact, representable "negative infinity" and doubles as every
/// tree's global low fence, but none of the three codecs has a
/// representable maximum (`u64::MAX` is a real, insertable key, and
/// byte strings/tuples have no largest value at all).
const FLAG_NO_HIGH_FENCE: u8 = 1 << 1;

/// One allocator-owned, byte-addressable B-tree page.
#[repr(C, align(8))]
#[derive(Clone)]
pub struct Page {
    bytes: [u8; PAGE_SIZE],
}

impl Page {
    /// A zeroed page, as the allocator contract (`allocate`) promises.
    pub fn zeroed() -> Self {
        Page { bytes: [0u8; PAGE_SIZE] }
    }

    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.bytes
    }

    fn read_u8(&self, off: usize) -> u8 {
        self.bytes[off]
    }

    fn write_u8(&mut self, off: usize, v: u8) {
        self.bytes[off] = v;
    }

    fn read_u16(&self, off: usize) -> u16 {
        u16::from_le_bytes(self.bytes[off..off + 2].try_into().unwrap())
    }

    fn write_u16(&mut self, off: usize, v: u16) {
        self.bytes[off..off + 2].copy_from_slice(&v.to_le_bytes());
    }

    fn read_u64(&self, off: usize) -> u64 {
        u64::from_le_bytes(self.bytes[off..off + 8].try_into().unwrap())
    }

    fn write_u64(&mut self, off: usize, v: u64) {
        self.bytes[off..off + 8].copy_from_slice(&v.to_le_bytes());
    }

    pub fn slot_count(&self) -> u16 {
        self.read_u16(SLOT_COUNT_OFF)
    }

    pub fn set_slot_count(&mut self, v: u16) {
        self.write_u16(SLOT_COUNT_OFF, v)
    }

    pub fn heap_end(&self) -> u16 {
        self.read_u16(HEAP_END_OFF)
    }

    pub fn set_heap_end(&mut self, v: u16) {
        self.write_u16(HEAP_END_OFF, v)
    }

    pub fn level(&self) -> u8 {
        self.read_u8(LEVEL_OFF)
    }

    pub fn set_level(&mut self, v: u8) {
        self.write_u8(LEVEL_OFF, v)
    }

    pub fn is_leaf(&self) -> bool {
        self.level() == 0
    }

    pub fn has_foster(&self) -> bool {
        self.read_u8(FLAGS_OFF) & FLAG_HAS_FOSTER != 0
    }

    pub fn set_has_foster(&mut self, v: bool) {
        let flags = self.read_u8(FLAGS_OFF);
        let flags = if v { flags | FLAG_HAS_FOSTER } else { flags & !FLAG_HAS_FOSTER };
        self.write_u8(FLAGS_OFF, flags);
    }

    pub fn has_high_fence(&self) -> bool {
        self.read_u8(FLAGS_OFF) & FLAG_NO_HIGH_FENCE == 0
    }

    pub fn set_has_high_fence(&mut self, v: bool) {
        let flags = self.read_u8(FLAGS_OFF);
        let flags = if v { flags & !FLAG_NO_HIGH_FENCE } else { flags | FLAG_NO_HIGH_FENCE };
        self.write_u8(FLAGS_OFF, flags);
    }

    pub fn foster_ptr(&self) -> PageId {
        self.read_u64(FOSTER_PTR_OFF)
    }

    pub fn set_foster_ptr(&mut self, v: PageId) {
        self.write_u64(FOSTER_PTR_OFF, v)
    }

    pub fn low_fence_off(&self) -> u16 {
        self.read_u16(LOW_FENCE_OFF_OFF)
    }

    pub fn set_low_fence_off(&mut self, v: u16) {
        self.write_u16(LOW_FENCE_OFF_OFF, v)
    }

    pub fn high_fence_off(&self) -> u16 {
        self.read_u16(HIGH_FENCE_OFF_OFF)
    }

    pub fn set_high_fence_off(&mut self, v: u16) {
        self.write_u16(HIGH_FENCE_OFF_OFF, v)
    }

    pub fn foster_key_off(&self) -> u16 {
        self.read_u16(FOSTER_KEY_OFF_OFF)
    }

    pub fn set_foster_key_off(&mut self, v: u16) {
        self.write_u16(FOSTER_KEY_OFF_OFF, v)
    }

    /// Bytes available between the slot directory's end and the heap's start.
    pub fn free_space(&self, slot_size: usize) -> usize {
        let slot_dir_end = HEADER_SIZE + self.slot_count() as usize * slot_size;
        self.heap_end() as usize - slot_dir_end
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("slot_count", &self.slot_count())
            .field("heap_end", &self.heap_end())
            .field("level", &self.level())
            .field("has_foster", &self.has_foster())
            .field("foster_ptr", &self.foster_ptr())
            .finish()
    }
}
