//! A Foster B-Tree: an ordered key-value index over fixed-size pages,
//! built up in four layers.
//!
//! - [`slot_array`] — the page-level slot directory and payload heap.
//! - [`kv_array`] — typed insert/remove/find over a [`slot_array`],
//!   generic over the key/value policy bundles in [`codec`].
//! - [`node`] — gives a [`kv_array::KeyValueArray`] an identity in a
//!   tree: fence keys, level, and foster-child linkage.
//! - [`btree`] — root-to-leaf traversal, mutation, range scan, and
//!   opportunistic adoption over a tree of [`node::Node`]s.
//!
//! Pages are handed out by whatever implements [`alloc::PageAllocator`];
//! [`alloc::InMemoryAllocator`] is the reference implementation used by
//! [`BTree::new`] and throughout the test suite.

pub mod alloc;
pub mod btree;
pub mod codec;
pub mod error;
pub mod kv_array;
pub mod node;
pub mod page;
pub mod pmnk;
pub mod slot_array;

pub use alloc::{InMemoryAllocator, PageAllocator};
pub use btree::{BTree, Scan};
pub use codec::{BytesKey, KeyCodec, PairKey, U64Key, ValueCodec};
pub use error::{Error, Result};
pub use page::{PageId, PAGE_SIZE};
