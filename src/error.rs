//! Discriminated result types for the core.
//!
//! The core never throws for control flow: every public
//! operation returns a `Result` carrying one of the variants below.
//! `NoSpace` and `KeyOutOfRange` are deliberately *not* part of this
//! enum — they are internal-only conditions handled by the driver
//! (`NoSpace`, see [`crate::slot_array::SlotError`]) or programmer
//! errors that abort via `debug_assert!` (`KeyOutOfRange`), and must
//! never reach a caller.

use std::fmt;

/// Errors surfaced by [`crate::btree::BTree`]'s public API.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Error {
    /// `put` was called with a key that already has a value.
    Duplicate,
    /// `remove` (or a lookup expecting a value) found no entry for the key.
    NotFound,
    /// The page allocator refused to hand out a new page.
    AllocFailure,
    /// A single entry is large enough that its leaf cannot be split
    /// into two non-empty halves to make room for it, even after
    /// compaction. Distinct from `AllocFailure`: the allocator is fine,
    /// the entry simply does not fit in one page alongside anything
    /// else.
    EntryTooLarge,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Duplicate => write!(f, "key already present"),
            Error::NotFound => write!(f, "key not found"),
            Error::AllocFailure => write!(f, "page allocator exhausted"),
            Error::EntryTooLarge => write!(f, "entry too large to fit in a page"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
