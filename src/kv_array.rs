//! Gives the [`SlotArray`] types: typed insert/remove/find
//! plus decode, layered over a PMNK-accelerated [`SlotArray`].

use std::cmp::Ordering;

use crate::codec::{KeyCodec, ValueCodec};
use crate::page::Page;
use crate::slot_array::{SlotArray, SlotError};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum KvError {
    NoSpace,
    Duplicate,
}

impl From<SlotError> for KvError {
    fn from(e: SlotError) -> Self {
        match e {
            SlotError::NoSpace => KvError::NoSpace,
        }
    }
}

pub struct KeyValueArray<'p, K: KeyCodec, V: ValueCodec> {
    slots: SlotArray<'p, K::Pmnk>,
    _v: std::marker::PhantomData<V>,
}

impl<'p, K: KeyCodec, V: ValueCodec> KeyValueArray<'p, K, V> {
    pub fn new(page: &'p mut Page) -> Self {
        KeyValueArray { slots: SlotArray::new(page), _v: std::marker::PhantomData }
    }

    pub fn init_empty(page: &mut Page) {
        SlotArray::<K::Pmnk>::init_empty(page);
    }

    pub fn slot_count(&self) -> usize {
        self.slots.slot_count()
    }

    pub fn free_space(&self) -> usize {
        self.slots.free_space()
    }

    pub fn used_space(&self) -> usize {
        self.slots.used_space()
    }

    fn decode_key(&self, pmnk: K::Pmnk, payload: &[u8]) -> K {
        if K::NEEDS_FULL_KEY {
            let klen = K::encoded_len_from_bytes(payload);
            K::decode(&payload[..klen])
        } else {
            K::from_pmnk_only(pmnk)
        }
    }

    /// Space a `(key, value)` pair would need, for callers deciding
    /// whether to compact or split before inserting.
    pub fn space_needed(key: &K, value: &V) -> usize {
        let payload_len = if K::NEEDS_FULL_KEY { key.encoded_len() + value.encoded_len() } else { value.encoded_len() };
        SlotArray::<K::Pmnk>::space_needed(payload_len)
    }

    /// PMNK binary search, then a linear scan over PMNK ties doing a
    /// full-key comparison. Returns the insertion position when not found.
    pub fn find(&self, key: &K) -> (bool, usize) {
        let pmnk = key.pmnk();
        let (_, mut idx) = self.slots.find(pmnk);
        let count = self.slots.slot_count();
        while idx < count {
            let (p, payload) = self.slots.get(idx);
            if p != pmnk {
                break;
            }
            match self.decode_key(p, payload).cmp(key) {
                Ordering::Less => idx += 1,
                Ordering::Equal => return (true, idx),
                Ordering::Greater => break,
            }
        }
        (false, idx)
    }

    pub fn read(&self, index: usize) -> (K, V) {
        let (pmnk, payload) = self.slots.get(index);
        if K::NEEDS_FULL_KEY {
            let klen = K::encoded_len_from_bytes(payload);
            let key = K::decode(&payload[..klen]);
            let value = V::decode(&payload[klen..]);
            (key, value)
        } else {
            let key = K::from_pmnk_only(pmnk);
            let value = V::decode(payload);
            (key, value)
        }
    }

    pub fn key_at(&self, index: usize) -> K {
        self.read(index).0
    }

    pub fn payload_len(&self, index: usize) -> usize {
        self.slots.get(index).1.len()
    }

    pub(crate) fn page(&self) -> &Page {
        self.slots.page()
    }

    pub(crate) fn page_mut(&mut self) -> &mut Page {
        self.slots.page_mut()
    }

    /// Removes the entry at `index` without a key lookup. Used by
    /// `Node::split`/`rebalance`/`merge`, which already know the index
    /// from an earlier `read`.
    pub(crate) fn remove_at(&mut self, index: usize) {
        self.slots.remove(index)
    }

    fn encode_payload(key: &K, value: &V) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::raw_len(key, value));
        if K::NEEDS_FULL_KEY {
            let mut kbuf = vec![0u8; key.encoded_len()];
            key.encode(&mut kbuf);
            buf.extend_from_slice(&kbuf);
        }
        let mut vbuf = vec![0u8; value.encoded_len()];
        value.encode(&mut vbuf);
        buf.extend_from_slice(&vbuf);
        buf
    }

    fn raw_len(key: &K, value: &V) -> usize {
        (if K::NEEDS_FULL_KEY { key.encoded_len() } else { 0 }) + value.encoded_len()
    }

    /// Computes PMNK, computes payload length, delegates to the slot
    /// array, writes the encoded bytes. Fails with `NoSpace` or
    /// `Duplicate`.
    pub fn insert(&mut self, key: &K, value: &V) -> Result<usize, KvError> {
        let (found, idx) = self.find(key);
        if found {
            return Err(KvError::Duplicate);
        }
        let payload = Self::encode_payload(key, value);
        self.slots.insert(idx, key.pmnk(), &payload)?;
        Ok(idx)
    }

    /// Locates via PMNK + full-key comparison, delegates slot removal.
    pub fn remove(&mut self, key: &K) -> bool {
        let (found, idx) = self.find(key);
        if found {
            self.slots.remove(idx);
        }
        found
    }

    pub fn compact(&mut self, extra_chunks: &mut [u16]) {
        self.slots.compact(extra_chunks)
    }

    pub(crate) fn write_heap_chunk(&mut self, data: &[u8]) -> u16 {
        self.slots.write_heap_chunk(data)
    }

    pub(crate) fn read_heap_chunk(&self, offset: u16) -> &[u8] {
        self.slots.read_heap_chunk(offset)
    }

    /// A lazy, finite, restartable sequence of `(key, value)` pairs in
    /// ascending key order, bounded by `low` (inclusive) and
    /// `high_exclusive`. Borrows `self` immutably, so the borrow
    /// checker — not a runtime check — rejects any attempt to mutate
    /// the page while the sequence is alive, satisfying spec §4.2's
    /// "invalidated on any mutation" contract for in-process callers.
    pub fn range_iter<'a>(
        &'a self,
        low: Option<&K>,
        high_exclusive: Option<&K>,
    ) -> impl Iterator<Item = (K, V)> + 'a {
        let start = low.map(|k| self.find(k).1).unwrap_or(0);
        let end = high_exclusive.map(|k| self.find(k).1).unwrap_or_else(|| self.slots.slot_count());
        (start..end.max(start)).map(move |i| self.read(i))
    }

    #[cfg(debug_assertions)]
    pub fn validate(&self) {
        self.slots.validate();
        for i in 0..self.slot_count().saturating_sub(1) {
            let (ka, _) = self.read(i);
            let (kb, _) = self.read(i + 1);
            assert!(ka < kb, "keys out of order at slot {i}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::U64Key;

    #[test]
    fn insert_find_and_duplicate_rejection() {
        let mut page = Page::zeroed();
        KeyValueArray::<U64Key<u32>, Vec<u8>>::init_empty(&mut page);
        let mut kv = KeyValueArray::<U64Key<u32>, Vec<u8>>::new(&mut page);
        kv.insert(&U64Key::new(5), &b"e".to_vec()).unwrap();
        kv.insert(&U64Key::new(1), &b"a".to_vec()).unwrap();
        kv.insert(&U64Key::new(3), &b"c".to_vec()).unwrap();
        assert_eq!(kv.read(kv.find(&U64Key::new(1)).1).1, b"a".to_vec());
        assert_eq!(kv.read(kv.find(&U64Key::new(3)).1).1, b"c".to_vec());
        assert_eq!(kv.read(kv.find(&U64Key::new(5)).1).1, b"e".to_vec());
        assert_eq!(kv.insert(&U64Key::new(1), &b"z".to_vec()), Err(KvError::Duplicate));
        kv.validate();
    }

    #[test]
    fn range_iter_yields_ascending_pairs() {
        let mut page = Page::zeroed();
        KeyValueArray::<U64Key<u32>, Vec<u8>>::init_empty(&mut page);
        let mut kv = KeyValueArray::<U64Key<u32>, Vec<u8>>::new(&mut page);
        for k in [5u64, 1, 3, 2, 4] {
            kv.insert(&U64Key::new(k), &vec![k as u8]).unwrap();
        }
        let collected: Vec<u64> = kv.range_iter(None, None).map(|(k, _)| k.0).collect();
        assert_eq!(collected, vec![1, 2, 3, 4, 5]);
        let bounded: Vec<u64> =
            kv.range_iter(Some(&U64Key::new(2)), Some(&U64Key::new(4))).map(|(k, _)| k.0).collect();
        assert_eq!(bounded, vec![2, 3]);
    }
}
