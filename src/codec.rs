//! Payload encoders and the key/value "policy bundles" built on top of
//! them.
//!
//! [`Encoder`] is the stateless, memory-less policy this module
//! describes: `encoded_length`, `encoded_length_from_bytes`, `encode`,
//! `decode`. [`KeyCodec`] and [`ValueCodec`] are the per-type policy
//! bundles a [`crate::kv_array::KeyValueArray`] is generic over; each
//! concrete key/value type picks which `Encoder`s it delegates to and
//! (for keys) how it extracts a PMNK.

use std::marker::PhantomData;

use bytemuck::Pod;

use crate::pmnk::Pmnk;

/// A stateless, pure encode/decode policy over one Rust type. Encoders
/// own no memory; every operation takes explicit source/destination
/// byte slices.
pub trait Encoder {
    type Value;

    /// Bytes `encode` will write for this value.
    fn encoded_length(value: &Self::Value) -> usize;

    /// Bytes a previously-encoded instance occupies, read from its own
    /// header (e.g. a length prefix) without decoding the whole value.
    fn encoded_length_from_bytes(src: &[u8]) -> usize;

    /// Writes the encoding to `dst`, returns bytes written.
    fn encode(value: &Self::Value, dst: &mut [u8]) -> usize;

    /// Reads a value back from `src`, returns it plus bytes consumed.
    fn decode(src: &[u8]) -> (Self::Value, usize);
}

/// Raw bitwise copy of a fixed-size scalar.
pub struct AssignmentEncoder<T>(PhantomData<T>);

impl<T: Pod> Encoder for AssignmentEncoder<T> {
    type Value = T;

    fn encoded_length(_value: &T) -> usize {
        std::mem::size_of::<T>()
    }

    fn encoded_length_from_bytes(_src: &[u8]) -> usize {
        std::mem::size_of::<T>()
    }

    fn encode(value: &T, dst: &mut [u8]) -> usize {
        let len = std::mem::size_of::<T>();
        dst[..len].copy_from_slice(bytemuck::bytes_of(value));
        len
    }

    fn decode(src: &[u8]) -> (T, usize) {
        let len = std::mem::size_of::<T>();
        (bytemuck::pod_read_unaligned(&src[..len]), len)
    }
}

/// 16-bit little-endian length prefix followed by raw bytes (spec
/// §4.2 "Inline variable-length encoder").
pub struct InlineBytesEncoder;

impl Encoder for InlineBytesEncoder {
    type Value = Vec<u8>;

    fn encoded_length(value: &Vec<u8>) -> usize {
        2 + value.len()
    }

    fn encoded_length_from_bytes(src: &[u8]) -> usize {
        2 + u16::from_le_bytes([src[0], src[1]]) as usize
    }

    fn encode(value: &Vec<u8>, dst: &mut [u8]) -> usize {
        let len = value.len() as u16;
        dst[..2].copy_from_slice(&len.to_le_bytes());
        dst[2..2 + value.len()].copy_from_slice(value);
        2 + value.len()
    }

    fn decode(src: &[u8]) -> (Vec<u8>, usize) {
        let len = u16::from_le_bytes([src[0], src[1]]) as usize;
        (src[2..2 + len].to_vec(), 2 + len)
    }
}

/// Recursive concatenation of two component encoders; nest further by
/// using a `TupleEncoder` as one of
/// `A`/`B` for more than two fields.
pub struct TupleEncoder<A, B>(PhantomData<(A, B)>);

impl<A: Encoder, B: Encoder> Encoder for TupleEncoder<A, B> {
    type Value = (A::Value, B::Value);

    fn encoded_length(value: &Self::Value) -> usize {
        A::encoded_length(&value.0) + B::encoded_length(&value.1)
    }

    fn encoded_length_from_bytes(src: &[u8]) -> usize {
        let a_len = A::encoded_length_from_bytes(src);
        let b_len = B::encoded_length_from_bytes(&src[a_len..]);
        a_len + b_len
    }

    fn encode(value: &Self::Value, dst: &mut [u8]) -> usize {
        let a_len = A::encode(&value.0, dst);
        let b_len = B::encode(&value.1, &mut dst[a_len..]);
        a_len + b_len
    }

    fn decode(src: &[u8]) -> (Self::Value, usize) {
        let (a, a_len) = A::decode(src);
        let (b, b_len) = B::decode(&src[a_len..]);
        ((a, b), a_len + b_len)
    }
}

/// Zero-width encoder for values recoverable without storing anything
/// at all. `decode` is infallible and takes no optional output buffer —
/// there is nothing to read back beyond `()` itself.
pub struct DummyEncoder;

impl Encoder for DummyEncoder {
    type Value = ();

    fn encoded_length(_value: &()) -> usize {
        0
    }

    fn encoded_length_from_bytes(_src: &[u8]) -> usize {
        0
    }

    fn encode(_value: &(), _dst: &mut [u8]) -> usize {
        0
    }

    fn decode(_src: &[u8]) -> ((), usize) {
        ((), 0)
    }
}

/// The key-side policy bundle a [`crate::kv_array::KeyValueArray`] is
/// generic over: ordering, PMNK extraction, and payload encoding.
pub trait KeyCodec: Ord + Clone + std::fmt::Debug {
    type Pmnk: Pmnk;

    /// Whether the payload must additionally carry the full encoded
    /// key. `false` only when the PMNK alone fully determines the key
    /// (the "identity extractor" case).
    const NEEDS_FULL_KEY: bool;

    fn pmnk(&self) -> Self::Pmnk;
    fn encoded_len(&self) -> usize;
    fn encoded_len_from_bytes(src: &[u8]) -> usize;
    fn encode(&self, dst: &mut [u8]);
    fn decode(src: &[u8]) -> Self;

    /// Reconstructs the key from its PMNK alone. Only ever called when
    /// `NEEDS_FULL_KEY` is `false`.
    fn from_pmnk_only(_pmnk: Self::Pmnk) -> Self {
        unreachable!("from_pmnk_only called on a codec that always stores the full key")
    }

    /// This type's natural minimum value under `Ord` — `0` for unsigned
    /// scalars, the empty byte string for lexicographic keys, the
    /// element-wise minimum for tuples. Exact, not a reserved sentinel:
    /// no value of this type compares less than it, so it doubles as
    /// every tree's global (unbounded) low fence without excluding any
    /// real key a caller might insert (see `page::FLAG_NO_HIGH_FENCE`
    /// for why the high side can't use the same trick).
    fn min_value() -> Self;
}

/// The value-side policy bundle: encode/decode only, no ordering.
pub trait ValueCodec: Clone + std::fmt::Debug {
    fn encoded_len(&self) -> usize;
    fn encoded_len_from_bytes(src: &[u8]) -> usize;
    fn encode(&self, dst: &mut [u8]);
    fn decode(src: &[u8]) -> Self;
}

impl ValueCodec for Vec<u8> {
    fn encoded_len(&self) -> usize {
        InlineBytesEncoder::encoded_length(self)
    }

    fn encoded_len_from_bytes(src: &[u8]) -> usize {
        InlineBytesEncoder::encoded_length_from_bytes(src)
    }

    fn encode(&self, dst: &mut [u8]) {
        InlineBytesEncoder::encode(self, dst);
    }

    fn decode(src: &[u8]) -> Self {
        InlineBytesEncoder::decode(src).0
    }
}

/// A value-less metadata view. Used by the driver to peek at a page's
/// fences, level, and foster linkage without committing to whether the
/// page is a leaf (`V` is the tree's value type) or an internal node
/// (`V = u64`) — none of that metadata lives in the payload bytes a
/// real `V` would decode.
impl ValueCodec for () {
    fn encoded_len(&self) -> usize {
        0
    }

    fn encoded_len_from_bytes(_src: &[u8]) -> usize {
        0
    }

    fn encode(&self, _dst: &mut [u8]) {}

    fn decode(_src: &[u8]) -> Self {}
}

impl ValueCodec for u64 {
    fn encoded_len(&self) -> usize {
        AssignmentEncoder::<u64>::encoded_length(self)
    }

    fn encoded_len_from_bytes(src: &[u8]) -> usize {
        AssignmentEncoder::<u64>::encoded_length_from_bytes(src)
    }

    fn encode(&self, dst: &mut [u8]) {
        AssignmentEncoder::<u64>::encode(self, dst);
    }

    fn decode(src: &[u8]) -> Self {
        AssignmentEncoder::<u64>::decode(src).0
    }
}

/// A scalar `u64` key. When `P` is `u64` itself the PMNK *is* the key
/// (`NEEDS_FULL_KEY = false`, the identity extractor); narrower `P`
/// forces the full 8-byte big-endian key into the payload.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct U64Key<P: Pmnk>(pub u64, PhantomData<P>);

impl<P: Pmnk> U64Key<P> {
    pub fn new(value: u64) -> Self {
        U64Key(value, PhantomData)
    }
}

impl<P: Pmnk> KeyCodec for U64Key<P> {
    type Pmnk = P;
    const NEEDS_FULL_KEY: bool = P::WIDTH < 8;

    fn pmnk(&self) -> P {
        P::from_be_prefix(&self.0.to_be_bytes())
    }

    fn encoded_len(&self) -> usize {
        8
    }

    fn encoded_len_from_bytes(_src: &[u8]) -> usize {
        8
    }

    fn encode(&self, dst: &mut [u8]) {
        dst[..8].copy_from_slice(&self.0.to_be_bytes());
    }

    fn decode(src: &[u8]) -> Self {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&src[..8]);
        U64Key::new(u64::from_be_bytes(buf))
    }

    fn from_pmnk_only(pmnk: P) -> Self {
        debug_assert!(!Self::NEEDS_FULL_KEY, "P does not cover the full u64 range");
        U64Key::new(pmnk.as_u64_zero_extended())
    }

    fn min_value() -> Self {
        U64Key::new(0)
    }
}

/// A byte-string key, ordered lexicographically via `Vec<u8>`'s
/// native `Ord`. Always needs the full key stored: a byte string's
/// type never coincides with an integer PMNK type.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct BytesKey<P: Pmnk>(pub Vec<u8>, PhantomData<P>);

impl<P: Pmnk> BytesKey<P> {
    pub fn new(bytes: Vec<u8>) -> Self {
        BytesKey(bytes, PhantomData)
    }

    pub fn from_str(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }
}

impl<P: Pmnk> KeyCodec for BytesKey<P> {
    type Pmnk = P;
    const NEEDS_FULL_KEY: bool = true;

    fn pmnk(&self) -> P {
        P::from_be_prefix(&self.0)
    }

    fn encoded_len(&self) -> usize {
        InlineBytesEncoder::encoded_length(&self.0)
    }

    fn encoded_len_from_bytes(src: &[u8]) -> usize {
        InlineBytesEncoder::encoded_length_from_bytes(src)
    }

    fn encode(&self, dst: &mut [u8]) {
        InlineBytesEncoder::encode(&self.0, dst);
    }

    fn decode(src: &[u8]) -> Self {
        BytesKey::new(InlineBytesEncoder::decode(src).0)
    }

    fn min_value() -> Self {
        BytesKey::new(Vec::new())
    }
}

/// A two-field tuple key `(bytes, u64)`, compared element-wise
/// lexicographically via the derived `Ord` (first field, then
/// second), and encoded via [`TupleEncoder`] composed from
/// [`InlineBytesEncoder`] and [`AssignmentEncoder<u64>`].
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct PairKey<P: Pmnk> {
    pub a: Vec<u8>,
    pub b: u64,
    _pmnk: PhantomData<P>,
}

impl<P: Pmnk> PairKey<P> {
    pub fn new(a: Vec<u8>, b: u64) -> Self {
        PairKey { a, b, _pmnk: PhantomData }
    }
}

type PairEncoder = TupleEncoder<InlineBytesEncoder, AssignmentEncoder<u64>>;

impl<P: Pmnk> KeyCodec for PairKey<P> {
    type Pmnk = P;
    const NEEDS_FULL_KEY: bool = true;

    fn pmnk(&self) -> P {
        if self.a.len() >= P::WIDTH {
            P::from_be_prefix(&self.a)
        } else {
            let mut combined = Vec::with_capacity(P::WIDTH);
            combined.extend_from_slice(&self.a);
            combined.extend_from_slice(&self.b.to_be_bytes());
            P::from_be_prefix(&combined)
        }
    }

    fn encoded_len(&self) -> usize {
        PairEncoder::encoded_length(&(self.a.clone(), self.b))
    }

    fn encoded_len_from_bytes(src: &[u8]) -> usize {
        PairEncoder::encoded_length_from_bytes(src)
    }

    fn encode(&self, dst: &mut [u8]) {
        PairEncoder::encode(&(self.a.clone(), self.b), dst);
    }

    fn decode(src: &[u8]) -> Self {
        let ((a, b), _) = PairEncoder::decode(src);
        PairKey::new(a, b)
    }

    fn min_value() -> Self {
        PairKey::new(Vec::new(), 0)
    }
}
