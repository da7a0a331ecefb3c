//! The poor-man's normalized key (PMNK): a small fixed-width unsigned
//! prefix of the full key, stored inline in each slot, compared as a
//! plain integer to accelerate binary search (§4.2).

use bytemuck::Pod;

/// A PMNK width: `u16`, `u32`, or `u64`. Which one a tree uses is a
/// value-level choice baked into its `KeyCodec`, not a hardcoded
/// constant — "policy bundle" guidance applied to key width.
pub trait Pmnk: Copy + Ord + Pod + Send + Sync + 'static {
    /// Width in bytes, also the slot record's PMNK field width.
    const WIDTH: usize;

    fn to_le_bytes_vec(self) -> Vec<u8>;
    fn from_le_bytes_slice(src: &[u8]) -> Self;

    /// Zero-extends this PMNK to a `u64`. Only meaningful for
    /// reconstructing a key when the PMNK width covers the whole key
    /// (see [`crate::codec::KeyCodec::from_pmnk_only`]).
    fn as_u64_zero_extended(self) -> u64;

    /// Reads the leading `WIDTH` bytes of `be_bytes` (zero-padded on
    /// the right if shorter) as a big-endian integer, then hands back
    /// the native value. Because `from_be_bytes` parses big-endian
    /// bytes correctly on any host, the native integer value already
    /// preserves the original key's byte order under `Ord` — this is
    /// the "round trip through big-endian" describes.
    fn from_be_prefix(be_bytes: &[u8]) -> Self;
}

macro_rules! impl_pmnk {
    ($t:ty) => {
        impl Pmnk for $t {
            const WIDTH: usize = std::mem::size_of::<$t>();

            fn to_le_bytes_vec(self) -> Vec<u8> {
                self.to_le_bytes().to_vec()
            }

            fn from_le_bytes_slice(src: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(&src[..std::mem::size_of::<$t>()]);
                <$t>::from_le_bytes(buf)
            }

            fn from_be_prefix(be_bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                let n = be_bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&be_bytes[..n]);
                <$t>::from_be_bytes(buf)
            }

            fn as_u64_zero_extended(self) -> u64 {
                self as u64
            }
        }
    };
}

impl_pmnk!(u16);
impl_pmnk!(u32);
impl_pmnk!(u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn be_prefix_preserves_order() {
        let a = u32::from_be_prefix(&0x0001_0000u32.to_be_bytes());
        let b = u32::from_be_prefix(&0x0002_0000u32.to_be_bytes());
        assert!(a < b);
    }

    #[test]
    fn short_input_is_zero_padded() {
        let short = u32::from_be_prefix(&[0x01]);
        let full = u32::from_be_prefix(&[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(short, full);
    }
}
