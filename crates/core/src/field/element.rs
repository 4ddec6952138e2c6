//! Scalar element types storable in a [`FieldArray`](super::FieldArray).

use std::fmt::{Debug, Display};
use std::ops::Add;

/// Numeric element with a fixed-width native-endian byte encoding.
///
/// Snapshot files store payloads in native byte order, so encoding is a
/// straight `to_ne_bytes` / `from_ne_bytes` per element.
pub trait Element:
    Copy + Default + PartialOrd + Debug + Display + Add<Output = Self> + 'static
{
    /// Encoded width in bytes
    const SIZE: usize;

    /// Append the native-endian encoding of `self` to `out`.
    fn write_ne(self, out: &mut Vec<u8>);

    /// Decode from exactly `SIZE` bytes.
    fn read_ne(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($ty:ty),*) => {
        $(
            impl Element for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn write_ne(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_ne_bytes());
                }

                #[inline]
                fn read_ne(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_ne_bytes(raw)
                }
            }
        )*
    };
}

impl_element!(f64, f32, i32, i64);
