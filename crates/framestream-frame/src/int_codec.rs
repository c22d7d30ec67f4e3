//! Fixed-width integer ⇄ big-endian byte conversion.
//!
//! The frame layer only uses the `i64` instantiation (the length prefix), but
//! every width is exposed so that other fixed-size fields can share the same
//! overflow rules.

use std::fmt::Debug;

/// Errors from [`encode`] and [`decode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntCodecError {
    /// The value does not fit in the target width.
    #[error("value {value} does not fit in {type_name}")]
    Overflow {
        value: i128,
        type_name: &'static str,
    },

    /// The input slice is not exactly the target width.
    #[error("expected {expected} bytes for {type_name}, got {actual}")]
    InvalidLength {
        expected: usize,
        actual: usize,
        type_name: &'static str,
    },
}

/// An integer type with a fixed big-endian wire width.
pub trait FixedInt: Copy + Debug + Into<i128> + TryFrom<i128> {
    /// Encoded width in bytes.
    const WIDTH: usize;
    /// Name used in error messages.
    const TYPE_NAME: &'static str;

    /// Append the big-endian bytes of `self` to `out`.
    fn put_be(self, out: &mut Vec<u8>);

    /// Read a value from exactly [`Self::WIDTH`] bytes.
    fn from_be_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_fixed_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FixedInt for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();
                const TYPE_NAME: &'static str = stringify!($ty);

                fn put_be(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_be_bytes());
                }

                fn from_be_slice(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_be_bytes(raw)
                }
            }
        )*
    };
}

impl_fixed_int!(i8, i16, i32, i64, u8, u16, u32, u64);

/// Encode `value` as the big-endian representation of `T`.
///
/// Fails with [`IntCodecError::Overflow`] if `value` is outside `T`'s range.
pub fn encode<T: FixedInt>(value: impl Into<i128>) -> Result<Vec<u8>, IntCodecError> {
    let value = value.into();
    let narrowed = T::try_from(value).map_err(|_| IntCodecError::Overflow {
        value,
        type_name: T::TYPE_NAME,
    })?;
    let mut out = Vec::with_capacity(T::WIDTH);
    narrowed.put_be(&mut out);
    Ok(out)
}

/// Decode a big-endian `T` from exactly `T::WIDTH` bytes.
pub fn decode<T: FixedInt>(bytes: &[u8]) -> Result<T, IntCodecError> {
    if bytes.len() != T::WIDTH {
        return Err(IntCodecError::InvalidLength {
            expected: T::WIDTH,
            actual: bytes.len(),
            type_name: T::TYPE_NAME,
        });
    }
    Ok(T::from_be_slice(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_boundaries<T: FixedInt + PartialEq>(min: T, max: T) {
        for value in [min.into(), -1i128, 0, 1, max.into()] {
            if T::try_from(value).is_err() {
                continue;
            }
            let bytes = encode::<T>(value).unwrap();
            assert_eq!(bytes.len(), T::WIDTH);
            let decoded: T = decode(&bytes).unwrap();
            assert_eq!(Into::<i128>::into(decoded), value, "{} round trip", T::TYPE_NAME);
        }
    }

    #[test]
    fn boundaries_round_trip_for_every_width() {
        check_boundaries(i8::MIN, i8::MAX);
        check_boundaries(i16::MIN, i16::MAX);
        check_boundaries(i32::MIN, i32::MAX);
        check_boundaries(i64::MIN, i64::MAX);
        check_boundaries(u8::MIN, u8::MAX);
        check_boundaries(u16::MIN, u16::MAX);
        check_boundaries(u32::MIN, u32::MAX);
        check_boundaries(u64::MIN, u64::MAX);
    }

    #[test]
    fn out_of_range_values_overflow() {
        assert_eq!(
            encode::<i8>(128i32),
            Err(IntCodecError::Overflow {
                value: 128,
                type_name: "i8"
            })
        );
        assert!(encode::<u16>(-1i32).is_err());
        assert!(encode::<i64>(i128::from(u64::MAX)).is_err());
        assert!(encode::<u64>(i128::from(u64::MAX) + 1).is_err());
    }

    #[test]
    fn encoding_is_big_endian() {
        assert_eq!(encode::<i64>(1i64).unwrap(), vec![0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(encode::<u16>(0x0102u16).unwrap(), vec![0x01, 0x02]);
        assert_eq!(encode::<i32>(-2i32).unwrap(), vec![0xFF, 0xFF, 0xFF, 0xFE]);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let err = decode::<i64>(&[0u8; 7]).unwrap_err();
        assert_eq!(
            err,
            IntCodecError::InvalidLength {
                expected: 8,
                actual: 7,
                type_name: "i64"
            }
        );
        assert!(decode::<u8>(&[]).is_err());
    }
}
