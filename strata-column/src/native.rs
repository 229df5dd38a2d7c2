use std::fmt::{Debug, Display};

use crate::Datum;

mod private {
    pub trait Sealed {}
}

/// A plain numeric value stored contiguously by a [`FixedLengthColumn`](crate::FixedLengthColumn).
///
/// Implemented only for primitive integers and floats, which have no padding bytes.
pub trait NativeType:
    private::Sealed + Copy + Default + Debug + Display + PartialEq + Send + Sync + 'static
{
    /// Short name used in column names and type mismatch errors.
    const NAME: &'static str;

    type Bytes: AsRef<[u8]>;

    fn le_bytes(self) -> Self::Bytes;

    /// Reads a value from exactly `size_of::<Self>()` little-endian bytes.
    fn from_le_slice(bytes: &[u8]) -> Self;

    /// The value's bit pattern widened to 64 bits, as folded by `xor_checksum`.
    fn xor_bits(self) -> i64;

    fn into_datum(self) -> Datum;

    fn from_datum(datum: &Datum) -> Option<Self>;
}

macro_rules! native_type {
    ($T:ty, $variant:ident, $name:literal, $xor:expr) => {
        impl private::Sealed for $T {}

        impl NativeType for $T {
            const NAME: &'static str = $name;

            type Bytes = [u8; size_of::<$T>()];

            #[inline]
            fn le_bytes(self) -> Self::Bytes {
                self.to_le_bytes()
            }

            #[inline]
            fn from_le_slice(bytes: &[u8]) -> Self {
                let mut buf = [0u8; size_of::<$T>()];
                buf.copy_from_slice(bytes);
                <$T>::from_le_bytes(buf)
            }

            #[inline]
            fn xor_bits(self) -> i64 {
                ($xor)(self)
            }

            fn into_datum(self) -> Datum {
                Datum::$variant(self)
            }

            fn from_datum(datum: &Datum) -> Option<Self> {
                match datum {
                    Datum::$variant(v) => Some(*v),
                    _ => None,
                }
            }
        }
    };
}

native_type!(i8, Int8, "int8", i64::from);
native_type!(i16, Int16, "int16", i64::from);
native_type!(i32, Int32, "int32", i64::from);
native_type!(i64, Int64, "int64", |v: i64| v);
native_type!(u8, UInt8, "uint8", i64::from);
native_type!(u16, UInt16, "uint16", i64::from);
native_type!(u32, UInt32, "uint32", i64::from);
native_type!(u64, UInt64, "uint64", |v: u64| v as i64);
native_type!(f32, Float32, "float32", |v: f32| i64::from(v.to_bits()));
native_type!(f64, Float64, "float64", |v: f64| v.to_bits() as i64);
