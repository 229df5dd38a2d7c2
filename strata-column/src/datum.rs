use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use bytes::Bytes;
use itertools::Itertools;
use strata_error::{StrataError, StrataResult, strata_err};

/// A single materialized value of any column kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Datum {
    Null,
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Binary(Bytes),
    Map(DatumMap),
}

/// The subset of [`Datum`] that can act as a map key.
///
/// Floats are excluded because they have no total order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DatumKey {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Binary(Bytes),
}

/// A materialized map row. Inserting an existing key replaces its value.
pub type DatumMap = BTreeMap<DatumKey, Datum>;

impl Datum {
    /// Builds a map datum from key/value pairs, the last pair winning for repeated keys.
    pub fn map<K, V, I>(pairs: I) -> Self
    where
        K: Into<DatumKey>,
        V: Into<Datum>,
        I: IntoIterator<Item = (K, V)>,
    {
        Datum::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    pub fn as_map(&self) -> Option<&DatumMap> {
        match self {
            Datum::Map(map) => Some(map),
            _ => None,
        }
    }

    /// A short name of the value's kind, used in type mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Null => "null",
            Datum::Int8(_) => "int8",
            Datum::Int16(_) => "int16",
            Datum::Int32(_) => "int32",
            Datum::Int64(_) => "int64",
            Datum::UInt8(_) => "uint8",
            Datum::UInt16(_) => "uint16",
            Datum::UInt32(_) => "uint32",
            Datum::UInt64(_) => "uint64",
            Datum::Float32(_) => "float32",
            Datum::Float64(_) => "float64",
            Datum::Binary(_) => "binary",
            Datum::Map(_) => "map",
        }
    }
}

macro_rules! datum_from {
    ($T:ty, $variant:ident) => {
        impl From<$T> for Datum {
            fn from(value: $T) -> Self {
                Datum::$variant(value)
            }
        }
    };
}

macro_rules! key_from {
    ($T:ty, $variant:ident) => {
        datum_from!($T, $variant);

        impl From<$T> for DatumKey {
            fn from(value: $T) -> Self {
                DatumKey::$variant(value)
            }
        }
    };
}

key_from!(i8, Int8);
key_from!(i16, Int16);
key_from!(i32, Int32);
key_from!(i64, Int64);
key_from!(u8, UInt8);
key_from!(u16, UInt16);
key_from!(u32, UInt32);
key_from!(u64, UInt64);
key_from!(Bytes, Binary);
datum_from!(f32, Float32);
datum_from!(f64, Float64);
datum_from!(DatumMap, Map);

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::Binary(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<&str> for DatumKey {
    fn from(value: &str) -> Self {
        DatumKey::Binary(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl<T: Into<Datum>> From<Option<T>> for Datum {
    fn from(value: Option<T>) -> Self {
        value.map_or(Datum::Null, Into::into)
    }
}

impl From<DatumKey> for Datum {
    fn from(key: DatumKey) -> Self {
        match key {
            DatumKey::Int8(v) => Datum::Int8(v),
            DatumKey::Int16(v) => Datum::Int16(v),
            DatumKey::Int32(v) => Datum::Int32(v),
            DatumKey::Int64(v) => Datum::Int64(v),
            DatumKey::UInt8(v) => Datum::UInt8(v),
            DatumKey::UInt16(v) => Datum::UInt16(v),
            DatumKey::UInt32(v) => Datum::UInt32(v),
            DatumKey::UInt64(v) => Datum::UInt64(v),
            DatumKey::Binary(v) => Datum::Binary(v),
        }
    }
}

impl TryFrom<Datum> for DatumKey {
    type Error = StrataError;

    fn try_from(datum: Datum) -> StrataResult<Self> {
        Ok(match datum {
            Datum::Int8(v) => DatumKey::Int8(v),
            Datum::Int16(v) => DatumKey::Int16(v),
            Datum::Int32(v) => DatumKey::Int32(v),
            Datum::Int64(v) => DatumKey::Int64(v),
            Datum::UInt8(v) => DatumKey::UInt8(v),
            Datum::UInt16(v) => DatumKey::UInt16(v),
            Datum::UInt32(v) => DatumKey::UInt32(v),
            Datum::UInt64(v) => DatumKey::UInt64(v),
            Datum::Binary(v) => DatumKey::Binary(v),
            other => return Err(strata_err!(MismatchedTypes: "map key", other.type_name())),
        })
    }
}

impl Display for Datum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Datum::Null => write!(f, "NULL"),
            Datum::Int8(v) => write!(f, "{v}"),
            Datum::Int16(v) => write!(f, "{v}"),
            Datum::Int32(v) => write!(f, "{v}"),
            Datum::Int64(v) => write!(f, "{v}"),
            Datum::UInt8(v) => write!(f, "{v}"),
            Datum::UInt16(v) => write!(f, "{v}"),
            Datum::UInt32(v) => write!(f, "{v}"),
            Datum::UInt64(v) => write!(f, "{v}"),
            Datum::Float32(v) => write!(f, "{v}"),
            Datum::Float64(v) => write!(f, "{v}"),
            Datum::Binary(v) => write!(f, "'{}'", String::from_utf8_lossy(v)),
            Datum::Map(map) => write!(
                f,
                "{{{}}}",
                map.iter()
                    .format_with(",", |(k, v), f| f(&format_args!(
                        "{}:{}",
                        Datum::from(k.clone()),
                        v
                    )))
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn map_last_write_wins() {
        let datum = Datum::map([(1i32, 10i32), (2, 20), (1, 30)]);
        let map = datum.as_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&DatumKey::Int32(1)], Datum::Int32(30));
    }

    #[test]
    fn float_is_not_a_key() {
        let err = DatumKey::try_from(Datum::Float64(1.5)).unwrap_err();
        assert!(err.to_string().starts_with("expected type: map key"));
        assert_eq!(
            DatumKey::try_from(Datum::from("a")).unwrap(),
            DatumKey::from("a")
        );
    }

    #[test]
    fn display() {
        assert_eq!(Datum::map([("a", 1i32), ("b", 2)]).to_string(), "{'a':1,'b':2}");
        assert_eq!(Datum::from(None::<i32>).to_string(), "NULL");
        assert_eq!(Datum::map(Vec::<(i32, i32)>::new()).to_string(), "{}");
    }
}
