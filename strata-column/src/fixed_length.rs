use std::any::Any;
use std::iter;

use bytes::{Buf, BufMut};
use strata_error::{StrataResult, strata_bail, strata_err};

use crate::column::{check_range, check_update_indexes, downcast_column, downcast_column_mut};
use crate::hash::{crc_hash, fnv_hash};
use crate::{Column, ColumnLimits, ColumnRef, Datum, NativeType};

/// A column of plain numeric values stored contiguously.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FixedLengthColumn<T: NativeType> {
    values: Vec<T>,
}

pub type Int8Column = FixedLengthColumn<i8>;
pub type Int16Column = FixedLengthColumn<i16>;
pub type Int32Column = FixedLengthColumn<i32>;
pub type Int64Column = FixedLengthColumn<i64>;
pub type UInt8Column = FixedLengthColumn<u8>;
pub type UInt16Column = FixedLengthColumn<u16>;
pub type UInt32Column = FixedLengthColumn<u32>;
pub type UInt64Column = FixedLengthColumn<u64>;
pub type Float32Column = FixedLengthColumn<f32>;
pub type Float64Column = FixedLengthColumn<f64>;

impl<T: NativeType> FixedLengthColumn<T> {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.values
    }

    pub fn as_mut_vec(&mut self) -> &mut Vec<T> {
        &mut self.values
    }

    pub fn into_vec(self) -> Vec<T> {
        self.values
    }

    #[inline]
    pub fn value(&self, idx: usize) -> T {
        self.values[idx]
    }

    #[inline]
    pub fn push(&mut self, value: T) {
        self.values.push(value);
    }

    pub fn last(&self) -> Option<T> {
        self.values.last().copied()
    }

    fn width() -> usize {
        size_of::<T>()
    }
}

impl<T: NativeType> From<Vec<T>> for FixedLengthColumn<T> {
    fn from(values: Vec<T>) -> Self {
        Self { values }
    }
}

impl<T: NativeType> FromIterator<T> for FixedLengthColumn<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl<T: NativeType> Column for FixedLengthColumn<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn name(&self) -> String {
        T::NAME.to_string()
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn capacity(&self) -> usize {
        self.values.capacity()
    }

    fn raw_data(&self) -> StrataResult<&[u8]> {
        // SAFETY: `NativeType` is sealed to primitive numbers, which have no padding and no
        // invalid bit patterns, so their storage can be viewed as initialized bytes.
        Ok(unsafe {
            std::slice::from_raw_parts(
                self.values.as_ptr().cast::<u8>(),
                size_of_val(self.values.as_slice()),
            )
        })
    }

    fn reserve(&mut self, rows: usize) {
        self.values.reserve(rows.saturating_sub(self.values.len()));
    }

    fn resize(&mut self, rows: usize) {
        self.values.resize(rows, T::default());
    }

    fn assign(&mut self, rows: usize, idx: usize) -> StrataResult<()> {
        let Some(&value) = self.values.get(idx) else {
            strata_bail!(OutOfBounds: idx, 0, self.len());
        };
        self.values.clear();
        self.values.resize(rows, value);
        Ok(())
    }

    fn append_datum(&mut self, datum: &Datum) -> StrataResult<()> {
        let value = T::from_datum(datum)
            .ok_or_else(|| strata_err!(MismatchedTypes: T::NAME, datum.type_name()))?;
        self.values.push(value);
        Ok(())
    }

    fn append(&mut self, src: &dyn Column, offset: usize, count: usize) -> StrataResult<()> {
        let src = downcast_column::<Self>(src, T::NAME)?;
        check_range(offset, count, src.len())?;
        self.values
            .extend_from_slice(&src.values[offset..offset + count]);
        Ok(())
    }

    fn append_selective(
        &mut self,
        src: &dyn Column,
        indexes: &[u32],
        from: usize,
        size: usize,
    ) -> StrataResult<()> {
        let src = downcast_column::<Self>(src, T::NAME)?;
        check_range(from, size, indexes.len())?;
        let indexes = &indexes[from..from + size];
        if let Some(&bad) = indexes.iter().find(|&&idx| idx as usize >= src.len()) {
            strata_bail!(OutOfBounds: bad as usize, 0, src.len());
        }
        self.values
            .extend(indexes.iter().map(|&idx| src.values[idx as usize]));
        Ok(())
    }

    fn append_value_multiple_times(
        &mut self,
        src: &dyn Column,
        index: usize,
        size: usize,
    ) -> StrataResult<()> {
        let src = downcast_column::<Self>(src, T::NAME)?;
        let Some(&value) = src.values.get(index) else {
            strata_bail!(OutOfBounds: index, 0, src.len());
        };
        self.values.extend(iter::repeat_n(value, size));
        Ok(())
    }

    fn append_nulls(&mut self, _count: usize) -> bool {
        false
    }

    fn append_default(&mut self, count: usize) {
        self.values
            .extend(iter::repeat_n(T::default(), count));
    }

    fn fill_default(&mut self, filter: &[u8]) -> StrataResult<()> {
        for (value, &selected) in self.values.iter_mut().zip(filter) {
            if selected != 0 {
                *value = T::default();
            }
        }
        Ok(())
    }

    fn update_rows(&mut self, src: &dyn Column, indexes: &[u32]) -> StrataResult<()> {
        let src = downcast_column::<Self>(src, T::NAME)?;
        if indexes.len() < src.len() {
            strata_bail!(
                "{} rows need as many update indexes, got {}",
                src.len(),
                indexes.len()
            );
        }
        let indexes = &indexes[..src.len()];
        check_update_indexes(indexes, self.len())?;
        for (&idx, &value) in indexes.iter().zip(&src.values) {
            self.values[idx as usize] = value;
        }
        Ok(())
    }

    fn filter_range(&mut self, filter: &[u8], from: usize, to: usize) -> usize {
        let mut result = from;
        for i in from..to {
            if filter[i] != 0 {
                self.values[result] = self.values[i];
                result += 1;
            }
        }
        self.values.truncate(result);
        result
    }

    fn byte_size_range(&self, _from: usize, size: usize) -> usize {
        size * Self::width()
    }

    fn element_memory_usage(&self, _from: usize, size: usize) -> usize {
        size * Self::width()
    }

    fn serialize(&self, idx: usize, dst: &mut [u8]) -> usize {
        let mut dst = dst;
        dst.put_slice(self.values[idx].le_bytes().as_ref());
        Self::width()
    }

    fn serialize_default(&self, dst: &mut [u8]) -> usize {
        let mut dst = dst;
        dst.put_slice(T::default().le_bytes().as_ref());
        Self::width()
    }

    fn serialize_size(&self, _idx: usize) -> usize {
        Self::width()
    }

    fn max_one_element_serialize_size(&self) -> usize {
        Self::width()
    }

    fn deserialize_and_append<'a>(&mut self, src: &'a [u8]) -> StrataResult<&'a [u8]> {
        let mut src = src;
        if src.remaining() < Self::width() {
            strata_bail!(
                InvalidSerde: "{} value needs {} bytes, {} remain",
                T::NAME,
                Self::width(),
                src.remaining()
            );
        }
        self.values
            .push(T::from_le_slice(&src[..Self::width()]));
        src.advance(Self::width());
        Ok(src)
    }

    fn fnv_hash_at(&self, hash: &mut u32, idx: usize) {
        *hash = fnv_hash(self.values[idx].le_bytes().as_ref(), *hash);
    }

    fn crc32_hash_at(&self, hash: &mut u32, idx: usize) {
        *hash = crc_hash(self.values[idx].le_bytes().as_ref(), *hash);
    }

    fn xor_checksum(&self, from: usize, to: usize) -> i64 {
        self.values[from..to]
            .iter()
            .fold(0, |checksum, value| checksum ^ value.xor_bits())
    }

    fn get(&self, idx: usize) -> StrataResult<Datum> {
        self.values
            .get(idx)
            .map(|value| value.into_datum())
            .ok_or_else(|| strata_err!(OutOfBounds: idx, 0, self.len()))
    }

    fn clone_empty(&self) -> ColumnRef {
        Box::new(Self::new())
    }

    fn clone_column(&self) -> ColumnRef {
        Box::new(self.clone())
    }

    fn swap_column(&mut self, rhs: &mut dyn Column) -> StrataResult<()> {
        let rhs = downcast_column_mut::<Self>(rhs, T::NAME)?;
        std::mem::swap(&mut self.values, &mut rhs.values);
        Ok(())
    }

    fn reset_column(&mut self) {
        self.values.clear();
    }

    fn debug_item(&self, idx: usize) -> String {
        self.values[idx].to_string()
    }

    fn check(&self) -> StrataResult<()> {
        Ok(())
    }

    fn upgrade_if_overflow(&mut self, limits: &ColumnLimits) -> StrataResult<Option<ColumnRef>> {
        if self.len() > limits.max_capacity {
            strata_bail!(CapacityExceeded: self.len(), limits.max_capacity);
        }
        Ok(None)
    }

    fn downgrade(&mut self, _limits: &ColumnLimits) -> StrataResult<Option<ColumnRef>> {
        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hash::FNV_SEED;

    fn ints(values: &[i32]) -> Int32Column {
        Int32Column::from(values.to_vec())
    }

    #[test]
    fn filter_range_keeps_prefix() {
        let mut column = ints(&[1, 2, 3, 4, 5, 6]);
        let kept = column.filter_range(&[0, 0, 1, 0, 1, 1], 2, 6);
        assert_eq!(kept, 5);
        assert_eq!(column.as_slice(), &[1, 2, 3, 5, 6]);
    }

    #[test]
    fn update_rows_validates_before_writing() {
        let mut column = ints(&[1, 2, 3]);
        let err = column.update_rows(&ints(&[7, 8]), &[0, 3]).unwrap_err();
        assert!(err.to_string().starts_with("index 3 out of bounds"));
        assert_eq!(column.as_slice(), &[1, 2, 3]);

        column.update_rows(&ints(&[7, 8]), &[0, 2]).unwrap();
        assert_eq!(column.as_slice(), &[7, 2, 8]);
    }

    #[test]
    fn append_other_kind_is_rejected() {
        let mut column = ints(&[1]);
        let err = column
            .append(&Int64Column::from(vec![1i64]), 0, 1)
            .unwrap_err();
        assert!(
            err.to_string()
                .starts_with("expected type: int32 but instead got int64")
        );
    }

    #[test]
    fn serde_roundtrip_and_truncation() {
        let column = ints(&[-3, 9]);
        let mut buf = vec![0u8; 8];
        assert_eq!(column.serialize(0, &mut buf), 4);
        assert_eq!(column.serialize(1, &mut buf[4..]), 4);

        let mut decoded = Int32Column::new();
        let rest = decoded.deserialize_and_append(&buf).unwrap();
        let rest = decoded.deserialize_and_append(rest).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, column);

        assert!(decoded.deserialize_and_append(&buf[..3]).is_err());
        assert_eq!(decoded.len(), 2);
    }

    #[test]
    fn hash_and_checksum() {
        let column = ints(&[1, 2, 3]);
        let mut hash = FNV_SEED;
        column.fnv_hash_at(&mut hash, 1);
        assert_eq!(hash, fnv_hash(&2i32.to_le_bytes(), FNV_SEED));
        assert_eq!(column.xor_checksum(0, 3), 1 ^ 2 ^ 3);
        assert_eq!(column.xor_checksum(1, 1), 0);
    }

    #[test]
    fn raw_data_is_little_endian() {
        let column = UInt16Column::from(vec![0x0102, 0x0304]);
        assert_eq!(column.raw_data().unwrap(), &[0x02, 0x01, 0x04, 0x03]);
    }

    #[test]
    fn assign_and_resize() {
        let mut column = ints(&[4, 5, 6]);
        column.assign(2, 1).unwrap();
        assert_eq!(column.as_slice(), &[5, 5]);
        column.resize(3);
        assert_eq!(column.as_slice(), &[5, 5, 0]);
        assert!(column.assign(1, 9).is_err());
    }
}
