use std::any::Any;
use std::iter;

use bytes::{Buf, BufMut};
use strata_error::{StrataResult, strata_bail};

use crate::column::{
    Column, ColumnRef, check_range, downcast_column_mut, downgrade_child, upgrade_child,
};
use crate::hash::null_hash;
use crate::{ColumnLimits, Datum, UInt8Column};

/// One byte per row, non-zero where the row is null.
pub type NullColumn = UInt8Column;

const NULL: u8 = 1;
const NOT_NULL: u8 = 0;

/// Wraps a data column with a per-row null flag.
///
/// Null rows still occupy a (default) slot in the data column so that both stay aligned.
#[derive(Clone, Debug)]
pub struct NullableColumn {
    data: ColumnRef,
    nulls: NullColumn,
    has_null: bool,
}

impl NullableColumn {
    /// Wraps a column that has no nulls.
    pub fn wrap(data: ColumnRef) -> Self {
        let nulls = NullColumn::from(vec![NOT_NULL; data.len()]);
        Self {
            data,
            nulls,
            has_null: false,
        }
    }

    pub fn try_new(data: ColumnRef, nulls: NullColumn) -> StrataResult<Self> {
        let has_null = nulls.as_slice().iter().any(|&n| n != NOT_NULL);
        let column = Self {
            data,
            nulls,
            has_null,
        };
        column.check()?;
        Ok(column)
    }

    pub fn data_column(&self) -> &dyn Column {
        self.data.as_ref()
    }

    pub fn data_column_mut(&mut self) -> &mut ColumnRef {
        &mut self.data
    }

    pub fn null_column(&self) -> &NullColumn {
        &self.nulls
    }

    /// Whether any row may be null. Never false while a null row exists.
    pub fn has_null(&self) -> bool {
        self.has_null
    }

    fn update_has_null(&mut self) {
        self.has_null = self.nulls.as_slice().iter().any(|&n| n != NOT_NULL);
    }

    fn push_not_null(&mut self, count: usize) {
        self.nulls
            .as_mut_vec()
            .extend(iter::repeat_n(NOT_NULL, count));
    }
}

impl Column for NullableColumn {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn name(&self) -> String {
        format!("nullable-{}", self.data.name())
    }

    fn len(&self) -> usize {
        self.nulls.len()
    }

    fn capacity(&self) -> usize {
        self.nulls.capacity()
    }

    fn is_nullable(&self) -> bool {
        true
    }

    fn is_null(&self, idx: usize) -> bool {
        self.has_null && self.nulls.value(idx) != NOT_NULL
    }

    fn is_large(&self) -> bool {
        self.data.is_large()
    }

    fn has_large_column(&self) -> bool {
        self.data.has_large_column()
    }

    fn raw_data(&self) -> StrataResult<&[u8]> {
        self.data.raw_data()
    }

    fn reserve(&mut self, rows: usize) {
        self.data.reserve(rows);
        self.nulls.reserve(rows);
    }

    fn resize(&mut self, rows: usize) {
        self.data.resize(rows);
        self.nulls.resize(rows);
    }

    fn assign(&mut self, rows: usize, idx: usize) -> StrataResult<()> {
        self.data.assign(rows, idx)?;
        self.nulls.assign(rows, idx)?;
        self.update_has_null();
        Ok(())
    }

    fn append_datum(&mut self, datum: &Datum) -> StrataResult<()> {
        if datum.is_null() {
            self.append_nulls(1);
            return Ok(());
        }
        self.data.append_datum(datum)?;
        self.nulls.push(NOT_NULL);
        Ok(())
    }

    fn append(&mut self, src: &dyn Column, offset: usize, count: usize) -> StrataResult<()> {
        match src.as_any().downcast_ref::<Self>() {
            Some(src) => {
                check_range(offset, count, src.len())?;
                self.data.append(src.data.as_ref(), offset, count)?;
                self.nulls.append(&src.nulls, offset, count)?;
                self.has_null |= src.has_null;
            }
            None => {
                self.data.append(src, offset, count)?;
                self.push_not_null(count);
            }
        }
        Ok(())
    }

    fn append_selective(
        &mut self,
        src: &dyn Column,
        indexes: &[u32],
        from: usize,
        size: usize,
    ) -> StrataResult<()> {
        match src.as_any().downcast_ref::<Self>() {
            Some(src) => {
                self.data
                    .append_selective(src.data.as_ref(), indexes, from, size)?;
                self.nulls
                    .append_selective(&src.nulls, indexes, from, size)?;
                self.has_null |= src.has_null;
            }
            None => {
                self.data.append_selective(src, indexes, from, size)?;
                self.push_not_null(size);
            }
        }
        Ok(())
    }

    fn append_value_multiple_times(
        &mut self,
        src: &dyn Column,
        index: usize,
        size: usize,
    ) -> StrataResult<()> {
        match src.as_any().downcast_ref::<Self>() {
            Some(src) => {
                self.data
                    .append_value_multiple_times(src.data.as_ref(), index, size)?;
                self.nulls
                    .append_value_multiple_times(&src.nulls, index, size)?;
                self.has_null |= src.is_null(index);
            }
            None => {
                self.data.append_value_multiple_times(src, index, size)?;
                self.push_not_null(size);
            }
        }
        Ok(())
    }

    fn append_nulls(&mut self, count: usize) -> bool {
        self.data.append_default(count);
        self.nulls
            .as_mut_vec()
            .extend(iter::repeat_n(NULL, count));
        self.has_null |= count > 0;
        true
    }

    fn append_default(&mut self, count: usize) {
        self.append_nulls(count);
    }

    fn fill_default(&mut self, filter: &[u8]) -> StrataResult<()> {
        self.data.fill_default(filter)?;
        for (null, &selected) in self.nulls.as_mut_slice().iter_mut().zip(filter) {
            if selected != 0 {
                *null = NULL;
            }
        }
        self.update_has_null();
        Ok(())
    }

    fn update_rows(&mut self, src: &dyn Column, indexes: &[u32]) -> StrataResult<()> {
        match src.as_any().downcast_ref::<Self>() {
            Some(src) => {
                self.data.update_rows(src.data.as_ref(), indexes)?;
                self.nulls.update_rows(&src.nulls, indexes)?;
            }
            None => {
                self.data.update_rows(src, indexes)?;
                let nulls = self.nulls.as_mut_slice();
                for &idx in &indexes[..src.len()] {
                    nulls[idx as usize] = NOT_NULL;
                }
            }
        }
        self.update_has_null();
        Ok(())
    }

    fn filter_range(&mut self, filter: &[u8], from: usize, to: usize) -> usize {
        let kept = self.data.filter_range(filter, from, to);
        let kept_nulls = self.nulls.filter_range(filter, from, to);
        debug_assert_eq!(kept, kept_nulls);
        if self.has_null {
            self.update_has_null();
        }
        kept
    }

    fn byte_size_range(&self, from: usize, size: usize) -> usize {
        self.data.byte_size_range(from, size) + self.nulls.byte_size_range(from, size)
    }

    fn element_memory_usage(&self, from: usize, size: usize) -> usize {
        self.data.element_memory_usage(from, size) + self.nulls.element_memory_usage(from, size)
    }

    fn serialize(&self, idx: usize, dst: &mut [u8]) -> usize {
        if self.is_null(idx) {
            let mut dst = dst;
            dst.put_u8(NULL);
            return 1;
        }
        dst[0] = NOT_NULL;
        1 + self.data.serialize(idx, &mut dst[1..])
    }

    fn serialize_default(&self, dst: &mut [u8]) -> usize {
        let mut dst = dst;
        dst.put_u8(NULL);
        1
    }

    fn serialize_size(&self, idx: usize) -> usize {
        if self.is_null(idx) {
            1
        } else {
            1 + self.data.serialize_size(idx)
        }
    }

    fn deserialize_and_append<'a>(&mut self, src: &'a [u8]) -> StrataResult<&'a [u8]> {
        let mut src = src;
        if !src.has_remaining() {
            strata_bail!(InvalidSerde: "nullable row needs a null flag, no bytes remain");
        }
        if src.get_u8() != NOT_NULL {
            self.append_nulls(1);
            return Ok(src);
        }
        let rest = self.data.deserialize_and_append(src)?;
        self.nulls.push(NOT_NULL);
        Ok(rest)
    }

    fn fnv_hash_at(&self, hash: &mut u32, idx: usize) {
        if self.is_null(idx) {
            *hash = null_hash(*hash);
        } else {
            self.data.fnv_hash_at(hash, idx);
        }
    }

    fn crc32_hash_at(&self, hash: &mut u32, idx: usize) {
        if self.is_null(idx) {
            *hash = null_hash(*hash);
        } else {
            self.data.crc32_hash_at(hash, idx);
        }
    }

    fn fnv_hash(&self, hashes: &mut [u32], from: usize, to: usize) {
        if !self.has_null {
            return self.data.fnv_hash(hashes, from, to);
        }
        for (idx, hash) in hashes.iter_mut().enumerate().take(to).skip(from) {
            self.fnv_hash_at(hash, idx);
        }
    }

    fn crc32_hash(&self, hashes: &mut [u32], from: usize, to: usize) {
        if !self.has_null {
            return self.data.crc32_hash(hashes, from, to);
        }
        for (idx, hash) in hashes.iter_mut().enumerate().take(to).skip(from) {
            self.crc32_hash_at(hash, idx);
        }
    }

    fn xor_checksum(&self, from: usize, to: usize) -> i64 {
        if !self.has_null {
            return self.data.xor_checksum(from, to);
        }
        let mut checksum = 0i64;
        for idx in from..to {
            let null = self.nulls.value(idx);
            checksum ^= i64::from(null);
            if null == NOT_NULL {
                checksum ^= self.data.xor_checksum(idx, idx + 1);
            }
        }
        checksum
    }

    fn get(&self, idx: usize) -> StrataResult<Datum> {
        if idx >= self.len() {
            strata_bail!(OutOfBounds: idx, 0, self.len());
        }
        if self.is_null(idx) {
            return Ok(Datum::Null);
        }
        self.data.get(idx)
    }

    fn clone_empty(&self) -> ColumnRef {
        Box::new(Self::wrap(self.data.clone_empty()))
    }

    fn clone_column(&self) -> ColumnRef {
        Box::new(self.clone())
    }

    fn swap_column(&mut self, rhs: &mut dyn Column) -> StrataResult<()> {
        let rhs = downcast_column_mut::<Self>(rhs, "nullable")?;
        std::mem::swap(self, rhs);
        Ok(())
    }

    fn reset_column(&mut self) {
        self.data.reset_column();
        self.nulls.reset_column();
        self.has_null = false;
    }

    fn debug_item(&self, idx: usize) -> String {
        if self.is_null(idx) {
            "NULL".to_string()
        } else {
            self.data.debug_item(idx)
        }
    }

    fn check(&self) -> StrataResult<()> {
        if self.data.len() != self.nulls.len() {
            strata_bail!(
                AssertionFailed: "nullable column has {} data rows but {} null flags",
                self.data.len(),
                self.nulls.len()
            );
        }
        if !self.has_null && self.nulls.as_slice().iter().any(|&n| n != NOT_NULL) {
            strata_bail!(AssertionFailed: "nullable column holds nulls but has_null is unset");
        }
        self.data.check()
    }

    fn upgrade_if_overflow(&mut self, limits: &ColumnLimits) -> StrataResult<Option<ColumnRef>> {
        if self.nulls.len() > limits.max_capacity {
            strata_bail!(CapacityExceeded: self.nulls.len(), limits.max_capacity);
        }
        upgrade_child(&mut self.data, limits)?;
        Ok(None)
    }

    fn downgrade(&mut self, limits: &ColumnLimits) -> StrataResult<Option<ColumnRef>> {
        downgrade_child(&mut self.data, limits)?;
        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hash::{FNV_SEED, NULL_HASH_SEED};
    use crate::{BinaryColumn, Int32Column};

    fn nullable_ints(values: &[Option<i32>]) -> NullableColumn {
        let mut column = NullableColumn::wrap(Box::new(Int32Column::new()));
        for value in values {
            column.append_datum(&Datum::from(*value)).unwrap();
        }
        column
    }

    #[test]
    fn nulls_keep_data_aligned() {
        let column = nullable_ints(&[Some(1), None, Some(3)]);
        assert_eq!(column.data_column().len(), 3);
        assert!(column.has_null());
        assert!(column.is_null(1));
        assert_eq!(column.get(1).unwrap(), Datum::Null);
        assert_eq!(column.debug_string(), "[1, NULL, 3]");
        column.check().unwrap();
    }

    #[test]
    fn filter_drops_nulls() {
        let mut column = nullable_ints(&[Some(1), None, Some(3)]);
        assert_eq!(column.filter(&[1, 0, 1]), 2);
        assert!(!column.has_null());
        assert_eq!(column.debug_string(), "[1, 3]");
    }

    #[test]
    fn append_plain_column() {
        let mut column = nullable_ints(&[None]);
        column
            .append(&Int32Column::from(vec![5, 6]), 0, 2)
            .unwrap();
        assert_eq!(column.debug_string(), "[NULL, 5, 6]");
    }

    #[test]
    fn update_rows_clears_nulls() {
        let mut column = nullable_ints(&[None, Some(2), None]);
        column
            .update_rows(&nullable_ints(&[Some(7), Some(9)]), &[0, 2])
            .unwrap();
        assert_eq!(column.debug_string(), "[7, 2, 9]");
        assert!(!column.has_null());
    }

    #[test]
    fn serde_null_flag() {
        let column = nullable_ints(&[None, Some(4)]);
        let mut buf = vec![0u8; column.serialize_size(0) + column.serialize_size(1)];
        let written = column.serialize(0, &mut buf);
        assert_eq!(written, 1);
        assert_eq!(column.serialize(1, &mut buf[written..]), 5);

        let mut decoded = nullable_ints(&[]);
        let rest = decoded.deserialize_and_append(&buf).unwrap();
        decoded.deserialize_and_append(rest).unwrap();
        assert_eq!(decoded.debug_string(), "[NULL, 4]");

        assert!(decoded.deserialize_and_append(&[]).is_err());
        assert!(decoded.deserialize_and_append(&[0, 1]).is_err());
        assert_eq!(decoded.len(), 2);
        decoded.check().unwrap();
    }

    #[test]
    fn null_hash_combines() {
        let column = nullable_ints(&[None]);
        let mut hash = 0;
        column.fnv_hash_at(&mut hash, 0);
        assert_eq!(hash, NULL_HASH_SEED);

        let mut hashes = [FNV_SEED];
        column.crc32_hash(&mut hashes, 0, 1);
        assert_eq!(hashes[0], null_hash(FNV_SEED));
    }

    #[test]
    fn upgrade_replaces_data_in_place() {
        let mut column =
            NullableColumn::wrap(Box::new(BinaryColumn::from_values(["abcdef"])));
        let limits = ColumnLimits::default().with_max_large_capacity(4);
        assert!(column.upgrade_if_overflow(&limits).unwrap().is_none());
        assert!(column.has_large_column());
        assert_eq!(column.debug_string(), "['abcdef']");
    }
}
