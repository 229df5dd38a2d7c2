//! A column whose rows are key/value maps.
//!
//! Row `i` owns the elements `[offsets[i], offsets[i + 1])` of two parallel, nullable child
//! columns holding the keys and the values. Rows are not deduplicated by key; when a row is
//! materialized the last occurrence of a key wins.

mod filter;
mod hash;
mod mutate;
mod overflow;
mod serde;
mod update;

use std::any::Any;
use std::ops::Range;

pub use filter::FilterKernel;
use itertools::Itertools;
use strata_error::{StrataResult, strata_bail};

use crate::column::{downcast_column, downcast_column_mut};
use crate::{
    Column, ColumnLimits, ColumnRef, Datum, DatumKey, DatumMap, NullableColumn, UInt32Column,
};

#[derive(Clone, Debug)]
pub struct MapColumn {
    keys: ColumnRef,
    values: ColumnRef,
    // Always holds `len + 1` entries, the first being zero.
    offsets: UInt32Column,
}

fn ensure_nullable(column: ColumnRef) -> ColumnRef {
    if column.is_nullable() {
        column
    } else {
        Box::new(NullableColumn::wrap(column))
    }
}

impl MapColumn {
    /// Creates a map column over existing children. Empty `offsets` describe zero rows.
    pub fn try_new(keys: ColumnRef, values: ColumnRef, offsets: UInt32Column) -> StrataResult<Self> {
        let mut offsets = offsets;
        if offsets.is_empty() {
            offsets.push(0);
        }
        let column = Self {
            keys,
            values,
            offsets,
        };
        column.check()?;
        Ok(column)
    }

    /// Creates an empty map column, wrapping children that are not already nullable.
    pub fn empty(keys: ColumnRef, values: ColumnRef) -> StrataResult<Self> {
        Self::try_new(
            ensure_nullable(keys),
            ensure_nullable(values),
            UInt32Column::new(),
        )
    }

    pub fn keys(&self) -> &dyn Column {
        self.keys.as_ref()
    }

    pub fn values(&self) -> &dyn Column {
        self.values.as_ref()
    }

    pub fn offsets(&self) -> &UInt32Column {
        &self.offsets
    }

    /// Mutable access to the keys. Callers must keep its length equal to the last offset.
    pub fn keys_mut(&mut self) -> &mut ColumnRef {
        &mut self.keys
    }

    /// Mutable access to the values. Callers must keep its length equal to the last offset.
    pub fn values_mut(&mut self) -> &mut ColumnRef {
        &mut self.values
    }

    /// Number of key/value pairs in row `idx`.
    #[inline]
    pub fn map_size(&self, idx: usize) -> usize {
        let offsets = self.offsets.as_slice();
        (offsets[idx + 1] - offsets[idx]) as usize
    }

    /// Element range owned by row `idx`.
    #[inline]
    pub fn element_range(&self, idx: usize) -> Range<usize> {
        let offsets = self.offsets.as_slice();
        offsets[idx] as usize..offsets[idx + 1] as usize
    }

    /// Element range owned by rows `[from, to)`.
    #[inline]
    fn elements_of(&self, from: usize, to: usize) -> Range<usize> {
        let offsets = self.offsets.as_slice();
        offsets[from] as usize..offsets[to] as usize
    }

    #[inline]
    fn last_offset(&self) -> u32 {
        self.offsets.last().unwrap_or(0)
    }

    /// A map column with the same child kinds and no rows.
    pub fn clone_empty_map(&self) -> Self {
        Self {
            keys: self.keys.clone_empty(),
            values: self.values.clone_empty(),
            offsets: UInt32Column::from(vec![0]),
        }
    }

    fn check_row(&self, idx: usize) -> StrataResult<()> {
        if idx >= self.len() {
            strata_bail!(OutOfBounds: idx, 0, self.len());
        }
        Ok(())
    }

    fn get_map(&self, idx: usize) -> StrataResult<DatumMap> {
        self.check_row(idx)?;
        let mut map = DatumMap::new();
        for element in self.element_range(idx) {
            if self.keys.is_null(element) {
                continue;
            }
            let key = DatumKey::try_from(self.keys.get(element)?)?;
            map.insert(key, self.values.get(element)?);
        }
        Ok(map)
    }
}

impl Column for MapColumn {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn name(&self) -> String {
        "map".to_string()
    }

    fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    fn capacity(&self) -> usize {
        self.offsets.capacity().saturating_sub(1)
    }

    fn has_large_column(&self) -> bool {
        self.keys.has_large_column() || self.values.has_large_column()
    }

    fn raw_data(&self) -> StrataResult<&[u8]> {
        strata_bail!(NotImplemented: "raw_data", self.name())
    }

    fn reserve(&mut self, rows: usize) {
        self.offsets.reserve(rows + 1);
    }

    fn resize(&mut self, rows: usize) {
        self.resize_rows(rows);
    }

    fn assign(&mut self, rows: usize, idx: usize) -> StrataResult<()> {
        self.assign_row(rows, idx)
    }

    fn append_datum(&mut self, datum: &Datum) -> StrataResult<()> {
        self.append_map_datum(datum)
    }

    fn append(&mut self, src: &dyn Column, offset: usize, count: usize) -> StrataResult<()> {
        self.append_range(downcast_column::<Self>(src, "map")?, offset, count)
    }

    fn append_selective(
        &mut self,
        src: &dyn Column,
        indexes: &[u32],
        from: usize,
        size: usize,
    ) -> StrataResult<()> {
        self.append_indexes(downcast_column::<Self>(src, "map")?, indexes, from, size)
    }

    fn append_value_multiple_times(
        &mut self,
        src: &dyn Column,
        index: usize,
        size: usize,
    ) -> StrataResult<()> {
        self.append_repeated(downcast_column::<Self>(src, "map")?, index, size)
    }

    fn append_nulls(&mut self, count: usize) -> bool {
        self.append_empty_rows(count);
        true
    }

    fn append_default(&mut self, count: usize) {
        self.append_empty_rows(count);
    }

    fn fill_default(&mut self, filter: &[u8]) -> StrataResult<()> {
        self.fill_empty(filter)
    }

    fn update_rows(&mut self, src: &dyn Column, indexes: &[u32]) -> StrataResult<()> {
        self.update_map_rows(downcast_column::<Self>(src, "map")?, indexes)
    }

    fn filter_range(&mut self, filter: &[u8], from: usize, to: usize) -> usize {
        self.filter_range_with(filter, from, to, FilterKernel::detect())
    }

    fn byte_size_range(&self, from: usize, size: usize) -> usize {
        let elements = self.elements_of(from, from + size);
        self.keys.byte_size_range(elements.start, elements.len())
            + self.values.byte_size_range(elements.start, elements.len())
            + self.offsets.byte_size_range(from, size)
    }

    fn element_memory_usage(&self, from: usize, size: usize) -> usize {
        let elements = self.elements_of(from, from + size);
        self.keys.element_memory_usage(elements.start, elements.len())
            + self.values.element_memory_usage(elements.start, elements.len())
            + self.offsets.element_memory_usage(from, size)
    }

    fn serialize(&self, idx: usize, dst: &mut [u8]) -> usize {
        self.serialize_row(idx, dst)
    }

    fn serialize_default(&self, dst: &mut [u8]) -> usize {
        self.serialize_empty_row(dst)
    }

    fn serialize_size(&self, idx: usize) -> usize {
        self.row_serialize_size(idx)
    }

    fn deserialize_and_append<'a>(&mut self, src: &'a [u8]) -> StrataResult<&'a [u8]> {
        self.deserialize_row(src)
    }

    fn fnv_hash_at(&self, hash: &mut u32, idx: usize) {
        self.fnv_hash_row(hash, idx);
    }

    fn crc32_hash_at(&self, hash: &mut u32, idx: usize) {
        self.crc32_hash_row(hash, idx);
    }

    fn xor_checksum(&self, from: usize, to: usize) -> i64 {
        self.xor_checksum_rows(from, to)
    }

    fn get(&self, idx: usize) -> StrataResult<Datum> {
        self.get_map(idx).map(Datum::Map)
    }

    fn clone_empty(&self) -> ColumnRef {
        Box::new(self.clone_empty_map())
    }

    fn clone_column(&self) -> ColumnRef {
        Box::new(self.clone())
    }

    fn swap_column(&mut self, rhs: &mut dyn Column) -> StrataResult<()> {
        let rhs = downcast_column_mut::<Self>(rhs, "map")?;
        std::mem::swap(self, rhs);
        Ok(())
    }

    fn reset_column(&mut self) {
        self.offsets.reset_column();
        self.offsets.push(0);
        self.keys.reset_column();
        self.values.reset_column();
    }

    fn debug_item(&self, idx: usize) -> String {
        format!(
            "{{{}}}",
            self.element_range(idx)
                .map(|element| format!(
                    "{}:{}",
                    self.keys.debug_item(element),
                    self.values.debug_item(element)
                ))
                .join(",")
        )
    }

    fn check(&self) -> StrataResult<()> {
        let offsets = self.offsets.as_slice();
        if offsets.first() != Some(&0) {
            strata_bail!(AssertionFailed: "map offsets must start with a zero entry");
        }
        if !offsets.is_sorted() {
            strata_bail!(AssertionFailed: "map offsets must be non-decreasing");
        }
        let elements = self.last_offset() as usize;
        if self.keys.len() != elements || self.values.len() != elements {
            strata_bail!(
                AssertionFailed: "map offsets cover {} elements but there are {} keys and {} values",
                elements,
                self.keys.len(),
                self.values.len()
            );
        }
        if !self.keys.is_nullable() || !self.values.is_nullable() {
            strata_bail!(
                AssertionFailed: "map children must be nullable, got {} and {}",
                self.keys.name(),
                self.values.name()
            );
        }
        self.keys.check()?;
        self.values.check()
    }

    fn upgrade_if_overflow(&mut self, limits: &ColumnLimits) -> StrataResult<Option<ColumnRef>> {
        self.upgrade_children(limits)
    }

    fn downgrade(&mut self, limits: &ColumnLimits) -> StrataResult<Option<ColumnRef>> {
        self.downgrade_children(limits)
    }
}
