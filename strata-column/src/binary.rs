use std::any::Any;
use std::ops::Range;

use bytes::{Buf, BufMut, Bytes};
use num_traits::{AsPrimitive, NumCast, PrimInt};
use strata_error::{StrataExpect, StrataResult, strata_bail, strata_err};

use crate::column::{check_range, check_update_indexes, downcast_column_mut};
use crate::hash::{crc_hash, fnv_hash};
use crate::{Column, ColumnLimits, ColumnRef, Datum, NativeType};

/// Width of the length prefix in the row encoding.
const LENGTH_WIDTH: usize = size_of::<u32>();

/// An offset type for [`BinaryColumnBase`].
pub trait BinaryOffset: NativeType + PrimInt + AsPrimitive<usize> {
    const IS_LARGE: bool;
}

impl BinaryOffset for u32 {
    const IS_LARGE: bool = false;
}

impl BinaryOffset for u64 {
    const IS_LARGE: bool = true;
}

/// Variable-length byte strings stored back to back, delimited by `len + 1` offsets.
#[derive(Clone, Debug, PartialEq)]
pub struct BinaryColumnBase<O: BinaryOffset> {
    bytes: Vec<u8>,
    offsets: Vec<O>,
}

/// Binary column addressing up to 4GiB of payload.
pub type BinaryColumn = BinaryColumnBase<u32>;
/// Binary column with 64-bit offsets.
pub type LargeBinaryColumn = BinaryColumnBase<u64>;

impl<O: BinaryOffset> Default for BinaryColumnBase<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: BinaryOffset> BinaryColumnBase<O> {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            offsets: vec![O::zero()],
        }
    }

    pub fn from_values<V: AsRef<[u8]>>(values: impl IntoIterator<Item = V>) -> Self {
        let mut column = Self::new();
        for value in values {
            column.push(value.as_ref());
        }
        column
    }

    #[inline]
    pub fn value(&self, idx: usize) -> &[u8] {
        &self.bytes[self.value_range(idx)]
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn offsets(&self) -> &[O] {
        &self.offsets
    }

    #[inline]
    fn value_range(&self, idx: usize) -> Range<usize> {
        self.offsets[idx].as_()..self.offsets[idx + 1].as_()
    }

    fn offset_from(len: usize) -> O {
        <O as NumCast>::from(len).strata_expect("binary payload exceeds the offset width; upgrade the column")
    }

    pub fn push(&mut self, value: &[u8]) {
        self.bytes.extend_from_slice(value);
        self.offsets.push(Self::offset_from(self.bytes.len()));
    }

    fn push_empty(&mut self, count: usize) {
        let last = self.last_offset();
        self.offsets
            .extend(std::iter::repeat_n(last, count));
    }

    fn last_offset(&self) -> O {
        self.offsets.last().copied().unwrap_or_else(O::zero)
    }

    /// Re-encodes the offsets with another width. Fails if the payload does not fit it.
    fn convert<P: BinaryOffset>(&mut self) -> StrataResult<BinaryColumnBase<P>> {
        let offsets = self
            .offsets
            .iter()
            .map(|offset| {
                <P as NumCast>::from(offset.as_()).ok_or_else(
                    || strata_err!(CapacityExceeded: offset.as_(), P::max_value().as_()),
                )
            })
            .collect::<StrataResult<Vec<P>>>()?;
        let bytes = std::mem::take(&mut self.bytes);
        self.offsets = vec![O::zero()];
        Ok(BinaryColumnBase { bytes, offsets })
    }

    /// Rebuilds the column row by row, taking each row from `pick` or from self.
    fn rebuild_with(&mut self, mut pick: impl FnMut(usize, &[u8]) -> Option<Vec<u8>>) {
        let mut rebuilt = Self::new();
        rebuilt.bytes.reserve(self.bytes.len());
        rebuilt.offsets.reserve(self.offsets.len());
        for idx in 0..self.len() {
            let value = self.value(idx);
            match pick(idx, value) {
                Some(replacement) => rebuilt.push(&replacement),
                None => rebuilt.push(value),
            }
        }
        *self = rebuilt;
    }
}

/// A binary column of either offset width, read through `usize` offsets. Appends and updates
/// take their source through this, so either width is accepted.
#[derive(Clone, Copy)]
enum BinarySource<'a> {
    Narrow(&'a BinaryColumn),
    Wide(&'a LargeBinaryColumn),
}

impl<'a> BinarySource<'a> {
    fn downcast(column: &'a dyn Column, expected: &str) -> StrataResult<Self> {
        let any = column.as_any();
        if let Some(narrow) = any.downcast_ref::<BinaryColumn>() {
            return Ok(Self::Narrow(narrow));
        }
        any.downcast_ref::<LargeBinaryColumn>()
            .map(Self::Wide)
            .ok_or_else(|| strata_err!(MismatchedTypes: expected, column.name()))
    }

    fn len(self) -> usize {
        match self {
            Self::Narrow(column) => column.len(),
            Self::Wide(column) => column.len(),
        }
    }

    fn offset(self, idx: usize) -> usize {
        match self {
            Self::Narrow(column) => column.offsets[idx].as_(),
            Self::Wide(column) => column.offsets[idx].as_(),
        }
    }

    fn bytes(self) -> &'a [u8] {
        match self {
            Self::Narrow(column) => &column.bytes,
            Self::Wide(column) => &column.bytes,
        }
    }

    fn value(self, idx: usize) -> &'a [u8] {
        &self.bytes()[self.offset(idx)..self.offset(idx + 1)]
    }
}

impl<O: BinaryOffset> Column for BinaryColumnBase<O> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn name(&self) -> String {
        if O::IS_LARGE {
            "large-binary".to_string()
        } else {
            "binary".to_string()
        }
    }

    fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    fn capacity(&self) -> usize {
        self.offsets.capacity().saturating_sub(1)
    }

    fn is_large(&self) -> bool {
        O::IS_LARGE
    }

    fn raw_data(&self) -> StrataResult<&[u8]> {
        Ok(&self.bytes)
    }

    fn reserve(&mut self, rows: usize) {
        self.offsets
            .reserve((rows + 1).saturating_sub(self.offsets.len()));
    }

    fn resize(&mut self, rows: usize) {
        if rows <= self.len() {
            self.offsets.truncate(rows + 1);
            let end = self.last_offset().as_();
            self.bytes.truncate(end);
        } else {
            self.push_empty(rows - self.len());
        }
    }

    fn assign(&mut self, rows: usize, idx: usize) -> StrataResult<()> {
        if idx >= self.len() {
            strata_bail!(OutOfBounds: idx, 0, self.len());
        }
        let value = self.value(idx).to_vec();
        self.reset_column();
        self.bytes.reserve(value.len() * rows);
        for _ in 0..rows {
            self.push(&value);
        }
        Ok(())
    }

    fn append_datum(&mut self, datum: &Datum) -> StrataResult<()> {
        let Datum::Binary(value) = datum else {
            strata_bail!(MismatchedTypes: self.name(), datum.type_name());
        };
        self.push(value);
        Ok(())
    }

    fn append(&mut self, src: &dyn Column, offset: usize, count: usize) -> StrataResult<()> {
        let src = BinarySource::downcast(src, &self.name())?;
        check_range(offset, count, src.len())?;
        let start = src.offset(offset);
        let end = src.offset(offset + count);
        let last = self.last_offset().as_();
        self.bytes.extend_from_slice(&src.bytes()[start..end]);

        self.offsets.reserve(count);
        for idx in offset + 1..=offset + count {
            self.offsets
                .push(Self::offset_from(last + src.offset(idx) - start));
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
        let src = BinarySource::downcast(src, &self.name())?;
        check_range(from, size, indexes.len())?;
        let indexes = &indexes[from..from + size];
        if let Some(&bad) = indexes.iter().find(|&&idx| idx as usize >= src.len()) {
            strata_bail!(OutOfBounds: bad as usize, 0, src.len());
        }
        for &idx in indexes {
            self.push(src.value(idx as usize));
        }
        Ok(())
    }

    fn append_value_multiple_times(
        &mut self,
        src: &dyn Column,
        index: usize,
        size: usize,
    ) -> StrataResult<()> {
        let src = BinarySource::downcast(src, &self.name())?;
        if index >= src.len() {
            strata_bail!(OutOfBounds: index, 0, src.len());
        }
        let value = src.value(index);
        for _ in 0..size {
            self.push(value);
        }
        Ok(())
    }

    fn append_nulls(&mut self, _count: usize) -> bool {
        false
    }

    fn append_default(&mut self, count: usize) {
        self.push_empty(count);
    }

    fn fill_default(&mut self, filter: &[u8]) -> StrataResult<()> {
        if filter.iter().take(self.len()).all(|&f| f == 0) {
            return Ok(());
        }
        self.rebuild_with(|idx, _| (filter.get(idx).is_some_and(|&f| f != 0)).then(Vec::new));
        Ok(())
    }

    fn update_rows(&mut self, src: &dyn Column, indexes: &[u32]) -> StrataResult<()> {
        let src = BinarySource::downcast(src, &self.name())?;
        if indexes.len() < src.len() {
            strata_bail!(
                "{} rows need as many update indexes, got {}",
                src.len(),
                indexes.len()
            );
        }
        let indexes = &indexes[..src.len()];
        check_update_indexes(indexes, self.len())?;

        let mut next = 0;
        self.rebuild_with(|idx, _| {
            (indexes.get(next).map(|&i| i as usize) == Some(idx)).then(|| {
                next += 1;
                src.value(next - 1).to_vec()
            })
        });
        Ok(())
    }

    fn filter_range(&mut self, filter: &[u8], from: usize, to: usize) -> usize {
        let mut result = from;
        let mut write = self.offsets[from].as_();
        for i in from..to {
            if filter[i] != 0 {
                let range = self.value_range(i);
                let len = range.len();
                self.bytes.copy_within(range, write);
                write += len;
                self.offsets[result + 1] = Self::offset_from(write);
                result += 1;
            }
        }
        self.offsets.truncate(result + 1);
        self.bytes.truncate(write);
        result
    }

    fn byte_size_range(&self, from: usize, size: usize) -> usize {
        let payload = self.offsets[from + size].as_() - self.offsets[from].as_();
        payload + size * size_of::<O>()
    }

    fn element_memory_usage(&self, from: usize, size: usize) -> usize {
        self.byte_size_range(from, size)
    }

    fn serialize(&self, idx: usize, dst: &mut [u8]) -> usize {
        let value = self.value(idx);
        let mut dst = dst;
        dst.put_u32_le(u32::try_from(value.len()).ok().strata_expect("binary row exceeds u32"));
        dst.put_slice(value);
        LENGTH_WIDTH + value.len()
    }

    fn serialize_default(&self, dst: &mut [u8]) -> usize {
        let mut dst = dst;
        dst.put_u32_le(0);
        LENGTH_WIDTH
    }

    fn serialize_size(&self, idx: usize) -> usize {
        LENGTH_WIDTH + self.value_range(idx).len()
    }

    fn deserialize_and_append<'a>(&mut self, src: &'a [u8]) -> StrataResult<&'a [u8]> {
        let mut src = src;
        if src.remaining() < LENGTH_WIDTH {
            strata_bail!(InvalidSerde: "binary row needs a {} byte length, {} remain", LENGTH_WIDTH, src.remaining());
        }
        let len = src.get_u32_le() as usize;
        if src.remaining() < len {
            strata_bail!(InvalidSerde: "binary row needs {} bytes, {} remain", len, src.remaining());
        }
        self.push(&src[..len]);
        src.advance(len);
        Ok(src)
    }

    fn fnv_hash_at(&self, hash: &mut u32, idx: usize) {
        *hash = fnv_hash(self.value(idx), *hash);
    }

    fn crc32_hash_at(&self, hash: &mut u32, idx: usize) {
        *hash = crc_hash(self.value(idx), *hash);
    }

    fn xor_checksum(&self, from: usize, to: usize) -> i64 {
        let mut checksum = 0i64;
        for idx in from..to {
            for chunk in self.value(idx).chunks(size_of::<i64>()) {
                let mut word = [0u8; size_of::<i64>()];
                word[..chunk.len()].copy_from_slice(chunk);
                checksum ^= i64::from_le_bytes(word);
            }
        }
        checksum
    }

    fn get(&self, idx: usize) -> StrataResult<Datum> {
        if idx >= self.len() {
            strata_bail!(OutOfBounds: idx, 0, self.len());
        }
        Ok(Datum::Binary(Bytes::copy_from_slice(self.value(idx))))
    }

    fn clone_empty(&self) -> ColumnRef {
        Box::new(Self::new())
    }

    fn clone_column(&self) -> ColumnRef {
        Box::new(self.clone())
    }

    fn swap_column(&mut self, rhs: &mut dyn Column) -> StrataResult<()> {
        let rhs = downcast_column_mut::<Self>(rhs, &self.name())?;
        std::mem::swap(self, rhs);
        Ok(())
    }

    fn reset_column(&mut self) {
        self.bytes.clear();
        self.offsets.clear();
        self.offsets.push(O::zero());
    }

    fn debug_item(&self, idx: usize) -> String {
        format!("'{}'", String::from_utf8_lossy(self.value(idx)))
    }

    fn check(&self) -> StrataResult<()> {
        if self.offsets.first() != Some(&O::zero()) {
            strata_bail!(AssertionFailed: "binary offsets must start at zero");
        }
        if !self.offsets.is_sorted() {
            strata_bail!(AssertionFailed: "binary offsets must be non-decreasing");
        }
        if self.last_offset().as_() != self.bytes.len() {
            strata_bail!(
                AssertionFailed: "last binary offset {} does not match {} payload bytes",
                self.last_offset(),
                self.bytes.len()
            );
        }
        Ok(())
    }

    fn upgrade_if_overflow(&mut self, limits: &ColumnLimits) -> StrataResult<Option<ColumnRef>> {
        if self.offsets.len() > limits.max_capacity {
            strata_bail!(CapacityExceeded: self.offsets.len(), limits.max_capacity);
        }
        if O::IS_LARGE || self.bytes.len() < limits.max_large_capacity {
            return Ok(None);
        }
        log::debug!(
            "upgrading binary column of {} bytes to 64-bit offsets",
            self.bytes.len()
        );
        Ok(Some(Box::new(self.convert::<u64>()?)))
    }

    fn downgrade(&mut self, limits: &ColumnLimits) -> StrataResult<Option<ColumnRef>> {
        if !O::IS_LARGE || self.bytes.len() >= limits.max_large_capacity {
            return Ok(None);
        }
        log::debug!(
            "downgrading binary column of {} bytes to 32-bit offsets",
            self.bytes.len()
        );
        Ok(Some(Box::new(self.convert::<u32>()?)))
    }
}
