use std::any::Any;
use std::fmt::Debug;

use itertools::Itertools;
use strata_error::{StrataExpect, StrataResult, strata_err, strata_panic};
use strata_mask::Mask;

use crate::{ColumnLimits, Datum};

/// An owned, type-erased column.
pub type ColumnRef = Box<dyn Column>;

/// A byte-per-row selection vector. Any non-zero byte keeps its row.
pub type Filter = Vec<u8>;

/// The contract every in-memory column implements.
///
/// Row indices are positions in `[0, len)`. Operations that take a second column require it to be
/// of the same concrete kind and report [`MismatchedTypes`](strata_error::StrataError) otherwise.
/// Binary columns of either offset width count as the same kind.
pub trait Column: Debug + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn name(&self) -> String;

    /// Number of rows.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of rows the column can hold without reallocating.
    fn capacity(&self) -> usize;

    fn is_nullable(&self) -> bool {
        false
    }

    fn is_null(&self, _idx: usize) -> bool {
        false
    }

    /// Whether this column itself uses 64-bit offsets.
    fn is_large(&self) -> bool {
        false
    }

    /// Whether this column or any column nested inside it uses 64-bit offsets.
    fn has_large_column(&self) -> bool {
        self.is_large()
    }

    /// The contiguous value bytes backing the column, for kinds that have them.
    fn raw_data(&self) -> StrataResult<&[u8]>;

    /// Ensures capacity for at least `rows` rows in total.
    fn reserve(&mut self, rows: usize);

    /// Truncates or pads the column to exactly `rows` rows. Padding rows hold default values.
    fn resize(&mut self, rows: usize);

    /// Replaces the contents with `rows` copies of row `idx`.
    fn assign(&mut self, rows: usize, idx: usize) -> StrataResult<()>;

    fn append_datum(&mut self, datum: &Datum) -> StrataResult<()>;

    fn append_datum_multiple_times(&mut self, datum: &Datum, count: usize) -> StrataResult<()> {
        for _ in 0..count {
            self.append_datum(datum)?;
        }
        Ok(())
    }

    /// Appends rows `[offset, offset + count)` of `src`.
    fn append(&mut self, src: &dyn Column, offset: usize, count: usize) -> StrataResult<()>;

    /// Appends the rows of `src` named by `indexes[from..from + size]`, in that order.
    fn append_selective(
        &mut self,
        src: &dyn Column,
        indexes: &[u32],
        from: usize,
        size: usize,
    ) -> StrataResult<()>;

    /// Appends row `index` of `src` `size` times.
    fn append_value_multiple_times(
        &mut self,
        src: &dyn Column,
        index: usize,
        size: usize,
    ) -> StrataResult<()>;

    /// Appends `count` null rows. Returns false, leaving the column untouched, if this kind
    /// cannot represent null.
    fn append_nulls(&mut self, count: usize) -> bool;

    fn append_default(&mut self, count: usize);

    /// Resets every row whose filter byte is non-zero to the default value.
    fn fill_default(&mut self, filter: &[u8]) -> StrataResult<()>;

    /// Overwrites rows `indexes[i]` with row `i` of `src`, for every row of `src`.
    ///
    /// `indexes` must be strictly increasing and hold at least `src.len()` entries.
    fn update_rows(&mut self, src: &dyn Column, indexes: &[u32]) -> StrataResult<()>;

    /// Compacts the rows in `[from, to)` selected by `filter[from..to]` towards `from`, drops every
    /// row from `to` onwards, and returns the new row count.
    fn filter_range(&mut self, filter: &[u8], from: usize, to: usize) -> usize;

    fn filter(&mut self, filter: &[u8]) -> usize {
        let to = self.len();
        self.filter_range(filter, 0, to)
    }

    /// Filters the column by a [`Mask`], skipping the per-row work for uniform masks.
    fn filter_mask(&mut self, mask: &Mask) -> StrataResult<usize> {
        if mask.len() != self.len() {
            return Err(strata_err!(
                "mask of length {} cannot filter {} rows",
                mask.len(),
                self.len()
            ));
        }
        if mask.all_true() {
            return Ok(self.len());
        }
        if mask.all_false() {
            self.resize(0);
            return Ok(0);
        }
        Ok(self.filter(&mask.to_filter()))
    }

    /// Bytes of payload held by rows `[from, from + size)`.
    fn byte_size_range(&self, from: usize, size: usize) -> usize;

    fn byte_size(&self) -> usize {
        self.byte_size_range(0, self.len())
    }

    fn byte_size_at(&self, idx: usize) -> usize {
        self.byte_size_range(idx, 1)
    }

    /// Bytes of memory attributable to rows `[from, from + size)`.
    fn element_memory_usage(&self, from: usize, size: usize) -> usize;

    /// Writes row `idx` to the front of `dst` and returns the number of bytes written.
    ///
    /// `dst` must have room for at least [`serialize_size(idx)`](Column::serialize_size) bytes.
    fn serialize(&self, idx: usize, dst: &mut [u8]) -> usize;

    /// Writes the encoding of a default row and returns the number of bytes written.
    fn serialize_default(&self, dst: &mut [u8]) -> usize;

    fn serialize_size(&self, idx: usize) -> usize;

    fn max_one_element_serialize_size(&self) -> usize {
        (0..self.len())
            .map(|idx| self.serialize_size(idx))
            .max()
            .unwrap_or(0)
    }

    /// Serializes rows `[0, chunk_size)` into a row-major buffer with a stride of
    /// `max_one_row_size` bytes.
    ///
    /// Row `i` is appended at `i * max_one_row_size + slice_sizes[i]`, after whatever earlier
    /// columns already wrote for that row, and `slice_sizes[i]` grows by the bytes written.
    fn serialize_batch(
        &self,
        dst: &mut [u8],
        slice_sizes: &mut [u32],
        chunk_size: usize,
        max_one_row_size: usize,
    ) {
        for (i, slice_size) in slice_sizes.iter_mut().enumerate().take(chunk_size) {
            let row_start = i * max_one_row_size;
            let start = row_start + *slice_size as usize;
            let written = self.serialize(i, &mut dst[start..row_start + max_one_row_size]);
            *slice_size += u32::try_from(written)
                .ok()
                .strata_expect("serialized row exceeds u32");
        }
    }

    /// Decodes one row from the front of `src`, appends it, and returns the unread remainder.
    ///
    /// On error the column is left as it was before the call.
    fn deserialize_and_append<'a>(&mut self, src: &'a [u8]) -> StrataResult<&'a [u8]>;

    /// Decodes one row from each of the first `chunk_size` inputs, advancing each input past the
    /// bytes consumed.
    fn deserialize_and_append_batch(
        &mut self,
        srcs: &mut [&[u8]],
        chunk_size: usize,
    ) -> StrataResult<()> {
        self.reserve(self.len() + chunk_size);
        for src in srcs.iter_mut().take(chunk_size) {
            *src = self.deserialize_and_append(*src)?;
        }
        Ok(())
    }

    /// Folds row `idx` into the running FNV-1a hash.
    fn fnv_hash_at(&self, hash: &mut u32, idx: usize);

    /// Folds row `idx` into the running CRC32 hash.
    fn crc32_hash_at(&self, hash: &mut u32, idx: usize);

    /// Folds rows `[from, to)` into `hashes[from..to]`.
    fn fnv_hash(&self, hashes: &mut [u32], from: usize, to: usize) {
        for (idx, hash) in hashes.iter_mut().enumerate().take(to).skip(from) {
            self.fnv_hash_at(hash, idx);
        }
    }

    fn crc32_hash(&self, hashes: &mut [u32], from: usize, to: usize) {
        for (idx, hash) in hashes.iter_mut().enumerate().take(to).skip(from) {
            self.crc32_hash_at(hash, idx);
        }
    }

    /// An order-independent checksum of rows `[from, to)`.
    fn xor_checksum(&self, from: usize, to: usize) -> i64;

    /// Materializes row `idx`.
    fn get(&self, idx: usize) -> StrataResult<Datum>;

    /// A column of the same kind, and with the same nested kinds, holding no rows.
    fn clone_empty(&self) -> ColumnRef;

    fn clone_column(&self) -> ColumnRef;

    /// Exchanges contents with `rhs`, which must be of the same kind.
    fn swap_column(&mut self, rhs: &mut dyn Column) -> StrataResult<()>;

    /// Drops every row, keeping the column's kind.
    fn reset_column(&mut self);

    fn debug_item(&self, idx: usize) -> String;

    fn debug_string(&self) -> String {
        format!(
            "[{}]",
            (0..self.len()).map(|idx| self.debug_item(idx)).join(", ")
        )
    }

    /// Verifies the column's structural invariants.
    fn check(&self) -> StrataResult<()>;

    /// Checks the column against `limits`.
    ///
    /// Returns a replacement when this column must switch to a wider representation, `None` when
    /// it is fine as is (nested columns may have been replaced in place), and
    /// [`CapacityExceeded`](strata_error::StrataError::CapacityExceeded) when no representation
    /// can hold it.
    fn upgrade_if_overflow(&mut self, limits: &ColumnLimits) -> StrataResult<Option<ColumnRef>>;

    /// The inverse of [`upgrade_if_overflow`](Column::upgrade_if_overflow): returns a narrower
    /// replacement when the contents fit one again.
    fn downgrade(&mut self, limits: &ColumnLimits) -> StrataResult<Option<ColumnRef>>;
}

impl Clone for ColumnRef {
    fn clone(&self) -> Self {
        self.clone_column()
    }
}

/// Downcasts `column` to the concrete kind `T`.
pub fn downcast_column<'a, T: Column>(column: &'a dyn Column, expected: &str) -> StrataResult<&'a T> {
    column
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| strata_err!(MismatchedTypes: expected, column.name()))
}

pub fn downcast_column_mut<'a, T: Column>(
    column: &'a mut dyn Column,
    expected: &str,
) -> StrataResult<&'a mut T> {
    let name = column.name();
    column
        .as_any_mut()
        .downcast_mut::<T>()
        .ok_or_else(|| strata_err!(MismatchedTypes: expected, name))
}

/// Installs the wider replacement of a nested column, if it needs one.
pub fn upgrade_child(child: &mut ColumnRef, limits: &ColumnLimits) -> StrataResult<()> {
    if let Some(upgraded) = child.upgrade_if_overflow(limits)? {
        *child = upgraded;
    }
    Ok(())
}

/// Installs the narrower replacement of a nested column, if it fits one.
pub fn downgrade_child(child: &mut ColumnRef, limits: &ColumnLimits) -> StrataResult<()> {
    if let Some(downgraded) = child.downgrade(limits)? {
        *child = downgraded;
    }
    Ok(())
}

/// Panics if `column` breaks its invariants. Compiled in for debug builds and the
/// `strict-checks` feature.
#[inline]
pub(crate) fn debug_check(column: &dyn Column) {
    if cfg!(any(debug_assertions, feature = "strict-checks")) {
        if let Err(err) = column.check() {
            strata_panic!(err, "invariant violated in {} column", column.name())
        }
    }
}

/// Fails with `MismatchedTypes` unless rows of `src` can be written into `dst`. Leaves `dst`
/// untouched.
pub(crate) fn check_same_kind(dst: &dyn Column, src: &dyn Column) -> StrataResult<()> {
    dst.clone_empty().append(src, 0, 0)
}

/// Checks that row range `[from, from + size)` lies within a column of `len` rows.
pub(crate) fn check_range(from: usize, size: usize, len: usize) -> StrataResult<()> {
    match from.checked_add(size) {
        Some(end) if end <= len => Ok(()),
        _ => Err(strata_err!(OutOfBounds: from.saturating_add(size), 0, len)),
    }
}

/// Checks that `indexes` is strictly increasing and stays below `len`.
pub(crate) fn check_update_indexes(indexes: &[u32], len: usize) -> StrataResult<()> {
    if let Some((prev, next)) = indexes.iter().tuple_windows().find(|(a, b)| a >= b) {
        return Err(strata_err!(
            "update indexes must be strictly increasing, found {} before {}",
            prev,
            next
        ));
    }
    match indexes.last() {
        Some(&last) if last as usize >= len => Err(strata_err!(OutOfBounds: last as usize, 0, len)),
        _ => Ok(()),
    }
}
