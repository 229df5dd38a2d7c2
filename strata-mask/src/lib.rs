//! A mask is a selection over the rows of a column: every row is either kept or dropped.
#![deny(missing_docs)]
mod filter;

use std::sync::Arc;

use arrow_buffer::{BooleanBuffer, BooleanBufferBuilder};

/// A selection over `len` rows.
///
/// The all-true and all-false cases are kept symbolic so that filters can short-circuit without
/// touching any per-row state.
#[derive(Clone, Debug)]
pub enum Mask {
    /// All rows are kept.
    AllTrue(usize),
    /// No rows are kept.
    AllFalse(usize),
    /// Some rows are kept and some are dropped.
    Values(Arc<MaskValues>),
}

/// The bitmap of a [`Mask`] that keeps some rows and drops others.
#[derive(Debug)]
pub struct MaskValues {
    buffer: BooleanBuffer,
    true_count: usize,
}

impl Mask {
    /// A mask keeping all `len` rows.
    pub fn new_true(len: usize) -> Self {
        Self::AllTrue(len)
    }

    /// A mask dropping all `len` rows.
    pub fn new_false(len: usize) -> Self {
        Self::AllFalse(len)
    }

    /// Wraps a bitmap, collapsing it to a uniform mask when every bit agrees.
    pub fn from_buffer(buffer: BooleanBuffer) -> Self {
        let len = buffer.len();
        match buffer.count_set_bits() {
            0 => Self::AllFalse(len),
            true_count if true_count == len => Self::AllTrue(len),
            true_count => Self::Values(Arc::new(MaskValues { buffer, true_count })),
        }
    }

    /// A mask over `len` rows keeping exactly the rows at the sorted `indices`.
    ///
    /// ## Panics
    ///
    /// Panics if `indices` is unsorted or reaches past `len`.
    pub fn from_indices(len: usize, indices: &[usize]) -> Self {
        assert!(indices.is_sorted(), "mask indices must be sorted");
        assert!(
            indices.last().is_none_or(|&idx| idx < len),
            "mask indices must be below {len}"
        );
        let mut builder = BooleanBufferBuilder::new(len);
        builder.append_n(len, false);
        for &idx in indices {
            builder.set_bit(idx, true);
        }
        Self::from_buffer(builder.finish())
    }

    /// Number of rows covered by the mask, kept or not.
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        match self {
            Self::AllTrue(len) | Self::AllFalse(len) => *len,
            Self::Values(values) => values.buffer.len(),
        }
    }

    /// Number of kept rows.
    #[inline]
    pub fn true_count(&self) -> usize {
        match self {
            Self::AllTrue(len) => *len,
            Self::AllFalse(_) => 0,
            Self::Values(values) => values.true_count,
        }
    }

    /// Number of dropped rows.
    #[inline]
    pub fn false_count(&self) -> usize {
        self.len() - self.true_count()
    }

    /// True if every row is kept.
    #[inline]
    pub fn all_true(&self) -> bool {
        self.true_count() == self.len()
    }

    /// True if no row is kept.
    #[inline]
    pub fn all_false(&self) -> bool {
        self.true_count() == 0
    }
}
