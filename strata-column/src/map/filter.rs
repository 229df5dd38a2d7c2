use static_assertions::const_assert_eq;
use strata_error::StrataExpect;

use super::MapColumn;
use crate::Column;
use crate::column::debug_check;

/// Filter lanes examined per batch, one byte per row, matching a 256-bit register.
const BATCH_SIZE: usize = 32;
// A batch's keep flags are gathered into the bits of a `u32`.
const_assert_eq!(BATCH_SIZE, u32::BITS as usize);

/// Strategy for compacting the offsets of a filtered map column.
///
/// Both kernels produce identical results; the batched kernel skips or bulk-copies runs of
/// uniformly kept or dropped rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKernel {
    /// One row at a time.
    Scalar,
    /// 32 rows at a time, with a scalar tail.
    Batched,
}

impl FilterKernel {
    /// The batched kernel when the CPU can gather a batch's flags in one instruction.
    pub fn detect() -> Self {
        if avx2_available() {
            FilterKernel::Batched
        } else {
            FilterKernel::Scalar
        }
    }
}

#[cfg(target_arch = "x86_64")]
fn avx2_available() -> bool {
    std::arch::is_x86_feature_detected!("avx2")
}

#[cfg(not(target_arch = "x86_64"))]
fn avx2_available() -> bool {
    false
}

/// Gathers the keep flags of one batch into a bit mask.
#[derive(Clone, Copy)]
#[cfg_attr(not(target_arch = "x86_64"), allow(dead_code))]
struct LaneMasker {
    avx2: bool,
}

impl LaneMasker {
    fn detect() -> Self {
        Self {
            avx2: avx2_available(),
        }
    }

    /// Bit `i` of the result is set iff `lanes[i]` is non-zero.
    #[inline]
    fn keep_mask(self, lanes: &[u8; BATCH_SIZE]) -> u32 {
        #[cfg(target_arch = "x86_64")]
        if self.avx2 {
            // SAFETY: `avx2` is only set after runtime detection of the feature.
            return unsafe { avx2::keep_mask(lanes) };
        }
        portable_keep_mask(lanes)
    }
}

#[inline]
fn portable_keep_mask(lanes: &[u8; BATCH_SIZE]) -> u32 {
    lanes
        .iter()
        .enumerate()
        .fold(0, |mask, (i, &lane)| mask | (u32::from(lane != 0) << i))
}

#[cfg(target_arch = "x86_64")]
mod avx2 {
    use std::arch::x86_64::{
        __m256i, _mm256_cmpeq_epi8, _mm256_loadu_si256, _mm256_movemask_epi8,
        _mm256_setzero_si256,
    };

    use super::BATCH_SIZE;

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn keep_mask(lanes: &[u8; BATCH_SIZE]) -> u32 {
        // SAFETY: `lanes` is exactly one unaligned 256-bit load wide.
        let zero_lanes = unsafe {
            let batch = _mm256_loadu_si256(lanes.as_ptr().cast::<__m256i>());
            _mm256_movemask_epi8(_mm256_cmpeq_epi8(batch, _mm256_setzero_si256()))
        };
        !(zero_lanes as u32)
    }
}

/// Marks the element slots of a kept row.
#[inline]
fn keep_elements(element_filter: &mut [u8], start: u32, end: u32) {
    element_filter[start as usize..end as usize].fill(1);
}

/// Compacts `offsets` in place for the rows of `[from, to)` kept by `filter`, marking the kept
/// rows' elements in `element_filter`. Returns the number of rows kept, plus `from`.
///
/// Writing `offsets[result + 1]` never clobbers an entry still to be read: `result <= i`
/// always holds, and `result == i` only while no row has been dropped, in which case the
/// rewritten entry is unchanged.
fn compact_offsets(
    offsets: &mut [u32],
    filter: &[u8],
    from: usize,
    to: usize,
    element_filter: &mut [u8],
    kernel: FilterKernel,
) -> usize {
    let mut check = from;
    let mut result = from;

    if kernel == FilterKernel::Batched {
        let masker = LaneMasker::detect();
        while check + BATCH_SIZE < to {
            let lanes = filter[check..]
                .first_chunk::<BATCH_SIZE>()
                .strata_expect("a full batch of filter lanes");
            let mask = masker.keep_mask(lanes);

            if mask == u32::MAX {
                // The whole batch survives: move its offsets down, rebased on the last kept
                // row, in one copy.
                keep_elements(element_filter, offsets[check], offsets[check + BATCH_SIZE]);
                if result != check {
                    let delta = offsets[check] - offsets[result];
                    offsets.copy_within(check + 1..=check + BATCH_SIZE, result + 1);
                    for offset in &mut offsets[result + 1..=result + BATCH_SIZE] {
                        *offset -= delta;
                    }
                }
                result += BATCH_SIZE;
            } else if mask != 0 {
                let mut remaining = mask;
                while remaining != 0 {
                    let idx = check + remaining.trailing_zeros() as usize;
                    let (start, end) = (offsets[idx], offsets[idx + 1]);
                    keep_elements(element_filter, start, end);
                    offsets[result + 1] = offsets[result] + (end - start);
                    result += 1;
                    remaining &= remaining - 1;
                }
            }
            check += BATCH_SIZE;
        }
    }

    for i in check..to {
        if filter[i] != 0 {
            let (start, end) = (offsets[i], offsets[i + 1]);
            keep_elements(element_filter, start, end);
            offsets[result + 1] = offsets[result] + (end - start);
            result += 1;
        }
    }
    result
}

impl MapColumn {
    /// [`Column::filter_range`] with an explicit kernel.
    ///
    /// Rows in `[from, to)` whose filter byte is non-zero are compacted towards `from`; rows
    /// before `from` are untouched and rows from `to` onwards are dropped.
    pub fn filter_range_with(
        &mut self,
        filter: &[u8],
        from: usize,
        to: usize,
        kernel: FilterKernel,
    ) -> usize {
        debug_assert_eq!(to, self.len(), "filter range must end at the last row");
        debug_assert!(
            filter.len() >= to,
            "filter of {} rows cannot select from {to} rows",
            filter.len()
        );
        let elements = self.elements_of(from, to);
        let mut element_filter = vec![0u8; elements.end];
        let result = compact_offsets(
            self.offsets.as_mut_slice(),
            filter,
            from,
            to,
            &mut element_filter,
            kernel,
        );

        let kept_elements = self.offsets.value(result) as usize;
        let kept_keys = self
            .keys
            .filter_range(&element_filter, elements.start, elements.end);
        debug_assert_eq!(kept_keys, kept_elements);
        let kept_values = self
            .values
            .filter_range(&element_filter, elements.start, elements.end);
        debug_assert_eq!(kept_values, kept_elements);

        self.offsets.as_mut_vec().truncate(result + 1);
        self.keys.resize(kept_elements);
        self.values.resize(kept_elements);
        debug_check(self);
        result
    }
}

#[cfg(test)]
mod test {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;

    use super::*;
    use crate::Datum;
    use crate::test_harness::{int_map_column, map_rows, string_int_map_column};

    fn sequential_maps(rows: usize) -> MapColumn {
        let mut column = int_map_column(&[]);
        for row in 0..rows {
            let row = i32::try_from(row).unwrap();
            let pairs = (0..row % 3).map(|k| (k, row * 10 + k));
            column.append_datum(&Datum::map(pairs)).unwrap();
        }
        column
    }

    #[test]
    fn portable_mask_matches_lanes() {
        let mut lanes = [0u8; BATCH_SIZE];
        lanes[0] = 1;
        lanes[5] = 0xFF;
        lanes[31] = 2;
        assert_eq!(portable_keep_mask(&lanes), 1 | 1 << 5 | 1 << 31);
        assert_eq!(LaneMasker::detect().keep_mask(&lanes), 1 | 1 << 5 | 1 << 31);
        assert_eq!(LaneMasker::detect().keep_mask(&[7; BATCH_SIZE]), u32::MAX);
        assert_eq!(LaneMasker::detect().keep_mask(&[0; BATCH_SIZE]), 0);
    }

    #[rstest]
    #[case::scalar(FilterKernel::Scalar)]
    #[case::batched(FilterKernel::Batched)]
    fn filter_small(#[case] kernel: FilterKernel) {
        let mut column = int_map_column(&[&[(1, 10)], &[(2, 20), (3, 30)], &[], &[(4, 40)]]);
        let kept = column.filter_range_with(&[1, 0, 1, 1], 0, 4, kernel);
        assert_eq!(kept, 3);
        assert_eq!(column.offsets().as_slice(), &[0, 1, 1, 2]);
        assert_eq!(column.debug_string(), "[{1:10}, {}, {4:40}]");
    }

    #[rstest]
    #[case::scalar(FilterKernel::Scalar)]
    #[case::batched(FilterKernel::Batched)]
    fn filter_string_keys(#[case] kernel: FilterKernel) {
        let mut column = string_int_map_column(&[
            &[("a", 1)],
            &[],
            &[("b", 2), ("c", 3)],
            &[],
            &[("d", 4)],
        ]);
        assert_eq!(column.filter_range_with(&[1, 0, 1, 1, 0], 0, 5, kernel), 3);
        assert_eq!(column.debug_string(), "[{'a':1}, {'b':2,'c':3}, {}]");
        assert_eq!(column.keys().len(), 3);
        column.check().unwrap();
    }

    #[rstest]
    #[case::scalar(FilterKernel::Scalar)]
    #[case::batched(FilterKernel::Batched)]
    fn filter_from_offset_keeps_prefix(#[case] kernel: FilterKernel) {
        let mut column = sequential_maps(100);
        let expected = map_rows(&column);
        let mut filter = vec![0u8; 100];
        filter[70] = 1;
        let kept = column.filter_range_with(&filter, 40, 100, kernel);
        assert_eq!(kept, 41);
        let rows = map_rows(&column);
        assert_eq!(rows[..40], expected[..40]);
        assert_eq!(rows[40], expected[70]);
    }

    #[rstest]
    #[case::scalar(FilterKernel::Scalar)]
    #[case::batched(FilterKernel::Batched)]
    fn filter_uniform_batches(#[case] kernel: FilterKernel) {
        // A dropped batch followed by kept batches forces the rebasing copy.
        let mut column = sequential_maps(130);
        let expected = map_rows(&column);
        let mut filter = vec![1u8; 130];
        filter[..32].fill(0);
        let kept = column.filter_range_with(&filter, 0, 130, kernel);
        assert_eq!(kept, 98);
        assert_eq!(map_rows(&column), expected[32..]);

        let mut column = sequential_maps(130);
        assert_eq!(column.filter_range_with(&[0; 130], 0, 130, kernel), 0);
        assert_eq!(column.keys().len(), 0);
        assert_eq!(column.values().len(), 0);
    }

    #[rstest]
    #[case::scalar(FilterKernel::Scalar)]
    #[case::batched(FilterKernel::Batched)]
    fn keep_everything_is_identity(#[case] kernel: FilterKernel) {
        let mut column = sequential_maps(100);
        let expected = column.clone();
        assert_eq!(column.filter_range_with(&[1; 100], 0, 100, kernel), 100);
        assert_eq!(column.offsets(), expected.offsets());
        assert_eq!(map_rows(&column), map_rows(&expected));
        assert_eq!(column.keys().len(), expected.keys().len());
        column.check().unwrap();
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "filter of 3 rows cannot select from 4 rows")]
    fn short_filter_panics() {
        sequential_maps(4).filter_range_with(&[1, 1, 1], 0, 4, FilterKernel::Scalar);
    }

    #[test]
    fn kernels_agree_on_random_filters() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..50 {
            let rows = rng.random_range(0..300);
            let from = rng.random_range(0..=rows);
            let density: f64 = rng.random();
            let filter: Vec<u8> = (0..rows)
                .map(|_| u8::from(rng.random_bool(density)) * rng.random_range(1..=255))
                .collect();

            let mut scalar = sequential_maps(rows);
            let mut batched = scalar.clone();
            let kept_scalar = scalar.filter_range_with(&filter, from, rows, FilterKernel::Scalar);
            let kept_batched =
                batched.filter_range_with(&filter, from, rows, FilterKernel::Batched);

            assert_eq!(kept_scalar, kept_batched);
            assert_eq!(
                kept_scalar,
                from + filter[from..].iter().filter(|&&f| f != 0).count()
            );
            assert_eq!(scalar.offsets(), batched.offsets());
            assert_eq!(map_rows(&scalar), map_rows(&batched));
        }
    }

    #[test]
    fn filter_via_column_trait() {
        let mut column = sequential_maps(5);
        assert_eq!(column.filter(&[0, 1, 0, 1, 0]), 2);
        assert_eq!(column.debug_string(), "[{0:10}, {}]");
    }
}
