use std::iter;

use strata_error::{StrataResult, strata_bail, strata_err};

use super::MapColumn;
use crate::column::{check_range, debug_check};
use crate::{Column, Datum};

impl MapColumn {
    /// Appends an offset for a new row holding `cardinality` more elements.
    pub(super) fn push_offset(&mut self, cardinality: usize) -> StrataResult<()> {
        let next = u32::try_from(cardinality)
            .ok()
            .and_then(|cardinality| self.last_offset().checked_add(cardinality))
            .ok_or_else(|| {
                strata_err!(
                    CapacityExceeded: self.last_offset() as usize + cardinality,
                    u32::MAX as usize
                )
            })?;
        self.offsets.push(next);
        Ok(())
    }

    pub(super) fn append_empty_rows(&mut self, count: usize) {
        let last = self.last_offset();
        self.offsets
            .as_mut_vec()
            .extend(iter::repeat_n(last, count));
    }

    pub(super) fn resize_rows(&mut self, rows: usize) {
        if rows <= self.len() {
            self.offsets.as_mut_vec().truncate(rows + 1);
        } else {
            self.append_empty_rows(rows - self.len());
        }
        let elements = self.last_offset() as usize;
        self.keys.resize(elements);
        self.values.resize(elements);
        debug_check(self);
    }

    /// Appends rows `[offset, offset + count)` of `src`, copying their elements.
    pub fn append_range(&mut self, src: &MapColumn, offset: usize, count: usize) -> StrataResult<()> {
        check_range(offset, count, src.len())?;
        let elements = src.elements_of(offset, offset + count);
        let total = self.last_offset() as usize + elements.len();
        if total > u32::MAX as usize {
            log::warn!(
                "map column would address {total} elements, more than 32-bit offsets allow"
            );
            strata_bail!(CapacityExceeded: total, u32::MAX as usize);
        }

        let before = self.keys.len();
        let appended = self
            .keys
            .append(src.keys.as_ref(), elements.start, elements.len())
            .and_then(|()| {
                self.values
                    .append(src.values.as_ref(), elements.start, elements.len())
            });
        if let Err(err) = appended {
            self.keys.resize(before);
            self.values.resize(before);
            return Err(err);
        }

        let mut last = self.last_offset();
        let src_offsets = &src.offsets.as_slice()[offset..=offset + count];
        self.offsets.reserve(self.offsets.len() + count);
        for window in src_offsets.windows(2) {
            last += window[1] - window[0];
            self.offsets.push(last);
        }
        Ok(())
    }

    pub(super) fn append_indexes(
        &mut self,
        src: &MapColumn,
        indexes: &[u32],
        from: usize,
        size: usize,
    ) -> StrataResult<()> {
        check_range(from, size, indexes.len())?;
        self.reserve(self.len() + size);
        for &idx in &indexes[from..from + size] {
            self.append_range(src, idx as usize, 1)?;
        }
        Ok(())
    }

    pub(super) fn append_repeated(
        &mut self,
        src: &MapColumn,
        index: usize,
        size: usize,
    ) -> StrataResult<()> {
        src.check_row(index)?;
        self.reserve(self.len() + size);
        for _ in 0..size {
            self.append_range(src, index, 1)?;
        }
        Ok(())
    }

    pub(super) fn append_map_datum(&mut self, datum: &Datum) -> StrataResult<()> {
        let Some(map) = datum.as_map() else {
            strata_bail!(MismatchedTypes: "map", datum.type_name());
        };
        let elements = self.keys.len();
        for (key, value) in map {
            let appended = self
                .keys
                .append_datum(&Datum::from(key.clone()))
                .and_then(|()| self.values.append_datum(value));
            if let Err(err) = appended {
                self.keys.resize(elements);
                self.values.resize(elements);
                return Err(err);
            }
        }
        self.push_offset(map.len())
    }

    /// Replaces the column with `rows` copies of row `idx`.
    pub(super) fn assign_row(&mut self, rows: usize, idx: usize) -> StrataResult<()> {
        self.check_row(idx)?;
        let mut assigned = self.clone_empty_map();
        assigned.reserve(rows);
        assigned.append_repeated(self, idx, rows)?;
        *self = assigned;
        debug_check(self);
        Ok(())
    }

    /// Replaces every selected, non-empty row with an empty map.
    pub(super) fn fill_empty(&mut self, filter: &[u8]) -> StrataResult<()> {
        let indexes: Vec<u32> = (0u32..)
            .zip(filter.iter().take(self.len()))
            .filter(|&(row, &selected)| selected != 0 && self.map_size(row as usize) > 0)
            .map(|(row, _)| row)
            .collect();
        if indexes.is_empty() {
            return Ok(());
        }
        let mut empty = self.clone_empty_map();
        empty.append_empty_rows(indexes.len());
        self.update_map_rows(&empty, &indexes)
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use crate::test_harness::{int_map_column, map_rows, string_int_map_column};
    use crate::{Column, Datum, Int32Column};

    #[rstest]
    #[case(0, 0)]
    #[case(0, 5)]
    #[case(1, 3)]
    #[case(2, 1)]
    #[case(4, 1)]
    fn bulk_append_matches_single_rows(#[case] offset: usize, #[case] count: usize) {
        let src = string_int_map_column(&[
            &[("a", 1)],
            &[],
            &[("b", 2), ("c", 3)],
            &[],
            &[("d", 4), ("e", 5), ("f", 6)],
        ]);
        let mut bulk = string_int_map_column(&[&[("z", 0)]]);
        let mut single = bulk.clone();

        bulk.append(&src, offset, count).unwrap();
        for row in offset..offset + count {
            single.append(&src, row, 1).unwrap();
        }
        assert_eq!(bulk.offsets(), single.offsets());
        assert_eq!(map_rows(&bulk), map_rows(&single));
        assert_eq!(bulk.keys().len(), single.keys().len());
        bulk.check().unwrap();
    }

    #[test]
    fn append_range_rebases_offsets() {
        let src = int_map_column(&[&[(1, 1)], &[(2, 2), (3, 3)], &[], &[(4, 4)]]);
        let mut column = int_map_column(&[&[(9, 9)]]);
        column.append(&src, 1, 3).unwrap();
        assert_eq!(column.offsets().as_slice(), &[0, 1, 3, 3, 4]);
        assert_eq!(column.debug_string(), "[{9:9}, {2:2,3:3}, {}, {4:4}]");

        assert!(column.append(&src, 3, 2).is_err());
        assert!(column.append(&Int32Column::new(), 0, 0).is_err());
        assert_eq!(column.len(), 4);
    }

    #[test]
    fn append_selective_and_repeated() {
        let src = int_map_column(&[&[(1, 1)], &[(2, 2), (3, 3)], &[]]);
        let mut column = int_map_column(&[]);
        column.append_selective(&src, &[5, 2, 0, 1], 1, 3).unwrap();
        assert_eq!(column.debug_string(), "[{}, {1:1}, {2:2,3:3}]");

        column.append_value_multiple_times(&src, 1, 2).unwrap();
        assert_eq!(column.len(), 5);
        assert_eq!(column.map_size(4), 2);
        assert!(column.append_value_multiple_times(&src, 3, 1).is_err());
    }

    #[test]
    fn append_datum_rejects_other_kinds() {
        let mut column = string_int_map_column(&[]);
        column
            .append_datum(&Datum::map([("a", 1i32), ("b", 2)]))
            .unwrap();
        assert!(column.append_datum(&Datum::Int32(1)).is_err());

        // A value of the wrong kind leaves no partial row behind.
        let bad = Datum::map([("c", Datum::from("not an int"))]);
        assert!(column.append_datum(&bad).is_err());
        assert_eq!(column.len(), 1);
        assert_eq!(column.keys().len(), 2);
        column.check().unwrap();
    }

    #[test]
    fn nulls_and_defaults_are_empty_maps() {
        let mut column = int_map_column(&[&[(1, 1)]]);
        assert!(column.append_nulls(2));
        column.append_default(1);
        assert_eq!(column.offsets().as_slice(), &[0, 1, 1, 1, 1]);
        assert_eq!(column.get(2).unwrap(), Datum::map(Vec::<(i32, i32)>::new()));
    }

    #[test]
    fn resize_repeats_last_offset() {
        let mut column = int_map_column(&[&[(1, 1)], &[(2, 2), (3, 3)]]);
        column.resize(4);
        assert_eq!(column.offsets().as_slice(), &[0, 1, 3, 3, 3]);
        column.resize(1);
        assert_eq!(column.offsets().as_slice(), &[0, 1]);
        assert_eq!(column.keys().len(), 1);
        assert_eq!(column.values().len(), 1);
    }

    #[test]
    fn assign_copies_one_row() {
        let mut column = int_map_column(&[&[(1, 1)], &[(2, 2), (3, 3)]]);
        column.assign(3, 1).unwrap();
        assert_eq!(column.len(), 3);
        assert_eq!(column.keys().len(), 6);
        let expected = Datum::map([(2i32, 2i32), (3, 3)]);
        assert_eq!(map_rows(&column), vec![expected.clone(), expected.clone(), expected]);
        assert!(column.assign(1, 3).is_err());
    }

    #[test]
    fn fill_default_empties_selected_rows() {
        let mut column = int_map_column(&[&[(1, 1)], &[(2, 2), (3, 3)], &[], &[(4, 4)]]);
        column.fill_default(&[0, 1, 1, 0]).unwrap();
        assert_eq!(column.debug_string(), "[{1:1}, {}, {}, {4:4}]");
        assert_eq!(column.keys().len(), 2);
        column.check().unwrap();
    }
}
