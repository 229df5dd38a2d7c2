use strata_error::{StrataResult, strata_bail};

use super::MapColumn;
use crate::column::{downgrade_child, upgrade_child};
use crate::{Column, ColumnLimits, ColumnRef};

impl MapColumn {
    /// The map's own offsets never widen: a child that outgrows its representation is replaced in
    /// place, so the map itself never needs a replacement.
    pub(super) fn upgrade_children(
        &mut self,
        limits: &ColumnLimits,
    ) -> StrataResult<Option<ColumnRef>> {
        if self.offsets.len() > limits.max_capacity {
            log::warn!(
                "map column with {} offsets exceeds the capacity limit {}",
                self.offsets.len(),
                limits.max_capacity
            );
            strata_bail!(CapacityExceeded: self.offsets.len(), limits.max_capacity);
        }
        let was_large = self.has_large_column();
        upgrade_child(&mut self.keys, limits)?;
        upgrade_child(&mut self.values, limits)?;
        if !was_large && self.has_large_column() {
            log::debug!("map column children upgraded to 64-bit offsets");
        }
        Ok(None)
    }

    pub(super) fn downgrade_children(
        &mut self,
        limits: &ColumnLimits,
    ) -> StrataResult<Option<ColumnRef>> {
        if !self.has_large_column() {
            return Ok(None);
        }
        downgrade_child(&mut self.keys, limits)?;
        downgrade_child(&mut self.values, limits)?;
        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use crate::test_harness::{int_map_column, map_rows, string_int_map_column};
    use crate::{Column, ColumnLimits};

    #[test]
    fn small_column_needs_nothing() {
        let mut column = string_int_map_column(&[&[("a", 1)]]);
        let limits = ColumnLimits::default();
        assert!(column.upgrade_if_overflow(&limits).unwrap().is_none());
        assert!(!column.has_large_column());
        assert!(column.downgrade(&limits).unwrap().is_none());
    }

    #[test]
    fn child_upgrade_is_installed_in_place() {
        let mut column = string_int_map_column(&[&[("abc", 1), ("def", 2)], &[("g", 3)]]);
        let before = map_rows(&column);
        let limits = ColumnLimits::default().with_max_large_capacity(4);

        assert!(column.upgrade_if_overflow(&limits).unwrap().is_none());
        assert!(column.has_large_column());
        assert!(column.keys().is_large());
        assert!(!column.is_large());
        assert_eq!(map_rows(&column), before);
        column.check().unwrap();

        column.resize(0);
        assert!(column.downgrade(&limits).unwrap().is_none());
        assert!(!column.has_large_column());
    }

    #[test]
    fn upgraded_keys_accept_narrow_sources() {
        let mut column = string_int_map_column(&[&[("abc", 1), ("def", 2)]]);
        let limits = ColumnLimits::default().with_max_large_capacity(4);
        column.upgrade_if_overflow(&limits).unwrap();
        assert!(column.keys().is_large());

        let src = string_int_map_column(&[&[("g", 3)], &[], &[("h", 4), ("i", 5)]]);
        column.append(&src, 0, 2).unwrap();
        column.append_selective(&src, &[2], 0, 1).unwrap();
        column.update_rows(&string_int_map_column(&[&[("x", 9)]]), &[1]).unwrap();
        assert_eq!(
            column.debug_string(),
            "[{'abc':1,'def':2}, {'x':9}, {}, {'h':4,'i':5}]"
        );
        column.check().unwrap();
    }

    #[test]
    fn too_many_rows() {
        let mut column = int_map_column(&[&[], &[], &[]]);
        let limits = ColumnLimits::default().with_max_capacity(3);
        let err = column.upgrade_if_overflow(&limits).unwrap_err();
        assert!(err.is_capacity_exceeded());
    }

    #[test]
    fn failed_upgrade_leaves_column_unmodified() {
        let mut column = string_int_map_column(&[&[("abcdef", 1)], &[("g", 2)], &[]]);
        let before = map_rows(&column);
        let limits = ColumnLimits::default()
            .with_max_capacity(3)
            .with_max_large_capacity(4);
        assert!(column.upgrade_if_overflow(&limits).unwrap_err().is_capacity_exceeded());
        assert!(!column.has_large_column());
        assert_eq!(column.offsets().as_slice(), &[0, 1, 2, 2]);
        assert_eq!(map_rows(&column), before);
        column.check().unwrap();
    }
}
