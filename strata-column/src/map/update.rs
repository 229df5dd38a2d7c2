use strata_error::{StrataResult, strata_bail};

use super::MapColumn;
use crate::Column;
use crate::column::{check_same_kind, check_update_indexes, debug_check};

impl MapColumn {
    /// Overwrites row `indexes[i]` with row `i` of `src`.
    ///
    /// When every replaced row keeps its cardinality the children are updated element-wise.
    /// Otherwise the column is rebuilt, and left untouched if the rebuild fails.
    pub fn update_map_rows(&mut self, src: &MapColumn, indexes: &[u32]) -> StrataResult<()> {
        if indexes.len() < src.len() {
            strata_bail!(
                "{} map rows need as many update indexes, got {}",
                src.len(),
                indexes.len()
            );
        }
        let indexes = &indexes[..src.len()];
        check_update_indexes(indexes, self.len())?;

        let same_shape = indexes
            .iter()
            .enumerate()
            .all(|(i, &idx)| self.map_size(idx as usize) == src.map_size(i));
        if same_shape {
            self.update_elements(src, indexes)?;
        } else {
            self.rebuild_with(src, indexes)?;
        }
        debug_check(self);
        Ok(())
    }

    fn update_elements(&mut self, src: &MapColumn, indexes: &[u32]) -> StrataResult<()> {
        let offsets = self.offsets.as_slice();
        let src_offsets = src.offsets.as_slice();
        let mut element_indexes = Vec::with_capacity(src.keys.len());
        for (i, &idx) in indexes.iter().enumerate() {
            let start = offsets[idx as usize];
            let size = src_offsets[i + 1] - src_offsets[i];
            element_indexes.extend(start..start + size);
        }
        if element_indexes.is_empty() {
            return Ok(());
        }
        check_same_kind(self.keys.as_ref(), src.keys.as_ref())?;
        check_same_kind(self.values.as_ref(), src.values.as_ref())?;
        self.keys.update_rows(src.keys.as_ref(), &element_indexes)?;
        self.values.update_rows(src.values.as_ref(), &element_indexes)
    }

    fn rebuild_with(&mut self, src: &MapColumn, indexes: &[u32]) -> StrataResult<()> {
        log::debug!(
            "rebuilding {} map rows to apply {} updates that change cardinality",
            self.len(),
            indexes.len()
        );
        let mut rebuilt = self.clone_empty_map();
        rebuilt.reserve(self.len());
        let mut unchanged_from = 0;
        for (i, &idx) in indexes.iter().enumerate() {
            let idx = idx as usize;
            rebuilt.append_range(self, unchanged_from, idx - unchanged_from)?;
            rebuilt.append_range(src, i, 1)?;
            unchanged_from = idx + 1;
        }
        rebuilt.append_range(self, unchanged_from, self.len() - unchanged_from)?;
        *self = rebuilt;
        Ok(())
    }
}
