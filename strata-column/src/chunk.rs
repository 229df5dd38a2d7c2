use itertools::Itertools;
use strata_error::{StrataResult, strata_bail};
use strata_mask::Mask;

use crate::column::{debug_check, downgrade_child, upgrade_child};
use crate::{Column, ColumnLimits, ColumnRef};

/// An ordered set of equally long columns, the unit of data moved between operators.
#[derive(Clone, Debug, Default)]
pub struct Chunk {
    columns: Vec<ColumnRef>,
}

/// Indices of the rows whose filter byte is non-zero.
pub fn build_selective(filter: &[u8]) -> Vec<u32> {
    (0u32..)
        .zip(filter)
        .filter(|&(_, &selected)| selected != 0)
        .map(|(idx, _)| idx)
        .collect()
}

impl Chunk {
    pub fn try_new(columns: Vec<ColumnRef>) -> StrataResult<Self> {
        if let Some((a, b)) = columns
            .iter()
            .map(|column| column.len())
            .tuple_windows()
            .find(|(a, b)| a != b)
        {
            strata_bail!("chunk columns must be equally long, found {} and {} rows", a, b);
        }
        Ok(Self { columns })
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |column| column.len())
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    pub fn column(&self, idx: usize) -> &dyn Column {
        self.columns[idx].as_ref()
    }

    pub fn into_columns(self) -> Vec<ColumnRef> {
        self.columns
    }

    /// A chunk with the same column kinds and no rows, with room for `reserve` rows.
    pub fn clone_empty(&self, reserve: usize) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|column| {
                    let mut empty = column.clone_empty();
                    empty.reserve(reserve);
                    empty
                })
                .collect(),
        }
    }

    fn check_shape(&self, other: &Chunk) -> StrataResult<()> {
        if self.num_columns() != other.num_columns() {
            strata_bail!(
                "cannot combine a chunk of {} columns with one of {}",
                self.num_columns(),
                other.num_columns()
            );
        }
        Ok(())
    }

    /// Appends rows `[offset, offset + count)` of `src`.
    pub fn append(&mut self, src: &Chunk, offset: usize, count: usize) -> StrataResult<()> {
        self.check_shape(src)?;
        for (column, src) in self.columns.iter_mut().zip(&src.columns) {
            column.append(src.as_ref(), offset, count)?;
        }
        Ok(())
    }

    pub fn append_all(&mut self, src: &Chunk) -> StrataResult<()> {
        self.append(src, 0, src.num_rows())
    }

    pub fn append_selective(
        &mut self,
        src: &Chunk,
        indexes: &[u32],
        from: usize,
        size: usize,
    ) -> StrataResult<()> {
        self.check_shape(src)?;
        for (column, src) in self.columns.iter_mut().zip(&src.columns) {
            column.append_selective(src.as_ref(), indexes, from, size)?;
        }
        Ok(())
    }

    /// Keeps the rows whose filter byte is non-zero and returns the new row count.
    pub fn filter(&mut self, filter: &[u8]) -> usize {
        let rows = self.num_rows();
        for column in &mut self.columns {
            column.filter_range(filter, 0, rows);
        }
        self.num_rows()
    }

    pub fn filter_mask(&mut self, mask: &Mask) -> StrataResult<usize> {
        for column in &mut self.columns {
            column.filter_mask(mask)?;
        }
        Ok(self.num_rows())
    }

    /// Bytes of memory attributable to the chunk's rows.
    pub fn memory_usage(&self) -> usize {
        self.columns
            .iter()
            .map(|column| column.element_memory_usage(0, column.len()))
            .sum()
    }

    /// Widens any column that outgrew its representation, see [`Column::upgrade_if_overflow`].
    pub fn upgrade_if_overflow(&mut self, limits: &ColumnLimits) -> StrataResult<()> {
        for column in &mut self.columns {
            upgrade_child(column, limits)?;
        }
        Ok(())
    }

    pub fn downgrade(&mut self, limits: &ColumnLimits) -> StrataResult<()> {
        for column in &mut self.columns {
            downgrade_child(column, limits)?;
        }
        Ok(())
    }

    pub fn check(&self) -> StrataResult<()> {
        let rows = self.num_rows();
        for column in &self.columns {
            if column.len() != rows {
                strata_bail!(
                    AssertionFailed: "chunk column {} has {} rows, expected {}",
                    column.name(),
                    column.len(),
                    rows
                );
            }
            column.check()?;
        }
        Ok(())
    }

    pub fn debug_row(&self, idx: usize) -> String {
        format!(
            "[{}]",
            self.columns
                .iter()
                .map(|column| column.debug_item(idx))
                .join(", ")
        )
    }

    pub(crate) fn debug_check(&self) {
        for column in &self.columns {
            debug_check(column.as_ref());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_harness::{int_chunk, int_map_column};
    use crate::{BinaryColumn, Int32Column, NullableColumn};

    #[test]
    fn selective_indexes() {
        assert_eq!(build_selective(&[0, 1, 0, 9, 1]), vec![1, 3, 4]);
        assert!(build_selective(&[]).is_empty());
    }

    #[test]
    fn columns_must_match() {
        let err = Chunk::try_new(vec![
            Box::new(Int32Column::from(vec![1, 2])),
            Box::new(Int32Column::from(vec![1])),
        ])
        .unwrap_err();
        assert!(err.to_string().starts_with("chunk columns must be equally long"));
    }

    #[test]
    fn append_and_filter_mixed_columns() {
        let maps = int_map_column(&[&[(1, 1)], &[], &[(2, 2), (3, 3)]]);
        let ints = NullableColumn::wrap(Box::new(Int32Column::from(vec![7, 8, 9])));
        let src = Chunk::try_new(vec![Box::new(maps), Box::new(ints)]).unwrap();

        let mut chunk = src.clone_empty(4);
        chunk.append(&src, 1, 2).unwrap();
        chunk.append_selective(&src, &[0, 2], 0, 2).unwrap();
        assert_eq!(chunk.num_rows(), 4);
        assert_eq!(chunk.debug_row(1), "[{2:2,3:3}, 9]");
        chunk.check().unwrap();

        assert_eq!(chunk.filter(&[1, 0, 0, 1]), 2);
        assert_eq!(chunk.debug_row(0), "[{}, 8]");
        assert_eq!(chunk.debug_row(1), "[{2:2,3:3}, 9]");
    }

    #[test]
    fn filter_by_mask() {
        let mut chunk = int_chunk(0..10);
        assert_eq!(chunk.filter_mask(&Mask::new_true(10)).unwrap(), 10);
        assert_eq!(
            chunk
                .filter_mask(&Mask::from_indices(10, &[2, 5]))
                .unwrap(),
            2
        );
        assert_eq!(chunk.debug_row(1), "[5]");
        assert!(chunk.filter_mask(&Mask::new_true(3)).is_err());
    }

    #[test]
    fn upgrade_binary_columns() {
        let strings = BinaryColumn::from_values(["abc", "defg"]);
        let mut chunk = Chunk::try_new(vec![Box::new(strings)]).unwrap();
        let limits = ColumnLimits::default().with_max_large_capacity(4);
        chunk.upgrade_if_overflow(&limits).unwrap();
        assert_eq!(chunk.column(0).name(), "large-binary");
        assert_eq!(chunk.debug_row(1), "['defg']");

        chunk.filter(&[1, 0]);
        chunk.downgrade(&limits).unwrap();
        assert_eq!(chunk.column(0).name(), "binary");
    }

    #[test]
    fn shape_mismatch() {
        let mut chunk = int_chunk(0..2);
        let wider = Chunk::try_new(vec![
            Box::new(Int32Column::from(vec![1])),
            Box::new(Int32Column::from(vec![1])),
        ])
        .unwrap();
        assert!(chunk.append_all(&wider).is_err());
    }
}
